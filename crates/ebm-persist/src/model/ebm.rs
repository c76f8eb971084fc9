//! Fitted explainable boosting model.
//!
//! [`EbmModel`] is an additive model: the raw score of a row is the intercept
//! plus, for every term, the grid cell addressed by the buckets of the term's
//! member features. It can only be obtained through its validating builder,
//! so a value of this type is always a complete, consistent fitted model.

use std::collections::{BTreeMap, HashSet};

use bon::Builder;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;

use super::{ClassLabel, FeatureBinning, FeatureInfo, ModelVariant, Task, Term};
use crate::codec::Table;

// =============================================================================
// ModelError
// =============================================================================

/// Invariant violations of a fitted model, reported by the builder and by
/// prediction entry points.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("term {term} has no member features")]
    EmptyTerm { term: usize },

    #[error("term {term}: feature index {feature} out of range for {n_features} features")]
    TermFeatureOutOfRange {
        term: usize,
        feature: usize,
        n_features: usize,
    },

    #[error("term {term}: feature {feature} appears more than once")]
    DuplicateTermFeature { term: usize, feature: usize },

    #[error("interaction {interaction}: feature index {feature} out of range for {n_features} features")]
    InteractionOutOfRange {
        interaction: usize,
        feature: usize,
        n_features: usize,
    },

    #[error("binning given for feature {feature} but the model has {n_features} features")]
    BinningOutOfRange { feature: usize, n_features: usize },

    #[error("term {term}: no binning for feature {feature}")]
    MissingBinning { term: usize, feature: usize },

    #[error("binning given for feature {feature}, which no term uses")]
    UnusedBinning { feature: usize },

    #[error("feature {feature}: bin edges must be finite and strictly increasing (position {position})")]
    NonMonotonicEdges { feature: usize, position: usize },

    #[error("feature {feature}: histogram has {edges} edges but {counts} counts")]
    HistogramMismatch {
        feature: usize,
        edges: usize,
        counts: usize,
    },

    #[error("term {term}: {grid} shape {actual:?} does not match expected {expected:?}")]
    ShapeMismatch {
        term: usize,
        grid: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("non-finite value in {context}")]
    NonFinite { context: String },

    #[error("feature {feature}: nonzero fraction {value} outside [0, 1]")]
    InvalidNonzeroFraction { feature: usize, value: f64 },

    #[error("term {term}: importance must be finite and non-negative, got {value}")]
    InvalidImportance { term: usize, value: f64 },

    #[error("classification requires at least one class label")]
    NoClasses,

    #[error("duplicate class label {label}")]
    DuplicateClass { label: ClassLabel },

    #[error("expected {expected} input columns, got {actual}")]
    InputWidth { expected: usize, actual: usize },

    #[error("probabilities are only defined for classification models")]
    NotClassifier,
}

// =============================================================================
// Predictions
// =============================================================================

/// Output of [`EbmModel::predict`].
#[derive(Debug, Clone, PartialEq)]
pub enum Predictions {
    /// Regression outputs, one per row.
    Values(Array1<f64>),
    /// Most probable class label per row.
    Labels(Vec<ClassLabel>),
}

// =============================================================================
// EbmModel
// =============================================================================

/// A fitted explainable boosting model.
///
/// # Example
///
/// ```
/// use ebm_persist::model::{EbmModel, FeatureBinning, FeatureInfo, Task, Term};
/// use ndarray::{arr1, arr2};
///
/// let model = EbmModel::builder()
///     .features(vec![FeatureInfo::continuous("age")])
///     .task(Task::Regression)
///     .intercept(0.5)
///     .terms(vec![Term::new(vec![0], arr1(&[-1.0, 1.0]).into_dyn())])
///     .binning([(0, FeatureBinning::new(vec![40.0], 18.0, 90.0))].into())
///     .build()
///     .unwrap();
///
/// let scores = model.predict_scores(arr2(&[[30.0], [50.0]]).view()).unwrap();
/// assert_eq!(scores.column(0).to_vec(), vec![-0.5, 1.5]);
/// ```
#[derive(Clone, Builder)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct EbmModel {
    /// Input features, in column order.
    features: Vec<FeatureInfo>,

    /// Prediction target.
    task: Task,

    /// Constant added to every raw score. Default: 0.
    #[builder(default)]
    intercept: f64,

    /// Additive terms, summed in order.
    #[builder(default)]
    terms: Vec<Term>,

    /// Binning per feature index. Exactly the features used by some term
    /// have an entry.
    #[builder(default)]
    binning: BTreeMap<usize, FeatureBinning>,

    /// Interaction specification requested at construction.
    #[builder(default)]
    interactions: Vec<Vec<usize>>,

    /// Fitting variant. Default: [`ModelVariant::Standard`].
    #[builder(default)]
    variant: ModelVariant,
}

/// Custom finishing function that validates the model.
impl<S: ebm_model_builder::IsComplete> EbmModelBuilder<S> {
    /// Build and validate the model.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if any index is out of range, binning is given
    /// for a feature no term uses, any bin edge list is not strictly
    /// increasing, any grid shape disagrees with the bucket counts of its
    /// features, any value is non-finite, or the class list is empty or holds
    /// duplicates.
    pub fn build(self) -> Result<EbmModel, ModelError> {
        let model = self.__build_internal();
        model.validate()?;
        Ok(model)
    }
}

impl EbmModel {
    fn validate(&self) -> Result<(), ModelError> {
        let n_features = self.features.len();

        for (feature, info) in self.features.iter().enumerate() {
            if !(0.0..=1.0).contains(&info.nonzero_fraction) {
                return Err(ModelError::InvalidNonzeroFraction {
                    feature,
                    value: info.nonzero_fraction,
                });
            }
        }

        if let Task::Classification { classes } = &self.task {
            if classes.is_empty() {
                return Err(ModelError::NoClasses);
            }
            let mut seen = HashSet::with_capacity(classes.len());
            for label in classes {
                if !seen.insert(label) {
                    return Err(ModelError::DuplicateClass {
                        label: label.clone(),
                    });
                }
            }
        }

        if !self.intercept.is_finite() {
            return Err(ModelError::NonFinite {
                context: "intercept".into(),
            });
        }

        for (&feature, binning) in &self.binning {
            if feature >= n_features {
                return Err(ModelError::BinningOutOfRange { feature, n_features });
            }
            binning.validate(feature)?;
        }

        for (idx, term) in self.terms.iter().enumerate() {
            self.validate_term(idx, term)?;
        }

        let used: HashSet<usize> = self
            .terms
            .iter()
            .flat_map(|t| t.features.iter().copied())
            .collect();
        if let Some(&feature) = self.binning.keys().find(|f| !used.contains(f)) {
            return Err(ModelError::UnusedBinning { feature });
        }

        for (interaction, group) in self.interactions.iter().enumerate() {
            if let Some(&feature) = group.iter().find(|&&f| f >= n_features) {
                return Err(ModelError::InteractionOutOfRange {
                    interaction,
                    feature,
                    n_features,
                });
            }
        }

        Ok(())
    }

    fn validate_term(&self, term: usize, t: &Term) -> Result<(), ModelError> {
        let n_features = self.features.len();
        if t.features.is_empty() {
            return Err(ModelError::EmptyTerm { term });
        }

        let mut expected = Vec::with_capacity(t.features.len() + 1);
        for (pos, &feature) in t.features.iter().enumerate() {
            if feature >= n_features {
                return Err(ModelError::TermFeatureOutOfRange {
                    term,
                    feature,
                    n_features,
                });
            }
            if t.features[..pos].contains(&feature) {
                return Err(ModelError::DuplicateTermFeature { term, feature });
            }
            let binning = self
                .binning
                .get(&feature)
                .ok_or(ModelError::MissingBinning { term, feature })?;
            expected.push(binning.n_bins());
        }
        if let Some(k) = self.task.class_axis() {
            expected.push(k);
        }

        for (grid, values) in [
            ("scores", &t.scores),
            ("standard_deviations", &t.standard_deviations),
        ] {
            if values.shape() != expected.as_slice() {
                return Err(ModelError::ShapeMismatch {
                    term,
                    grid,
                    expected: expected.clone(),
                    actual: values.shape().to_vec(),
                });
            }
            if values.iter().any(|v| !v.is_finite()) {
                return Err(ModelError::NonFinite {
                    context: format!("{grid} of term {term}"),
                });
            }
        }

        if !t.importance.is_finite() || t.importance < 0.0 {
            return Err(ModelError::InvalidImportance {
                term,
                value: t.importance,
            });
        }
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Input features, in column order.
    pub fn features(&self) -> &[FeatureInfo] {
        &self.features
    }

    /// Number of input features.
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Prediction target.
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Constant term.
    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Additive terms.
    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    /// Binning per feature index.
    pub fn binning(&self) -> &BTreeMap<usize, FeatureBinning> {
        &self.binning
    }

    /// Interaction specification.
    pub fn interactions(&self) -> &[Vec<usize>] {
        &self.interactions
    }

    /// Fitting variant.
    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    /// Number of raw scores per row.
    pub fn n_scores(&self) -> usize {
        self.task.n_scores()
    }

    /// Global feature selector: one row per feature with its name, kind,
    /// unique count and nonzero fraction.
    pub fn global_selector(&self) -> Table {
        Table::feature_selector(
            self.features
                .iter()
                .map(|f| (f.name.as_str(), f.kind, f.n_unique, f.nonzero_fraction)),
        )
    }

    // =========================================================================
    // Prediction
    // =========================================================================

    /// Raw additive scores, shape `(n_rows, n_scores)`.
    ///
    /// Rows are scored in parallel; each row's terms are summed in order, so
    /// the result does not depend on scheduling.
    ///
    /// # Errors
    ///
    /// [`ModelError::InputWidth`] if `x` does not have one column per feature.
    pub fn predict_scores(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        if x.ncols() != self.n_features() {
            return Err(ModelError::InputWidth {
                expected: self.n_features(),
                actual: x.ncols(),
            });
        }

        let rows: Vec<Vec<f64>> = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.score_row(x.row(i)))
            .collect();

        let mut out = Array2::zeros((x.nrows(), self.n_scores()));
        for (mut dst, src) in out.rows_mut().into_iter().zip(&rows) {
            dst.iter_mut().zip(src).for_each(|(d, s)| *d = *s);
        }
        Ok(out)
    }

    fn score_row(&self, row: ArrayView1<'_, f64>) -> Vec<f64> {
        let mut acc = vec![self.intercept; self.n_scores()];
        let mut bins = Vec::with_capacity(2);
        for term in &self.terms {
            bins.clear();
            bins.extend(
                term.features
                    .iter()
                    .map(|&f| self.binning.get(&f).map_or(0, |b| b.bin(row[f]))),
            );
            for (a, s) in acc.iter_mut().zip(term.lookup(&bins).iter()) {
                *a += *s;
            }
        }
        acc
    }

    /// Class probabilities, shape `(n_rows, n_classes)`, columns in label order.
    ///
    /// Binary models apply the logistic function to the single logit;
    /// multiclass models apply softmax across the class scores.
    ///
    /// # Errors
    ///
    /// [`ModelError::NotClassifier`] for regression models, and
    /// [`ModelError::InputWidth`] on a bad input width.
    pub fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        let n_classes = self.task.classes().ok_or(ModelError::NotClassifier)?.len();
        let scores = self.predict_scores(x)?;
        let mut proba = Array2::zeros((scores.nrows(), n_classes));

        for (mut dst, src) in proba.rows_mut().into_iter().zip(scores.rows()) {
            match n_classes {
                1 => dst.fill(1.0),
                2 => {
                    let p = sigmoid(src[0]);
                    dst[0] = 1.0 - p;
                    dst[1] = p;
                }
                _ => {
                    let max = src.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
                    let mut total = 0.0;
                    for (d, &s) in dst.iter_mut().zip(src) {
                        *d = (s - max).exp();
                        total += *d;
                    }
                    dst.mapv_inplace(|v| v / total);
                }
            }
        }
        Ok(proba)
    }

    /// Predicted values (regression) or most probable labels (classification).
    ///
    /// Ties between classes resolve to the earliest label.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Predictions, ModelError> {
        match &self.task {
            Task::Regression => Ok(Predictions::Values(
                self.predict_scores(x)?.column(0).to_owned(),
            )),
            Task::Classification { classes } => {
                let proba = self.predict_proba(x)?;
                let labels = proba
                    .rows()
                    .into_iter()
                    .map(|row| classes[argmax(row)].clone())
                    .collect();
                Ok(Predictions::Labels(labels))
            }
        }
    }
}

impl std::fmt::Debug for EbmModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EbmModel")
            .field("n_features", &self.features.len())
            .field("n_terms", &self.terms.len())
            .field("task", &self.task)
            .field("intercept", &self.intercept)
            .field("variant", &self.variant)
            .finish()
    }
}

#[inline]
fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn argmax(row: ArrayView1<'_, f64>) -> usize {
    let mut best = 0;
    for (i, &v) in row.iter().enumerate() {
        if v > row[best] {
            best = i;
        }
    }
    best
}
