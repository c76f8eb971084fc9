//! Deterministic fixture models and inputs for tests, docs and benchmarks.
//!
//! All fixtures share three features:
//!
//! | index | name     | kind        | bins |
//! |-------|----------|-------------|------|
//! | 0     | `age`    | continuous  | 4    |
//! | 1     | `income` | continuous  | 3    |
//! | 2     | `color`  | categorical | 3    |
//!
//! `age` carries a histogram; the others do not.

use std::collections::BTreeMap;

use ndarray::{Array2, ArrayD, Dimension, IxDyn, array};

use crate::model::{
    ClassLabel, EbmModel, FeatureBinning, FeatureInfo, Histogram, ModelVariant, Task, Term,
};

/// Default tolerance for comparing probabilities.
pub const DEFAULT_TOLERANCE: f64 = 1e-12;

/// The three fixture features with their fitting statistics.
pub fn features() -> Vec<FeatureInfo> {
    vec![
        FeatureInfo::continuous("age").with_stats(73, 1.0),
        FeatureInfo::continuous("income").with_stats(1_204, 0.92),
        FeatureInfo::categorical("color").with_stats(3, 0.66),
    ]
}

/// Binning for all three fixture features.
pub fn binning() -> BTreeMap<usize, FeatureBinning> {
    BTreeMap::from([
        (
            0,
            FeatureBinning::new(vec![30.0, 45.0, 60.0], 18.0, 90.0).with_histogram(Histogram::new(
                vec![18.0, 36.0, 54.0, 72.0, 90.0],
                vec![10.0, 20.0, 15.0, 5.0],
            )),
        ),
        (1, FeatureBinning::new(vec![20_000.0, 50_000.0], 0.0, 200_000.0)),
        (2, FeatureBinning::new(vec![0.5, 1.5], 0.0, 2.0)),
    ])
}

/// Fixture binning restricted to `features`.
pub fn binning_for(features: &[usize]) -> BTreeMap<usize, FeatureBinning> {
    binning()
        .into_iter()
        .filter(|(f, _)| features.contains(f))
        .collect()
}

/// A deterministic score grid of the given shape.
///
/// Cells differ from each other and mix signs, so a swapped axis or an
/// off-by-one bin shows up in predictions.
pub fn grid(shape: &[usize], seed: f64) -> ArrayD<f64> {
    ArrayD::from_shape_fn(IxDyn(shape), |ix| {
        let weighted: f64 = ix
            .as_array_view()
            .iter()
            .enumerate()
            .map(|(axis, &i)| (i as f64 + 1.0) * (axis as f64 + 1.0) * 0.25)
            .sum();
        (weighted - seed).sin() * 2.0
    })
}

fn term(features: Vec<usize>, shape: &[usize], seed: f64, importance: f64) -> Term {
    Term::new(features, grid(shape, seed))
        .with_standard_deviations(ArrayD::from_elem(IxDyn(shape), 0.05 * importance))
        .with_importance(importance)
}

/// Regression model: `age`, `income` and the `age x income` interaction.
pub fn regression_model() -> EbmModel {
    regression(ModelVariant::Standard)
}

/// Binary classifier over `"no"` / `"yes"`: `age`, `color` and
/// `age x color`.
pub fn binary_model() -> EbmModel {
    binary(ModelVariant::Standard)
}

/// Three-class classifier over integer labels `0, 1, 2`: `age` and `income`.
pub fn multiclass_model() -> EbmModel {
    EbmModel::builder()
        .features(features())
        .task(Task::classification([0i64, 1, 2]))
        .intercept(0.1)
        .terms(vec![
            term(vec![0], &[4, 3], 0.3, 0.8),
            term(vec![1], &[3, 3], 1.1, 0.4),
        ])
        .binning(binning_for(&[0, 1]))
        .build()
        .expect("multiclass fixture is valid")
}

/// Differentially private binary classifier; cannot be captured.
pub fn private_classifier() -> EbmModel {
    binary(ModelVariant::DifferentiallyPrivate)
}

/// Differentially private regressor.
pub fn private_regressor() -> EbmModel {
    regression(ModelVariant::DifferentiallyPrivate)
}

fn regression(variant: ModelVariant) -> EbmModel {
    EbmModel::builder()
        .features(features())
        .task(Task::Regression)
        .intercept(12.5)
        .terms(vec![
            term(vec![0], &[4], 0.0, 1.5),
            term(vec![1], &[3], 0.7, 0.9),
            term(vec![0, 1], &[4, 3], 1.3, 0.2),
        ])
        .binning(binning_for(&[0, 1]))
        .interactions(vec![vec![0, 1]])
        .variant(variant)
        .build()
        .expect("regression fixture is valid")
}

fn binary(variant: ModelVariant) -> EbmModel {
    EbmModel::builder()
        .features(features())
        .task(Task::classification(["no", "yes"]))
        .intercept(-0.3)
        .terms(vec![
            term(vec![0], &[4], 0.5, 1.2),
            term(vec![2], &[3], 0.9, 0.6),
            term(vec![0, 2], &[4, 3], 1.7, 0.1),
        ])
        .binning(binning_for(&[0, 2]))
        .interactions(vec![vec![0, 2]])
        .variant(variant)
        .build()
        .expect("binary fixture is valid")
}

/// Rows covering every bin of every fixture feature, plus a missing value.
pub fn inputs() -> Array2<f64> {
    array![
        [18.0, 0.0, 0.0],
        [29.9, 19_999.0, 1.0],
        [30.0, 20_000.0, 2.0],
        [44.0, 35_000.0, 0.0],
        [45.0, 50_000.0, 1.0],
        [59.0, 75_000.0, 2.0],
        [60.0, 200_000.0, 0.0],
        [89.0, 150_000.0, 1.0],
        [f64::NAN, 40_000.0, 2.0],
    ]
}

/// Labels of [`binary_model`], in output order.
pub fn binary_classes() -> Vec<ClassLabel> {
    vec![ClassLabel::from("no"), ClassLabel::from("yes")]
}
