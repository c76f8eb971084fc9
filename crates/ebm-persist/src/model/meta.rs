//! Model metadata.
//!
//! Task, class-label and per-feature descriptors shared by the fitted model
//! and its persisted records.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Declared kind of an input feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// Ordered numeric feature.
    #[default]
    Continuous,
    /// Unordered categorical feature.
    Categorical,
}

impl FeatureKind {
    /// Wire name of the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Continuous => "continuous",
            Self::Categorical => "categorical",
        }
    }
}

impl fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown feature kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown feature kind `{0}`, expected `continuous` or `categorical`")]
pub struct ParseFeatureKindError(pub String);

impl FromStr for FeatureKind {
    type Err = ParseFeatureKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "continuous" => Ok(Self::Continuous),
            "categorical" => Ok(Self::Categorical),
            other => Err(ParseFeatureKindError(other.to_string())),
        }
    }
}

/// A classification label.
///
/// Serialized as a bare JSON integer or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClassLabel {
    Int(i64),
    Str(String),
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<i64> for ClassLabel {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for ClassLabel {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for ClassLabel {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

/// Prediction target of a fitted model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Continuous target.
    Regression,
    /// Discrete target. Label order defines output column order.
    Classification {
        /// Class labels in output order.
        classes: Vec<ClassLabel>,
    },
}

impl Task {
    /// Classification over the given labels, in the given order.
    pub fn classification<L: Into<ClassLabel>>(classes: impl IntoIterator<Item = L>) -> Self {
        Self::Classification {
            classes: classes.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns true if this is a classification task.
    pub fn is_classification(&self) -> bool {
        matches!(self, Self::Classification { .. })
    }

    /// Class labels, if this is a classification task.
    pub fn classes(&self) -> Option<&[ClassLabel]> {
        match self {
            Self::Regression => None,
            Self::Classification { classes } => Some(classes),
        }
    }

    /// Number of raw scores produced per row.
    ///
    /// Regression and binary classification produce a single logit; `k > 2`
    /// classes produce one score per class.
    pub fn n_scores(&self) -> usize {
        match self {
            Self::Classification { classes } if classes.len() > 2 => classes.len(),
            _ => 1,
        }
    }

    /// Length of the trailing class axis on term grids, if any.
    pub(crate) fn class_axis(&self) -> Option<usize> {
        match self.n_scores() {
            1 => None,
            k => Some(k),
        }
    }
}

/// Descriptive statistics for one input feature.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureInfo {
    /// Feature name.
    pub name: String,
    /// Declared kind.
    pub kind: FeatureKind,
    /// Number of distinct values seen during fitting.
    pub n_unique: u64,
    /// Fraction of non-zero values seen during fitting, in `[0, 1]`.
    pub nonzero_fraction: f64,
}

impl FeatureInfo {
    /// Create a feature with zeroed statistics.
    pub fn new(name: impl Into<String>, kind: FeatureKind) -> Self {
        Self {
            name: name.into(),
            kind,
            n_unique: 0,
            nonzero_fraction: 0.0,
        }
    }

    /// Create a continuous feature.
    pub fn continuous(name: impl Into<String>) -> Self {
        Self::new(name, FeatureKind::Continuous)
    }

    /// Create a categorical feature.
    pub fn categorical(name: impl Into<String>) -> Self {
        Self::new(name, FeatureKind::Categorical)
    }

    /// Set the fitting statistics.
    pub fn with_stats(mut self, n_unique: u64, nonzero_fraction: f64) -> Self {
        self.n_unique = n_unique;
        self.nonzero_fraction = nonzero_fraction;
        self
    }
}

/// Fitting variant of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelVariant {
    #[default]
    Standard,
    /// Fitted under differential privacy.
    DifferentiallyPrivate,
}
