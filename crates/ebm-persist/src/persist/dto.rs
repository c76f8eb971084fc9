//! Model-state records.
//!
//! These records capture a fitted model independent of its in-memory form.
//! They are plain values: created by [`capture`](super::capture) or by
//! reading a payload, consumed by [`rebuild`](super::rebuild), and never
//! mutated in between.
//!
//! Equality is structural over every field. [`Hash`] and [`Eq`] come from the
//! canonical digest in [`hash`](super::hash), so records can be used as map
//! keys and compared across processes through [`StableHash`](super::StableHash).

use std::collections::BTreeMap;

use ndarray::ArrayD;
use serde::Serialize;

use super::SchemaVersion;
use super::hash::impl_stable_hash;
use crate::codec::Table;
use crate::model::{ClassLabel, FeatureKind};

/// Prediction target of a persisted model.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskRecord {
    /// Discrete target; label order defines output column order.
    Classification { classes: Vec<ClassLabel> },
    /// Continuous target.
    Regression,
}

/// Descriptive statistics of one input feature.
///
/// Position in [`ModelStateDto::features`] is the feature's canonical index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRecord {
    pub name: String,
    pub kind: FeatureKind,
    pub unique_count: u64,
    /// Fraction of non-zero training values, in `[0, 1]`.
    pub nonzero_fraction: f64,
}

impl FeatureRecord {
    /// Global selector table: one row per feature.
    pub fn selector_table(features: &[FeatureRecord]) -> Table {
        Table::feature_selector(
            features
                .iter()
                .map(|f| (f.name.as_str(), f.kind, f.unique_count, f.nonzero_fraction)),
        )
    }
}

/// One additive term with the binning state of its member features.
///
/// The per-feature maps are keyed by feature index and hold exactly the
/// term's member features.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TermRecord {
    /// Member feature indices, in grid axis order.
    pub features: Vec<usize>,
    pub importance: f64,
    pub bin_edges: BTreeMap<usize, Vec<f64>>,
    pub value_min: BTreeMap<usize, f64>,
    pub value_max: BTreeMap<usize, f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub histogram_edges: Option<BTreeMap<usize, Vec<f64>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub histogram_counts: Option<BTreeMap<usize, Vec<f64>>>,
    pub scores: ArrayD<f64>,
    pub standard_deviations: ArrayD<f64>,
}

/// Complete persisted state of a fitted model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelStateDto {
    pub schema_version: SchemaVersion,
    /// `None` only for payloads written with the flat `0.0.x` layout.
    pub task: Option<TaskRecord>,
    pub features: Vec<FeatureRecord>,
    pub terms: Vec<TermRecord>,
    pub intercept: f64,
    /// Interaction specification requested at construction.
    pub interaction_spec: Vec<Vec<usize>>,
}

impl ModelStateDto {
    /// Number of features.
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Global selector table of the recorded features.
    pub fn selector(&self) -> Table {
        FeatureRecord::selector_table(&self.features)
    }
}

impl_stable_hash!(TaskRecord, FeatureRecord, TermRecord, ModelStateDto);
