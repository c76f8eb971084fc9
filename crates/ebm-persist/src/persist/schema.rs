//! Wire layouts of the persisted envelope.
//!
//! These types mirror the JSON payload field for field and are kept separate
//! from [`ModelStateDto`](super::ModelStateDto), so that each schema
//! revision can be read and written without touching the record types.
//!
//! Maps keyed by feature index are written with decimal-string keys and
//! parsed back into integers; a key that is not a decimal integer fails
//! deserialization. All maps are `BTreeMap` for deterministic output.

use std::collections::BTreeMap;

use ndarray::ArrayD;
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};

use super::SchemaVersion;
use crate::model::{ClassLabel, FeatureKind};

/// Top-level payload: version tag plus learner body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<L> {
    pub version: SchemaVersion,
    pub learner: L,
}

/// Per-feature statistics record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FeatureKind,
    pub num_unique: u64,
    pub nonzero_fraction: f64,
}

/// Task descriptor.
///
/// `kind` stays a plain string here; unrecognized kinds are rejected when
/// the layout is converted, not while parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSchema {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classes: Option<Vec<ClassLabel>>,
}

/// Term groups and the per-feature binning state they reference.
#[serde_as]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureGroupsSchema {
    /// Member feature indices per term.
    pub groups: Vec<Vec<usize>>,
    /// Importance per term.
    pub importances: Vec<f64>,
    #[serde_as(as = "BTreeMap<DisplayFromStr, _>")]
    pub mins: BTreeMap<usize, f64>,
    #[serde_as(as = "BTreeMap<DisplayFromStr, _>")]
    pub maxes: BTreeMap<usize, f64>,
    #[serde_as(as = "BTreeMap<DisplayFromStr, _>")]
    pub bin_edges: BTreeMap<usize, Vec<f64>>,
    #[serde_as(as = "Option<BTreeMap<DisplayFromStr, _>>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hist_edges: Option<BTreeMap<usize, Vec<f64>>>,
    #[serde_as(as = "Option<BTreeMap<DisplayFromStr, _>>")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hist_counts: Option<BTreeMap<usize, Vec<f64>>>,
    /// Interaction specification (0.1.x layout only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactions: Option<Vec<Vec<usize>>>,
}

/// Learned state of the additive model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EbmSchema {
    pub task: TaskSchema,
    pub intercept: f64,
    /// Score grid per term, as nested arrays.
    #[serde(with = "crate::codec::grid::nested")]
    pub additive_terms: Vec<ArrayD<f64>>,
    /// Standard-deviation grid per term, as nested arrays.
    #[serde(with = "crate::codec::grid::nested")]
    pub standard_deviations: Vec<ArrayD<f64>>,
    /// Interaction specification (1.x layout only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interactions: Option<Vec<Vec<usize>>>,
    pub feature_groups: FeatureGroupsSchema,
}

/// `0.0.x` learner: feature names and types only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatLearner {
    pub feature_names: Vec<String>,
    pub feature_types: Vec<FeatureKind>,
}

/// `0.1.x` learner: required feature records, interactions in the groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsLearner {
    pub feature_names: Vec<String>,
    pub feature_types: Vec<FeatureKind>,
    pub features: Vec<FeatureSchema>,
    pub interpretable_ebm: EbmSchema,
}

/// `1.x` learner: optional feature records, interactions beside the groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentLearner {
    pub feature_names: Vec<String>,
    pub feature_types: Vec<FeatureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<FeatureSchema>>,
    pub interpretable_ebm: EbmSchema,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integer_keys_are_parsed() {
        let groups: FeatureGroupsSchema = serde_json::from_value(json!({
            "groups": [[2]],
            "importances": [0.5],
            "mins": {"2": 0.0},
            "maxes": {"2": 1.0},
            "bin_edges": {"2": [0.1, 0.5, 0.9]}
        }))
        .unwrap();
        assert_eq!(groups.bin_edges.get(&2), Some(&vec![0.1, 0.5, 0.9]));
        assert!(groups.hist_edges.is_none());
        assert!(groups.interactions.is_none());

        let back = serde_json::to_value(&groups).unwrap();
        assert_eq!(back["bin_edges"], json!({"2": [0.1, 0.5, 0.9]}));
        assert!(back.get("hist_edges").is_none());
    }

    #[test]
    fn non_integer_key_fails() {
        let err = serde_json::from_value::<FeatureGroupsSchema>(json!({
            "groups": [],
            "importances": [],
            "mins": {"two": 0.0},
            "maxes": {},
            "bin_edges": {}
        }));
        assert!(err.is_err());
    }

    #[test]
    fn task_kind_is_free_text() {
        let task: TaskSchema = serde_json::from_value(json!({"type": "ranking"})).unwrap();
        assert_eq!(task.kind, "ranking");
        assert_eq!(task.classes, None);
    }

    #[test]
    fn grids_are_nested_arrays() {
        let ebm: EbmSchema = serde_json::from_value(json!({
            "task": {"type": "regression"},
            "intercept": 0.5,
            "additive_terms": [[[1.0, 2.0], [3.0, 4.0]]],
            "standard_deviations": [[[0.0, 0.0], [0.0, 0.0]]],
            "feature_groups": {
                "groups": [[0, 1]], "importances": [1.0],
                "mins": {}, "maxes": {}, "bin_edges": {}
            }
        }))
        .unwrap();
        assert_eq!(ebm.additive_terms[0].shape(), &[2, 2]);
        let back = serde_json::to_value(&ebm).unwrap();
        assert_eq!(back["additive_terms"], json!([[[1.0, 2.0], [3.0, 4.0]]]));
    }
}
