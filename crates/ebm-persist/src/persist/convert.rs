//! Conversion between wire layouts and model-state records.
//!
//! Reading restricts the payload's global per-feature maps to each term's
//! member features; writing merges the per-term maps back into global maps
//! and rejects terms that disagree about a shared feature.

use std::collections::BTreeMap;

use ndarray::ArrayD;

use super::schema::{
    CurrentLearner, EbmSchema, FeatureGroupsSchema, FeatureSchema, FlatLearner, RecordsLearner,
    TaskSchema,
};
use super::{FeatureRecord, ModelStateDto, SchemaVersion, TaskRecord, TermRecord};
use crate::error::{EncodeError, ReconstructionError};
use crate::model::{FeatureKind, ModelError};

const CLASSIFICATION: &str = "classification";
const REGRESSION: &str = "regression";

// =============================================================================
// Task conversions
// =============================================================================

impl From<&TaskRecord> for TaskSchema {
    fn from(task: &TaskRecord) -> Self {
        match task {
            TaskRecord::Classification { classes } => Self {
                kind: CLASSIFICATION.into(),
                classes: Some(classes.clone()),
            },
            TaskRecord::Regression => Self {
                kind: REGRESSION.into(),
                classes: None,
            },
        }
    }
}

impl TryFrom<TaskSchema> for TaskRecord {
    type Error = ReconstructionError;

    fn try_from(schema: TaskSchema) -> Result<Self, Self::Error> {
        match schema.kind.as_str() {
            CLASSIFICATION => {
                let classes = schema.classes.ok_or(ModelError::NoClasses)?;
                Ok(Self::Classification { classes })
            }
            REGRESSION => Ok(Self::Regression),
            _ => Err(ReconstructionError::UnknownTask { kind: schema.kind }),
        }
    }
}

// =============================================================================
// Feature conversions
// =============================================================================

impl From<&FeatureRecord> for FeatureSchema {
    fn from(record: &FeatureRecord) -> Self {
        Self {
            name: record.name.clone(),
            kind: record.kind,
            num_unique: record.unique_count,
            nonzero_fraction: record.nonzero_fraction,
        }
    }
}

impl From<FeatureSchema> for FeatureRecord {
    fn from(schema: FeatureSchema) -> Self {
        Self {
            name: schema.name,
            kind: schema.kind,
            unique_count: schema.num_unique,
            nonzero_fraction: schema.nonzero_fraction,
        }
    }
}

/// Combine the parallel name/type lists with optional statistics records.
fn features_from(
    names: Vec<String>,
    types: Vec<FeatureKind>,
    records: Option<Vec<FeatureSchema>>,
) -> Result<Vec<FeatureRecord>, ReconstructionError> {
    if types.len() != names.len() {
        return Err(ReconstructionError::FeatureCountMismatch {
            field: "feature_types",
            expected: names.len(),
            actual: types.len(),
        });
    }

    let Some(records) = records else {
        return Ok(names
            .into_iter()
            .zip(types)
            .map(|(name, kind)| FeatureRecord {
                name,
                kind,
                unique_count: 0,
                nonzero_fraction: 0.0,
            })
            .collect());
    };

    if records.len() != names.len() {
        return Err(ReconstructionError::FeatureCountMismatch {
            field: "features",
            expected: names.len(),
            actual: records.len(),
        });
    }
    records
        .into_iter()
        .zip(names.iter().zip(&types))
        .enumerate()
        .map(|(feature, (record, (name, &kind)))| {
            if &record.name != name {
                return Err(ReconstructionError::ConflictingFeatureMetadata {
                    feature,
                    field: "name",
                });
            }
            if record.kind != kind {
                return Err(ReconstructionError::ConflictingFeatureMetadata {
                    feature,
                    field: "type",
                });
            }
            Ok(record.into())
        })
        .collect()
}

fn names_and_types(features: &[FeatureRecord]) -> (Vec<String>, Vec<FeatureKind>) {
    features.iter().map(|f| (f.name.clone(), f.kind)).unzip()
}

// =============================================================================
// Term conversions
// =============================================================================

fn check_indices<'a>(
    indices: impl IntoIterator<Item = &'a usize>,
    n_features: usize,
    context: impl FnOnce() -> String,
) -> Result<(), ReconstructionError> {
    match indices.into_iter().find(|&&f| f >= n_features) {
        Some(&feature) => Err(ReconstructionError::FeatureIndexOutOfRange {
            feature,
            n_features,
            context: context(),
        }),
        None => Ok(()),
    }
}

/// Entries of `map` for every member feature; all must be present.
fn restrict<V: Clone>(
    term: usize,
    features: &[usize],
    map: &BTreeMap<usize, V>,
    field: &'static str,
) -> Result<BTreeMap<usize, V>, ReconstructionError> {
    features
        .iter()
        .map(|&feature| {
            map.get(&feature)
                .cloned()
                .map(|v| (feature, v))
                .ok_or(ReconstructionError::MissingFeatureMetadata {
                    term,
                    feature,
                    field,
                })
        })
        .collect()
}

/// Entries of an optional diagnostic map for the member features that have
/// one. An empty restriction reads as absent.
fn restrict_optional(
    features: &[usize],
    map: Option<&BTreeMap<usize, Vec<f64>>>,
) -> Option<BTreeMap<usize, Vec<f64>>> {
    let map = map?;
    let restricted: BTreeMap<_, _> = features
        .iter()
        .filter_map(|f| map.get(f).map(|v| (*f, v.clone())))
        .collect();
    (!restricted.is_empty()).then_some(restricted)
}

/// Split the layout's grids and global maps into per-term records.
fn terms_from(
    n_features: usize,
    additive_terms: Vec<ArrayD<f64>>,
    standard_deviations: Vec<ArrayD<f64>>,
    groups: FeatureGroupsSchema,
) -> Result<Vec<TermRecord>, ReconstructionError> {
    let n_terms = groups.groups.len();
    for (field, actual) in [
        ("additive_terms", additive_terms.len()),
        ("standard_deviations", standard_deviations.len()),
        ("importances", groups.importances.len()),
    ] {
        if actual != n_terms {
            return Err(ReconstructionError::TermCountMismatch {
                field,
                expected: n_terms,
                actual,
            });
        }
    }

    check_indices(groups.mins.keys(), n_features, || "mins".into())?;
    check_indices(groups.maxes.keys(), n_features, || "maxes".into())?;
    check_indices(groups.bin_edges.keys(), n_features, || "bin_edges".into())?;
    for (name, map) in [("hist_edges", &groups.hist_edges), ("hist_counts", &groups.hist_counts)] {
        if let Some(map) = map {
            check_indices(map.keys(), n_features, || name.into())?;
        }
    }

    let mut terms = Vec::with_capacity(n_terms);
    let grids = additive_terms.into_iter().zip(standard_deviations);
    for (term, ((features, importance), (scores, sds))) in groups
        .groups
        .into_iter()
        .zip(groups.importances)
        .zip(grids)
        .enumerate()
    {
        check_indices(&features, n_features, || format!("feature_groups.groups[{term}]"))?;
        terms.push(TermRecord {
            bin_edges: restrict(term, &features, &groups.bin_edges, "bin_edges")?,
            value_min: restrict(term, &features, &groups.mins, "mins")?,
            value_max: restrict(term, &features, &groups.maxes, "maxes")?,
            histogram_edges: restrict_optional(&features, groups.hist_edges.as_ref()),
            histogram_counts: restrict_optional(&features, groups.hist_counts.as_ref()),
            features,
            importance,
            scores,
            standard_deviations: sds,
        });
    }
    Ok(terms)
}

fn merge_into<V: PartialEq + Clone>(
    target: &mut BTreeMap<usize, V>,
    source: &BTreeMap<usize, V>,
    field: &'static str,
) -> Result<(), EncodeError> {
    for (&feature, value) in source {
        match target.get(&feature) {
            Some(existing) if existing != value => {
                return Err(EncodeError::ConflictingFeatureMetadata { feature, field });
            }
            Some(_) => {}
            None => {
                target.insert(feature, value.clone());
            }
        }
    }
    Ok(())
}

/// Merge per-term records into the layout's groups and global maps.
fn groups_from(terms: &[TermRecord]) -> Result<FeatureGroupsSchema, EncodeError> {
    let mut groups = FeatureGroupsSchema::default();
    for term in terms {
        groups.groups.push(term.features.clone());
        groups.importances.push(term.importance);
        merge_into(&mut groups.bin_edges, &term.bin_edges, "bin_edges")?;
        merge_into(&mut groups.mins, &term.value_min, "mins")?;
        merge_into(&mut groups.maxes, &term.value_max, "maxes")?;
        if let Some(edges) = &term.histogram_edges {
            merge_into(groups.hist_edges.get_or_insert_with(BTreeMap::new), edges, "hist_edges")?;
        }
        if let Some(counts) = &term.histogram_counts {
            merge_into(groups.hist_counts.get_or_insert_with(BTreeMap::new), counts, "hist_counts")?;
        }
    }
    Ok(groups)
}

fn ebm_from(dto: &ModelStateDto, interactions_in_groups: bool) -> Result<EbmSchema, EncodeError> {
    let task = dto.task.as_ref().ok_or(EncodeError::NotRepresentable {
        version: dto.schema_version,
        field: "task",
    })?;
    let mut feature_groups = groups_from(&dto.terms)?;
    let interactions = Some(dto.interaction_spec.clone());
    let (ebm_interactions, group_interactions) = if interactions_in_groups {
        (None, interactions)
    } else {
        (interactions, None)
    };
    feature_groups.interactions = group_interactions;

    Ok(EbmSchema {
        task: task.into(),
        intercept: dto.intercept,
        additive_terms: dto.terms.iter().map(|t| t.scores.clone()).collect(),
        standard_deviations: dto
            .terms
            .iter()
            .map(|t| t.standard_deviations.clone())
            .collect(),
        interactions: ebm_interactions,
        feature_groups,
    })
}

/// Read the learned state shared by the records and current layouts.
fn state_from(
    version: SchemaVersion,
    features: Vec<FeatureRecord>,
    ebm: EbmSchema,
    interactions: Vec<Vec<usize>>,
) -> Result<ModelStateDto, ReconstructionError> {
    let n_features = features.len();
    for (i, group) in interactions.iter().enumerate() {
        check_indices(group, n_features, || format!("interactions[{i}]"))?;
    }
    let task = TaskRecord::try_from(ebm.task)?;
    let terms = terms_from(
        n_features,
        ebm.additive_terms,
        ebm.standard_deviations,
        ebm.feature_groups,
    )?;
    Ok(ModelStateDto {
        schema_version: version,
        task: Some(task),
        features,
        terms,
        intercept: ebm.intercept,
        interaction_spec: interactions,
    })
}

// =============================================================================
// Flat layout (0.0.x)
// =============================================================================

pub(crate) fn from_flat(
    version: SchemaVersion,
    learner: FlatLearner,
) -> Result<ModelStateDto, ReconstructionError> {
    Ok(ModelStateDto {
        schema_version: version,
        task: None,
        features: features_from(learner.feature_names, learner.feature_types, None)?,
        terms: Vec::new(),
        intercept: 0.0,
        interaction_spec: Vec::new(),
    })
}

pub(crate) fn to_flat(dto: &ModelStateDto) -> Result<FlatLearner, EncodeError> {
    let not_representable = |field| EncodeError::NotRepresentable {
        version: dto.schema_version,
        field,
    };
    if dto.task.is_some() {
        return Err(not_representable("task"));
    }
    if !dto.terms.is_empty() {
        return Err(not_representable("terms"));
    }
    if dto.intercept != 0.0 {
        return Err(not_representable("intercept"));
    }
    if !dto.interaction_spec.is_empty() {
        return Err(not_representable("interaction_spec"));
    }
    if dto
        .features
        .iter()
        .any(|f| f.unique_count != 0 || f.nonzero_fraction != 0.0)
    {
        return Err(not_representable("features"));
    }
    let (feature_names, feature_types) = names_and_types(&dto.features);
    Ok(FlatLearner {
        feature_names,
        feature_types,
    })
}

// =============================================================================
// Records layout (0.1.x)
// =============================================================================

pub(crate) fn from_records(
    version: SchemaVersion,
    learner: RecordsLearner,
) -> Result<ModelStateDto, ReconstructionError> {
    let features = features_from(
        learner.feature_names,
        learner.feature_types,
        Some(learner.features),
    )?;
    let mut ebm = learner.interpretable_ebm;
    let interactions = ebm.feature_groups.interactions.take().unwrap_or_default();
    state_from(version, features, ebm, interactions)
}

pub(crate) fn to_records(dto: &ModelStateDto) -> Result<RecordsLearner, EncodeError> {
    let (feature_names, feature_types) = names_and_types(&dto.features);
    Ok(RecordsLearner {
        feature_names,
        feature_types,
        features: dto.features.iter().map(FeatureSchema::from).collect(),
        interpretable_ebm: ebm_from(dto, true)?,
    })
}

// =============================================================================
// Current layout (1.x)
// =============================================================================

pub(crate) fn from_current(
    version: SchemaVersion,
    learner: CurrentLearner,
) -> Result<ModelStateDto, ReconstructionError> {
    let features = features_from(learner.feature_names, learner.feature_types, learner.features)?;
    let mut ebm = learner.interpretable_ebm;
    let interactions = ebm.interactions.take().unwrap_or_default();
    state_from(version, features, ebm, interactions)
}

pub(crate) fn to_current(dto: &ModelStateDto) -> Result<CurrentLearner, EncodeError> {
    let (feature_names, feature_types) = names_and_types(&dto.features);
    Ok(CurrentLearner {
        feature_names,
        feature_types,
        features: Some(dto.features.iter().map(FeatureSchema::from).collect()),
        interpretable_ebm: ebm_from(dto, false)?,
    })
}
