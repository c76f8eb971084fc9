//! Capture of fitted models into model-state records and their exact
//! reconstruction.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::{FeatureRecord, ModelStateDto, SchemaVersion, TaskRecord, TermRecord};
use crate::config::{JsonWriteOptions, ReadOptions};
use crate::error::{
    DecodeError, EncodeError, Error, LoadError, ReconstructionError, UnsupportedOperationError,
};
use crate::model::{
    EbmModel, FeatureBinning, FeatureInfo, Histogram, ModelVariant, Task, Term,
};

// =============================================================================
// Capture
// =============================================================================

/// Capture a fitted model as a [`ModelStateDto`] at [`SchemaVersion::CURRENT`].
///
/// # Errors
///
/// Differentially private classifiers are rejected with
/// [`UnsupportedOperationError`]; their state is not recoverable from the
/// persisted fields.
pub fn capture(model: &EbmModel) -> Result<ModelStateDto, UnsupportedOperationError> {
    let _span = tracing::debug_span!("capture", n_terms = model.terms().len()).entered();

    if model.variant() == ModelVariant::DifferentiallyPrivate && model.task().is_classification() {
        return Err(UnsupportedOperationError {
            operation: "capture",
            reason: "differentially private classifiers cannot be persisted".into(),
        });
    }

    let task = match model.task() {
        Task::Regression => TaskRecord::Regression,
        Task::Classification { classes } => TaskRecord::Classification {
            classes: classes.clone(),
        },
    };
    let features = model
        .features()
        .iter()
        .map(|f| FeatureRecord {
            name: f.name.clone(),
            kind: f.kind,
            unique_count: f.n_unique,
            nonzero_fraction: f.nonzero_fraction,
        })
        .collect();
    let terms = model
        .terms()
        .iter()
        .map(|term| term_record(term, model.binning()))
        .collect();

    let dto = ModelStateDto {
        schema_version: SchemaVersion::CURRENT,
        task: Some(task),
        features,
        terms,
        intercept: model.intercept(),
        interaction_spec: model.interactions().to_vec(),
    };
    tracing::debug!(version = %dto.schema_version, "captured model state");
    Ok(dto)
}

fn term_record(term: &Term, binning: &BTreeMap<usize, FeatureBinning>) -> TermRecord {
    // A built model has binning for every member feature.
    let members: Vec<(usize, &FeatureBinning)> = term
        .features
        .iter()
        .filter_map(|&f| binning.get(&f).map(|b| (f, b)))
        .collect();

    let histograms: BTreeMap<usize, &Histogram> = members
        .iter()
        .filter_map(|&(f, b)| b.histogram.as_ref().map(|h| (f, h)))
        .collect();
    let (histogram_edges, histogram_counts) = if histograms.is_empty() {
        (None, None)
    } else {
        (
            Some(histograms.iter().map(|(&f, h)| (f, h.edges.clone())).collect()),
            Some(histograms.iter().map(|(&f, h)| (f, h.counts.clone())).collect()),
        )
    };

    TermRecord {
        features: term.features.clone(),
        importance: term.importance,
        bin_edges: members.iter().map(|&(f, b)| (f, b.edges.clone())).collect(),
        value_min: members.iter().map(|&(f, b)| (f, b.min)).collect(),
        value_max: members.iter().map(|&(f, b)| (f, b.max)).collect(),
        histogram_edges,
        histogram_counts,
        scores: term.scores.clone(),
        standard_deviations: term.standard_deviations.clone(),
    }
}

// =============================================================================
// Rebuild
// =============================================================================

/// Reconstruct a fitted model from its recorded state.
///
/// The result predicts identically to the captured model. Nothing is built
/// unless every check passes.
pub fn rebuild(dto: ModelStateDto) -> Result<EbmModel, ReconstructionError> {
    let version = dto.schema_version;
    let _span = tracing::debug_span!("rebuild", %version, n_terms = dto.terms.len()).entered();

    if version.layout().is_none() {
        return Err(ReconstructionError::UnsupportedVersion { version });
    }
    let task = match dto.task {
        None => return Err(ReconstructionError::MissingTask { version }),
        Some(TaskRecord::Regression) => Task::Regression,
        Some(TaskRecord::Classification { classes }) => Task::Classification { classes },
    };

    let n_features = dto.features.len();
    for (i, group) in dto.interaction_spec.iter().enumerate() {
        check_range(group, n_features, || format!("interaction {i}"))?;
    }

    let mut binning = BTreeMap::new();
    let mut terms = Vec::with_capacity(dto.terms.len());
    for (t, record) in dto.terms.into_iter().enumerate() {
        check_range(&record.features, n_features, || format!("term {t}"))?;
        for &feature in &record.features {
            let member = member_binning(t, feature, &record)?;
            match binning.entry(feature) {
                Entry::Vacant(slot) => {
                    slot.insert(member);
                }
                Entry::Occupied(slot) => {
                    if let Some(field) = first_difference(slot.get(), &member) {
                        return Err(ReconstructionError::ConflictingFeatureMetadata { feature, field });
                    }
                }
            }
        }
        terms.push(
            Term::new(record.features, record.scores)
                .with_standard_deviations(record.standard_deviations)
                .with_importance(record.importance),
        );
    }

    let features = dto
        .features
        .into_iter()
        .map(|f| FeatureInfo::new(f.name, f.kind).with_stats(f.unique_count, f.nonzero_fraction))
        .collect();

    let model = EbmModel::builder()
        .features(features)
        .task(task)
        .intercept(dto.intercept)
        .terms(terms)
        .binning(binning)
        .interactions(dto.interaction_spec)
        .build()?;
    tracing::debug!(n_features, "rebuilt model");
    Ok(model)
}

fn check_range(
    features: &[usize],
    n_features: usize,
    context: impl FnOnce() -> String,
) -> Result<(), ReconstructionError> {
    match features.iter().find(|&&f| f >= n_features) {
        Some(&feature) => Err(ReconstructionError::FeatureIndexOutOfRange {
            feature,
            n_features,
            context: context(),
        }),
        None => Ok(()),
    }
}

fn member_binning(
    term: usize,
    feature: usize,
    record: &TermRecord,
) -> Result<FeatureBinning, ReconstructionError> {
    let missing = |field| ReconstructionError::MissingFeatureMetadata {
        term,
        feature,
        field,
    };
    let edges = record.bin_edges.get(&feature).ok_or_else(|| missing("bin_edges"))?;
    let min = *record.value_min.get(&feature).ok_or_else(|| missing("value_min"))?;
    let max = *record.value_max.get(&feature).ok_or_else(|| missing("value_max"))?;

    let hist_edges = record.histogram_edges.as_ref().and_then(|m| m.get(&feature));
    let hist_counts = record.histogram_counts.as_ref().and_then(|m| m.get(&feature));
    let histogram = match (hist_edges, hist_counts) {
        (Some(edges), Some(counts)) => Some(Histogram::new(edges.clone(), counts.clone())),
        (None, None) => None,
        (Some(_), None) => return Err(missing("histogram_counts")),
        (None, Some(_)) => return Err(missing("histogram_edges")),
    };

    Ok(FeatureBinning {
        edges: edges.clone(),
        min,
        max,
        histogram,
    })
}

fn first_difference(a: &FeatureBinning, b: &FeatureBinning) -> Option<&'static str> {
    if a.edges != b.edges {
        Some("bin_edges")
    } else if a.min != b.min {
        Some("value_min")
    } else if a.max != b.max {
        Some("value_max")
    } else if a.histogram != b.histogram {
        Some("histogram")
    } else {
        None
    }
}

// =============================================================================
// Conversions and model conveniences
// =============================================================================

impl TryFrom<&EbmModel> for ModelStateDto {
    type Error = UnsupportedOperationError;

    fn try_from(model: &EbmModel) -> Result<Self, Self::Error> {
        capture(model)
    }
}

impl TryFrom<ModelStateDto> for EbmModel {
    type Error = ReconstructionError;

    fn try_from(dto: ModelStateDto) -> Result<Self, Self::Error> {
        rebuild(dto)
    }
}

impl EbmModel {
    /// Capture the model and write its state envelope to `writer`.
    pub fn write_json_into<W: Write>(&self, writer: W, options: &JsonWriteOptions) -> Result<(), Error> {
        let dto = capture(self)?;
        super::write_state(writer, &dto, options)?;
        Ok(())
    }

    /// Read a state envelope from `reader` and rebuild the model.
    pub fn read_json_from<R: Read>(reader: R, options: &ReadOptions) -> Result<Self, LoadError> {
        let dto = super::read_state(reader, options)?;
        Ok(rebuild(dto)?)
    }

    /// Save the model state to a file, replacing any existing content.
    pub fn save_json(&self, path: impl AsRef<Path>, options: &JsonWriteOptions) -> Result<(), Error> {
        let dto = capture(self)?;
        let file = File::create(path.as_ref()).map_err(EncodeError::from)?;
        let mut writer = BufWriter::new(file);
        super::write_state(&mut writer, &dto, options)?;
        writer.flush().map_err(EncodeError::from)?;
        Ok(())
    }

    /// Load a model from a file written by [`save_json`](Self::save_json).
    pub fn load_json(path: impl AsRef<Path>, options: &ReadOptions) -> Result<Self, LoadError> {
        let file = File::open(path.as_ref()).map_err(DecodeError::from)?;
        Self::read_json_from(BufReader::new(file), options)
    }
}
