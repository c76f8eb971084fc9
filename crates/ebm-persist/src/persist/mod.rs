//! Versioned model-state persistence.
//!
//! The read pipeline is strictly staged:
//!
//! 1. validate the version-independent envelope;
//! 2. resolve the payload layout from `version`;
//! 3. validate against the layout's schema document;
//! 4. parse the layout types in [`schema`];
//! 5. convert the layout to a [`ModelStateDto`].
//!
//! Each stage fails with its own error class, so a caller can tell a
//! malformed document from one whose contents are inconsistent. Writing
//! runs the conversion in reverse for the layout of the record's own
//! [`SchemaVersion`].
//!
//! # Example
//!
//! ```
//! use ebm_persist::config::{JsonWriteOptions, ReadOptions};
//! use ebm_persist::persist::{ModelStateDto, capture, rebuild};
//! use ebm_persist::testing;
//!
//! let model = testing::regression_model();
//! let state = capture(&model).unwrap();
//!
//! let text = state.to_json_string(&JsonWriteOptions::compact()).unwrap();
//! let back = ModelStateDto::from_json_str(&text, &ReadOptions::default()).unwrap();
//! assert_eq!(back, state);
//!
//! let rebuilt = rebuild(back).unwrap();
//! assert_eq!(rebuilt.terms(), model.terms());
//! ```

mod convert;
mod dto;
pub(crate) mod hash;
mod reconstruct;
pub mod schema;
mod version;

use std::io::{Read, Write};

use serde::Deserialize;
use serde_json::Value as JsonValue;

pub use dto::{FeatureRecord, ModelStateDto, TaskRecord, TermRecord};
pub use hash::StableHash;
pub use reconstruct::{capture, rebuild};
pub use version::{Layout, SchemaVersion};

use crate::codec::TypeTag;
use crate::config::{JsonWriteOptions, ReadOptions};
use crate::error::{DecodeError, EncodeError, LoadError, ReconstructionError};
use crate::validate;
use schema::{CurrentLearner, Envelope, FlatLearner, RecordsLearner};

// =============================================================================
// Encode
// =============================================================================

/// Render a model state as the JSON envelope of its own schema version.
pub fn state_to_json(dto: &ModelStateDto) -> Result<JsonValue, EncodeError> {
    let version = dto.schema_version;
    let layout = version
        .layout()
        .ok_or(EncodeError::UnsupportedVersion { version })?;
    tracing::debug!(
        %version,
        layout = layout.name(),
        n_features = dto.n_features(),
        n_terms = dto.terms.len(),
        "encoding model state"
    );

    let json = match layout {
        Layout::Flat => serde_json::to_value(Envelope {
            version,
            learner: convert::to_flat(dto)?,
        })?,
        Layout::Records => serde_json::to_value(Envelope {
            version,
            learner: convert::to_records(dto)?,
        })?,
        Layout::Current => serde_json::to_value(Envelope {
            version,
            learner: convert::to_current(dto)?,
        })?,
    };
    Ok(json)
}

/// Write a model state envelope to `writer`.
pub fn write_state<W: Write>(
    writer: W,
    dto: &ModelStateDto,
    options: &JsonWriteOptions,
) -> Result<(), EncodeError> {
    let json = state_to_json(dto)?;
    options.write(writer, &json)?;
    Ok(())
}

// =============================================================================
// Decode
// =============================================================================

/// Load a model state from a parsed JSON envelope.
pub fn state_from_json(json: &JsonValue, options: &ReadOptions) -> Result<ModelStateDto, LoadError> {
    validate::validate(json, validate::envelope()?)?;

    let version = SchemaVersion::deserialize(&json["version"]).map_err(invalid_state)?;
    let layout = version
        .layout()
        .filter(|_| options.allow_legacy || !version.is_legacy())
        .ok_or(ReconstructionError::UnsupportedVersion { version })?;
    if version.is_legacy() {
        tracing::warn!(%version, layout = layout.name(), "reading legacy model state");
    }

    let document = match &options.schema_override {
        Some(document) => document,
        None => validate::for_layout(layout)?,
    };
    validate::validate(json, document)?;

    let dto = match layout {
        Layout::Flat => convert::from_flat(version, parse::<FlatLearner>(json)?)?,
        Layout::Records => convert::from_records(version, parse::<RecordsLearner>(json)?)?,
        Layout::Current => convert::from_current(version, parse::<CurrentLearner>(json)?)?,
    };
    tracing::debug!(
        %version,
        layout = layout.name(),
        n_features = dto.n_features(),
        n_terms = dto.terms.len(),
        "loaded model state"
    );
    Ok(dto)
}

/// Read a model state envelope from `reader`.
pub fn read_state<R: Read>(reader: R, options: &ReadOptions) -> Result<ModelStateDto, LoadError> {
    let json: JsonValue = serde_json::from_reader(reader).map_err(DecodeError::from_json)?;
    state_from_json(&json, options)
}

fn parse<'j, L: Deserialize<'j>>(json: &'j JsonValue) -> Result<L, DecodeError> {
    Envelope::<L>::deserialize(json)
        .map(|envelope| envelope.learner)
        .map_err(invalid_state)
}

fn invalid_state(err: serde_json::Error) -> DecodeError {
    DecodeError::InvalidPayload {
        tag: TypeTag::ModelState.as_str(),
        path: "$".into(),
        reason: err.to_string(),
    }
}

impl ModelStateDto {
    /// Serialize to envelope text.
    pub fn to_json_string(&self, options: &JsonWriteOptions) -> Result<String, EncodeError> {
        let mut buf = Vec::new();
        write_state(&mut buf, self, options)?;
        String::from_utf8(buf)
            .map_err(|e| EncodeError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
    }

    /// Parse envelope text.
    pub fn from_json_str(text: &str, options: &ReadOptions) -> Result<Self, LoadError> {
        let json: JsonValue = serde_json::from_str(text).map_err(DecodeError::from_json)?;
        state_from_json(&json, options)
    }
}
