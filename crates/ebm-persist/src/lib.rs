//! ebm-persist: versioned persistence for explainable boosting models.
//!
//! Fitted additive models are captured into a versioned model-state record,
//! written through a tagged JSON codec, and rebuilt exactly from any
//! supported schema revision.
//!
//! # Key Types
//!
//! - [`EbmModel`] - Fitted additive model with prediction
//! - [`ModelStateDto`] - Versioned, plain-value model state
//! - [`Value`] - Tagged interchange value
//! - [`SchemaDocument`] - Structural schema for raw payloads
//! - [`JsonWriteOptions`] / [`ReadOptions`] - Option builders
//!
//! # Saving and Loading
//!
//! ```
//! use ebm_persist::{EbmModel, JsonWriteOptions, ReadOptions, testing};
//!
//! let model = testing::binary_model();
//! let mut buf = Vec::new();
//! model.write_json_into(&mut buf, &JsonWriteOptions::default()).unwrap();
//!
//! let loaded = EbmModel::read_json_from(buf.as_slice(), &ReadOptions::default()).unwrap();
//! let x = testing::inputs();
//! assert_eq!(
//!     loaded.predict_proba(x.view()).unwrap(),
//!     model.predict_proba(x.view()).unwrap()
//! );
//! ```
//!
//! Reading accepts every supported layout (`0.0.x`, `0.1.x`, `1.x`); writing
//! always targets the layout of the record's own version. See [`persist`]
//! for the read pipeline and [`codec`] for the tagged format.

pub mod codec;
pub mod config;
pub mod error;
pub mod model;
pub mod persist;
pub mod testing;
pub mod validate;

// =============================================================================
// Convenience Re-exports
// =============================================================================

pub use codec::{ExplanationRecord, Table, TypeTag, Value};
pub use config::{ConfigError, JsonWriteOptions, ReadOptions};
pub use error::{
    DecodeError, EncodeError, Error, LoadError, ReconstructionError, UnsupportedOperationError,
    ValidationError, ValidationErrorKind,
};
pub use model::{ClassLabel, EbmModel, FeatureInfo, FeatureKind, ModelError, Task, Term};
pub use persist::{ModelStateDto, SchemaVersion, StableHash, capture, rebuild};
pub use validate::{SchemaDocument, SchemaError};
