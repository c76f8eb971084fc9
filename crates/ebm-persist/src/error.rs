//! Error taxonomy for the persistence pipeline.
//!
//! Each failure class has its own type so that malformed text, structurally
//! non-conformant payloads and semantically inconsistent models are always
//! distinguishable:
//!
//! - [`DecodeError`]: malformed interchange text or an unrecognized type tag
//! - [`ValidationError`]: payload does not conform to its schema document
//! - [`ReconstructionError`]: structurally valid but inconsistent model state
//! - [`UnsupportedOperationError`]: an operation that is declared unsupported
//! - [`EncodeError`]: a value or model state that cannot be written
//!
//! [`LoadError`] and [`Error`] aggregate them for APIs that span stages.

use crate::model::ModelError;
use crate::persist::SchemaVersion;
use crate::validate::SchemaError;

// =============================================================================
// Decode
// =============================================================================

/// Failure to decode interchange text.
///
/// Always fatal to the single decode call. Decoding never mutates caller
/// state, so nothing is partially applied.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The text is not well-formed JSON.
    #[error("malformed JSON at line {line}, column {column}: {message}")]
    Malformed {
        line: usize,
        column: usize,
        message: String,
    },

    /// A tagged object carries a tag outside the known set.
    #[error("unknown type tag `{tag}` at {path}")]
    UnknownTag { tag: String, path: String },

    /// An object uses `_type` but is not a well-formed tagged value.
    #[error("malformed tagged value at {path}: {reason}")]
    MalformedTag { path: String, reason: String },

    /// The tag is known but its `value` does not have the expected shape.
    #[error("invalid `{tag}` payload at {path}: {reason}")]
    InvalidPayload {
        tag: &'static str,
        path: String,
        reason: String,
    },

    /// An embedded model state failed to load.
    #[error("invalid model state at {path}: {source}")]
    ModelState {
        path: String,
        #[source]
        source: Box<LoadError>,
    },

    /// Reading the backing stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    /// Classify a `serde_json` parse failure.
    pub(crate) fn from_json(err: serde_json::Error) -> Self {
        if err.is_io() {
            return Self::Io(err.into());
        }
        Self::Malformed {
            line: err.line(),
            column: err.column(),
            message: err.to_string(),
        }
    }
}

// =============================================================================
// Validation
// =============================================================================

/// A raw record does not conform to its schema document.
///
/// `path` is the dotted path of the offending field, for example
/// `learner.feature_names` or `learner.interpretable_ebm.additive_terms[2]`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{path}: {kind}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub path: String,
    /// What is wrong with it.
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    pub(crate) fn new(path: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Kinds of structural violations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationErrorKind {
    #[error("missing required field `{field}`")]
    MissingField { field: String },

    #[error("expected {expected}, found {found}")]
    WrongType {
        expected: String,
        found: &'static str,
    },

    #[error("value {value} is not one of {allowed}")]
    NotInEnum { value: String, allowed: String },

    #[error("expected at least {min} items, found {actual}")]
    TooFewItems { min: usize, actual: usize },

    #[error("expected at most {max} items, found {actual}")]
    TooManyItems { max: usize, actual: usize },

    #[error("{value} is below the minimum {minimum}")]
    BelowMinimum { value: f64, minimum: f64 },

    #[error("{value} is above the maximum {maximum}")]
    AboveMaximum { value: f64, maximum: f64 },

    #[error("`{value}` does not match pattern `{pattern}`")]
    PatternMismatch { value: String, pattern: String },

    #[error("unexpected property `{name}`")]
    UnexpectedProperty { name: String },

    #[error("invalid property name `{name}`: {reason}")]
    InvalidPropertyName {
        name: String,
        reason: Box<ValidationErrorKind>,
    },
}

// =============================================================================
// Reconstruction
// =============================================================================

/// A structurally valid model state that is semantically inconsistent.
///
/// These can only be detected with cross-field or domain knowledge, which is
/// why they are kept apart from [`ValidationError`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReconstructionError {
    #[error("unsupported schema version {version}")]
    UnsupportedVersion { version: SchemaVersion },

    #[error("model state carries no task (schema {version})")]
    MissingTask { version: SchemaVersion },

    #[error("unrecognized task type `{kind}`")]
    UnknownTask { kind: String },

    #[error("`{field}` has {actual} entries but there are {expected} term groups")]
    TermCountMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("`{field}` has {actual} entries but there are {expected} features")]
    FeatureCountMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("feature {feature}: conflicting `{field}`")]
    ConflictingFeatureMetadata { feature: usize, field: &'static str },

    #[error("term {term}: no `{field}` entry for feature {feature}")]
    MissingFeatureMetadata {
        term: usize,
        feature: usize,
        field: &'static str,
    },

    #[error("feature index {feature} out of range for {n_features} features in {context}")]
    FeatureIndexOutOfRange {
        feature: usize,
        n_features: usize,
        context: String,
    },

    #[error(transparent)]
    Model(#[from] ModelError),
}

// =============================================================================
// Unsupported operations
// =============================================================================

/// An operation that is explicitly declared unsupported.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{operation} is not supported: {reason}")]
pub struct UnsupportedOperationError {
    /// The rejected operation.
    pub operation: &'static str,
    /// Why it is rejected.
    pub reason: String,
}

// =============================================================================
// Encode
// =============================================================================

/// Failure to write a value or model state.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to serialize JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The model state does not fit the layout of its own schema version:
    /// a field the layout lacks is populated, or a field it requires is absent.
    #[error("schema {version} layout cannot represent the state of `{field}`")]
    NotRepresentable {
        version: SchemaVersion,
        field: &'static str,
    },

    /// Two terms carry different per-feature metadata for the same feature.
    #[error("feature {feature}: terms disagree on `{field}`")]
    ConflictingFeatureMetadata { feature: usize, field: &'static str },

    #[error("cannot encode schema version {version}")]
    UnsupportedVersion { version: SchemaVersion },
}

// =============================================================================
// Aggregates
// =============================================================================

/// Failure anywhere in the read pipeline: decode, validate, convert.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("reconstruction failed: {0}")]
    Reconstruction(#[from] ReconstructionError),

    #[error("schema document error: {0}")]
    Schema(#[from] SchemaError),
}

/// Crate-level error for convenience APIs spanning capture, encode and load.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Unsupported(#[from] UnsupportedOperationError),
}
