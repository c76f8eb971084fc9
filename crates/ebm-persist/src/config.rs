//! Read and write options with builder pattern.
//!
//! # Example
//!
//! ```
//! use ebm_persist::config::{JsonWriteOptions, ReadOptions};
//!
//! // Defaults: pretty output with 4-space indentation
//! let opts = JsonWriteOptions::builder().build().unwrap();
//! assert!(opts.pretty);
//!
//! // Two-space indentation
//! let opts = JsonWriteOptions::builder().indent(2).build().unwrap();
//!
//! // Reject payloads written with a 0.x schema
//! let read = ReadOptions::builder().allow_legacy(false).build();
//! assert!(!read.allow_legacy);
//! ```

use std::io::Write;

use bon::Builder;
use serde::Serialize;
use serde_json::ser::{CompactFormatter, PrettyFormatter, Serializer};

use crate::validate::SchemaDocument;

/// Largest accepted indentation width.
pub const MAX_INDENT: usize = 16;

// =============================================================================
// ConfigError
// =============================================================================

/// Errors that can occur during option validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Indentation width above [`MAX_INDENT`].
    InvalidIndent(usize),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIndent(v) => {
                write!(f, "indent must be at most {}, got {}", MAX_INDENT, v)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// =============================================================================
// JsonWriteOptions
// =============================================================================

/// Options controlling JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
#[builder(
    derive(Clone, Debug),
    finish_fn(vis = "", name = __build_internal)
)]
pub struct JsonWriteOptions {
    /// Emit newlines and indentation. Default: true.
    #[builder(default = true)]
    pub pretty: bool,

    /// Spaces per indentation level when `pretty`. Default: 4.
    #[builder(default = 4)]
    pub indent: usize,
}

impl<S: json_write_options_builder::IsComplete> JsonWriteOptionsBuilder<S> {
    /// Build and validate the options.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidIndent`] if `indent > MAX_INDENT`.
    pub fn build(self) -> Result<JsonWriteOptions, ConfigError> {
        let options = self.__build_internal();
        if options.indent > MAX_INDENT {
            return Err(ConfigError::InvalidIndent(options.indent));
        }
        Ok(options)
    }
}

impl Default for JsonWriteOptions {
    fn default() -> Self {
        Self::pretty()
    }
}

impl JsonWriteOptions {
    /// Single-line output.
    pub fn compact() -> Self {
        Self {
            pretty: false,
            indent: 0,
        }
    }

    /// Multi-line output with 4-space indentation.
    pub fn pretty() -> Self {
        Self {
            pretty: true,
            indent: 4,
        }
    }

    /// Serialize `value` into `writer` using these options.
    pub(crate) fn write<W: Write, T: Serialize + ?Sized>(
        &self,
        writer: W,
        value: &T,
    ) -> serde_json::Result<()> {
        if self.pretty {
            let indent = vec![b' '; self.indent.min(MAX_INDENT)];
            let mut ser = Serializer::with_formatter(writer, PrettyFormatter::with_indent(&indent));
            value.serialize(&mut ser)
        } else {
            let mut ser = Serializer::with_formatter(writer, CompactFormatter);
            value.serialize(&mut ser)
        }
    }
}

// =============================================================================
// ReadOptions
// =============================================================================

/// Options controlling how model-state payloads are read.
#[derive(Debug, Clone, Builder)]
pub struct ReadOptions {
    /// Accept payloads written with a 0.x schema. Default: true.
    #[builder(default = true)]
    pub allow_legacy: bool,

    /// Validate payloads against this document instead of the built-in one
    /// for their layout.
    pub schema_override: Option<SchemaDocument>,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            allow_legacy: true,
            schema_override: None,
        }
    }
}
