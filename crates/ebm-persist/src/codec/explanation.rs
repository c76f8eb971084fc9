//! Explanation records.
//!
//! An explanation is produced by an external composition layer. The codec
//! only carries its named fields across the wire and never interprets the
//! internal payload.

use super::{Table, Value};

/// Named fields of an explanation, as exchanged with the composition layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplanationRecord {
    /// Explanation kind, e.g. `"global"` or `"local"`.
    pub explanation_type: String,
    /// Opaque payload owned by the composition layer.
    pub internal: Value,
    /// Feature names the explanation covers.
    pub feature_names: Vec<String>,
    /// Declared kind per feature.
    pub feature_types: Vec<String>,
    /// Display name.
    pub name: Option<String>,
    /// Feature selector table.
    pub selector: Table,
}

impl ExplanationRecord {
    /// Create a record with an empty payload and selector.
    pub fn new(explanation_type: impl Into<String>) -> Self {
        Self {
            explanation_type: explanation_type.into(),
            internal: Value::Null,
            feature_names: Vec::new(),
            feature_types: Vec::new(),
            name: None,
            selector: Table::default(),
        }
    }

    pub fn with_internal(mut self, internal: Value) -> Self {
        self.internal = internal;
        self
    }

    pub fn with_features(mut self, names: Vec<String>, types: Vec<String>) -> Self {
        self.feature_names = names;
        self.feature_types = types;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_selector(mut self, selector: Table) -> Self {
        self.selector = selector;
        self
    }
}
