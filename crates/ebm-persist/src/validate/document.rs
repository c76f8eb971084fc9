//! Schema documents.
//!
//! A JSON-Schema-style subset: `type`, `properties`, `required`,
//! `additionalProperties`, `propertyNames`, `items`, `enum`, `minItems`,
//! `maxItems`, `minimum`, `maximum`, `pattern` and local `$ref` into `$defs`.
//! Other keywords (`$schema`, `title`, `description`, ...) are ignored.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use regex::Regex;
use serde_json::Value as JsonValue;

/// A schema document that could not be parsed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("schema document is not valid JSON: {0}")]
    Json(String),

    #[error("failed to read schema document: {0}")]
    Io(String),

    #[error("{path}: invalid `{keyword}`: {reason}")]
    InvalidKeyword {
        path: String,
        keyword: &'static str,
        reason: String,
    },

    #[error("{path}: invalid pattern `{pattern}`: {reason}")]
    InvalidPattern {
        path: String,
        pattern: String,
        reason: String,
    },

    #[error("{path}: unresolved reference `{reference}`")]
    UnresolvedRef { path: String, reference: String },

    #[error("{path}: reference cycle through `{reference}`")]
    CyclicRef { path: String, reference: String },
}

/// Primitive JSON kinds a schema can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JsonType {
    Object,
    Array,
    String,
    Number,
    Integer,
    Boolean,
    Null,
}

impl JsonType {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "object" => Self::Object,
            "array" => Self::Array,
            "string" => Self::String,
            "number" => Self::Number,
            "integer" => Self::Integer,
            "boolean" => Self::Boolean,
            "null" => Self::Null,
            _ => return None,
        })
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Number => "number",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Null => "null",
        }
    }

    /// Integers must be written without a fraction or exponent: `3.0` is a
    /// number but not an integer, matching what the payload parser accepts.
    pub(crate) fn matches(self, value: &JsonValue) -> bool {
        match self {
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
            Self::String => value.is_string(),
            Self::Number => value.is_number(),
            Self::Integer => match value {
                JsonValue::Number(n) => n.is_i64() || n.is_u64(),
                _ => false,
            },
            Self::Boolean => value.is_boolean(),
            Self::Null => value.is_null(),
        }
    }
}

/// Policy for properties not listed under `properties`.
#[derive(Debug, Clone, Default)]
pub(crate) enum Additional {
    #[default]
    Allow,
    Deny,
    Schema(Box<Node>),
}

/// One parsed schema node.
#[derive(Debug, Clone, Default)]
pub(crate) struct Node {
    pub types: Option<Vec<JsonType>>,
    pub properties: BTreeMap<String, Node>,
    pub required: Vec<String>,
    pub additional: Additional,
    pub property_names: Option<Box<Node>>,
    pub items: Option<Box<Node>>,
    pub enum_values: Option<Vec<JsonValue>>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub pattern: Option<Regex>,
    pub reference: Option<String>,
}

/// A parsed, reference-checked schema document.
///
/// Cheap to clone; the parsed tree is shared.
#[derive(Clone)]
pub struct SchemaDocument {
    pub(crate) root: Arc<Node>,
    pub(crate) defs: Arc<BTreeMap<String, Node>>,
}

impl fmt::Debug for SchemaDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaDocument")
            .field("properties", &self.root.properties.keys().collect::<Vec<_>>())
            .field("defs", &self.defs.keys().collect::<Vec<_>>())
            .finish()
    }
}

const DEFS_PREFIX: &str = "#/$defs/";

impl SchemaDocument {
    /// Parse a document from a JSON tree.
    pub fn from_json(doc: &JsonValue) -> Result<Self, SchemaError> {
        let mut defs = BTreeMap::new();
        if let Some(raw) = doc.get("$defs") {
            let obj = raw.as_object().ok_or_else(|| SchemaError::InvalidKeyword {
                path: "$".into(),
                keyword: "$defs",
                reason: "expected an object".into(),
            })?;
            for (name, def) in obj {
                defs.insert(name.clone(), parse_node(def, &format!("$.$defs.{name}"))?);
            }
        }
        let root = parse_node(doc, "$")?;

        check_refs(&root, "$", &defs)?;
        for (name, def) in &defs {
            check_refs(def, &format!("$.$defs.{name}"), &defs)?;
        }
        check_ref_chains(&defs)?;

        Ok(Self {
            root: Arc::new(root),
            defs: Arc::new(defs),
        })
    }

    /// Read a document from a reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, SchemaError> {
        let json: JsonValue =
            serde_json::from_reader(reader).map_err(|e| SchemaError::Json(e.to_string()))?;
        Self::from_json(&json)
    }

    /// Read a document from a file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
        let file = std::fs::File::open(path.as_ref()).map_err(|e| SchemaError::Io(e.to_string()))?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    /// Check `raw` against this document, stopping at the first violation.
    pub fn validate(&self, raw: &JsonValue) -> Result<(), crate::error::ValidationError> {
        super::validate(raw, self)
    }
}

impl FromStr for SchemaDocument {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let json: JsonValue = serde_json::from_str(s).map_err(|e| SchemaError::Json(e.to_string()))?;
        Self::from_json(&json)
    }
}

fn invalid(path: &str, keyword: &'static str, reason: impl Into<String>) -> SchemaError {
    SchemaError::InvalidKeyword {
        path: path.to_string(),
        keyword,
        reason: reason.into(),
    }
}

fn parse_node(doc: &JsonValue, path: &str) -> Result<Node, SchemaError> {
    let obj = doc
        .as_object()
        .ok_or_else(|| invalid(path, "schema", "expected an object"))?;
    let mut node = Node::default();

    if let Some(raw) = obj.get("type") {
        let names: Vec<&str> = match raw {
            JsonValue::String(s) => vec![s.as_str()],
            JsonValue::Array(items) => items
                .iter()
                .map(|v| v.as_str().ok_or_else(|| invalid(path, "type", "expected type names")))
                .collect::<Result<_, _>>()?,
            _ => return Err(invalid(path, "type", "expected a string or a list of strings")),
        };
        let types = names
            .into_iter()
            .map(|n| JsonType::parse(n).ok_or_else(|| invalid(path, "type", format!("unknown type `{n}`"))))
            .collect::<Result<Vec<_>, _>>()?;
        node.types = Some(types);
    }

    if let Some(raw) = obj.get("properties") {
        let props = raw
            .as_object()
            .ok_or_else(|| invalid(path, "properties", "expected an object"))?;
        for (name, sub) in props {
            node.properties
                .insert(name.clone(), parse_node(sub, &format!("{path}.properties.{name}"))?);
        }
    }

    if let Some(raw) = obj.get("required") {
        node.required = raw
            .as_array()
            .and_then(|items| items.iter().map(|v| v.as_str().map(str::to_string)).collect())
            .ok_or_else(|| invalid(path, "required", "expected a list of strings"))?;
    }

    if let Some(raw) = obj.get("additionalProperties") {
        node.additional = match raw {
            JsonValue::Bool(true) => Additional::Allow,
            JsonValue::Bool(false) => Additional::Deny,
            sub => Additional::Schema(Box::new(parse_node(
                sub,
                &format!("{path}.additionalProperties"),
            )?)),
        };
    }

    if let Some(raw) = obj.get("propertyNames") {
        node.property_names = Some(Box::new(parse_node(raw, &format!("{path}.propertyNames"))?));
    }

    if let Some(raw) = obj.get("items") {
        node.items = Some(Box::new(parse_node(raw, &format!("{path}.items"))?));
    }

    if let Some(raw) = obj.get("enum") {
        let values = raw
            .as_array()
            .ok_or_else(|| invalid(path, "enum", "expected a list"))?;
        node.enum_values = Some(values.clone());
    }

    node.min_items = count(obj.get("minItems"), path, "minItems")?;
    node.max_items = count(obj.get("maxItems"), path, "maxItems")?;
    node.minimum = bound(obj.get("minimum"), path, "minimum")?;
    node.maximum = bound(obj.get("maximum"), path, "maximum")?;

    if let Some(raw) = obj.get("pattern") {
        let source = raw
            .as_str()
            .ok_or_else(|| invalid(path, "pattern", "expected a string"))?;
        let regex = Regex::new(source).map_err(|e| SchemaError::InvalidPattern {
            path: path.to_string(),
            pattern: source.to_string(),
            reason: e.to_string(),
        })?;
        node.pattern = Some(regex);
    }

    if let Some(raw) = obj.get("$ref") {
        let reference = raw
            .as_str()
            .ok_or_else(|| invalid(path, "$ref", "expected a string"))?;
        let name = reference
            .strip_prefix(DEFS_PREFIX)
            .ok_or_else(|| SchemaError::UnresolvedRef {
                path: path.to_string(),
                reference: reference.to_string(),
            })?;
        node.reference = Some(name.to_string());
    }

    Ok(node)
}

fn count(raw: Option<&JsonValue>, path: &str, keyword: &'static str) -> Result<Option<usize>, SchemaError> {
    raw.map(|v| {
        v.as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| invalid(path, keyword, "expected a non-negative integer"))
    })
    .transpose()
}

fn bound(raw: Option<&JsonValue>, path: &str, keyword: &'static str) -> Result<Option<f64>, SchemaError> {
    raw.map(|v| v.as_f64().ok_or_else(|| invalid(path, keyword, "expected a number")))
        .transpose()
}

fn check_refs(node: &Node, path: &str, defs: &BTreeMap<String, Node>) -> Result<(), SchemaError> {
    if let Some(name) = &node.reference
        && !defs.contains_key(name)
    {
        return Err(SchemaError::UnresolvedRef {
            path: path.to_string(),
            reference: format!("{DEFS_PREFIX}{name}"),
        });
    }
    for (name, sub) in &node.properties {
        check_refs(sub, &format!("{path}.properties.{name}"), defs)?;
    }
    if let Additional::Schema(sub) = &node.additional {
        check_refs(sub, &format!("{path}.additionalProperties"), defs)?;
    }
    if let Some(sub) = &node.property_names {
        check_refs(sub, &format!("{path}.propertyNames"), defs)?;
    }
    if let Some(sub) = &node.items {
        check_refs(sub, &format!("{path}.items"), defs)?;
    }
    Ok(())
}

/// Every chain of bare references must end in a definition without one.
/// Descending into properties or items consumes the instance, so only these
/// chains can recurse without bound.
fn check_ref_chains(defs: &BTreeMap<String, Node>) -> Result<(), SchemaError> {
    for start in defs.keys() {
        let mut seen = vec![start.as_str()];
        let mut name = start;
        while let Some(next) = defs.get(name).and_then(|n| n.reference.as_ref()) {
            if seen.contains(&next.as_str()) {
                return Err(SchemaError::CyclicRef {
                    path: format!("$.$defs.{start}"),
                    reference: format!("{DEFS_PREFIX}{next}"),
                });
            }
            seen.push(next.as_str());
            name = next;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_keywords() {
        let doc = SchemaDocument::from_json(&json!({
            "$schema": "https://json-schema.org/draft/2020-12/schema",
            "type": "object",
            "required": ["version"],
            "properties": {
                "version": {
                    "type": "array",
                    "items": {"type": "integer", "minimum": 0},
                    "minItems": 3,
                    "maxItems": 3
                },
                "name": {"$ref": "#/$defs/name"}
            },
            "$defs": {"name": {"type": "string", "pattern": "^[a-z]+$"}}
        }))
        .unwrap();
        let version = &doc.root.properties["version"];
        assert_eq!(version.min_items, Some(3));
        assert_eq!(version.items.as_ref().unwrap().minimum, Some(0.0));
        assert!(doc.defs.contains_key("name"));
    }

    #[test]
    fn unresolved_reference() {
        let err = SchemaDocument::from_json(&json!({"items": {"$ref": "#/$defs/missing"}}))
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvedRef { .. }));

        let err = SchemaDocument::from_json(&json!({"$ref": "http://example.com/x"})).unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvedRef { .. }));
    }

    #[test]
    fn reference_cycles() {
        let err = SchemaDocument::from_json(&json!({
            "$ref": "#/$defs/a",
            "$defs": {"a": {"$ref": "#/$defs/a"}}
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::CyclicRef { .. }));

        let err = SchemaDocument::from_json(&json!({
            "$defs": {
                "a": {"type": "object", "$ref": "#/$defs/b"},
                "b": {"$ref": "#/$defs/c"},
                "c": {"$ref": "#/$defs/a"}
            }
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::CyclicRef { .. }));

        // Recursion through `items` is bounded by the instance.
        assert!(
            SchemaDocument::from_json(&json!({
                "$ref": "#/$defs/tree",
                "$defs": {"tree": {"type": ["array", "number"], "items": {"$ref": "#/$defs/tree"}}}
            }))
            .is_ok()
        );
    }

    #[test]
    fn bad_pattern_and_type() {
        let err = SchemaDocument::from_json(&json!({"pattern": "(unclosed"})).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidPattern { .. }));

        let err = SchemaDocument::from_json(&json!({"type": "tuple"})).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidKeyword { keyword: "type", .. }));
    }

    #[test]
    fn malformed_text() {
        assert!(matches!("{".parse::<SchemaDocument>(), Err(SchemaError::Json(_))));
    }

    #[test]
    fn integer_matching() {
        assert!(JsonType::Integer.matches(&json!(3)));
        assert!(!JsonType::Integer.matches(&json!(3.0)));
        assert!(!JsonType::Integer.matches(&json!(3.5)));
        assert!(!JsonType::Integer.matches(&json!("3")));
    }
}
