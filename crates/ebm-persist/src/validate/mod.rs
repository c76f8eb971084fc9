//! Structural validation of raw payloads against schema documents.
//!
//! Validation is a pure check over a [`serde_json::Value`] tree. It runs
//! before any domain conversion, so a payload that reaches conversion is
//! known to have the shape its layout requires.
//!
//! Error order is deterministic: within an object, required fields are
//! checked first in the order the document lists them, then present
//! properties in sorted key order; array items are checked in index order.

mod builtin;
mod document;

pub use builtin::{envelope, for_layout};
pub use document::{SchemaDocument, SchemaError};

use serde_json::Value as JsonValue;

use crate::error::{ValidationError, ValidationErrorKind};
use document::{Additional, JsonType, Node};

/// Check `raw` against `schema`, returning the first violation.
pub fn validate(raw: &JsonValue, schema: &SchemaDocument) -> Result<(), ValidationError> {
    let mut validator = Validator::new(schema, true);
    let _ = validator.node(&schema.root, raw);
    match validator.errors.into_iter().next() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Check `raw` against `schema`, returning every violation found.
///
/// A node with the wrong type yields one error; its children are not
/// inspected.
pub fn validate_all(raw: &JsonValue, schema: &SchemaDocument) -> Vec<ValidationError> {
    let mut validator = Validator::new(schema, false);
    let _ = validator.node(&schema.root, raw);
    validator.errors
}

/// Marker returned once a fail-fast validator has recorded an error.
struct Stop;

struct Validator<'s> {
    schema: &'s SchemaDocument,
    fail_fast: bool,
    path: String,
    errors: Vec<ValidationError>,
}

impl<'s> Validator<'s> {
    fn new(schema: &'s SchemaDocument, fail_fast: bool) -> Self {
        Self {
            schema,
            fail_fast,
            path: String::new(),
            errors: Vec::new(),
        }
    }

    fn report(&mut self, kind: ValidationErrorKind) -> Result<(), Stop> {
        self.errors.push(ValidationError::new(self.path.clone(), kind));
        if self.fail_fast { Err(Stop) } else { Ok(()) }
    }

    fn report_at(&mut self, child: Segment<'_>, kind: ValidationErrorKind) -> Result<(), Stop> {
        let mark = self.push(child);
        let result = self.report(kind);
        self.path.truncate(mark);
        result
    }

    /// Extend the current path, returning the length to truncate back to.
    fn push(&mut self, segment: Segment<'_>) -> usize {
        let mark = self.path.len();
        match segment {
            Segment::Key(key) => {
                if !self.path.is_empty() {
                    self.path.push('.');
                }
                self.path.push_str(key);
            }
            Segment::Index(i) => {
                self.path.push('[');
                self.path.push_str(&i.to_string());
                self.path.push(']');
            }
        }
        mark
    }

    fn child(&mut self, segment: Segment<'_>, node: &'s Node, value: &JsonValue) -> Result<(), Stop> {
        let mark = self.push(segment);
        let result = self.node(node, value);
        self.path.truncate(mark);
        result
    }

    fn node(&mut self, node: &'s Node, value: &JsonValue) -> Result<(), Stop> {
        if let Some(types) = &node.types
            && !types.iter().any(|t| t.matches(value))
        {
            let expected = types.iter().map(|t| t.name()).collect::<Vec<_>>().join(" or ");
            return self.report(ValidationErrorKind::WrongType {
                expected,
                found: kind_name(value),
            });
        }

        if let Some(allowed) = &node.enum_values
            && !allowed.contains(value)
        {
            let allowed = allowed.iter().map(JsonValue::to_string).collect::<Vec<_>>();
            self.report(ValidationErrorKind::NotInEnum {
                value: value.to_string(),
                allowed: format!("[{}]", allowed.join(", ")),
            })?;
        }

        match value {
            JsonValue::Object(map) => self.object(node, map)?,
            JsonValue::Array(items) => self.array(node, items)?,
            JsonValue::Number(n) => {
                if let Some(x) = n.as_f64() {
                    self.number(node, x)?;
                }
            }
            JsonValue::String(s) => self.string(node, s)?,
            _ => {}
        }

        if let Some(name) = &node.reference
            && let Some(target) = self.schema.defs.get(name)
        {
            self.node(target, value)?;
        }
        Ok(())
    }

    fn object(
        &mut self,
        node: &'s Node,
        map: &serde_json::Map<String, JsonValue>,
    ) -> Result<(), Stop> {
        for field in &node.required {
            if !map.contains_key(field) {
                self.report_at(
                    Segment::Key(field),
                    ValidationErrorKind::MissingField {
                        field: field.clone(),
                    },
                )?;
            }
        }

        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort();
        for key in keys {
            let value = &map[key.as_str()];

            if let Some(names) = &node.property_names
                && let Some(reason) = self.property_name_violation(names, key)
            {
                self.report(ValidationErrorKind::InvalidPropertyName {
                    name: key.clone(),
                    reason: Box::new(reason),
                })?;
                continue;
            }

            match node.properties.get(key) {
                Some(sub) => self.child(Segment::Key(key), sub, value)?,
                None => match &node.additional {
                    Additional::Allow => {}
                    Additional::Deny => self.report(ValidationErrorKind::UnexpectedProperty {
                        name: key.clone(),
                    })?,
                    Additional::Schema(sub) => self.child(Segment::Key(key), sub, value)?,
                },
            }
        }
        Ok(())
    }

    fn property_name_violation(&self, names: &'s Node, key: &str) -> Option<ValidationErrorKind> {
        let mut inner = Validator::new(self.schema, true);
        let _ = inner.node(names, &JsonValue::String(key.to_string()));
        inner.errors.into_iter().next().map(|e| e.kind)
    }

    fn array(&mut self, node: &'s Node, items: &[JsonValue]) -> Result<(), Stop> {
        if let Some(min) = node.min_items
            && items.len() < min
        {
            self.report(ValidationErrorKind::TooFewItems {
                min,
                actual: items.len(),
            })?;
        }
        if let Some(max) = node.max_items
            && items.len() > max
        {
            self.report(ValidationErrorKind::TooManyItems {
                max,
                actual: items.len(),
            })?;
        }
        if let Some(sub) = &node.items {
            for (i, item) in items.iter().enumerate() {
                self.child(Segment::Index(i), sub, item)?;
            }
        }
        Ok(())
    }

    fn number(&mut self, node: &Node, value: f64) -> Result<(), Stop> {
        if let Some(minimum) = node.minimum
            && value < minimum
        {
            self.report(ValidationErrorKind::BelowMinimum { value, minimum })?;
        }
        if let Some(maximum) = node.maximum
            && value > maximum
        {
            self.report(ValidationErrorKind::AboveMaximum { value, maximum })?;
        }
        Ok(())
    }

    fn string(&mut self, node: &Node, value: &str) -> Result<(), Stop> {
        if let Some(pattern) = &node.pattern
            && !pattern.is_match(value)
        {
            self.report(ValidationErrorKind::PatternMismatch {
                value: value.to_string(),
                pattern: pattern.as_str().to_string(),
            })?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

fn kind_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc() -> SchemaDocument {
        SchemaDocument::from_json(&json!({
            "type": "object",
            "required": ["version", "learner"],
            "properties": {
                "version": {
                    "type": "array",
                    "minItems": 3,
                    "maxItems": 3,
                    "items": {"type": "integer", "minimum": 0}
                },
                "learner": {
                    "type": "object",
                    "required": ["feature_names"],
                    "properties": {
                        "feature_names": {"type": "array", "items": {"type": "string"}},
                        "feature_types": {
                            "type": "array",
                            "items": {"enum": ["continuous", "categorical"]}
                        },
                        "mins": {"$ref": "#/$defs/index_map"}
                    }
                }
            },
            "$defs": {
                "index_map": {
                    "type": "object",
                    "propertyNames": {"pattern": "^(0|[1-9][0-9]*)$"},
                    "additionalProperties": {"type": "number"}
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn accepts_conforming() {
        let raw = json!({
            "version": [1, 0, 0],
            "learner": {
                "feature_names": ["a", "b"],
                "feature_types": ["continuous", "categorical"],
                "mins": {"0": 1.0, "12": 2.5}
            }
        });
        assert_eq!(validate(&raw, &doc()), Ok(()));
        assert!(validate_all(&raw, &doc()).is_empty());
    }

    #[test]
    fn missing_nested_field_has_dotted_path() {
        let raw = json!({"version": [1, 0, 0], "learner": {}});
        let err = validate(&raw, &doc()).unwrap_err();
        assert_eq!(err.path, "learner.feature_names");
        assert!(matches!(err.kind, ValidationErrorKind::MissingField { .. }));
    }

    #[test]
    fn required_fields_come_first_in_listed_order() {
        let errors = validate_all(&json!({}), &doc());
        let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["version", "learner"]);
    }

    #[test]
    fn array_item_paths() {
        let raw = json!({
            "version": [1, -1, 0],
            "learner": {"feature_names": ["a", 3]}
        });
        let errors = validate_all(&raw, &doc());
        let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
        // Present properties are visited in sorted order.
        assert_eq!(paths, ["learner.feature_names[1]", "version[1]"]);
        assert!(matches!(
            errors[1].kind,
            ValidationErrorKind::BelowMinimum { minimum, .. } if minimum == 0.0
        ));
    }

    #[test]
    fn version_length() {
        let raw = json!({"version": [1, 0], "learner": {"feature_names": []}});
        let err = validate(&raw, &doc()).unwrap_err();
        assert_eq!(err.path, "version");
        assert_eq!(err.kind, ValidationErrorKind::TooFewItems { min: 3, actual: 2 });
    }

    #[test]
    fn wrong_type_reports_found_kind() {
        let raw = json!({"version": "1.0.0", "learner": {"feature_names": []}});
        let err = validate(&raw, &doc()).unwrap_err();
        assert_eq!(
            err.kind,
            ValidationErrorKind::WrongType {
                expected: "array".into(),
                found: "string"
            }
        );
    }

    #[test]
    fn enum_violation() {
        let raw = json!({
            "version": [1, 0, 0],
            "learner": {"feature_names": ["a"], "feature_types": ["ordinal"]}
        });
        let err = validate(&raw, &doc()).unwrap_err();
        assert_eq!(err.path, "learner.feature_types[0]");
        assert!(matches!(err.kind, ValidationErrorKind::NotInEnum { .. }));
    }

    #[test]
    fn property_names_through_reference() {
        let raw = json!({
            "version": [1, 0, 0],
            "learner": {"feature_names": [], "mins": {"01": 1.0}}
        });
        let err = validate(&raw, &doc()).unwrap_err();
        assert_eq!(err.path, "learner.mins");
        match err.kind {
            ValidationErrorKind::InvalidPropertyName { name, reason } => {
                assert_eq!(name, "01");
                assert!(matches!(*reason, ValidationErrorKind::PatternMismatch { .. }));
            }
            other => panic!("unexpected kind: {other:?}"),
        }
    }

    #[test]
    fn additional_properties_schema() {
        let raw = json!({
            "version": [1, 0, 0],
            "learner": {"feature_names": [], "mins": {"0": "low"}}
        });
        let err = validate(&raw, &doc()).unwrap_err();
        assert_eq!(err.path, "learner.mins.0");
    }

    #[test]
    fn denied_additional_properties() {
        let schema = SchemaDocument::from_json(&json!({
            "type": "object",
            "properties": {"a": {}},
            "additionalProperties": false
        }))
        .unwrap();
        let err = validate(&json!({"a": 1, "b": 2}), &schema).unwrap_err();
        assert_eq!(err.path, "");
        assert_eq!(
            err.kind,
            ValidationErrorKind::UnexpectedProperty { name: "b".into() }
        );
    }

    #[test]
    fn recursive_reference() {
        let schema = SchemaDocument::from_json(&json!({
            "$ref": "#/$defs/grid",
            "$defs": {"grid": {"type": ["array", "number"], "items": {"$ref": "#/$defs/grid"}}}
        }))
        .unwrap();
        assert!(validate(&json!([[1.0, 2.0], [3.0, 4.0]]), &schema).is_ok());
        let err = validate(&json!([[1.0, "x"]]), &schema).unwrap_err();
        assert_eq!(err.path, "[0][1]");
    }
}
