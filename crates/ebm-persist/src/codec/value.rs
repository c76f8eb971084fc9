//! The tagged value union and its JSON encoding.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::ArrayD;
use num_bigint::BigInt;
use serde_json::{Map as JsonMap, Value as JsonValue};

use super::grid;
use super::{ExplanationRecord, Table};
use crate::config::ReadOptions;
use crate::error::{DecodeError, EncodeError};
use crate::persist::{self, ModelStateDto};

/// Key holding the tag of a tagged object.
pub const TAG_KEY: &str = "_type";
/// Key holding the payload of a tagged object.
pub const VALUE_KEY: &str = "value";

// =============================================================================
// TypeTag
// =============================================================================

/// Tags of the composite value kinds.
///
/// The set is closed: decoding any other tag fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    BigInt,
    Int32,
    Int64,
    Float,
    Map,
    NdArray,
    Table,
    Explanation,
    ModelState,
}

impl TypeTag {
    pub const ALL: [TypeTag; 9] = [
        Self::BigInt,
        Self::Int32,
        Self::Int64,
        Self::Float,
        Self::Map,
        Self::NdArray,
        Self::Table,
        Self::Explanation,
        Self::ModelState,
    ];

    /// Wire name of the tag.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::BigInt => "bigint",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float => "float",
            Self::Map => "map",
            Self::NdArray => "ndarray",
            Self::Table => "table",
            Self::Explanation => "explanation",
            Self::ModelState => "model_state",
        }
    }

    /// Look up a tag by wire name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Value
// =============================================================================

/// A value the codec can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    /// Arbitrary-precision integer.
    Int(BigInt),
    /// Fixed-width 32-bit integer, kept distinct from [`Value::Int`].
    Int32(i32),
    /// Fixed-width 64-bit integer, kept distinct from [`Value::Int`].
    Int64(i64),
    Float(f64),
    Str(String),
    Seq(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Dense numeric array of any rank.
    Array(ArrayD<f64>),
    Table(Table),
    Explanation(Box<ExplanationRecord>),
    ModelState(Box<ModelStateDto>),
}

impl Value {
    /// Tag this value is written with, or `None` if it is written as plain JSON.
    pub fn tag(&self) -> Option<TypeTag> {
        match self {
            Self::Null | Self::Bool(_) | Self::Str(_) | Self::Seq(_) => None,
            Self::Int(n) => (!fits_plain(n)).then_some(TypeTag::BigInt),
            Self::Int32(_) => Some(TypeTag::Int32),
            Self::Int64(_) => Some(TypeTag::Int64),
            Self::Float(v) => (!v.is_finite()).then_some(TypeTag::Float),
            Self::Map(m) => m.contains_key(TAG_KEY).then_some(TypeTag::Map),
            Self::Array(_) => Some(TypeTag::NdArray),
            Self::Table(_) => Some(TypeTag::Table),
            Self::Explanation(_) => Some(TypeTag::Explanation),
            Self::ModelState(_) => Some(TypeTag::ModelState),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_model_state(&self) -> Option<&ModelStateDto> {
        match self {
            Self::ModelState(dto) => Some(dto),
            _ => None,
        }
    }

    pub fn into_model_state(self) -> Option<ModelStateDto> {
        match self {
            Self::ModelState(dto) => Some(*dto),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v.into())
    }
}

impl From<BigInt> for Value {
    fn from(v: BigInt) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Self::Seq(v)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(v: BTreeMap<String, Value>) -> Self {
        Self::Map(v)
    }
}

impl From<ArrayD<f64>> for Value {
    fn from(v: ArrayD<f64>) -> Self {
        Self::Array(v)
    }
}

impl From<Table> for Value {
    fn from(v: Table) -> Self {
        Self::Table(v)
    }
}

impl From<ExplanationRecord> for Value {
    fn from(v: ExplanationRecord) -> Self {
        Self::Explanation(Box::new(v))
    }
}

impl From<ModelStateDto> for Value {
    fn from(v: ModelStateDto) -> Self {
        Self::ModelState(Box::new(v))
    }
}

fn fits_plain(n: &BigInt) -> bool {
    i64::try_from(n).is_ok() || u64::try_from(n).is_ok()
}

// =============================================================================
// Encoding
// =============================================================================

fn tagged(tag: TypeTag, payload: JsonValue) -> JsonValue {
    let mut obj = JsonMap::new();
    obj.insert(TAG_KEY.to_string(), JsonValue::from(tag.as_str()));
    obj.insert(VALUE_KEY.to_string(), payload);
    JsonValue::Object(obj)
}

/// Encode a value into a JSON tree.
pub(crate) fn to_json(value: &Value) -> Result<JsonValue, EncodeError> {
    let json = match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Str(s) => JsonValue::String(s.clone()),
        Value::Int(n) => {
            if let Ok(v) = i64::try_from(n) {
                JsonValue::from(v)
            } else if let Ok(v) = u64::try_from(n) {
                JsonValue::from(v)
            } else {
                tagged(TypeTag::BigInt, JsonValue::String(n.to_string()))
            }
        }
        Value::Int32(v) => tagged(TypeTag::Int32, JsonValue::from(*v)),
        Value::Int64(v) => tagged(TypeTag::Int64, JsonValue::from(*v)),
        Value::Float(v) => match serde_json::Number::from_f64(*v) {
            Some(n) => JsonValue::Number(n),
            None => tagged(TypeTag::Float, grid::scalar_to_json(*v)),
        },
        Value::Seq(items) => {
            JsonValue::Array(items.iter().map(to_json).collect::<Result<_, _>>()?)
        }
        Value::Map(map) => {
            let obj = map_to_json(map)?;
            if map.contains_key(TAG_KEY) {
                tagged(TypeTag::Map, obj)
            } else {
                obj
            }
        }
        Value::Array(array) => tagged(TypeTag::NdArray, grid::to_json(array.view())),
        Value::Table(table) => tagged(TypeTag::Table, table_to_json(table)?),
        Value::Explanation(record) => {
            let mut obj = JsonMap::new();
            obj.insert(
                "explanation_type".into(),
                JsonValue::from(record.explanation_type.as_str()),
            );
            obj.insert("internal".into(), to_json(&record.internal)?);
            obj.insert("feature_names".into(), JsonValue::from(record.feature_names.clone()));
            obj.insert("feature_types".into(), JsonValue::from(record.feature_types.clone()));
            obj.insert(
                "name".into(),
                record.name.as_deref().map_or(JsonValue::Null, JsonValue::from),
            );
            obj.insert(
                "selector".into(),
                tagged(TypeTag::Table, table_to_json(&record.selector)?),
            );
            tagged(TypeTag::Explanation, JsonValue::Object(obj))
        }
        Value::ModelState(dto) => tagged(TypeTag::ModelState, persist::state_to_json(dto)?),
    };
    Ok(json)
}

fn map_to_json(map: &BTreeMap<String, Value>) -> Result<JsonValue, EncodeError> {
    let mut obj = JsonMap::new();
    for (k, v) in map {
        obj.insert(k.clone(), to_json(v)?);
    }
    Ok(JsonValue::Object(obj))
}

fn table_to_json(table: &Table) -> Result<JsonValue, EncodeError> {
    let data = table
        .rows()
        .iter()
        .map(|row| row.iter().map(to_json).collect::<Result<Vec<_>, _>>().map(JsonValue::Array))
        .collect::<Result<Vec<_>, _>>()?;
    let mut obj = JsonMap::new();
    obj.insert("columns".into(), JsonValue::from(table.columns().to_vec()));
    obj.insert("data".into(), JsonValue::Array(data));
    Ok(JsonValue::Object(obj))
}

// =============================================================================
// Decoding
// =============================================================================

#[derive(Clone, Copy)]
enum Segment<'j> {
    Key(&'j str),
    Index(usize),
}

/// Location inside the document being decoded, rendered only on failure.
#[derive(Default)]
struct Path<'j>(Vec<Segment<'j>>);

impl<'j> Path<'j> {
    fn render(&self) -> String {
        let mut out = String::from("$");
        for seg in &self.0 {
            match seg {
                Segment::Key(k) => {
                    out.push('.');
                    out.push_str(k);
                }
                Segment::Index(i) => out.push_str(&format!("[{i}]")),
            }
        }
        out
    }

    fn push(&mut self, seg: Segment<'j>) {
        self.0.push(seg);
    }

    fn pop(&mut self) {
        self.0.pop();
    }
}

/// Decodes a JSON tree into [`Value`]s.
pub(crate) struct Decoder<'o> {
    options: &'o ReadOptions,
}

impl<'o> Decoder<'o> {
    pub(crate) fn new(options: &'o ReadOptions) -> Self {
        Self { options }
    }

    pub(crate) fn decode(&self, json: &JsonValue) -> Result<Value, DecodeError> {
        self.value(json, &mut Path::default())
    }

    fn value<'j>(&self, json: &'j JsonValue, path: &mut Path<'j>) -> Result<Value, DecodeError> {
        match json {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Bool(b) => Ok(Value::Bool(*b)),
            JsonValue::String(s) => Ok(Value::Str(s.clone())),
            JsonValue::Number(n) => Ok(if let Some(v) = n.as_i64() {
                Value::Int(v.into())
            } else if let Some(v) = n.as_u64() {
                Value::Int(v.into())
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }),
            JsonValue::Array(items) => Ok(Value::Seq(self.seq(items, path)?)),
            JsonValue::Object(obj) => match obj.get(TAG_KEY) {
                Some(tag) => self.tagged(obj, tag, path),
                None => Ok(Value::Map(self.map(obj, path)?)),
            },
        }
    }

    fn seq<'j>(&self, items: &'j [JsonValue], path: &mut Path<'j>) -> Result<Vec<Value>, DecodeError> {
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            path.push(Segment::Index(i));
            out.push(self.value(item, path)?);
            path.pop();
        }
        Ok(out)
    }

    fn map<'j>(
        &self,
        obj: &'j JsonMap<String, JsonValue>,
        path: &mut Path<'j>,
    ) -> Result<BTreeMap<String, Value>, DecodeError> {
        let mut out = BTreeMap::new();
        for (k, v) in obj {
            path.push(Segment::Key(k));
            out.insert(k.clone(), self.value(v, path)?);
            path.pop();
        }
        Ok(out)
    }

    fn tagged<'j>(
        &self,
        obj: &'j JsonMap<String, JsonValue>,
        tag: &'j JsonValue,
        path: &mut Path<'j>,
    ) -> Result<Value, DecodeError> {
        let name = tag.as_str().ok_or_else(|| DecodeError::MalformedTag {
            path: path.render(),
            reason: format!("`{TAG_KEY}` must be a string"),
        })?;
        let tag = TypeTag::from_name(name).ok_or_else(|| DecodeError::UnknownTag {
            tag: name.to_string(),
            path: path.render(),
        })?;
        let payload = match obj.get(VALUE_KEY) {
            Some(payload) if obj.len() == 2 => payload,
            _ => {
                return Err(DecodeError::MalformedTag {
                    path: path.render(),
                    reason: format!("a tagged object holds exactly `{TAG_KEY}` and `{VALUE_KEY}`"),
                });
            }
        };

        let invalid = |path: &Path<'j>, reason: String| DecodeError::InvalidPayload {
            tag: tag.as_str(),
            path: path.render(),
            reason,
        };

        path.push(Segment::Key(VALUE_KEY));
        let value = match tag {
            TypeTag::BigInt => {
                let digits = payload
                    .as_str()
                    .filter(|s| is_decimal(s))
                    .ok_or_else(|| invalid(path, "expected a decimal integer string".into()))?;
                let n = digits
                    .parse::<BigInt>()
                    .map_err(|e| invalid(path, e.to_string()))?;
                Value::Int(n)
            }
            TypeTag::Int32 => payload
                .as_i64()
                .and_then(|v| i32::try_from(v).ok())
                .map(Value::Int32)
                .ok_or_else(|| invalid(path, "expected an integer in 32-bit range".into()))?,
            TypeTag::Int64 => payload
                .as_i64()
                .map(Value::Int64)
                .ok_or_else(|| invalid(path, "expected an integer in 64-bit range".into()))?,
            TypeTag::Float => payload
                .as_str()
                .and_then(grid::non_finite_from_str)
                .map(Value::Float)
                .ok_or_else(|| invalid(path, "expected \"NaN\", \"inf\" or \"-inf\"".into()))?,
            TypeTag::Map => match payload {
                JsonValue::Object(inner) => Value::Map(self.map(inner, path)?),
                _ => return Err(invalid(path, "expected an object".into())),
            },
            TypeTag::NdArray => {
                Value::Array(grid::from_json(payload).map_err(|e| invalid(path, e.to_string()))?)
            }
            TypeTag::Table => Value::Table(self.table(payload, path)?),
            TypeTag::Explanation => Value::Explanation(Box::new(self.explanation(payload, path)?)),
            TypeTag::ModelState => {
                let dto = persist::state_from_json(payload, self.options).map_err(|e| {
                    DecodeError::ModelState {
                        path: path.render(),
                        source: Box::new(e),
                    }
                })?;
                Value::ModelState(Box::new(dto))
            }
        };
        path.pop();
        Ok(value)
    }

    fn table<'j>(&self, payload: &'j JsonValue, path: &mut Path<'j>) -> Result<Table, DecodeError> {
        let invalid = |path: &Path<'j>, reason: String| DecodeError::InvalidPayload {
            tag: TypeTag::Table.as_str(),
            path: path.render(),
            reason,
        };

        let columns = field(payload, "columns")
            .and_then(string_list)
            .ok_or_else(|| invalid(path, "`columns` must be a list of strings".into()))?;
        let data = field(payload, "data")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| invalid(path, "`data` must be a list of rows".into()))?;

        path.push(Segment::Key("data"));
        let mut rows = Vec::with_capacity(data.len());
        for (r, row) in data.iter().enumerate() {
            path.push(Segment::Index(r));
            let cells = row
                .as_array()
                .ok_or_else(|| invalid(path, "row must be a list".into()))?;
            rows.push(self.seq(cells, path)?);
            path.pop();
        }
        path.pop();

        Table::from_rows(columns, rows).map_err(|e| invalid(path, e.to_string()))
    }

    fn explanation<'j>(
        &self,
        payload: &'j JsonValue,
        path: &mut Path<'j>,
    ) -> Result<ExplanationRecord, DecodeError> {
        let invalid = |path: &Path<'j>, reason: String| DecodeError::InvalidPayload {
            tag: TypeTag::Explanation.as_str(),
            path: path.render(),
            reason,
        };
        let require = |name: &'static str, path: &Path<'j>| {
            field(payload, name).ok_or_else(|| invalid(path, format!("missing `{name}`")))
        };

        let explanation_type = require("explanation_type", path)?
            .as_str()
            .ok_or_else(|| invalid(path, "`explanation_type` must be a string".into()))?
            .to_string();
        let feature_names = string_list(require("feature_names", path)?)
            .ok_or_else(|| invalid(path, "`feature_names` must be a list of strings".into()))?;
        let feature_types = string_list(require("feature_types", path)?)
            .ok_or_else(|| invalid(path, "`feature_types` must be a list of strings".into()))?;
        let name = match field(payload, "name") {
            None | Some(JsonValue::Null) => None,
            Some(JsonValue::String(s)) => Some(s.clone()),
            Some(_) => return Err(invalid(path, "`name` must be a string or null".into())),
        };

        let internal_json = require("internal", path)?;
        path.push(Segment::Key("internal"));
        let internal = self.value(internal_json, path)?;
        path.pop();

        let selector_json = require("selector", path)?;
        path.push(Segment::Key("selector"));
        let selector = match self.value(selector_json, path)? {
            Value::Table(table) => table,
            _ => return Err(invalid(path, "`selector` must be a table".into())),
        };
        path.pop();

        Ok(ExplanationRecord {
            explanation_type,
            internal,
            feature_names,
            feature_types,
            name,
            selector,
        })
    }
}

fn field<'j>(obj: &'j JsonValue, name: &str) -> Option<&'j JsonValue> {
    obj.as_object()?.get(name)
}

fn string_list(value: &JsonValue) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect()
}

fn is_decimal(s: &str) -> bool {
    let digits = s.strip_prefix('-').unwrap_or(s);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}
