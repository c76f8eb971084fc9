//! Tagged-type codec.
//!
//! Every composite value is written as `{"_type": <tag>, "value": <payload>}`
//! so that decoding is driven by the tag alone. The set of tags is closed
//! ([`TypeTag`]); an unknown tag is a [`DecodeError`], never a best-effort
//! fallback.
//!
//! Plain JSON scalars, lists and objects decode to [`Value::Int`],
//! [`Value::Float`], [`Value::Str`], [`Value::Seq`] and [`Value::Map`].
//!
//! # Example
//!
//! ```
//! use ebm_persist::codec::{self, Value};
//!
//! let value = Value::Seq(vec![Value::Int32(3), Value::Float(f64::INFINITY)]);
//! let text = codec::encode(&value).unwrap();
//! assert_eq!(codec::decode(&text).unwrap(), value);
//! ```
//!
//! `encode` and `decode` perform no I/O. The reader, writer and file helpers
//! hold their handle only for the duration of the call.

mod explanation;
pub mod grid;
mod table;
mod value;

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

pub use explanation::ExplanationRecord;
pub use table::{Table, TableShapeError};
pub use value::{TAG_KEY, TypeTag, VALUE_KEY, Value};

pub(crate) use value::Decoder;

use crate::config::{JsonWriteOptions, ReadOptions};
use crate::error::{DecodeError, EncodeError};

/// Encode a value with the default (pretty) options.
pub fn encode(value: &Value) -> Result<String, EncodeError> {
    encode_with(value, &JsonWriteOptions::default())
}

/// Encode a value to text.
pub fn encode_with(value: &Value, options: &JsonWriteOptions) -> Result<String, EncodeError> {
    let mut buf = Vec::new();
    write_value(&mut buf, value, options)?;
    String::from_utf8(buf)
        .map_err(|e| EncodeError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Decode a value from text.
pub fn decode(text: &str) -> Result<Value, DecodeError> {
    decode_with(text, &ReadOptions::default())
}

/// Decode a value from text; embedded model states are read with `options`.
pub fn decode_with(text: &str, options: &ReadOptions) -> Result<Value, DecodeError> {
    let _span = tracing::debug_span!("decode", bytes = text.len()).entered();
    let json: serde_json::Value = serde_json::from_str(text).map_err(DecodeError::from_json)?;
    Decoder::new(options).decode(&json)
}

/// Encode a value into a writer.
pub fn write_value<W: Write>(
    writer: W,
    value: &Value,
    options: &JsonWriteOptions,
) -> Result<(), EncodeError> {
    let _span = tracing::debug_span!("encode", tag = ?value.tag()).entered();
    let json = value::to_json(value)?;
    options.write(writer, &json)?;
    Ok(())
}

/// Decode a value from a reader.
pub fn read_value<R: Read>(reader: R) -> Result<Value, DecodeError> {
    let json: serde_json::Value =
        serde_json::from_reader(reader).map_err(DecodeError::from_json)?;
    Decoder::new(&ReadOptions::default()).decode(&json)
}

/// Encode a value into a file, replacing its contents.
pub fn to_file(
    path: impl AsRef<Path>,
    value: &Value,
    options: &JsonWriteOptions,
) -> Result<(), EncodeError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "writing value");
    let mut writer = BufWriter::new(File::create(path)?);
    write_value(&mut writer, value, options)?;
    writer.flush()?;
    Ok(())
}

/// Decode a value from a file.
pub fn from_file(path: impl AsRef<Path>) -> Result<Value, DecodeError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "reading value");
    read_value(BufReader::new(File::open(path)?))
}
