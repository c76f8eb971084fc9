//! Nested-array representation of numeric grids.
//!
//! A grid of shape `[a, b, c]` is written as `a` arrays of `b` arrays of `c`
//! numbers. Non-finite elements are written as the strings `"NaN"`, `"inf"`
//! and `"-inf"` so that no value is lost.
//!
//! Nesting carries no explicit shape: an array whose leading axis is empty is
//! written as `[]` and reads back with shape `[0]`.
//!
//! Grids inside model-state records go through `nested`, which accepts
//! finite numbers only.

use ndarray::{ArrayD, ArrayViewD, IxDyn};
use serde_json::Value as JsonValue;

const PREALLOC_LIMIT: usize = 1 << 20;

/// A nested array that is not a rectangular numeric grid.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GridError {
    #[error("ragged nested array at {path}")]
    Ragged { path: String },

    #[error("expected a number at {path}")]
    NotANumber { path: String },

    #[error("non-finite value at {path}")]
    NonFinite { path: String },
}

impl GridError {
    fn at(self, index: usize) -> Self {
        match self {
            Self::Ragged { path } => Self::Ragged {
                path: format!("[{index}]{path}"),
            },
            Self::NotANumber { path } => Self::NotANumber {
                path: format!("[{index}]{path}"),
            },
            Self::NonFinite { path } => Self::NonFinite {
                path: format!("[{index}]{path}"),
            },
        }
    }
}

/// Write a grid as nested arrays.
pub fn to_json(grid: ArrayViewD<'_, f64>) -> JsonValue {
    if grid.ndim() == 0 {
        return scalar_to_json(grid.iter().next().copied().unwrap_or_default());
    }
    JsonValue::Array(grid.outer_iter().map(to_json).collect())
}

/// Read nested arrays back into a grid.
///
/// The shape is taken from the first element at every depth; every other
/// element must agree with it.
pub fn from_json(value: &JsonValue) -> Result<ArrayD<f64>, GridError> {
    parse(value, false)
}

/// Like [`from_json`], but every element must be a finite JSON number.
pub fn finite_from_json(value: &JsonValue) -> Result<ArrayD<f64>, GridError> {
    parse(value, true)
}

fn parse(value: &JsonValue, finite: bool) -> Result<ArrayD<f64>, GridError> {
    let mut shape = Vec::new();
    let mut cursor = value;
    while let JsonValue::Array(items) = cursor {
        shape.push(items.len());
        match items.first() {
            Some(first) => cursor = first,
            None => break,
        }
    }

    // The first-element shape is unverified until `collect` succeeds.
    let len = shape
        .iter()
        .try_fold(1usize, |acc, &n| acc.checked_mul(n))
        .ok_or(GridError::Ragged {
            path: String::new(),
        })?;
    let mut data = Vec::with_capacity(len.min(PREALLOC_LIMIT));
    collect(value, &shape, finite, &mut data)?;
    ArrayD::from_shape_vec(IxDyn(&shape), data).map_err(|_| GridError::Ragged {
        path: String::new(),
    })
}

fn collect(
    value: &JsonValue,
    shape: &[usize],
    finite: bool,
    out: &mut Vec<f64>,
) -> Result<(), GridError> {
    let Some((&len, rest)) = shape.split_first() else {
        let v = scalar_from_json(value)?;
        if finite && !v.is_finite() {
            return Err(GridError::NonFinite {
                path: String::new(),
            });
        }
        out.push(v);
        return Ok(());
    };
    match value {
        JsonValue::Array(items) if items.len() == len => {
            for (i, item) in items.iter().enumerate() {
                collect(item, rest, finite, out).map_err(|e| e.at(i))?;
            }
            Ok(())
        }
        _ => Err(GridError::Ragged {
            path: String::new(),
        }),
    }
}

pub(crate) fn scalar_to_json(v: f64) -> JsonValue {
    match serde_json::Number::from_f64(v) {
        Some(n) => JsonValue::Number(n),
        None if v.is_nan() => JsonValue::from("NaN"),
        None if v > 0.0 => JsonValue::from("inf"),
        None => JsonValue::from("-inf"),
    }
}

pub(crate) fn non_finite_from_str(s: &str) -> Option<f64> {
    match s {
        "NaN" => Some(f64::NAN),
        "inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        _ => None,
    }
}

fn scalar_from_json(value: &JsonValue) -> Result<f64, GridError> {
    let parsed = match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => non_finite_from_str(s),
        JsonValue::Array(_) => {
            return Err(GridError::Ragged {
                path: String::new(),
            });
        }
        _ => None,
    };
    parsed.ok_or(GridError::NotANumber {
        path: String::new(),
    })
}

/// Serde adapter for a list of finite grids stored as nested arrays.
pub(crate) mod nested {
    use ndarray::ArrayD;
    use serde::de::Error as _;
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_json::Value as JsonValue;

    use super::GridError;

    pub fn serialize<S: Serializer>(grids: &[ArrayD<f64>], s: S) -> Result<S::Ok, S::Error> {
        for (i, grid) in grids.iter().enumerate() {
            if grid.iter().any(|v| !v.is_finite()) {
                let err = GridError::NonFinite {
                    path: String::new(),
                };
                return Err(S::Error::custom(err.at(i)));
            }
        }
        s.collect_seq(grids.iter().map(|g| super::to_json(g.view())))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<ArrayD<f64>>, D::Error> {
        let raw = Vec::<JsonValue>::deserialize(d)?;
        raw.iter()
            .enumerate()
            .map(|(i, v)| super::finite_from_json(v).map_err(|e| D::Error::custom(e.at(i))))
            .collect()
    }
}
