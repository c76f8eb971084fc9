//! Tagged codec: values, nesting, failures and file helpers.

mod common;

use std::collections::BTreeMap;

use ndarray::{ArrayD, IxDyn, array};
use num_bigint::BigInt;
use rstest::rstest;

use ebm_persist::codec::{self, ExplanationRecord, Table, TypeTag, Value};
use ebm_persist::persist::capture;
use ebm_persist::{DecodeError, JsonWriteOptions, LoadError, ReadOptions, testing};

fn roundtrip(value: &Value) -> Value {
    common::init_tracing();
    let text = codec::encode(value).unwrap();
    codec::decode(&text).unwrap_or_else(|e| panic!("Failed to decode {text}: {e}"))
}

#[rstest]
#[case::null(Value::Null)]
#[case::bool(Value::Bool(true))]
#[case::small_int(Value::from(-42i64))]
#[case::int32(Value::Int32(i32::MIN))]
#[case::int64(Value::Int64(i64::MAX))]
#[case::float(Value::Float(0.1))]
#[case::infinity(Value::Float(f64::NEG_INFINITY))]
#[case::string(Value::from("caf\u{e9}"))]
#[case::seq(Value::Seq(vec![Value::Int32(1), Value::Str("two".into()), Value::Null]))]
fn scalars_roundtrip(#[case] value: Value) {
    assert_eq!(roundtrip(&value), value);
}

#[test]
fn nan_float_roundtrips_as_nan() {
    match roundtrip(&Value::Float(f64::NAN)) {
        Value::Float(v) => assert!(v.is_nan()),
        other => panic!("unexpected value: {other:?}"),
    }
}

#[test]
fn big_integers_beyond_u64() {
    let huge: BigInt = "-123456789012345678901234567890".parse().unwrap();
    let value = Value::Int(huge);
    assert_eq!(value.tag(), Some(TypeTag::BigInt));
    assert_eq!(roundtrip(&value), value);

    let above_u64 = BigInt::from(u64::MAX) + BigInt::from(1);
    assert_eq!(roundtrip(&Value::Int(above_u64.clone())), Value::Int(above_u64));
}

#[test]
fn int_widths_stay_distinct() {
    let seq = Value::Seq(vec![Value::Int32(7), Value::Int64(7), Value::from(7i64)]);
    assert_eq!(roundtrip(&seq), seq);
}

#[test]
fn maps_with_reserved_keys() {
    let mut map = BTreeMap::new();
    map.insert("_type".to_string(), Value::from("not a tag"));
    map.insert("value".to_string(), Value::from(1i64));
    let value = Value::Map(map);
    assert_eq!(value.tag(), Some(TypeTag::Map));

    let text = codec::encode_with(&value, &JsonWriteOptions::compact()).unwrap();
    assert!(text.starts_with("{\"_type\":\"map\""));
    assert_eq!(codec::decode(&text).unwrap(), value);
}

#[test]
fn plain_maps_stay_plain() {
    let value = Value::Map(BTreeMap::from([("a".to_string(), Value::Float(1.5))]));
    let text = codec::encode_with(&value, &JsonWriteOptions::compact()).unwrap();
    assert_eq!(text, "{\"a\":1.5}");
    assert_eq!(codec::decode(&text).unwrap(), value);
}

#[test]
fn arrays_keep_shape_and_non_finite_cells() {
    let grid = array![[1.0, f64::INFINITY], [-0.5, f64::NEG_INFINITY]].into_dyn();
    let value = Value::Array(grid.clone());
    assert_eq!(roundtrip(&value), value);

    let empty = Value::Array(ArrayD::zeros(IxDyn(&[0])));
    assert_eq!(roundtrip(&empty), empty);
}

#[test]
fn tables_roundtrip() {
    let table = Table::from_rows(
        vec!["name".into(), "count".into()],
        vec![
            vec![Value::from("a"), Value::from(1i64)],
            vec![Value::from("b"), Value::Null],
        ],
    )
    .unwrap();
    let value = Value::Table(table.clone());
    let Value::Table(back) = roundtrip(&value) else {
        panic!("expected a table");
    };
    assert_eq!(back, table);
    assert_eq!(back.column("name").unwrap().count(), 2);
}

#[test]
fn explanations_roundtrip() {
    let model = testing::binary_model();
    let record = ExplanationRecord::new("global")
        .with_name("Global Term/Feature Importances")
        .with_features(
            vec!["age".into(), "color".into()],
            vec!["continuous".into(), "categorical".into()],
        )
        .with_internal(Value::Map(BTreeMap::from([(
            "scores".to_string(),
            Value::Array(array![0.5, 0.25].into_dyn()),
        )])))
        .with_selector(model.global_selector());
    let value = Value::from(record);
    assert_eq!(roundtrip(&value), value);
}

#[test]
fn model_state_fragments_roundtrip() {
    let dto = capture(&testing::multiclass_model()).unwrap();
    let value = Value::Seq(vec![Value::from("header"), Value::from(dto.clone())]);
    let back = roundtrip(&value);
    let Value::Seq(items) = back else {
        panic!("expected a sequence");
    };
    assert_eq!(items[1].as_model_state(), Some(&dto));
}

#[test]
fn invalid_model_state_fragment() {
    let text = r#"{"_type": "model_state", "value": {"version": [1, 0, 0], "learner": {}}}"#;
    match codec::decode(text).unwrap_err() {
        DecodeError::ModelState { path, source } => {
            assert_eq!(path, "$");
            assert!(matches!(*source, LoadError::Validation(_)));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn legacy_fragment_respects_read_options() {
    let state = common::fixture_json(common::RECORDS);
    let text = serde_json::json!({"_type": "model_state", "value": state}).to_string();
    assert!(codec::decode(&text).is_ok());

    let strict = ReadOptions::builder().allow_legacy(false).build();
    assert!(matches!(
        codec::decode_with(&text, &strict),
        Err(DecodeError::ModelState { .. })
    ));
}

#[rstest]
#[case::unknown_tag(r#"{"_type": "pickle", "value": 1}"#)]
#[case::extra_key(r#"{"_type": "int32", "value": 1, "extra": 2}"#)]
#[case::ragged(r#"{"_type": "ndarray", "value": [[1.0], [2.0, 3.0]]}"#)]
#[case::bad_bigint(r#"{"_type": "bigint", "value": "12x"}"#)]
#[case::malformed("{\"a\": [1, 2")]
fn decode_failures(#[case] text: &str) {
    assert!(codec::decode(text).is_err());
}

#[test]
fn unknown_tag_reports_path() {
    let text = r#"{"items": [1, {"_type": "pickle", "value": null}]}"#;
    match codec::decode(text).unwrap_err() {
        DecodeError::UnknownTag { tag, path } => {
            assert_eq!(tag, "pickle");
            assert_eq!(path, "$.items[1]");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn file_helpers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("value.json");
    let value = Value::Seq(vec![Value::Int64(1), Value::Float(f64::NAN)]);
    codec::to_file(&path, &value, &JsonWriteOptions::pretty()).unwrap();

    let Value::Seq(items) = codec::from_file(&path).unwrap() else {
        panic!("expected a sequence");
    };
    assert_eq!(items[0], Value::Int64(1));
    assert!(items[1].as_f64().unwrap().is_nan());

    std::fs::remove_file(&path).unwrap();
    assert!(matches!(codec::from_file(&path), Err(DecodeError::Io(_))));
}
