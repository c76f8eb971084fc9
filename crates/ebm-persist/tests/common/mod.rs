//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Once;

use serde_json::Value as JsonValue;

static TRACING: Once = Once::new();

/// Install a test-writer subscriber once per test binary.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/test-cases/persist")
}

pub fn fixture_path(name: &str) -> PathBuf {
    test_cases_dir().join(name)
}

pub fn fixture_text(name: &str) -> String {
    let path = fixture_path(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {e}", path.display()))
}

pub fn fixture_json(name: &str) -> JsonValue {
    serde_json::from_str(&fixture_text(name))
        .unwrap_or_else(|e| panic!("Failed to parse {name}: {e}"))
}

pub const FLAT: &str = "flat_v0_0_1.json";
pub const RECORDS: &str = "records_v0_1_0.json";
pub const CURRENT: &str = "current_v1_0_0.json";
