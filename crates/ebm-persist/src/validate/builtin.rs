//! Schema documents shipped with the crate, parsed once on first use.

use std::sync::OnceLock;

use super::{SchemaDocument, SchemaError};
use crate::persist::Layout;

type Cached = OnceLock<Result<SchemaDocument, SchemaError>>;

static ENVELOPE: Cached = OnceLock::new();
static FLAT: Cached = OnceLock::new();
static RECORDS: Cached = OnceLock::new();
static CURRENT: Cached = OnceLock::new();

fn cached(cell: &'static Cached, text: &'static str) -> Result<&'static SchemaDocument, SchemaError> {
    cell.get_or_init(|| text.parse()).as_ref().map_err(Clone::clone)
}

/// Version-independent document: `version`, `learner` and
/// `learner.feature_names`.
pub fn envelope() -> Result<&'static SchemaDocument, SchemaError> {
    cached(&ENVELOPE, include_str!("../../schemas/envelope.json"))
}

/// Full document for one payload layout.
pub fn for_layout(layout: Layout) -> Result<&'static SchemaDocument, SchemaError> {
    match layout {
        Layout::Flat => cached(&FLAT, include_str!("../../schemas/v0_0.json")),
        Layout::Records => cached(&RECORDS, include_str!("../../schemas/v0_1.json")),
        Layout::Current => cached(&CURRENT, include_str!("../../schemas/v1.json")),
    }
}
