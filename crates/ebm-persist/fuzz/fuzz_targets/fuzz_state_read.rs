//! Fuzz target for the model-state read pipeline.
//!
//! Run with:
//! ```sh
//! cargo +nightly fuzz run fuzz_state_read
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;

use ebm_persist::{EbmModel, ReadOptions};

fuzz_target!(|data: &[u8]| {
    // Decode, validate, convert and rebuild; every stage may fail but none
    // may panic.
    let _ = EbmModel::read_json_from(data, &ReadOptions::default());
});
