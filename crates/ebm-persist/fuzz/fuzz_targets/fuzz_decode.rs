//! Fuzz target for the tagged value decoder.
//!
//! Arbitrary text must either decode or fail with a `DecodeError`; any
//! successfully decoded value must encode again.
//!
//! Run with:
//! ```sh
//! cargo +nightly fuzz run fuzz_decode
//! ```

#![no_main]

use libfuzzer_sys::fuzz_target;

use ebm_persist::JsonWriteOptions;
use ebm_persist::codec;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(value) = codec::decode(text) {
        let encoded = codec::encode_with(&value, &JsonWriteOptions::compact());
        assert!(encoded.is_ok(), "decoded value failed to encode: {encoded:?}");
    }
});
