//! Stable structural hashing for persisted records.
//!
//! A record is serialized to a JSON tree and the tree is fed to SHA-256 in a
//! canonical form: object keys in sorted order, every node prefixed by its
//! kind and length, `-0.0` folded into `0.0`. The first eight digest bytes
//! form the hash, which is therefore identical across runs, platforms and
//! process restarts.

use serde::Serialize;
use serde_json::Value as JsonValue;
use sha2::{Digest, Sha256};

/// Hash that depends only on a record's structure and content.
pub trait StableHash {
    fn stable_hash(&self) -> u64;
}

/// Digest a serializable value.
///
/// Non-finite floats serialize as `null` and digest as such. Decoded and
/// captured records never hold them.
pub(crate) fn digest<T: Serialize + ?Sized>(value: &T) -> u64 {
    let tree = serde_json::to_value(value).unwrap_or(JsonValue::Null);
    let mut hasher = Sha256::new();
    feed(&mut hasher, &tree);
    let bytes = hasher.finalize();
    let mut head = [0u8; 8];
    head.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(head)
}

fn feed(hasher: &mut Sha256, value: &JsonValue) {
    match value {
        JsonValue::Null => hasher.update(b"z"),
        JsonValue::Bool(b) => hasher.update(if *b { b"t" } else { b"f" }),
        JsonValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                hasher.update(b"i");
                hasher.update(i.to_le_bytes());
            } else if let Some(u) = n.as_u64() {
                hasher.update(b"u");
                hasher.update(u.to_le_bytes());
            } else {
                let f = n.as_f64().unwrap_or_default();
                let f = if f == 0.0 { 0.0 } else { f };
                hasher.update(b"d");
                hasher.update(f.to_bits().to_le_bytes());
            }
        }
        JsonValue::String(s) => {
            hasher.update(b"s");
            hasher.update((s.len() as u64).to_le_bytes());
            hasher.update(s.as_bytes());
        }
        JsonValue::Array(items) => {
            hasher.update(b"a");
            hasher.update((items.len() as u64).to_le_bytes());
            for item in items {
                feed(hasher, item);
            }
        }
        JsonValue::Object(obj) => {
            let mut keys: Vec<&String> = obj.keys().collect();
            keys.sort();
            hasher.update(b"o");
            hasher.update((keys.len() as u64).to_le_bytes());
            for key in keys {
                hasher.update((key.len() as u64).to_le_bytes());
                hasher.update(key.as_bytes());
                if let Some(v) = obj.get(key) {
                    feed(hasher, v);
                }
            }
        }
    }
}

/// Implement [`StableHash`], [`Hash`](std::hash::Hash) and [`Eq`] for record
/// types through their canonical digest.
///
/// Records hold only finite floats, so the derived `PartialEq` is total.
macro_rules! impl_stable_hash {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::persist::hash::StableHash for $ty {
            fn stable_hash(&self) -> u64 {
                $crate::persist::hash::digest(self)
            }
        }

        impl ::std::hash::Hash for $ty {
            fn hash<H: ::std::hash::Hasher>(&self, state: &mut H) {
                state.write_u64($crate::persist::hash::StableHash::stable_hash(self));
            }
        }

        impl ::std::cmp::Eq for $ty {}
    )+};
}

pub(crate) use impl_stable_hash;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_matter() {
        let a = json!({"a": 1, "b": [1.5, "x"]});
        let b = json!({"b": [1.5, "x"], "a": 1});
        assert_eq!(digest(&a), digest(&b));
    }

    #[test]
    fn negative_zero_is_folded() {
        assert_eq!(digest(&json!([0.0])), digest(&json!([-0.0])));
        assert_ne!(digest(&json!([0.0])), digest(&json!([1.0])));
    }

    #[test]
    fn kinds_are_distinguished() {
        assert_ne!(digest(&json!("1")), digest(&json!(1)));
        assert_ne!(digest(&json!(["ab"])), digest(&json!(["a", "b"])));
        assert_ne!(digest(&json!(null)), digest(&json!([])));
    }

    #[test]
    fn digest_is_deterministic() {
        let value = json!({"k": [1, 2.5], "n": null});
        assert_eq!(digest(&value), digest(&value.clone()));
    }
}
