//! Schema versions and layout dispatch.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Version tag on the persisted envelope, written as `[major, minor, patch]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SchemaVersion {
    /// Version written by [`capture`](crate::persist::capture).
    pub const CURRENT: Self = Self::new(1, 0, 0);

    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Field layout used by payloads of this version, if supported.
    pub fn layout(self) -> Option<Layout> {
        match (self.major, self.minor) {
            (0, 0) => Some(Layout::Flat),
            (0, 1) => Some(Layout::Records),
            (1, _) => Some(Layout::Current),
            _ => None,
        }
    }

    /// Returns true for pre-1.0 versions.
    pub fn is_legacy(self) -> bool {
        self.major == 0
    }
}

impl Default for SchemaVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl From<[u32; 3]> for SchemaVersion {
    fn from([major, minor, patch]: [u32; 3]) -> Self {
        Self::new(major, minor, patch)
    }
}

impl Serialize for SchemaVersion {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        [self.major, self.minor, self.patch].serialize(s)
    }
}

impl<'de> Deserialize<'de> for SchemaVersion {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        <[u32; 3]>::deserialize(d).map(Self::from)
    }
}

/// Field layouts observed over the schema's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Layout {
    /// `0.0.x`: feature names and types only.
    Flat,
    /// `0.1.x`: per-feature records are required and the interaction
    /// specification lives inside `feature_groups`.
    Records,
    /// `1.x`: per-feature records are optional and the interaction
    /// specification lives beside `feature_groups`.
    Current,
}

impl Layout {
    pub fn name(self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Records => "records",
            Self::Current => "current",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case([0, 0, 1], Some(Layout::Flat))]
    #[case([0, 0, 7], Some(Layout::Flat))]
    #[case([0, 1, 0], Some(Layout::Records))]
    #[case([0, 2, 0], None)]
    #[case([1, 0, 0], Some(Layout::Current))]
    #[case([1, 4, 2], Some(Layout::Current))]
    #[case([2, 0, 0], None)]
    fn layout_dispatch(#[case] version: [u32; 3], #[case] expected: Option<Layout>) {
        assert_eq!(SchemaVersion::from(version).layout(), expected);
    }

    #[test]
    fn serializes_as_triple() {
        let v = SchemaVersion::new(1, 2, 3);
        assert_eq!(serde_json::to_string(&v).unwrap(), "[1,2,3]");
        assert_eq!(serde_json::from_str::<SchemaVersion>("[1,2,3]").unwrap(), v);
        assert!(serde_json::from_str::<SchemaVersion>("[1,2]").is_err());
        assert_eq!(v.to_string(), "1.2.3");
    }
}
