use serde::{Deserialize, Serialize};
use std::fmt;

/// BLAKE3 hash of a document's raw text. Immutable input key for the score cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContentKey(pub String);

impl ContentKey {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }
}

impl fmt::Display for ContentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Forecast model version id: `{name}-{first 12 hex of BLAKE3(weights)}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelVersion(pub String);

impl ModelVersion {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive a version id from a model name and the bytes of its weights.
    pub fn derive(name: &str, weight_bytes: &[u8]) -> Self {
        let hex = blake3::hash(weight_bytes).to_hex();
        Self(format!("{name}-{}", &hex.as_str()[..12]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deterministic dataset hash (content hash of bars and documents)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    pub fn from_hash(hash: &str) -> Self {
        Self(hash.to_string())
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_key_is_deterministic() {
        let a = ContentKey::from_bytes(b"stocks rally");
        let b = ContentKey::from_bytes(b"stocks rally");
        let c = ContentKey::from_bytes(b"stocks fall");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.0.len(), 64);
    }

    #[test]
    fn model_version_format() {
        let v = ModelVersion::derive("ridge", b"weights");
        let (name, hex) = v.as_str().split_once('-').unwrap();
        assert_eq!(name, "ridge");
        assert_eq!(hex.len(), 12);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(v, ModelVersion::derive("ridge", b"weights"));
        assert_ne!(v, ModelVersion::derive("ridge", b"other"));
    }
}
