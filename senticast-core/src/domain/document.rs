//! Raw text input to the sentiment scorer.

use super::ids::ContentKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A timestamped piece of text (headline, post, filing excerpt).
///
/// Associated with at most one bar: the nearest bar at or after its timestamp
/// sees it through the nearest-preceding join in feature assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextDocument {
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub text: String,
}

impl TextDocument {
    pub fn new(timestamp: DateTime<Utc>, source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            timestamp,
            source: source.into(),
            text: text.into(),
        }
    }

    pub fn content_key(&self) -> ContentKey {
        ContentKey::from_bytes(self.text.as_bytes())
    }

    /// Empty or whitespace-only text.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}
