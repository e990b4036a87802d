//! Sentiment scores and their provenance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which scorer produced a sentiment value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Primary,
    Fallback,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::Primary => write!(f, "primary"),
            Provenance::Fallback => write!(f, "fallback"),
        }
    }
}

/// A sentiment value in [-1, 1], tagged with the scorer that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provenance", content = "value", rename_all = "snake_case")]
pub enum Sentiment {
    Primary(f64),
    Fallback(f64),
}

impl Sentiment {
    /// Neutral score used for blank text and for bars with no preceding document.
    pub const NEUTRAL: Sentiment = Sentiment::Fallback(0.0);

    pub fn value(&self) -> f64 {
        match *self {
            Sentiment::Primary(v) | Sentiment::Fallback(v) => v,
        }
    }

    pub fn provenance(&self) -> Provenance {
        match self {
            Sentiment::Primary(_) => Provenance::Primary,
            Sentiment::Fallback(_) => Provenance::Fallback,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Sentiment::Fallback(_))
    }
}

/// Immutable sentiment score for one document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentScore {
    pub timestamp: DateTime<Utc>,
    pub sentiment: Sentiment,
}

impl SentimentScore {
    pub fn new(timestamp: DateTime<Utc>, sentiment: Sentiment) -> Self {
        Self {
            timestamp,
            sentiment,
        }
    }

    pub fn value(&self) -> f64 {
        self.sentiment.value()
    }

    pub fn provenance(&self) -> Provenance {
        self.sentiment.provenance()
    }
}
