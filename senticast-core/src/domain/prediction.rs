use super::ids::ModelVersion;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One forecast: predicted next-period return with its uncertainty.
///
/// The timestamp is that of the last feature vector in the input window, so
/// the prediction concerns the period that starts after it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub timestamp: DateTime<Utc>,
    pub predicted_return: f64,
    /// Always >= 0.
    pub uncertainty: f64,
    pub model_version: ModelVersion,
}

/// Signed exposure in [-1, 1] held from `timestamp` to the next bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub timestamp: DateTime<Utc>,
    pub exposure: f64,
}

impl Position {
    pub fn is_flat(&self) -> bool {
        self.exposure == 0.0
    }
}
