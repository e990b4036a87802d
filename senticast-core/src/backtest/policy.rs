//! Threshold policies: prediction → signed exposure.
//!
//! The backtester clips whatever a policy returns into [-1, 1] and rejects
//! non-finite output.

use crate::domain::PredictionRecord;
use serde::{Deserialize, Serialize};

pub trait ThresholdPolicy: Send + Sync {
    fn exposure(&self, prediction: &PredictionRecord) -> f64;
}

impl<F> ThresholdPolicy for F
where
    F: Fn(&PredictionRecord) -> f64 + Send + Sync,
{
    fn exposure(&self, prediction: &PredictionRecord) -> f64 {
        self(prediction)
    }
}

/// Serializable built-in policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyConfig {
    /// Sign of the predicted return scaled by confidence `|mu| / (|mu| + sigma)`.
    #[default]
    ConfidenceScaled,

    /// Fully long when the prediction exceeds `min_return`, else flat.
    LongOnly {
        #[serde(default)]
        min_return: f64,
    },

    /// Long above `min_return`, short below `-min_return`, flat in between.
    LongShort {
        #[serde(default)]
        min_return: f64,
    },

    AlwaysLong,

    Flat,
}

impl PolicyConfig {
    pub fn label(&self) -> String {
        match self {
            PolicyConfig::ConfidenceScaled => "confidence_scaled".to_string(),
            PolicyConfig::LongOnly { min_return } => format!("long_only({min_return})"),
            PolicyConfig::LongShort { min_return } => format!("long_short({min_return})"),
            PolicyConfig::AlwaysLong => "always_long".to_string(),
            PolicyConfig::Flat => "flat".to_string(),
        }
    }
}

impl ThresholdPolicy for PolicyConfig {
    fn exposure(&self, prediction: &PredictionRecord) -> f64 {
        let mu = prediction.predicted_return;
        match *self {
            PolicyConfig::ConfidenceScaled => {
                if mu == 0.0 {
                    return 0.0;
                }
                let sigma = prediction.uncertainty.max(0.0);
                let confidence = mu.abs() / (mu.abs() + sigma);
                mu.signum() * confidence
            }
            PolicyConfig::LongOnly { min_return } => {
                if mu > min_return {
                    1.0
                } else {
                    0.0
                }
            }
            PolicyConfig::LongShort { min_return } => {
                let band = min_return.abs();
                if mu > band {
                    1.0
                } else if mu < -band {
                    -1.0
                } else {
                    0.0
                }
            }
            PolicyConfig::AlwaysLong => 1.0,
            PolicyConfig::Flat => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ModelVersion;
    use chrono::{DateTime, Utc};

    fn pred(mu: f64, sigma: f64) -> PredictionRecord {
        PredictionRecord {
            timestamp: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
            predicted_return: mu,
            uncertainty: sigma,
            model_version: ModelVersion::new("t"),
        }
    }

    #[test]
    fn confidence_scaled() {
        let p = PolicyConfig::ConfidenceScaled;
        assert_eq!(p.exposure(&pred(0.01, 0.0)), 1.0);
        assert_eq!(p.exposure(&pred(-0.01, 0.0)), -1.0);
        assert!((p.exposure(&pred(0.01, 0.01)) - 0.5).abs() < 1e-12);
        assert!((p.exposure(&pred(-0.01, 0.03)) + 0.25).abs() < 1e-12);
        assert_eq!(p.exposure(&pred(0.0, 0.0)), 0.0);
    }

    #[test]
    fn long_only_threshold() {
        let p = PolicyConfig::LongOnly { min_return: 0.001 };
        assert_eq!(p.exposure(&pred(0.002, 0.1)), 1.0);
        assert_eq!(p.exposure(&pred(0.001, 0.1)), 0.0);
        assert_eq!(p.exposure(&pred(-0.5, 0.1)), 0.0);
    }

    #[test]
    fn long_short_band() {
        let p = PolicyConfig::LongShort { min_return: 0.001 };
        assert_eq!(p.exposure(&pred(0.002, 0.0)), 1.0);
        assert_eq!(p.exposure(&pred(-0.002, 0.0)), -1.0);
        assert_eq!(p.exposure(&pred(0.0005, 0.0)), 0.0);
    }

    #[test]
    fn closures_are_policies() {
        let half = |p: &PredictionRecord| p.predicted_return.signum() * 0.5;
        assert_eq!(half.exposure(&pred(0.3, 0.0)), 0.5);
    }

    #[test]
    fn serde_tags() {
        let json = serde_json::to_string(&PolicyConfig::LongOnly { min_return: 0.0 }).unwrap();
        assert_eq!(json, r#"{"type":"LONG_ONLY","min_return":0.0}"#);
        let parsed: PolicyConfig = serde_json::from_str(r#"{"type":"ALWAYS_LONG"}"#).unwrap();
        assert_eq!(parsed, PolicyConfig::AlwaysLong);
        let parsed: PolicyConfig = serde_json::from_str(r#"{"type":"LONG_SHORT"}"#).unwrap();
        assert_eq!(parsed, PolicyConfig::LongShort { min_return: 0.0 });
        assert_eq!(PolicyConfig::default(), PolicyConfig::ConfidenceScaled);
    }
}
