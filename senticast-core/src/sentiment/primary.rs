//! Primary sentiment model: trait seam plus the shipped bag-of-words model.

use super::tokenize;
use crate::error::ForecastError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Why the primary model did not produce a score for a call.
///
/// These never escape the scorer; they decide that the fallback is used and
/// are logged.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SentimentError {
    #[error("primary model not loaded")]
    NotLoaded,
    #[error("primary model timed out after {0} ms")]
    Timeout(u64),
    #[error("scorer is in offline mode")]
    Offline,
    #[error("circuit breaker open ({remaining_ms} ms remaining)")]
    CircuitOpen { remaining_ms: u64 },
    #[error("all {limit} primary workers busy")]
    Saturated { limit: usize },
    #[error("primary inference failed: {0}")]
    Inference(String),
}

impl SentimentError {
    /// Failures that count against the circuit breaker.
    pub fn is_call_failure(&self) -> bool {
        matches!(self, SentimentError::Timeout(_) | SentimentError::Inference(_))
    }
}

/// A loaded statistical sentiment model.
///
/// Implementations are read-only after construction and shared via `Arc`.
pub trait PrimarySentimentModel: Send + Sync {
    fn version(&self) -> &str;

    /// Score one non-blank text. Values outside [-1, 1] are clamped by the caller.
    fn infer(&self, text: &str) -> Result<f64, SentimentError>;
}

/// Logistic bag-of-words classifier: `tanh(bias + sum of token weights)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BagOfWordsModel {
    pub version: String,
    pub bias: f64,
    pub vocabulary: HashMap<String, f64>,
}

impl BagOfWordsModel {
    pub fn new(version: impl Into<String>, bias: f64, vocabulary: HashMap<String, f64>) -> Self {
        Self {
            version: version.into(),
            bias,
            vocabulary,
        }
    }

    /// Parse a JSON artifact. Non-finite weights make the artifact unusable.
    pub fn from_json(json: &str) -> Result<Self, ForecastError> {
        let model: BagOfWordsModel = serde_json::from_str(json)
            .map_err(|e| ForecastError::unavailable(format!("corrupt sentiment artifact: {e}")))?;
        if !model.bias.is_finite() || model.vocabulary.values().any(|w| !w.is_finite()) {
            return Err(ForecastError::unavailable(
                "sentiment artifact contains non-finite weights",
            ));
        }
        Ok(model)
    }

    /// One-time load from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ForecastError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            ForecastError::unavailable(format!(
                "cannot read sentiment artifact {}: {e}",
                path.display()
            ))
        })?;
        let model = Self::from_json(&json)?;
        tracing::info!(
            path = %path.display(),
            version = %model.version,
            vocabulary = model.vocabulary.len(),
            "loaded primary sentiment model"
        );
        Ok(model)
    }
}

impl PrimarySentimentModel for BagOfWordsModel {
    fn version(&self) -> &str {
        &self.version
    }

    fn infer(&self, text: &str) -> Result<f64, SentimentError> {
        let logit = tokenize(text)
            .iter()
            .filter_map(|t| self.vocabulary.get(t))
            .fold(self.bias, |acc, w| acc + w);
        let score = logit.tanh();
        if score.is_finite() {
            Ok(score)
        } else {
            Err(SentimentError::Inference(format!("non-finite logit {logit}")))
        }
    }
}
