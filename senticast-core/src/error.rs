//! Error taxonomy for the forecasting engine.
//!
//! Sentiment failures never surface here: they are recovered by the lexicon
//! fallback and show up only as provenance on the score. Everything that
//! touches forecasting, backtesting, or attribution fails with a typed
//! `ForecastError` and produces no partial result.

use crate::domain::BarError;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("model unavailable: {reason}")]
    ModelUnavailable { reason: String },

    #[error("invalid input shape for {what}: expected {expected}, got {actual}")]
    InvalidInputShape {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("insufficient data for {what}: need at least {required}, have {available}")]
    InsufficientData {
        what: &'static str,
        required: usize,
        available: usize,
    },

    #[error("schema mismatch: expected {expected}, found {found}")]
    SchemaMismatch { expected: String, found: String },

    #[error("invalid feature schema: {0}")]
    InvalidSchema(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("threshold policy produced a non-finite exposure ({0})")]
    InvalidPolicyOutput(f64),

    #[error("invalid bar series: {0}")]
    InvalidBars(#[from] BarError),

    #[error("feature vector at {timestamp} is not aligned with the bar series")]
    MisalignedFeatures { timestamp: DateTime<Utc> },

    #[error("non-finite value in {what}")]
    NonFinite { what: &'static str },

    #[error("failed to write artifact {path}: {source}")]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ForecastError {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::ModelUnavailable {
            reason: reason.into(),
        }
    }
}
