//! Senticast Runner: orchestration on top of `senticast-core`.
//!
//! This crate provides:
//! - TOML run configuration and content-addressed run ids
//! - CSV bar and JSON Lines document loading, with a synthetic fallback
//! - The `Pipeline` facade over scoring, assembly, prediction, backtest, and attribution
//! - Offline training of the ridge ensemble
//! - Parallel policy sweeps and walk-forward evaluation
//! - An on-disk result cache and report export

pub mod cache;
pub mod config;
pub mod data_loader;
pub mod export;
pub mod pipeline;
pub mod sweep;
pub mod training;
pub mod walk_forward;

use thiserror::Error;

pub use cache::ResultCache;
pub use config::{BaselineKind, ConfigError, RunId, RunnerConfig};
pub use data_loader::{Dataset, LoadError};
pub use export::{save_report, RunReport, REPORT_SCHEMA_VERSION};
pub use pipeline::Pipeline;
pub use sweep::{PolicyGrid, PolicySweep, SweepEntry, SweepResults};
pub use training::{fit_model, train_and_save, TrainingReport};
pub use walk_forward::{
    create_folds, run_walk_forward, DegradationFlag, FoldResult, FoldSpec, WalkForwardConfig,
    WalkForwardError, WalkForwardResult,
};

use senticast_core::ForecastError;

/// Errors from runner orchestration.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("cannot build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}
