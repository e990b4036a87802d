//! TOML run configuration.
//!
//! Every section and field has a default, so an empty file is a valid
//! configuration:
//!
//! ```toml
//! [features]
//! return_windows = [1, 5, 10]
//! volatility_window = 10
//! rsi_period = 14
//! lookback = 20
//!
//! [sentiment]
//! primary_model = "models/sentiment.json"
//! primary_timeout_ms = 2000
//! primary_workers = 4
//! cache_max_entries = 100000
//!
//! [model]
//! artifact = "models/ridge.json"
//! alpha = 1.0
//! members = 5
//! window_len = 5
//!
//! [backtest]
//! periods_per_year = 252.0
//! policy = { type = "LONG_SHORT", min_return = 0.0005 }
//!
//! [attribution]
//! baseline = "mean"
//!
//! [runtime]
//! workers = 4
//! cache_dir = ".senticast/cache"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use senticast_core::backtest::{BacktestConfig, PolicyConfig};
use senticast_core::domain::{DatasetHash, ModelVersion};
use senticast_core::features::FeatureSchema;
use senticast_core::model::FitConfig;
use senticast_core::sentiment::ScorerConfig;
use senticast_core::ForecastError;

use crate::walk_forward::WalkForwardConfig;

/// Content-addressed identifier of a run (BLAKE3 hex).
pub type RunId = String;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),

    #[error(transparent)]
    Core(#[from] ForecastError),

    #[error("cannot serialize config: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub features: FeaturesSection,
    pub sentiment: SentimentSection,
    pub model: ModelSection,
    pub backtest: BacktestSection,
    pub attribution: AttributionSection,
    pub walk_forward: WalkForwardConfig,
    pub runtime: RuntimeSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesSection {
    #[serde(flatten)]
    pub schema: FeatureSchema,
    /// Bars skipped before the first vector; defaults to the schema's minimum.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookback: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentSection {
    /// Primary model file. Without one every score is a fallback score.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_model: Option<PathBuf>,
    #[serde(flatten)]
    pub scorer: ScorerConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSection {
    /// Trained forecast model loaded at startup.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<PathBuf>,
    #[serde(flatten)]
    pub fit: FitConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestSection {
    #[serde(flatten)]
    pub engine: BacktestConfig,
    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaselineKind {
    #[default]
    Zeros,
    /// Per-feature mean over the assembled history.
    Mean,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributionSection {
    pub baseline: BaselineKind,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    /// Worker threads for batch work; 0 lets rayon decide.
    pub workers: usize,
    /// Backtest result cache; disabled when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,
}

impl RunnerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text)?;
        tracing::debug!(path = %path.display(), "loaded runner config");
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: RunnerConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.features.schema.validate()?;
        if let Some(lookback) = self.features.lookback {
            let min = self.features.schema.min_lookback();
            if lookback < min {
                return Err(ConfigError::Invalid(format!(
                    "features.lookback = {lookback} is below the schema minimum {min}"
                )));
            }
        }
        self.model.fit.validate()?;
        self.backtest.engine.validate()?;
        self.walk_forward
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.sentiment.scorer.breaker_failure_threshold == 0 {
            return Err(ConfigError::Invalid(
                "sentiment.breaker_failure_threshold must be >= 1".into(),
            ));
        }
        if self.sentiment.scorer.primary_workers == 0 {
            return Err(ConfigError::Invalid(
                "sentiment.primary_workers must be >= 1".into(),
            ));
        }
        Ok(())
    }

    /// Lookback used for assembly.
    pub fn lookback(&self) -> usize {
        self.features
            .lookback
            .unwrap_or_else(|| self.features.schema.min_lookback())
    }

    /// Identifier for caching the backtest of this config on a dataset and model.
    pub fn run_id(
        &self,
        dataset: &DatasetHash,
        model: &ModelVersion,
    ) -> Result<RunId, ConfigError> {
        let json = serde_json::to_string(&(self, dataset, model))?;
        Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_default() {
        let config = RunnerConfig::from_toml("").unwrap();
        assert_eq!(config, RunnerConfig::default());
        assert_eq!(config.lookback(), config.features.schema.min_lookback());
    }

    #[test]
    fn sections_parse_with_flattened_fields() {
        let config = RunnerConfig::from_toml(
            r#"
            [features]
            return_windows = [1, 3]
            volatility_window = 5
            rsi_period = 0
            lookback = 12

            [sentiment]
            primary_model = "m.json"
            primary_timeout_ms = 50
            primary_workers = 2
            cache_max_entries = 500
            offline = true

            [model]
            alpha = 0.5
            members = 3
            window_len = 4

            [backtest]
            periods_per_year = 52.0
            policy = { type = "LONG_SHORT", min_return = 0.001 }

            [attribution]
            baseline = "mean"

            [runtime]
            workers = 2
            cache_dir = "cache"
            "#,
        )
        .unwrap();

        assert_eq!(config.features.schema.return_windows, vec![1, 3]);
        assert_eq!(config.features.schema.rsi_period, 0);
        assert_eq!(config.lookback(), 12);
        assert_eq!(config.sentiment.primary_model, Some(PathBuf::from("m.json")));
        assert_eq!(config.sentiment.scorer.primary_timeout_ms, 50);
        assert!(config.sentiment.scorer.offline);
        assert!(config.sentiment.scorer.cache_enabled);
        assert_eq!(config.sentiment.scorer.primary_workers, 2);
        assert_eq!(config.sentiment.scorer.cache_max_entries, 500);
        assert_eq!(config.model.fit.members, 3);
        assert_eq!(config.model.fit.window_len, 4);
        assert_eq!(config.backtest.engine.periods_per_year, 52.0);
        assert_eq!(
            config.backtest.policy,
            PolicyConfig::LongShort { min_return: 0.001 }
        );
        assert_eq!(config.attribution.baseline, BaselineKind::Mean);
        assert_eq!(config.runtime.workers, 2);
    }

    #[test]
    fn lookback_below_schema_minimum_is_rejected() {
        let err = RunnerConfig::from_toml("[features]\nlookback = 2\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn zero_primary_workers_is_rejected() {
        let err = RunnerConfig::from_toml("[sentiment]\nprimary_workers = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn bad_fit_config_is_rejected() {
        let err = RunnerConfig::from_toml("[model]\nmembers = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Core(ForecastError::InvalidConfig(_))));
    }

    #[test]
    fn unknown_policy_is_a_parse_error() {
        let err = RunnerConfig::from_toml("[backtest]\npolicy = { type = \"MARTINGALE\" }\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn toml_round_trip() {
        let mut config = RunnerConfig::default();
        config.backtest.policy = PolicyConfig::LongOnly { min_return: 0.002 };
        config.runtime.cache_dir = Some(PathBuf::from("cache"));
        let text = config.to_toml().unwrap();
        assert_eq!(RunnerConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn run_id_is_deterministic_and_sensitive() {
        let config = RunnerConfig::default();
        let data = DatasetHash::from_hash("abc");
        let model = ModelVersion::new("ridge-000000000000");

        let a = config.run_id(&data, &model).unwrap();
        assert_eq!(a, config.run_id(&data, &model).unwrap());
        assert_eq!(a.len(), 64);

        let mut other = config.clone();
        other.backtest.policy = PolicyConfig::AlwaysLong;
        assert_ne!(a, other.run_id(&data, &model).unwrap());
        assert_ne!(a, config.run_id(&DatasetHash::from_hash("abd"), &model).unwrap());
        assert_ne!(
            a,
            config
                .run_id(&data, &ModelVersion::new("ridge-111111111111"))
                .unwrap()
        );
    }
}
