//! The `Pipeline` facade: one handle over scoring, assembly, prediction,
//! backtesting, and attribution for a single configuration.
//!
//! Models are loaded once at construction and shared read-only. Batch work
//! runs on the pipeline's own rayon pool, sized by `runtime.workers`.

use std::sync::Arc;

use senticast_core::attribution::{AttributionResult, Attributor, Baseline};
use senticast_core::backtest::{BacktestResult, Backtester, ThresholdPolicy};
use senticast_core::domain::{BarSeries, PredictionRecord, Sentiment, SentimentScore, TextDocument};
use senticast_core::features::{FeatureAssembler, FeatureSchema, FeatureVector};
use senticast_core::model::{sliding_windows, ForecastModel, ModelArtifact, RidgeEnsemble};
use senticast_core::sentiment::{BagOfWordsModel, SentimentScorer};
use senticast_core::ForecastError;

use crate::config::{BaselineKind, RunnerConfig, SentimentSection};
use crate::training::{fit_model, TrainingReport};
use crate::RunError;

pub struct Pipeline {
    config: RunnerConfig,
    scorer: SentimentScorer,
    assembler: FeatureAssembler,
    backtester: Backtester,
    model: Option<Arc<dyn ForecastModel>>,
    pool: rayon::ThreadPool,
}

impl Pipeline {
    /// Build from configuration, loading the primary sentiment model and the
    /// forecast artifact when configured.
    ///
    /// A primary sentiment model that fails to load is logged and scoring
    /// continues on the fallback. A forecast artifact that fails to load, or
    /// was built for another schema, is an error.
    pub fn from_config(config: RunnerConfig) -> Result<Self, RunError> {
        config.validate()?;
        let scorer = build_scorer(&config.sentiment);
        let model = match &config.model.artifact {
            Some(path) => {
                let model = ModelArtifact::load(path, &config.features.schema)?;
                Some(Arc::new(model) as Arc<dyn ForecastModel>)
            }
            None => None,
        };
        Self::new(config, scorer, model)
    }

    pub fn new(
        config: RunnerConfig,
        scorer: SentimentScorer,
        model: Option<Arc<dyn ForecastModel>>,
    ) -> Result<Self, RunError> {
        let assembler = FeatureAssembler::new(config.features.schema.clone())?;
        let backtester = Backtester::new(config.backtest.engine.clone())?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.runtime.workers)
            .thread_name(|i| format!("senticast-worker-{i}"))
            .build()?;
        tracing::debug!(
            workers = pool.current_num_threads(),
            primary = scorer.primary_version().unwrap_or("none"),
            model = %model.as_ref().map(|m| m.version().to_string()).unwrap_or_default(),
            "pipeline ready"
        );
        Ok(Self {
            config,
            scorer,
            assembler,
            backtester,
            model,
            pool,
        })
    }

    /// Replace the forecast model.
    pub fn with_model(mut self, model: Arc<dyn ForecastModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn scorer(&self) -> &SentimentScorer {
        &self.scorer
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.assembler.schema()
    }

    pub fn lookback(&self) -> usize {
        self.config.lookback()
    }

    pub fn model(&self) -> Result<&dyn ForecastModel, ForecastError> {
        self.model
            .as_deref()
            .ok_or_else(|| ForecastError::unavailable("no forecast model loaded"))
    }

    /// Run `op` on the pipeline's worker pool.
    pub fn install<R, OP>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        self.pool.install(op)
    }

    // ─── Sentiment ───────────────────────────────────────────────────

    pub fn score(&self, document: &TextDocument) -> SentimentScore {
        self.scorer.score(document)
    }

    pub fn score_text(&self, text: &str) -> Sentiment {
        self.scorer.score_text(text)
    }

    pub fn score_many(&self, documents: &[TextDocument]) -> Vec<SentimentScore> {
        self.install(|| self.scorer.score_many(documents))
    }

    // ─── Features ────────────────────────────────────────────────────

    /// Assemble with the configured lookback.
    pub fn assemble(
        &self,
        bars: &BarSeries,
        scores: &[SentimentScore],
    ) -> Result<Vec<FeatureVector>, ForecastError> {
        self.assembler.assemble(bars, scores, self.lookback())
    }

    pub fn assemble_with_lookback(
        &self,
        bars: &BarSeries,
        scores: &[SentimentScore],
        lookback: usize,
    ) -> Result<Vec<FeatureVector>, ForecastError> {
        self.assembler.assemble(bars, scores, lookback)
    }

    // ─── Forecast ────────────────────────────────────────────────────

    pub fn predict(&self, window: &[FeatureVector]) -> Result<PredictionRecord, ForecastError> {
        self.model()?.predict(window)
    }

    pub fn predict_many(
        &self,
        windows: &[&[FeatureVector]],
    ) -> Result<Vec<PredictionRecord>, ForecastError> {
        let model = self.model()?;
        self.install(|| model.predict_many(windows))
    }

    /// One prediction per full window over `vectors`, in time order.
    pub fn predict_series(
        &self,
        vectors: &[FeatureVector],
    ) -> Result<Vec<PredictionRecord>, ForecastError> {
        let model = self.model()?;
        let windows = sliding_windows(vectors, model.window_len());
        self.install(|| model.predict_many(&windows))
    }

    /// Fit a ridge ensemble with the configured fit settings. The pipeline's
    /// own model is left untouched.
    pub fn train(
        &self,
        bars: &BarSeries,
        vectors: &[FeatureVector],
    ) -> Result<(RidgeEnsemble, TrainingReport), ForecastError> {
        self.install(|| fit_model(bars, vectors, self.schema(), &self.config.model.fit))
    }

    // ─── Backtest ────────────────────────────────────────────────────

    /// Backtest the loaded model; `None` uses the configured policy.
    pub fn run_backtest(
        &self,
        bars: &BarSeries,
        features: &[FeatureVector],
        policy: Option<&dyn ThresholdPolicy>,
    ) -> Result<BacktestResult, ForecastError> {
        self.backtest_with(self.model()?, bars, features, policy)
    }

    pub fn backtest_with(
        &self,
        model: &dyn ForecastModel,
        bars: &BarSeries,
        features: &[FeatureVector],
        policy: Option<&dyn ThresholdPolicy>,
    ) -> Result<BacktestResult, ForecastError> {
        let policy = policy.unwrap_or(&self.config.backtest.policy);
        self.backtester.run(bars, features, model, policy)
    }

    // ─── Attribution ─────────────────────────────────────────────────

    /// Attributor for the configured baseline; `history` feeds the mean baseline.
    pub fn attributor(&self, history: &[FeatureVector]) -> Result<Attributor, ForecastError> {
        let baseline = match self.config.attribution.baseline {
            BaselineKind::Zeros => Baseline::Zeros,
            BaselineKind::Mean => Baseline::mean_of(history)?,
        };
        Ok(Attributor::new(baseline))
    }

    /// Explain the prediction for the window ending at its last vector.
    pub fn explain(
        &self,
        window: &[FeatureVector],
        history: &[FeatureVector],
    ) -> Result<AttributionResult, ForecastError> {
        let model = self.model()?;
        let attributor = self.attributor(history)?;
        self.install(|| attributor.explain(window, model))
    }
}

fn build_scorer(section: &SentimentSection) -> SentimentScorer {
    let Some(path) = &section.primary_model else {
        return SentimentScorer::fallback_only(section.scorer.clone());
    };
    match BagOfWordsModel::load(path) {
        Ok(model) => SentimentScorer::with_primary(Arc::new(model), section.scorer.clone()),
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "primary sentiment model unavailable, scoring with fallback only"
            );
            SentimentScorer::fallback_only(section.scorer.clone())
        }
    }
}
