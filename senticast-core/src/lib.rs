//! Senticast Core: sentiment-fused return forecasting engine.
//!
//! This crate contains the engine:
//! - Domain types (bars, documents, sentiment scores, predictions, positions)
//! - Sentiment scoring with a primary model and a deterministic lexicon fallback
//! - Feature assembly fusing price indicators with joined sentiment
//! - The forecast model contract, the ridge ensemble, and its artifact
//! - The backtest fold and its performance metrics
//! - Exact Shapley attribution of single predictions

pub mod attribution;
pub mod backtest;
pub mod domain;
pub mod error;
pub mod features;
pub mod model;
pub mod sentiment;

pub use error::ForecastError;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: everything shared across worker threads is Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::BarSeries>();
        require_sync::<domain::BarSeries>();
        require_send::<domain::TextDocument>();
        require_sync::<domain::TextDocument>();
        require_send::<domain::SentimentScore>();
        require_sync::<domain::SentimentScore>();
        require_send::<domain::PredictionRecord>();
        require_sync::<domain::PredictionRecord>();

        // Shared handles
        require_send::<sentiment::SentimentScorer>();
        require_sync::<sentiment::SentimentScorer>();
        require_send::<features::FeatureAssembler>();
        require_sync::<features::FeatureAssembler>();
        require_send::<model::RidgeEnsemble>();
        require_sync::<model::RidgeEnsemble>();
        require_send::<backtest::Backtester>();
        require_sync::<backtest::Backtester>();
        require_send::<attribution::Attributor>();
        require_sync::<attribution::Attributor>();

        // Results
        require_send::<backtest::BacktestResult>();
        require_sync::<backtest::BacktestResult>();
        require_send::<attribution::AttributionResult>();
        require_sync::<attribution::AttributionResult>();
        require_send::<ForecastError>();
        require_sync::<ForecastError>();
    }

    /// Architecture contract: ForecastModel is object safe, so loaded models
    /// can be shared as `Arc<dyn ForecastModel>`.
    #[test]
    fn forecast_model_is_object_safe() {
        fn _check(model: std::sync::Arc<dyn model::ForecastModel>) -> usize {
            model.window_len()
        }
    }

    /// Architecture contract: the backtester takes the model by shared
    /// reference and cannot mutate it between steps.
    #[test]
    fn backtester_borrows_model_immutably() {
        fn _check(
            bt: &backtest::Backtester,
            bars: &domain::BarSeries,
            features: &[features::FeatureVector],
            model: &dyn model::ForecastModel,
            policy: &dyn backtest::ThresholdPolicy,
        ) -> Result<backtest::BacktestResult, ForecastError> {
            bt.run(bars, features, model, policy)
        }
    }
}
