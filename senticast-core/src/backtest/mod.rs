//! Backtesting: replay features through a model, turn predictions into
//! positions, and summarise the resulting equity curve.

pub mod engine;
pub mod metrics;
pub mod policy;
pub mod result;

pub use engine::{BacktestConfig, Backtester, EQUITY_BASE};
pub use metrics::BacktestSummary;
pub use policy::{PolicyConfig, ThresholdPolicy};
pub use result::{BacktestResult, EquityPoint};
