//! Policy sweeps: backtest one model under many threshold policies.
//!
//! Each policy is an independent backtest over the same features, so the
//! sweep runs them concurrently on the pipeline's pool unless told not to.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use senticast_core::backtest::{BacktestResult, PolicyConfig};
use senticast_core::domain::BarSeries;
use senticast_core::features::FeatureVector;
use senticast_core::ForecastError;

use crate::pipeline::Pipeline;

/// Grid of policies to compare.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyGrid {
    /// Thresholds tried for the long-only and long-short rules.
    pub min_returns: Vec<f64>,
    /// Also run confidence-scaled, always-long, and flat.
    pub include_reference: bool,
}

impl Default for PolicyGrid {
    fn default() -> Self {
        Self {
            min_returns: vec![0.0, 0.0005, 0.001, 0.002],
            include_reference: true,
        }
    }
}

impl PolicyGrid {
    pub fn size(&self) -> usize {
        2 * self.min_returns.len() + if self.include_reference { 3 } else { 0 }
    }

    pub fn policies(&self) -> Vec<PolicyConfig> {
        let mut policies = Vec::with_capacity(self.size());
        if self.include_reference {
            policies.extend([
                PolicyConfig::ConfidenceScaled,
                PolicyConfig::AlwaysLong,
                PolicyConfig::Flat,
            ]);
        }
        for &min_return in &self.min_returns {
            policies.push(PolicyConfig::LongOnly { min_return });
            policies.push(PolicyConfig::LongShort { min_return });
        }
        policies
    }
}

pub struct PolicySweep<'a> {
    pipeline: &'a Pipeline,
    parallel: bool,
}

impl<'a> PolicySweep<'a> {
    pub fn new(pipeline: &'a Pipeline) -> Self {
        Self {
            pipeline,
            parallel: true,
        }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn run(
        &self,
        grid: &PolicyGrid,
        bars: &BarSeries,
        features: &[FeatureVector],
    ) -> Result<SweepResults, ForecastError> {
        self.run_policies(&grid.policies(), bars, features)
    }

    /// Backtest every policy; output order follows `policies`.
    pub fn run_policies(
        &self,
        policies: &[PolicyConfig],
        bars: &BarSeries,
        features: &[FeatureVector],
    ) -> Result<SweepResults, ForecastError> {
        let one = |policy: &PolicyConfig| {
            self.pipeline
                .run_backtest(bars, features, Some(policy))
                .map(|result| SweepEntry {
                    policy: policy.clone(),
                    result,
                })
        };
        let entries = if self.parallel {
            self.pipeline
                .install(|| policies.par_iter().map(one).collect::<Result<Vec<_>, _>>())?
        } else {
            policies.iter().map(one).collect::<Result<Vec<_>, _>>()?
        };
        tracing::info!(policies = entries.len(), "policy sweep complete");
        Ok(SweepResults { entries })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepEntry {
    pub policy: PolicyConfig,
    pub result: BacktestResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResults {
    entries: Vec<SweepEntry>,
}

impl SweepResults {
    pub fn all(&self) -> &[SweepEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, policy: &PolicyConfig) -> Option<&SweepEntry> {
        self.entries.iter().find(|e| &e.policy == policy)
    }

    /// Entries by Sharpe ratio, best first.
    pub fn sorted_by_sharpe(&self) -> Vec<&SweepEntry> {
        let mut sorted: Vec<&SweepEntry> = self.entries.iter().collect();
        sorted.sort_by(|a, b| b.result.summary.sharpe.total_cmp(&a.result.summary.sharpe));
        sorted
    }

    pub fn top_n(&self, n: usize) -> Vec<&SweepEntry> {
        self.sorted_by_sharpe().into_iter().take(n).collect()
    }

    pub fn best(&self) -> Option<&SweepEntry> {
        self.sorted_by_sharpe().into_iter().next()
    }
}
