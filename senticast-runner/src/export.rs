//! Reporting and export: JSON run reports and CSV series.
//!
//! A saved run directory holds:
//! - `report.json`: the full `RunReport`
//! - `summary.json`: headline statistics only
//! - `equity.csv`: `timestamp,equity`
//! - `positions.csv`: one row per decision step
//!
//! Reports carry a `schema_version`; newer versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use senticast_core::attribution::AttributionResult;
use senticast_core::backtest::{BacktestResult, BacktestSummary, PolicyConfig};
use senticast_core::domain::{DatasetHash, ModelVersion};

use crate::config::RunId;

pub const REPORT_SCHEMA_VERSION: u32 = 1;

/// A backtest together with what produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub schema_version: u32,
    pub run_id: RunId,
    pub created_at: DateTime<Utc>,
    pub dataset_hash: DatasetHash,
    /// Built from synthetic data; never comparable with real runs.
    pub synthetic: bool,
    pub policy: PolicyConfig,
    pub result: BacktestResult,
}

impl RunReport {
    pub fn new(
        run_id: RunId,
        dataset_hash: DatasetHash,
        synthetic: bool,
        policy: PolicyConfig,
        result: BacktestResult,
    ) -> Self {
        Self {
            schema_version: REPORT_SCHEMA_VERSION,
            run_id,
            created_at: Utc::now(),
            dataset_hash,
            synthetic,
            policy,
            result,
        }
    }
}

#[derive(Debug, Serialize)]
struct SummaryDocument<'a> {
    run_id: &'a str,
    model_version: &'a ModelVersion,
    policy: String,
    synthetic: bool,
    periods_per_year: f64,
    fallback_inputs: usize,
    final_equity: f64,
    #[serde(flatten)]
    summary: &'a BacktestSummary,
}

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_json(report: &RunReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize run report")
}

pub fn import_json(json: &str) -> Result<RunReport> {
    let report: RunReport =
        serde_json::from_str(json).context("failed to deserialize run report")?;
    if report.schema_version > REPORT_SCHEMA_VERSION {
        bail!(
            "unsupported report schema version {} (max supported: {})",
            report.schema_version,
            REPORT_SCHEMA_VERSION
        );
    }
    Ok(report)
}

pub fn export_summary_json(report: &RunReport) -> Result<String> {
    let doc = SummaryDocument {
        run_id: &report.run_id,
        model_version: &report.result.model_version,
        policy: report.policy.label(),
        synthetic: report.synthetic,
        periods_per_year: report.result.periods_per_year,
        fallback_inputs: report.result.fallback_inputs,
        final_equity: report.result.final_equity(),
        summary: &report.result.summary,
    };
    serde_json::to_string_pretty(&doc).context("failed to serialize summary")
}

pub fn export_attribution_json(result: &AttributionResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize attribution")
}

// ─── CSV ────────────────────────────────────────────────────────────

pub fn export_equity_csv(result: &BacktestResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["timestamp", "equity"])?;
    for point in &result.equity_curve {
        wtr.write_record([point.timestamp.to_rfc3339(), format!("{:.8}", point.equity)])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: timestamp, exposure, predicted_return, uncertainty, realized_return.
pub fn export_positions_csv(result: &BacktestResult) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "timestamp",
        "exposure",
        "predicted_return",
        "uncertainty",
        "realized_return",
    ])?;
    let rows = result
        .positions
        .iter()
        .zip(&result.predictions)
        .zip(&result.realized_returns);
    for ((position, prediction), realized) in rows {
        wtr.write_record([
            position.timestamp.to_rfc3339(),
            format!("{:.6}", position.exposure),
            format!("{:.8}", prediction.predicted_return),
            format!("{:.8}", prediction.uncertainty),
            format!("{:.8}", realized),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Write the report bundle into `output_dir/<run id prefix>/` and return it.
pub fn save_report(report: &RunReport, output_dir: &Path) -> Result<PathBuf> {
    let short_id = report.run_id.get(..12).unwrap_or(&report.run_id);
    let run_dir = output_dir.join(short_id);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create {}", run_dir.display()))?;

    let files = [
        ("report.json", export_json(report)?),
        ("summary.json", export_summary_json(report)?),
        ("equity.csv", export_equity_csv(&report.result)?),
        ("positions.csv", export_positions_csv(&report.result)?),
    ];
    for (name, contents) in files {
        let path = run_dir.join(name);
        std::fs::write(&path, contents)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    tracing::info!(dir = %run_dir.display(), run_id = %report.run_id, "saved run report");
    Ok(run_dir)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use chrono::TimeZone;
    use senticast_core::backtest::EquityPoint;
    use senticast_core::domain::{Position, PredictionRecord};

    pub fn report(run_id: &str) -> RunReport {
        let t = |d: u32| Utc.with_ymd_and_hms(2024, 1, d, 21, 0, 0).unwrap();
        let version = ModelVersion::new("ridge-0123456789ab");
        let equity = vec![1.0, 1.01, 0.999];
        let result = BacktestResult {
            model_version: version.clone(),
            equity_curve: (0..3)
                .map(|i| EquityPoint {
                    timestamp: t(2 + i as u32),
                    equity: equity[i],
                })
                .collect(),
            positions: vec![
                Position {
                    timestamp: t(2),
                    exposure: 1.0,
                },
                Position {
                    timestamp: t(3),
                    exposure: 0.5,
                },
            ],
            predictions: vec![
                PredictionRecord {
                    timestamp: t(2),
                    predicted_return: 0.002,
                    uncertainty: 0.001,
                    model_version: version.clone(),
                },
                PredictionRecord {
                    timestamp: t(3),
                    predicted_return: 0.001,
                    uncertainty: 0.001,
                    model_version: version,
                },
            ],
            realized_returns: vec![0.01, -0.0218],
            summary: BacktestSummary::compute(&equity, &[0.002, 0.001], &[0.01, -0.0218], 252.0),
            periods_per_year: 252.0,
            fallback_inputs: 2,
        };
        RunReport::new(
            run_id.to_string(),
            DatasetHash::from_hash("feedface"),
            true,
            PolicyConfig::ConfidenceScaled,
            result,
        )
    }
}
