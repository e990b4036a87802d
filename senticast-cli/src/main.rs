//! Senticast CLI: scoring, training, forecasting, and evaluation commands.
//!
//! Commands:
//! - `score`: score headlines (one `--text`, or a JSON Lines document file)
//! - `train`: fit the ridge ensemble and write its artifact
//! - `predict`: next-period forecasts for the most recent bars
//! - `backtest`: single backtest, cached by run id when `runtime.cache_dir` is set
//! - `explain`: per-feature attribution of one prediction
//! - `sweep`: backtest one model under a grid of threshold policies
//! - `walk-forward`: retrain per fold and report out-of-sample degradation
//!
//! Every command reads the optional `--config` TOML; logs go to stderr and
//! honour `RUST_LOG`.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use senticast_core::backtest::PolicyConfig;
use senticast_core::domain::{Provenance, TextDocument};
use senticast_core::features::FeatureVector;
use senticast_core::model::ForecastModel;
use senticast_runner::data_loader::load_documents_jsonl;
use senticast_runner::export::export_attribution_json;
use senticast_runner::{
    run_walk_forward, save_report, train_and_save, Dataset, Pipeline, PolicyGrid, PolicySweep,
    ResultCache, RunReport, RunnerConfig, WalkForwardResult,
};

#[derive(Parser)]
#[command(
    name = "senticast",
    about = "Senticast CLI: sentiment-fused return forecasting and backtesting"
)]
struct Cli {
    /// Path to a TOML run configuration. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Where bars and documents come from.
#[derive(Args, Clone)]
struct DataArgs {
    /// OHLCV bars as CSV (timestamp,open,high,low,close,volume).
    #[arg(long)]
    bars: Option<PathBuf>,

    /// Documents as JSON Lines ({"timestamp", "source", "text"}).
    #[arg(long)]
    documents: Option<PathBuf>,

    /// Generate this many synthetic bars (with headlines) instead of loading files.
    #[arg(long, value_name = "N")]
    synthetic: Option<usize>,

    /// Seed for synthetic data.
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyKind {
    ConfidenceScaled,
    LongOnly,
    LongShort,
    AlwaysLong,
    Flat,
}

impl PolicyKind {
    fn into_config(self, min_return: f64) -> PolicyConfig {
        match self {
            PolicyKind::ConfidenceScaled => PolicyConfig::ConfidenceScaled,
            PolicyKind::LongOnly => PolicyConfig::LongOnly { min_return },
            PolicyKind::LongShort => PolicyConfig::LongShort { min_return },
            PolicyKind::AlwaysLong => PolicyConfig::AlwaysLong,
            PolicyKind::Flat => PolicyConfig::Flat,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Score headlines and print one JSON object per line.
    Score {
        /// Score a single text.
        #[arg(long, conflicts_with = "documents")]
        text: Option<String>,

        /// Score every document in a JSON Lines file.
        #[arg(long)]
        documents: Option<PathBuf>,
    },
    /// Fit the forecast model and write its artifact.
    Train {
        #[command(flatten)]
        data: DataArgs,

        /// Artifact output path.
        #[arg(long, default_value = "models/ridge.json")]
        out: PathBuf,
    },
    /// Print forecasts for the most recent windows as JSON lines.
    Predict {
        #[command(flatten)]
        data: DataArgs,

        /// Model artifact (overrides `model.artifact`).
        #[arg(long)]
        model: Option<PathBuf>,

        /// Number of most recent forecasts to print.
        #[arg(long, default_value_t = 1)]
        last: usize,
    },
    /// Run one backtest and print its summary.
    Backtest {
        #[command(flatten)]
        data: DataArgs,

        /// Model artifact (overrides `model.artifact`).
        #[arg(long)]
        model: Option<PathBuf>,

        /// Threshold policy (overrides `backtest.policy`).
        #[arg(long, value_enum)]
        policy: Option<PolicyKind>,

        /// Minimum predicted return for the long-only and long-short policies.
        #[arg(long, default_value_t = 0.0)]
        min_return: f64,

        /// Write report.json, summary.json, equity.csv, and positions.csv here.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Attribute one prediction to its input features.
    Explain {
        #[command(flatten)]
        data: DataArgs,

        /// Model artifact (overrides `model.artifact`).
        #[arg(long)]
        model: Option<PathBuf>,

        /// Feature-vector index whose window is explained. Defaults to the last.
        #[arg(long)]
        index: Option<usize>,
    },
    /// Backtest one model under a grid of threshold policies.
    Sweep {
        #[command(flatten)]
        data: DataArgs,

        /// Model artifact (overrides `model.artifact`).
        #[arg(long)]
        model: Option<PathBuf>,

        /// Comma-separated thresholds for the long-only and long-short rules.
        #[arg(long, value_delimiter = ',')]
        min_returns: Vec<f64>,

        /// Rows to print, best Sharpe first.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
    /// Walk-forward evaluation: retrain per fold, test out of sample.
    WalkForward {
        #[command(flatten)]
        data: DataArgs,

        /// Number of folds (overrides `walk_forward.n_folds`).
        #[arg(long)]
        folds: Option<usize>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Score { text, documents } => run_score(config, text, documents),
        Commands::Train { data, out } => run_train(config, &data, &out),
        Commands::Predict { data, model, last } => {
            run_predict(with_model(config, model), &data, last)
        }
        Commands::Backtest {
            data,
            model,
            policy,
            min_return,
            out,
        } => {
            let mut config = with_model(config, model);
            if let Some(kind) = policy {
                config.backtest.policy = kind.into_config(min_return);
            }
            run_backtest_cmd(config, &data, out.as_deref())
        }
        Commands::Explain { data, model, index } => {
            run_explain(with_model(config, model), &data, index)
        }
        Commands::Sweep {
            data,
            model,
            min_returns,
            top,
        } => run_sweep(with_model(config, model), &data, min_returns, top),
        Commands::WalkForward { data, folds } => {
            let mut config = config;
            if let Some(n) = folds {
                config.walk_forward.n_folds = n;
            }
            run_walk_forward_cmd(config, &data)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<RunnerConfig> {
    match path {
        Some(path) => RunnerConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(RunnerConfig::default()),
    }
}

fn with_model(mut config: RunnerConfig, model: Option<PathBuf>) -> RunnerConfig {
    if model.is_some() {
        config.model.artifact = model;
    }
    config
}

fn load_data(args: &DataArgs) -> Result<Dataset> {
    match (&args.bars, args.synthetic) {
        (Some(_), Some(_)) => bail!("--bars and --synthetic are mutually exclusive"),
        (Some(bars), None) => Dataset::load(bars, args.documents.as_deref())
            .with_context(|| format!("failed to load dataset from {}", bars.display())),
        (None, Some(n)) => {
            if args.documents.is_some() {
                bail!("--documents cannot be combined with --synthetic");
            }
            Dataset::synthetic(n, args.seed).context("failed to generate synthetic data")
        }
        (None, None) => bail!("one of --bars or --synthetic is required"),
    }
}

fn build_pipeline(config: RunnerConfig) -> Result<Pipeline> {
    Pipeline::from_config(config).context("failed to build pipeline")
}

fn require_model(pipeline: &Pipeline) -> Result<&dyn ForecastModel> {
    pipeline.model().map_err(|e| {
        anyhow::anyhow!("{e}; run `senticast train --out <path>` and pass --model <path>")
    })
}

fn assemble(pipeline: &Pipeline, data: &Dataset) -> Result<Vec<FeatureVector>> {
    let scores = pipeline.score_many(&data.documents);
    let vectors = pipeline
        .assemble(&data.bars, &scores)
        .context("failed to assemble features")?;
    if vectors.is_empty() {
        bail!(
            "{} bars do not reach past the lookback of {}",
            data.bars.len(),
            pipeline.lookback()
        );
    }
    Ok(vectors)
}

// ─── Commands ───────────────────────────────────────────────────────

fn run_score(config: RunnerConfig, text: Option<String>, documents: Option<PathBuf>) -> Result<()> {
    let pipeline = build_pipeline(config)?;

    if let Some(text) = text {
        let sentiment = pipeline.score_text(&text);
        println!("{}", serde_json::to_string(&sentiment)?);
        return Ok(());
    }

    let Some(path) = documents else {
        bail!("one of --text or --documents is required");
    };
    let docs: Vec<TextDocument> = load_documents_jsonl(&path)
        .with_context(|| format!("failed to read documents from {}", path.display()))?;
    let scores = pipeline.score_many(&docs);
    for score in &scores {
        println!("{}", serde_json::to_string(score)?);
    }
    let fallback = scores
        .iter()
        .filter(|s| s.provenance() == Provenance::Fallback)
        .count();
    tracing::info!(documents = scores.len(), fallback, "scored documents");
    Ok(())
}

fn run_train(mut config: RunnerConfig, args: &DataArgs, out: &Path) -> Result<()> {
    // Training never needs an existing artifact.
    config.model.artifact = None;
    let data = load_data(args)?;
    let pipeline = build_pipeline(config)?;
    let vectors = assemble(&pipeline, &data)?;

    let (_, report) = train_and_save(
        &data.bars,
        &vectors,
        pipeline.schema(),
        &pipeline.config().model.fit,
        out,
    )
    .context("training failed")?;

    println!();
    println!("=== Training ===");
    println!("Model:          {}", report.model_version);
    println!("Samples:        {}", report.samples);
    println!("Window:         {}", report.window_len);
    println!("Features:       {}", report.feature_names.join(", "));
    println!("Fallback input: {} of {}", report.fallback_inputs, vectors.len());
    if data.synthetic {
        println!();
        println!("WARNING: Model trained on SYNTHETIC data");
    }
    println!("Artifact saved to: {}", out.display());
    Ok(())
}

fn run_predict(config: RunnerConfig, args: &DataArgs, last: usize) -> Result<()> {
    let data = load_data(args)?;
    let pipeline = build_pipeline(config)?;
    require_model(&pipeline)?;
    let vectors = assemble(&pipeline, &data)?;

    let records = pipeline
        .predict_series(&vectors)
        .context("prediction failed")?;
    let skip = records.len().saturating_sub(last);
    for record in &records[skip..] {
        println!("{}", serde_json::to_string(record)?);
    }
    Ok(())
}

fn run_backtest_cmd(config: RunnerConfig, args: &DataArgs, out: Option<&Path>) -> Result<()> {
    let data = load_data(args)?;
    let pipeline = build_pipeline(config)?;
    let model_version = require_model(&pipeline)?.version().clone();
    let run_id = pipeline.config().run_id(&data.hash, &model_version)?;

    let run = || -> Result<RunReport> {
        let vectors = assemble(&pipeline, &data)?;
        let result = pipeline
            .run_backtest(&data.bars, &vectors, None)
            .context("backtest failed")?;
        Ok(RunReport::new(
            run_id.clone(),
            data.hash.clone(),
            data.synthetic,
            pipeline.config().backtest.policy.clone(),
            result,
        ))
    };

    let report = match &pipeline.config().runtime.cache_dir {
        Some(dir) => {
            let cache = ResultCache::new(dir)?;
            let (report, hit) = cache.get_or_insert_with(&run_id, run)?;
            if hit {
                println!("(cached result {})", &run_id[..12.min(run_id.len())]);
            }
            report
        }
        None => run()?,
    };

    print_summary(&report);

    if let Some(dir) = out {
        let run_dir = save_report(&report, dir)?;
        println!("Artifacts saved to: {}", run_dir.display());
    }
    Ok(())
}

fn run_explain(config: RunnerConfig, args: &DataArgs, index: Option<usize>) -> Result<()> {
    let data = load_data(args)?;
    let pipeline = build_pipeline(config)?;
    let window_len = require_model(&pipeline)?.window_len();
    let vectors = assemble(&pipeline, &data)?;

    let k = index.unwrap_or(vectors.len() - 1);
    if k >= vectors.len() {
        bail!("index {k} out of range ({} feature vectors)", vectors.len());
    }
    if k + 1 < window_len {
        bail!("index {k} has fewer than {window_len} vectors of history");
    }
    let window = &vectors[k + 1 - window_len..=k];
    let explained = pipeline
        .explain(window, &vectors[..=k])
        .context("attribution failed")?;
    println!("{}", export_attribution_json(&explained)?);
    Ok(())
}

fn run_sweep(config: RunnerConfig, args: &DataArgs, min_returns: Vec<f64>, top: usize) -> Result<()> {
    let data = load_data(args)?;
    let pipeline = build_pipeline(config)?;
    require_model(&pipeline)?;
    let vectors = assemble(&pipeline, &data)?;

    let mut grid = PolicyGrid::default();
    if !min_returns.is_empty() {
        grid.min_returns = min_returns;
    }
    let results = PolicySweep::new(&pipeline)
        .run(&grid, &data.bars, &vectors)
        .context("policy sweep failed")?;

    println!();
    println!("=== Policy Sweep ({} policies) ===", results.len());
    println!(
        "{:<24} {:>8} {:>9} {:>9} {:>9}",
        "Policy", "Sharpe", "CAGR", "Return", "Max DD"
    );
    println!("{}", "-".repeat(63));
    for entry in results.top_n(top) {
        let s = &entry.result.summary;
        println!(
            "{:<24} {:>8.3} {:>8.2}% {:>8.2}% {:>8.2}%",
            entry.policy.label(),
            s.sharpe,
            s.cagr * 100.0,
            s.total_return * 100.0,
            s.max_drawdown * 100.0
        );
    }
    if data.synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
    Ok(())
}

fn run_walk_forward_cmd(config: RunnerConfig, args: &DataArgs) -> Result<()> {
    let data = load_data(args)?;
    let wf_config = config.walk_forward.clone();
    let pipeline = build_pipeline(config)?;
    let scores = pipeline.score_many(&data.documents);

    let result = run_walk_forward(&pipeline, &data.bars, &scores, &wf_config)
        .context("walk-forward evaluation failed")?;
    print_walk_forward(&result, data.synthetic);
    Ok(())
}

// ─── Output ─────────────────────────────────────────────────────────

fn print_summary(report: &RunReport) {
    let result = &report.result;
    let s = &result.summary;
    println!();
    println!("=== Backtest Result ===");
    println!("Run:            {}", report.run_id);
    println!("Model:          {}", result.model_version);
    println!("Policy:         {}", report.policy.label());
    if let (Some(first), Some(last)) = (result.equity_curve.first(), result.equity_curve.last()) {
        println!(
            "Period:         {} to {}",
            first.timestamp.format("%Y-%m-%d"),
            last.timestamp.format("%Y-%m-%d")
        );
    }
    println!("Steps:          {}", s.num_periods);
    println!("Fallback input: {}", result.fallback_inputs);
    println!();
    println!("--- Performance ---");
    println!("Total Return:   {:.2}%", s.total_return * 100.0);
    println!("CAGR:           {:.2}%", s.cagr * 100.0);
    println!("Sharpe:         {:.3}", s.sharpe);
    println!("Max Drawdown:   {:.2}%", s.max_drawdown * 100.0);
    println!("Forecast MSE:   {:.3e}", s.mse);
    println!("Final Equity:   {:.4}", result.final_equity());
    if report.synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
}

fn print_walk_forward(result: &WalkForwardResult, synthetic: bool) {
    println!();
    println!("=== Walk-Forward ({} folds) ===", result.folds.len());
    println!(
        "{:<5} {:>8} {:>14} {:>8} {:>10} {:>10}",
        "Fold", "IS end", "OOS bars", "Samples", "IS Sharpe", "OOS Sharpe"
    );
    println!("{}", "-".repeat(60));
    for fold in &result.folds {
        println!(
            "{:<5} {:>8} {:>14} {:>8} {:>10.3} {:>10.3}",
            fold.spec.fold_index,
            fold.spec.is_end,
            format!("{}..{}", fold.spec.oos_start, fold.spec.oos_end),
            fold.training_samples,
            fold.in_sample.sharpe,
            fold.out_of_sample.sharpe
        );
    }
    println!();
    println!("--- Out of Sample ---");
    println!("Total Return:   {:.2}%", result.oos_summary.total_return * 100.0);
    println!("CAGR:           {:.2}%", result.oos_summary.cagr * 100.0);
    println!("Sharpe:         {:.3}", result.oos_summary.sharpe);
    println!("Max Drawdown:   {:.2}%", result.oos_summary.max_drawdown * 100.0);
    println!("Mean IS Sharpe: {:.3}", result.mean_is_sharpe);
    println!("Mean OOS Sharpe:{:.3}", result.mean_oos_sharpe);
    match result.degradation_ratio {
        Some(ratio) => println!("Degradation:    {ratio:.3} ({:?})", result.degradation_flag),
        None => println!("Degradation:    n/a ({:?})", result.degradation_flag),
    }
    if synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
}
