//! Bar and document loading for the runner.
//!
//! Bars come from CSV with a `timestamp,open,high,low,close,volume` header;
//! the timestamp is RFC 3339 or a plain `YYYY-MM-DD` date (midnight UTC).
//! Documents come from JSON Lines, one `{"timestamp","source","text"}` object
//! per line. Blank lines are skipped.
//!
//! Synthetic data is a developer-only mode. Datasets built from it are
//! tagged so results are never mistaken for real ones.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

use senticast_core::domain::{Bar, BarError, BarSeries, DatasetHash, TextDocument};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV row: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: unrecognised timestamp '{value}'")]
    Timestamp { line: usize, value: String },

    #[error("line {line}: malformed document: {source}")]
    Document {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid bar series: {0}")]
    Bars(#[from] BarError),

    #[error("no bars in input")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// Everything one run consumes, plus its content hash.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub bars: BarSeries,
    pub documents: Vec<TextDocument>,
    pub hash: DatasetHash,
    pub synthetic: bool,
}

impl Dataset {
    pub fn new(bars: BarSeries, documents: Vec<TextDocument>, synthetic: bool) -> Self {
        let hash = dataset_hash(&bars, &documents);
        Self {
            bars,
            documents,
            hash,
            synthetic,
        }
    }

    /// Load bars and, optionally, documents from disk.
    pub fn load(bars_path: &Path, documents_path: Option<&Path>) -> Result<Self, LoadError> {
        let bars = load_bars_csv(bars_path)?;
        let documents = match documents_path {
            Some(path) => load_documents_jsonl(path)?,
            None => Vec::new(),
        };
        tracing::info!(
            bars = bars.len(),
            documents = documents.len(),
            path = %bars_path.display(),
            "loaded dataset"
        );
        Ok(Self::new(bars, documents, false))
    }

    /// Seeded synthetic dataset: a random walk with one headline per bar.
    pub fn synthetic(bars: usize, seed: u64) -> Result<Self, LoadError> {
        tracing::warn!(bars, seed, "generating synthetic data; results are tagged synthetic");
        let series = generate_synthetic_bars(bars, seed)?;
        let documents = generate_synthetic_documents(&series, seed);
        Ok(Self::new(series, documents, true))
    }
}

fn open(path: &Path) -> Result<std::fs::File, LoadError> {
    std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_bars_csv(path: &Path) -> Result<BarSeries, LoadError> {
    read_bars(open(path)?)
}

/// Parse bars from any CSV reader and validate them as a series.
pub fn read_bars<R: Read>(reader: R) -> Result<BarSeries, LoadError> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut bars = Vec::new();
    for (i, row) in rdr.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        // Header is line 1.
        let line = i + 2;
        let timestamp = parse_timestamp(&row.timestamp).ok_or(LoadError::Timestamp {
            line,
            value: row.timestamp.clone(),
        })?;
        bars.push(Bar {
            timestamp,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        });
    }
    if bars.is_empty() {
        return Err(LoadError::Empty);
    }
    Ok(BarSeries::new(bars)?)
}

pub fn load_documents_jsonl(path: &Path) -> Result<Vec<TextDocument>, LoadError> {
    read_documents(BufReader::new(open(path)?))
}

pub fn read_documents<R: BufRead>(reader: R) -> Result<Vec<TextDocument>, LoadError> {
    let mut documents = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line_no = i + 1;
        let line = line.map_err(|e| LoadError::Document {
            line: line_no,
            source: serde_json::Error::io(e),
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: TextDocument = serde_json::from_str(&line).map_err(|source| {
            LoadError::Document {
                line: line_no,
                source,
            }
        })?;
        documents.push(doc);
    }
    Ok(documents)
}

/// RFC 3339, or a bare date taken as midnight UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

/// BLAKE3 over every bar field and every document, in input order.
pub fn dataset_hash(bars: &BarSeries, documents: &[TextDocument]) -> DatasetHash {
    let mut hasher = blake3::Hasher::new();
    for bar in bars.iter() {
        hasher.update(&bar.timestamp.timestamp().to_le_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    for doc in documents {
        hasher.update(&doc.timestamp.timestamp().to_le_bytes());
        hasher.update(doc.source.as_bytes());
        hasher.update(&[0]);
        hasher.update(doc.text.as_bytes());
        hasher.update(&[0]);
    }
    DatasetHash::from_hash(hasher.finalize().to_hex().as_str())
}

// 2020-01-02T21:00:00Z
const SYNTHETIC_START_SECS: i64 = 1_577_998_800;

/// Seeded random walk from 100.0 on weekdays starting 2020-01-02, closing at
/// 21:00 UTC.
pub fn generate_synthetic_bars(n: usize, seed: u64) -> Result<BarSeries, LoadError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut bars = Vec::with_capacity(n);
    let mut price = 100.0_f64;
    let mut day = Utc
        .timestamp_opt(SYNTHETIC_START_SECS, 0)
        .single()
        .unwrap_or_default();

    while bars.len() < n {
        let weekday = day.weekday();
        if weekday == chrono::Weekday::Sat || weekday == chrono::Weekday::Sun {
            day += Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.02..0.0205);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000.0..5_000_000.0_f64).round();

        bars.push(Bar {
            timestamp: day,
            open,
            high,
            low,
            close,
            volume,
        });
        price = close;
        day += Duration::days(1);
    }
    Ok(BarSeries::new(bars)?)
}

const UPBEAT: [&str; 4] = [
    "Shares rally as quarterly profit beats estimates",
    "Analysts upgrade the stock on strong demand",
    "Company raises guidance after record growth",
    "Investors cheer robust margins and upbeat outlook",
];

const DOWNBEAT: [&str; 4] = [
    "Shares slump after weak earnings miss",
    "Analysts downgrade the stock citing falling demand",
    "Company cuts guidance amid losses",
    "Investors fear a lawsuit and declining margins",
];

const NEUTRAL: [&str; 3] = [
    "Company schedules annual shareholder meeting",
    "Board announces routine management changes",
    "Trading volume in line with recent sessions",
];

/// One headline an hour before each close, reacting to that bar's own move.
pub fn generate_synthetic_documents(bars: &BarSeries, seed: u64) -> Vec<TextDocument> {
    let mut rng = StdRng::seed_from_u64(seed ^ 0x5EED_D0C5);
    bars.iter()
        .map(|bar| {
            let change = bar.close / bar.open - 1.0;
            let text = if change > 0.005 {
                UPBEAT[rng.gen_range(0..UPBEAT.len())]
            } else if change < -0.005 {
                DOWNBEAT[rng.gen_range(0..DOWNBEAT.len())]
            } else {
                NEUTRAL[rng.gen_range(0..NEUTRAL.len())]
            };
            TextDocument::new(bar.timestamp - Duration::hours(1), "synthetic", text)
        })
        .collect()
}
