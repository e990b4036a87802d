//! Bar: the fundamental market data unit, and the validated series that
//! carries bars into the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use thiserror::Error;

/// OHLCV bar for a single instrument at a single timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Returns true if any OHLCV field is NaN or infinite.
    pub fn is_void(&self) -> bool {
        ![self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
    }

    /// Basic OHLCV sanity check: high >= low, high >= open, high >= close, etc.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
            && self.volume >= 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("bar {index} at {timestamp} is not strictly after the previous bar at {previous}")]
    NotIncreasing {
        index: usize,
        previous: DateTime<Utc>,
        timestamp: DateTime<Utc>,
    },
    #[error("bar {index} at {timestamp} fails OHLCV sanity checks")]
    Insane {
        index: usize,
        timestamp: DateTime<Utc>,
    },
}

/// Bars in strictly increasing timestamp order, each passing `Bar::is_sane`.
///
/// Construction is the only validation point; once built the series is
/// immutable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    pub fn new(bars: Vec<Bar>) -> Result<Self, BarError> {
        for (index, bar) in bars.iter().enumerate() {
            if !bar.is_sane() {
                return Err(BarError::Insane {
                    index,
                    timestamp: bar.timestamp,
                });
            }
            if index > 0 {
                let previous = bars[index - 1].timestamp;
                if bar.timestamp <= previous {
                    return Err(BarError::NotIncreasing {
                        index,
                        previous,
                        timestamp: bar.timestamp,
                    });
                }
            }
        }
        Ok(Self { bars })
    }

    pub fn as_slice(&self) -> &[Bar] {
        &self.bars
    }

    /// Index of the bar with exactly this timestamp.
    pub fn index_of(&self, timestamp: DateTime<Utc>) -> Option<usize> {
        self.bars
            .binary_search_by(|bar| bar.timestamp.cmp(&timestamp))
            .ok()
    }

    /// Simple return from bar `index - 1` to bar `index`.
    pub fn simple_return(&self, index: usize) -> Option<f64> {
        if index == 0 || index >= self.bars.len() {
            return None;
        }
        Some(self.bars[index].close / self.bars[index - 1].close - 1.0)
    }

    /// A validated prefix or window of this series. Ranges are clamped.
    pub fn slice(&self, start: usize, end: usize) -> BarSeries {
        let end = end.min(self.bars.len());
        let start = start.min(end);
        BarSeries {
            bars: self.bars[start..end].to_vec(),
        }
    }

    pub fn into_inner(self) -> Vec<Bar> {
        self.bars
    }
}

impl Deref for BarSeries {
    type Target = [Bar];

    fn deref(&self) -> &[Bar] {
        &self.bars
    }
}

impl<'de> Deserialize<'de> for BarSeries {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bars = Vec::<Bar>::deserialize(deserializer)?;
        BarSeries::new(bars).map_err(serde::de::Error::custom)
    }
}
