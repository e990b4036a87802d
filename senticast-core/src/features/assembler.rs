//! Feature assembly: bars + sentiment scores → fixed-width vectors.

use super::join::join_nearest_preceding;
use super::schema::FeatureSchema;
use super::vector::FeatureVector;
use crate::domain::{BarSeries, SentimentScore};
use crate::error::ForecastError;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct FeatureAssembler {
    schema: FeatureSchema,
}

impl FeatureAssembler {
    pub fn new(schema: FeatureSchema) -> Result<Self, ForecastError> {
        schema.validate()?;
        Ok(Self { schema })
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// One vector per bar at index `i >= lookback`; nothing for earlier bars.
    ///
    /// Scores may be unsorted. Identical inputs give identical vectors.
    pub fn assemble(
        &self,
        bars: &BarSeries,
        scores: &[SentimentScore],
        lookback: usize,
    ) -> Result<Vec<FeatureVector>, ForecastError> {
        let required = self.schema.min_lookback();
        if lookback < required {
            return Err(ForecastError::InvalidInputShape {
                what: "lookback",
                expected: required,
                actual: lookback,
            });
        }
        if bars.len() <= lookback {
            tracing::debug!(bars = bars.len(), lookback, "no bar past the lookback");
            return Ok(Vec::new());
        }

        let columns: Vec<Vec<f64>> = self
            .schema
            .price_indicators()
            .iter()
            .map(|ind| ind.compute(bars))
            .collect();
        let timestamps: Vec<DateTime<Utc>> = bars.iter().map(|b| b.timestamp).collect();
        let joined = join_nearest_preceding(&timestamps, scores);

        let width = self.schema.field_count();
        let mut vectors = Vec::with_capacity(bars.len() - lookback);
        for i in lookback..bars.len() {
            let mut values = Vec::with_capacity(width);
            values.extend(columns.iter().map(|col| col[i]));
            let sentiment = joined[i];
            values.push(sentiment.value());
            values.push(sentiment.value() - joined[i - 1].value());

            if values.iter().any(|v| !v.is_finite()) {
                return Err(ForecastError::NonFinite {
                    what: "feature vector",
                });
            }
            vectors.push(FeatureVector {
                timestamp: bars[i].timestamp,
                schema_version: self.schema.version,
                values,
                sentiment_provenance: sentiment.provenance(),
            });
        }

        tracing::debug!(
            vectors = vectors.len(),
            width,
            fallback = vectors
                .iter()
                .filter(|v| v.sentiment_provenance == crate::domain::Provenance::Fallback)
                .count(),
            "assembled feature vectors"
        );
        Ok(vectors)
    }
}

/// Realized next-bar return aligned with each vector; `None` for a vector on
/// the final bar.
pub fn next_returns(
    bars: &BarSeries,
    vectors: &[FeatureVector],
) -> Result<Vec<Option<f64>>, ForecastError> {
    vectors
        .iter()
        .map(|v| {
            let idx = bars
                .index_of(v.timestamp)
                .ok_or(ForecastError::MisalignedFeatures {
                    timestamp: v.timestamp,
                })?;
            Ok(bars.simple_return(idx + 1))
        })
        .collect()
}
