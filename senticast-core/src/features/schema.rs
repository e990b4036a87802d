//! Feature schema: which columns a feature vector carries, in what order.

use super::indicators::{Indicator, RealizedVolatility, Rsi, TrailingReturn};
use crate::error::ForecastError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

pub const SENTIMENT_FIELD: &str = "sentiment";
pub const SENTIMENT_MOMENTUM_FIELD: &str = "sentiment_momentum";

/// Fixed per deployment. Field order is: one `ret_{w}` per return window,
/// `vol_{n}`, optional `rsi_{p}`, `sentiment`, `sentiment_momentum`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureSchema {
    pub version: u32,
    pub return_windows: Vec<usize>,
    pub volatility_window: usize,
    /// 0 disables the RSI column.
    pub rsi_period: usize,
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self {
            version: 1,
            return_windows: vec![1, 5, 10],
            volatility_window: 10,
            rsi_period: 14,
        }
    }
}

/// BLAKE3 fingerprint of a schema's full definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaFingerprint(pub String);

impl fmt::Display for SchemaFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FeatureSchema {
    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.return_windows.is_empty() {
            return Err(ForecastError::InvalidSchema(
                "at least one return window is required".into(),
            ));
        }
        if self.return_windows.contains(&0) {
            return Err(ForecastError::InvalidSchema("return windows must be >= 1".into()));
        }
        let unique: BTreeSet<_> = self.return_windows.iter().collect();
        if unique.len() != self.return_windows.len() {
            return Err(ForecastError::InvalidSchema(
                "return windows must be distinct".into(),
            ));
        }
        if self.volatility_window == 0 {
            return Err(ForecastError::InvalidSchema(
                "volatility window must be >= 1".into(),
            ));
        }
        Ok(())
    }

    pub fn rsi(&self) -> Option<usize> {
        (self.rsi_period > 0).then_some(self.rsi_period)
    }

    /// Price-derived columns in field order.
    pub fn price_indicators(&self) -> Vec<Box<dyn Indicator>> {
        let mut out: Vec<Box<dyn Indicator>> = self
            .return_windows
            .iter()
            .map(|&w| Box::new(TrailingReturn::new(w)) as Box<dyn Indicator>)
            .collect();
        out.push(Box::new(RealizedVolatility::new(self.volatility_window)));
        if let Some(period) = self.rsi() {
            out.push(Box::new(Rsi::new(period)));
        }
        out
    }

    pub fn field_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .price_indicators()
            .iter()
            .map(|ind| ind.name().to_string())
            .collect();
        names.push(SENTIMENT_FIELD.to_string());
        names.push(SENTIMENT_MOMENTUM_FIELD.to_string());
        names
    }

    pub fn field_count(&self) -> usize {
        self.return_windows.len() + 1 + usize::from(self.rsi().is_some()) + 2
    }

    /// Minimum warm-up: the earliest bar index with every column defined.
    pub fn min_lookback(&self) -> usize {
        self.price_indicators()
            .iter()
            .map(|ind| ind.lookback())
            .max()
            .unwrap_or(0)
            .max(1)
    }

    pub fn fingerprint(&self) -> SchemaFingerprint {
        let canonical = serde_json::json!({
            "version": self.version,
            "fields": self.field_names(),
        });
        SchemaFingerprint(blake3::hash(canonical.to_string().as_bytes()).to_hex().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_field_names() {
        let schema = FeatureSchema::default();
        assert_eq!(
            schema.field_names(),
            vec!["ret_1", "ret_5", "ret_10", "vol_10", "rsi_14", "sentiment", "sentiment_momentum"]
        );
        assert_eq!(schema.field_count(), 7);
        assert_eq!(schema.min_lookback(), 14);
    }

    #[test]
    fn rsi_can_be_disabled() {
        let schema = FeatureSchema {
            rsi_period: 0,
            ..FeatureSchema::default()
        };
        assert_eq!(schema.field_count(), 6);
        assert_eq!(schema.field_names().len(), 6);
        assert_eq!(schema.min_lookback(), 10);
    }

    #[test]
    fn fingerprint_tracks_definition() {
        let a = FeatureSchema::default();
        let mut b = a.clone();
        assert_eq!(a.fingerprint(), b.fingerprint());
        b.return_windows = vec![1, 5];
        assert_ne!(a.fingerprint(), b.fingerprint());
        let mut c = a.clone();
        c.version = 2;
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn validation() {
        assert!(FeatureSchema::default().validate().is_ok());
        for bad in [
            FeatureSchema { return_windows: vec![], ..FeatureSchema::default() },
            FeatureSchema { return_windows: vec![0, 1], ..FeatureSchema::default() },
            FeatureSchema { return_windows: vec![5, 5], ..FeatureSchema::default() },
            FeatureSchema { volatility_window: 0, ..FeatureSchema::default() },
        ] {
            assert!(matches!(bad.validate(), Err(ForecastError::InvalidSchema(_))));
        }
    }

    #[test]
    fn parses_from_partial_toml_like_json() {
        let schema: FeatureSchema = serde_json::from_str(r#"{"return_windows":[1,3]}"#).unwrap();
        assert_eq!(schema.return_windows, vec![1, 3]);
        assert_eq!(schema.volatility_window, 10);
        assert_eq!(schema.rsi_period, 14);
    }
}
