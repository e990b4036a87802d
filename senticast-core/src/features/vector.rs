use crate::domain::Provenance;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One time step of model input: values in schema field order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub timestamp: DateTime<Utc>,
    pub schema_version: u32,
    pub values: Vec<f64>,
    /// Provenance of the sentiment joined into this step.
    pub sentiment_provenance: Provenance,
}

impl FeatureVector {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Pair each value with its field name.
    pub fn named<'a>(&'a self, names: &'a [String]) -> impl Iterator<Item = (&'a str, f64)> + 'a {
        names.iter().map(String::as_str).zip(self.values.iter().copied())
    }
}
