//! Domain types for Senticast

pub mod bar;
pub mod document;
pub mod ids;
pub mod prediction;
pub mod score;

pub use bar::{Bar, BarError, BarSeries};
pub use document::TextDocument;
pub use ids::{ContentKey, DatasetHash, ModelVersion};
pub use prediction::{Position, PredictionRecord};
pub use score::{Provenance, Sentiment, SentimentScore};
