//! Sentiment scoring: a primary statistical model guarded by a timeout and a
//! circuit breaker, with a deterministic lexicon fallback and a content-keyed
//! score cache.

pub mod cache;
pub mod circuit_breaker;
pub mod lexicon;
pub mod primary;
pub mod scorer;

pub use cache::ScoreCache;
pub use circuit_breaker::{BreakerState, CircuitBreaker};
pub use lexicon::LexiconScorer;
pub use primary::{BagOfWordsModel, PrimarySentimentModel, SentimentError};
pub use scorer::{ScorerConfig, SentimentScorer};

/// Split text into lowercase word tokens.
///
/// Letters, digits, apostrophes and inner hyphens are kept, so `"didn't"` and
/// `"sell-off"` stay single tokens. Typographic apostrophes are normalised.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '\u{2019}' || c == '-'))
        .map(|raw| raw.trim_matches(|c: char| c == '\'' || c == '\u{2019}' || c == '-'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase().replace('\u{2019}', "'"))
        .collect()
}
