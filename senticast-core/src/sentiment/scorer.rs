//! The sentiment scorer: primary model first, lexicon fallback otherwise.
//!
//! Primary calls with a deadline run on a dedicated pool of
//! `primary_workers` threads. At most that many calls are in flight; a call
//! that times out keeps its slot until the model returns, and while every
//! slot is held new calls fall back without touching the pool.

use super::cache::ScoreCache;
use super::circuit_breaker::CircuitBreaker;
use super::lexicon::LexiconScorer;
use super::primary::{PrimarySentimentModel, SentimentError};
use crate::domain::{ContentKey, Sentiment, SentimentScore, TextDocument};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

/// Runtime behaviour of the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScorerConfig {
    /// Deadline for one primary call; 0 runs the call inline without a deadline.
    pub primary_timeout_ms: u64,
    /// Skip the primary entirely.
    pub offline: bool,
    /// Threads in the primary pool, and the cap on concurrent primary calls.
    pub primary_workers: usize,
    pub breaker_failure_threshold: u32,
    pub breaker_cooldown_secs: u64,
    pub cache_enabled: bool,
    pub prefer_cached_fallback: bool,
    /// Score cache capacity; 0 means unbounded.
    pub cache_max_entries: usize,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            primary_timeout_ms: 2_000,
            offline: false,
            primary_workers: 4,
            breaker_failure_threshold: 3,
            breaker_cooldown_secs: 60,
            cache_enabled: true,
            prefer_cached_fallback: false,
            cache_max_entries: 100_000,
        }
    }
}

pub struct SentimentScorer {
    primary: Option<Arc<dyn PrimarySentimentModel>>,
    lexicon: LexiconScorer,
    breaker: CircuitBreaker,
    cache: Option<ScoreCache>,
    primary_pool: Option<rayon::ThreadPool>,
    in_flight: Arc<AtomicUsize>,
    config: ScorerConfig,
}

/// One claimed primary-call slot, released on drop.
struct InFlightSlot(Arc<AtomicUsize>);

impl InFlightSlot {
    fn acquire(counter: &Arc<AtomicUsize>, limit: usize) -> Option<Self> {
        counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < limit).then_some(n + 1))
            .ok()
            .map(|_| Self(Arc::clone(counter)))
    }
}

impl Drop for InFlightSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

fn build_primary_pool(workers: usize) -> Option<rayon::ThreadPool> {
    let built = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("senticast-primary-{i}"))
        .panic_handler(|_| tracing::error!("primary sentiment call panicked"))
        .build();
    match built {
        Ok(pool) => Some(pool),
        Err(e) => {
            tracing::warn!(error = %e, "cannot build primary sentiment pool");
            None
        }
    }
}

impl SentimentScorer {
    /// Scorer without a primary model: every score is tagged fallback.
    pub fn fallback_only(config: ScorerConfig) -> Self {
        Self::build(None, config)
    }

    pub fn with_primary(primary: Arc<dyn PrimarySentimentModel>, config: ScorerConfig) -> Self {
        Self::build(Some(primary), config)
    }

    fn build(primary: Option<Arc<dyn PrimarySentimentModel>>, config: ScorerConfig) -> Self {
        let breaker = CircuitBreaker::new(
            config.breaker_failure_threshold,
            Duration::from_secs(config.breaker_cooldown_secs),
        );
        let cache = config.cache_enabled.then(|| {
            ScoreCache::with_capacity(config.prefer_cached_fallback, config.cache_max_entries)
        });
        let primary_pool = if primary.is_some() && config.primary_timeout_ms > 0 {
            build_primary_pool(config.primary_workers)
        } else {
            None
        };
        Self {
            primary,
            lexicon: LexiconScorer::new(),
            breaker,
            cache,
            primary_pool,
            in_flight: Arc::new(AtomicUsize::new(0)),
            config,
        }
    }

    pub fn with_lexicon(mut self, lexicon: LexiconScorer) -> Self {
        self.lexicon = lexicon;
        self
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn cache(&self) -> Option<&ScoreCache> {
        self.cache.as_ref()
    }

    /// Primary calls currently running, including timed-out ones.
    pub fn primary_in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn primary_version(&self) -> Option<&str> {
        self.primary.as_deref().map(|p| p.version())
    }

    /// The deterministic fallback score for a text.
    pub fn fallback_score(&self, text: &str) -> f64 {
        self.lexicon.score(text)
    }

    /// Whether a primary call would be attempted right now.
    pub fn primary_available(&self) -> bool {
        self.availability().is_ok()
    }

    fn availability(&self) -> Result<&Arc<dyn PrimarySentimentModel>, SentimentError> {
        if self.config.offline {
            return Err(SentimentError::Offline);
        }
        let primary = self.primary.as_ref().ok_or(SentimentError::NotLoaded)?;
        if !self.breaker.is_allowed() {
            return Err(SentimentError::CircuitOpen {
                remaining_ms: self.breaker.remaining_cooldown().as_millis() as u64,
            });
        }
        Ok(primary)
    }

    /// Score one document.
    pub fn score(&self, document: &TextDocument) -> SentimentScore {
        SentimentScore::new(document.timestamp, self.score_text(&document.text))
    }

    /// Score documents in parallel on the current rayon pool; output order
    /// equals input order.
    pub fn score_many(&self, documents: &[TextDocument]) -> Vec<SentimentScore> {
        documents.par_iter().map(|doc| self.score(doc)).collect()
    }

    /// Score raw text without a timestamp.
    pub fn score_text(&self, text: &str) -> Sentiment {
        if text.trim().is_empty() {
            return Sentiment::NEUTRAL;
        }

        let key = self
            .cache
            .as_ref()
            .map(|_| ContentKey::from_bytes(text.as_bytes()));
        let available = self.primary_available();
        if let (Some(cache), Some(key)) = (&self.cache, &key) {
            if let Some(hit) = cache.lookup(key, available) {
                return hit;
            }
        }

        let sentiment = match self.try_primary(text) {
            Ok(value) => Sentiment::Primary(value),
            Err(reason) => {
                if reason.is_call_failure() {
                    tracing::warn!(%reason, "primary sentiment failed, using lexicon fallback");
                } else {
                    tracing::debug!(%reason, "primary sentiment skipped, using lexicon fallback");
                }
                Sentiment::Fallback(self.lexicon.score(text))
            }
        };

        if let (Some(cache), Some(key)) = (&self.cache, key) {
            cache.insert(key, sentiment);
        }
        sentiment
    }

    fn try_primary(&self, text: &str) -> Result<f64, SentimentError> {
        let primary = self.availability()?;
        let outcome = self.call_with_deadline(primary, text);
        match &outcome {
            Ok(_) => self.breaker.record_success(),
            Err(e) if e.is_call_failure() => self.breaker.record_failure(),
            Err(_) => {}
        }
        outcome
    }

    fn call_with_deadline(
        &self,
        primary: &Arc<dyn PrimarySentimentModel>,
        text: &str,
    ) -> Result<f64, SentimentError> {
        let raw = if self.config.primary_timeout_ms == 0 {
            primary.infer(text)?
        } else {
            let pool = self
                .primary_pool
                .as_ref()
                .ok_or_else(|| SentimentError::Inference("primary worker pool unavailable".into()))?;
            let limit = self.config.primary_workers.max(1);
            let slot = InFlightSlot::acquire(&self.in_flight, limit)
                .ok_or(SentimentError::Saturated { limit })?;
            let (tx, rx) = mpsc::channel();
            let model = Arc::clone(primary);
            let owned = text.to_owned();
            // On timeout the job runs to completion on the pool; its send
            // fails silently and the slot is released when it returns.
            pool.spawn(move || {
                let _slot = slot;
                let _ = tx.send(model.infer(&owned));
            });
            let deadline = Duration::from_millis(self.config.primary_timeout_ms);
            match rx.recv_timeout(deadline) {
                Ok(result) => result?,
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    return Err(SentimentError::Timeout(self.config.primary_timeout_ms))
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => {
                    return Err(SentimentError::Inference("primary call panicked".into()))
                }
            }
        };
        if raw.is_finite() {
            Ok(raw.clamp(-1.0, 1.0))
        } else {
            Err(SentimentError::Inference(format!("non-finite score {raw}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::BreakerState;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        value: f64,
        calls: AtomicUsize,
    }

    impl Fixed {
        fn new(value: f64) -> Arc<Self> {
            Arc::new(Self {
                value,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl PrimarySentimentModel for Fixed {
        fn version(&self) -> &str {
            "fixed"
        }
        fn infer(&self, _text: &str) -> Result<f64, SentimentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.value)
        }
    }

    struct Failing;

    impl PrimarySentimentModel for Failing {
        fn version(&self) -> &str {
            "failing"
        }
        fn infer(&self, _text: &str) -> Result<f64, SentimentError> {
            Err(SentimentError::Inference("boom".into()))
        }
    }

    struct Slow;

    impl PrimarySentimentModel for Slow {
        fn version(&self) -> &str {
            "slow"
        }
        fn infer(&self, _text: &str) -> Result<f64, SentimentError> {
            std::thread::sleep(Duration::from_millis(200));
            Ok(0.9)
        }
    }

    /// Blocks every call until released.
    struct Held {
        released: std::sync::atomic::AtomicBool,
        started: AtomicUsize,
    }

    impl PrimarySentimentModel for Held {
        fn version(&self) -> &str {
            "held"
        }
        fn infer(&self, _text: &str) -> Result<f64, SentimentError> {
            self.started.fetch_add(1, Ordering::SeqCst);
            while !self.released.load(Ordering::SeqCst) {
                std::thread::sleep(Duration::from_millis(5));
            }
            Ok(0.5)
        }
    }

    fn doc(text: &str) -> TextDocument {
        TextDocument::new(DateTime::<Utc>::from_timestamp(0, 0).unwrap(), "test", text)
    }

    fn inline() -> ScorerConfig {
        ScorerConfig {
            primary_timeout_ms: 0,
            ..ScorerConfig::default()
        }
    }

    #[test]
    fn blank_text_is_neutral_fallback_and_skips_primary() {
        let primary = Fixed::new(0.7);
        let scorer = SentimentScorer::with_primary(primary.clone(), inline());
        let s = scorer.score(&doc("   \n"));
        assert_eq!(s.sentiment, Sentiment::Fallback(0.0));
        assert_eq!(primary.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn primary_result_is_tagged_primary() {
        let scorer = SentimentScorer::with_primary(Fixed::new(0.7), inline());
        assert_eq!(scorer.score(&doc("anything")).sentiment, Sentiment::Primary(0.7));
    }

    #[test]
    fn primary_output_is_clamped() {
        let scorer = SentimentScorer::with_primary(Fixed::new(3.0), inline());
        assert_eq!(scorer.score_text("x"), Sentiment::Primary(1.0));
    }

    #[test]
    fn no_primary_means_fallback() {
        let scorer = SentimentScorer::fallback_only(inline());
        let s = scorer.score(&doc("Shares surge"));
        assert!(s.sentiment.is_fallback());
        assert_eq!(s.value(), scorer.fallback_score("Shares surge"));
    }

    #[test]
    fn offline_mode_skips_primary() {
        let primary = Fixed::new(0.7);
        let config = ScorerConfig {
            offline: true,
            ..inline()
        };
        let scorer = SentimentScorer::with_primary(primary.clone(), config);
        assert!(scorer.score(&doc("Shares surge")).sentiment.is_fallback());
        assert_eq!(primary.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn failures_trip_breaker() {
        let config = ScorerConfig {
            cache_enabled: false,
            ..inline()
        };
        let scorer = SentimentScorer::with_primary(Arc::new(Failing), config);
        for i in 0..3 {
            assert!(scorer.score_text(&format!("text {i}")).is_fallback());
        }
        assert!(!scorer.primary_available());
    }

    #[test]
    fn timeout_falls_back() {
        let config = ScorerConfig {
            primary_timeout_ms: 20,
            ..ScorerConfig::default()
        };
        let scorer = SentimentScorer::with_primary(Arc::new(Slow), config);
        let s = scorer.score_text("Shares surge");
        assert_eq!(s, Sentiment::Fallback(scorer.fallback_score("Shares surge")));
    }

    #[test]
    fn hung_primary_holds_at_most_worker_count_calls() {
        let held = Arc::new(Held {
            released: std::sync::atomic::AtomicBool::new(false),
            started: AtomicUsize::new(0),
        });
        let config = ScorerConfig {
            primary_timeout_ms: 100,
            primary_workers: 2,
            breaker_failure_threshold: 1_000,
            breaker_cooldown_secs: 0,
            cache_enabled: false,
            ..ScorerConfig::default()
        };
        let scorer = SentimentScorer::with_primary(held.clone(), config);

        let docs: Vec<_> = (0..60).map(|i| doc(&format!("headline {i}"))).collect();
        let scores = scorer.score_many(&docs);
        assert!(scores.iter().all(|s| s.sentiment.is_fallback()));
        assert!(held.started.load(Ordering::SeqCst) <= 2);
        assert!(scorer.primary_in_flight() <= 2);
        assert_eq!(scorer.breaker().state(), BreakerState::Closed);

        held.released.store(true, Ordering::SeqCst);
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while scorer.primary_in_flight() > 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(scorer.primary_in_flight(), 0);
        assert_eq!(scorer.score_text("fresh headline"), Sentiment::Primary(0.5));
    }

    #[test]
    fn in_flight_slots_are_capped_and_released() {
        let counter = Arc::new(AtomicUsize::new(0));
        let a = InFlightSlot::acquire(&counter, 2).unwrap();
        let b = InFlightSlot::acquire(&counter, 2).unwrap();
        assert!(InFlightSlot::acquire(&counter, 2).is_none());
        drop(a);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        let _c = InFlightSlot::acquire(&counter, 2).unwrap();
        drop(b);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cached_primary_skips_second_call() {
        let primary = Fixed::new(0.4);
        let scorer = SentimentScorer::with_primary(primary.clone(), inline());
        scorer.score_text("same text");
        scorer.score_text("same text");
        assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cache_respects_configured_capacity() {
        let config = ScorerConfig {
            cache_max_entries: 2,
            ..inline()
        };
        let scorer = SentimentScorer::fallback_only(config);
        for text in ["surge", "plunge", "rally", "crash", "beat"] {
            scorer.score_text(text);
        }
        let cache = scorer.cache().unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.max_entries(), Some(2));
    }

    #[test]
    fn score_many_preserves_order() {
        let scorer = SentimentScorer::fallback_only(inline());
        let docs: Vec<_> = ["surge", "plunge", "", "rally", "crash"]
            .iter()
            .map(|t| doc(t))
            .collect();
        let scores = scorer.score_many(&docs);
        let expected: Vec<_> = docs.iter().map(|d| scorer.score(d)).collect();
        assert_eq!(scores, expected);
        assert!(scores[0].value() > 0.0);
        assert!(scores[1].value() < 0.0);
        assert_eq!(scores[2].value(), 0.0);
    }
}
