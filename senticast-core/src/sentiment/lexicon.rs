//! Deterministic lexicon scorer used as the sentiment fallback.
//!
//! Each token is looked up in a financial word list (valence roughly in
//! [-3, 3]). An intensifier multiplies the next sentiment word, and only the
//! most recent intensifier before that word counts; a negator flips the next
//! sentiment word found within `NEGATION_SCOPE` tokens. The summed valence is
//! squashed into [-1, 1] with `x / sqrt(x^2 + alpha)`.

use super::tokenize;
use std::collections::HashMap;

/// Normalisation constant for the valence sum.
pub const NORMALIZATION_ALPHA: f64 = 15.0;

/// Number of tokens a negator stays armed for.
const NEGATION_SCOPE: usize = 3;

const POSITIVE_WORDS: &[(&str, f64)] = &[
    ("gain", 1.8),
    ("gains", 1.8),
    ("rally", 2.2),
    ("rallies", 2.2),
    ("rallied", 2.2),
    ("surge", 2.5),
    ("surges", 2.5),
    ("surged", 2.5),
    ("soar", 2.7),
    ("soars", 2.7),
    ("soared", 2.7),
    ("jump", 1.8),
    ("jumps", 1.8),
    ("climb", 1.5),
    ("climbs", 1.5),
    ("rise", 1.3),
    ("rises", 1.3),
    ("rose", 1.3),
    ("up", 0.8),
    ("higher", 1.2),
    ("beat", 2.0),
    ("beats", 2.0),
    ("outperform", 2.2),
    ("outperforms", 2.2),
    ("upgrade", 2.0),
    ("upgraded", 2.0),
    ("bullish", 2.6),
    ("strong", 1.8),
    ("stronger", 1.9),
    ("record", 1.5),
    ("profit", 1.7),
    ("profits", 1.7),
    ("profitable", 1.9),
    ("growth", 1.6),
    ("boost", 1.7),
    ("boosts", 1.7),
    ("optimism", 2.0),
    ("optimistic", 2.0),
    ("recovery", 1.6),
    ("rebound", 1.6),
    ("breakthrough", 2.3),
    ("upbeat", 1.9),
    ("positive", 1.6),
    ("good", 1.5),
    ("great", 2.2),
    ("success", 2.0),
    ("win", 1.8),
    ("wins", 1.8),
    ("approval", 1.6),
    ("approved", 1.6),
    ("dividend", 1.0),
    ("buyback", 1.2),
    ("opportunity", 1.3),
    ("partnership", 1.1),
];

const NEGATIVE_WORDS: &[(&str, f64)] = &[
    ("loss", -1.8),
    ("losses", -1.8),
    ("fall", -1.5),
    ("falls", -1.5),
    ("fell", -1.5),
    ("drop", -1.6),
    ("drops", -1.6),
    ("dropped", -1.6),
    ("decline", -1.6),
    ("declines", -1.6),
    ("down", -0.8),
    ("lower", -1.2),
    ("slump", -2.2),
    ("slumps", -2.2),
    ("plunge", -2.7),
    ("plunges", -2.7),
    ("plunged", -2.7),
    ("crash", -3.0),
    ("crashes", -3.0),
    ("collapse", -2.9),
    ("collapses", -2.9),
    ("tumble", -2.3),
    ("tumbles", -2.3),
    ("miss", -1.9),
    ("misses", -1.9),
    ("missed", -1.9),
    ("downgrade", -2.0),
    ("downgraded", -2.0),
    ("bearish", -2.6),
    ("weak", -1.7),
    ("weaker", -1.8),
    ("sell-off", -2.3),
    ("selloff", -2.3),
    ("lawsuit", -1.9),
    ("fraud", -2.9),
    ("scandal", -2.5),
    ("bankruptcy", -3.0),
    ("default", -2.4),
    ("recession", -2.5),
    ("layoffs", -2.0),
    ("warning", -1.7),
    ("warns", -1.7),
    ("risk", -1.0),
    ("fear", -2.0),
    ("fears", -2.0),
    ("panic", -2.5),
    ("uncertainty", -1.4),
    ("volatile", -1.0),
    ("negative", -1.6),
    ("bad", -1.8),
    ("poor", -1.8),
    ("fail", -2.1),
    ("fails", -2.1),
    ("failed", -2.1),
    ("probe", -1.3),
    ("investigation", -1.4),
    ("hack", -2.4),
    ("breach", -2.2),
];

const NEGATORS: &[&str] = &[
    "not", "no", "never", "without", "nor", "neither", "cannot", "hardly",
];

const INTENSIFIERS: &[(&str, f64)] = &[
    ("very", 1.5),
    ("extremely", 1.8),
    ("highly", 1.5),
    ("strongly", 1.5),
    ("sharply", 1.6),
    ("significantly", 1.4),
    ("hugely", 1.7),
    ("massive", 1.6),
    ("slightly", 0.5),
    ("somewhat", 0.7),
    ("marginally", 0.5),
    ("modestly", 0.7),
];

/// Pure function of the text: no state, no I/O, no randomness.
#[derive(Debug, Clone)]
pub struct LexiconScorer {
    words: HashMap<String, f64>,
    intensifiers: HashMap<String, f64>,
}

impl LexiconScorer {
    pub fn new() -> Self {
        let words = POSITIVE_WORDS
            .iter()
            .chain(NEGATIVE_WORDS)
            .map(|(w, v)| (w.to_string(), *v))
            .collect();
        let intensifiers = INTENSIFIERS
            .iter()
            .map(|(w, m)| (w.to_string(), *m))
            .collect();
        Self {
            words,
            intensifiers,
        }
    }

    /// Add or override word valences. Non-finite valences are skipped.
    pub fn with_words<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        for (word, valence) in extra {
            let word = word.into().to_lowercase();
            if !valence.is_finite() {
                tracing::warn!(%word, valence, "ignoring non-finite lexicon valence");
                continue;
            }
            self.words.insert(word, valence);
        }
        self
    }

    /// Raw valence sum before normalisation.
    pub fn valence(&self, text: &str) -> f64 {
        let mut total = 0.0;
        let mut negation_left = 0usize;
        let mut multiplier = 1.0;

        for token in tokenize(text) {
            if is_negator(&token) {
                negation_left = NEGATION_SCOPE;
                continue;
            }
            if let Some(&m) = self.intensifiers.get(&token) {
                multiplier = m;
                continue;
            }
            match self.words.get(&token) {
                Some(&valence) => {
                    let mut v = valence * multiplier;
                    if negation_left > 0 {
                        v = -v;
                        negation_left = 0;
                    }
                    total += v;
                }
                None => {
                    negation_left = negation_left.saturating_sub(1);
                }
            }
            multiplier = 1.0;
        }
        total
    }

    /// Score in [-1, 1].
    pub fn score(&self, text: &str) -> f64 {
        normalize(self.valence(text))
    }
}

impl Default for LexiconScorer {
    fn default() -> Self {
        Self::new()
    }
}

fn is_negator(token: &str) -> bool {
    NEGATORS.contains(&token) || token.ends_with("n't")
}

/// Squash an unbounded valence sum into [-1, 1].
///
/// Written as `sign(x) / sqrt(1 + alpha / x^2)` so huge sums saturate at ±1
/// instead of overflowing. NaN maps to 0.
pub fn normalize(x: f64) -> f64 {
    if x == 0.0 || x.is_nan() {
        return 0.0;
    }
    if x.is_infinite() {
        return x.signum();
    }
    (x.signum() / (1.0 + NORMALIZATION_ALPHA / (x * x)).sqrt()).clamp(-1.0, 1.0)
}
