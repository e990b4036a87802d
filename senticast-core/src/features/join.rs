//! Nearest-preceding sentiment join.
//!
//! Each bar takes the most recent score with timestamp at or before the bar's
//! timestamp. Scores are stably sorted first, so among scores sharing a
//! timestamp the one given last wins. Bars with no preceding score get the
//! neutral fallback.

use crate::domain::{Sentiment, SentimentScore};
use chrono::{DateTime, Utc};

pub fn join_nearest_preceding(
    bar_timestamps: &[DateTime<Utc>],
    scores: &[SentimentScore],
) -> Vec<Sentiment> {
    let mut sorted: Vec<&SentimentScore> = scores.iter().collect();
    sorted.sort_by_key(|s| s.timestamp);

    let mut joined = Vec::with_capacity(bar_timestamps.len());
    let mut cursor = 0usize;
    let mut current = Sentiment::NEUTRAL;
    for ts in bar_timestamps {
        while cursor < sorted.len() && sorted[cursor].timestamp <= *ts {
            current = sorted[cursor].sentiment;
            cursor += 1;
        }
        joined.push(current);
    }
    joined
}
