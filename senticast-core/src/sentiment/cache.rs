//! In-memory score cache keyed by document content hash.
//!
//! A cached `Primary` result is always served. A cached `Fallback` result is
//! served only when the primary is currently unavailable, or when the cache
//! prefers cached fallbacks; otherwise the primary is retried and a primary
//! success replaces the entry.
//!
//! With a capacity set, inserting a new key into a full cache evicts the
//! oldest inserted key first.

use crate::domain::{ContentKey, Sentiment};
use std::collections::{HashMap, VecDeque};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Entries {
    map: HashMap<ContentKey, Sentiment>,
    order: VecDeque<ContentKey>,
}

#[derive(Debug, Default)]
pub struct ScoreCache {
    entries: RwLock<Entries>,
    prefer_cached_fallback: bool,
    /// 0 means unbounded.
    max_entries: usize,
}

impl ScoreCache {
    /// Unbounded cache.
    pub fn new(prefer_cached_fallback: bool) -> Self {
        Self::with_capacity(prefer_cached_fallback, 0)
    }

    pub fn with_capacity(prefer_cached_fallback: bool, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(Entries::default()),
            prefer_cached_fallback,
            max_entries,
        }
    }

    pub fn max_entries(&self) -> Option<usize> {
        (self.max_entries > 0).then_some(self.max_entries)
    }

    fn read(&self) -> RwLockReadGuard<'_, Entries> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Entries> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &ContentKey) -> Option<Sentiment> {
        self.read().map.get(key).copied()
    }

    /// Cached value to serve given the primary's current availability, if any.
    pub fn lookup(&self, key: &ContentKey, primary_available: bool) -> Option<Sentiment> {
        match self.get(key)? {
            hit @ Sentiment::Primary(_) => Some(hit),
            hit @ Sentiment::Fallback(_) => {
                (!primary_available || self.prefer_cached_fallback).then_some(hit)
            }
        }
    }

    /// Store a result. A primary entry is never downgraded to a fallback one.
    pub fn insert(&self, key: ContentKey, sentiment: Sentiment) {
        let mut entries = self.write();
        let existing = entries.map.get(&key).copied();
        match (existing, sentiment) {
            (Some(Sentiment::Primary(_)), Sentiment::Fallback(_)) => {}
            (Some(_), _) => {
                entries.map.insert(key, sentiment);
            }
            (None, _) => {
                if self.max_entries > 0 {
                    while entries.map.len() >= self.max_entries {
                        let Some(oldest) = entries.order.pop_front() else {
                            break;
                        };
                        entries.map.remove(&oldest);
                    }
                }
                entries.order.push_back(key.clone());
                entries.map.insert(key, sentiment);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.read().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut entries = self.write();
        entries.map.clear();
        entries.order.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(text: &str) -> ContentKey {
        ContentKey::from_bytes(text.as_bytes())
    }

    #[test]
    fn primary_hit_always_served() {
        let cache = ScoreCache::new(false);
        cache.insert(key("a"), Sentiment::Primary(0.3));
        assert_eq!(cache.lookup(&key("a"), true), Some(Sentiment::Primary(0.3)));
        assert_eq!(cache.lookup(&key("a"), false), Some(Sentiment::Primary(0.3)));
    }

    #[test]
    fn fallback_hit_not_served_when_primary_available() {
        let cache = ScoreCache::new(false);
        cache.insert(key("a"), Sentiment::Fallback(0.1));
        assert_eq!(cache.lookup(&key("a"), true), None);
        assert_eq!(cache.lookup(&key("a"), false), Some(Sentiment::Fallback(0.1)));
    }

    #[test]
    fn prefer_cached_fallback_serves_it() {
        let cache = ScoreCache::new(true);
        cache.insert(key("a"), Sentiment::Fallback(0.1));
        assert_eq!(cache.lookup(&key("a"), true), Some(Sentiment::Fallback(0.1)));
    }

    #[test]
    fn primary_replaces_fallback_but_not_vice_versa() {
        let cache = ScoreCache::new(false);
        cache.insert(key("a"), Sentiment::Fallback(0.1));
        cache.insert(key("a"), Sentiment::Primary(0.5));
        assert_eq!(cache.get(&key("a")), Some(Sentiment::Primary(0.5)));
        cache.insert(key("a"), Sentiment::Fallback(0.2));
        assert_eq!(cache.get(&key("a")), Some(Sentiment::Primary(0.5)));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn full_cache_evicts_oldest_key() {
        let cache = ScoreCache::with_capacity(false, 3);
        assert_eq!(cache.max_entries(), Some(3));
        for (i, text) in ["a", "b", "c"].iter().enumerate() {
            cache.insert(key(text), Sentiment::Fallback(i as f64 / 10.0));
        }
        // Upgrading an existing key neither grows the cache nor reorders it.
        cache.insert(key("a"), Sentiment::Primary(0.9));
        assert_eq!(cache.len(), 3);

        cache.insert(key("d"), Sentiment::Primary(0.4));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&key("a")), None);
        assert_eq!(cache.get(&key("b")), Some(Sentiment::Fallback(0.1)));
        assert_eq!(cache.get(&key("d")), Some(Sentiment::Primary(0.4)));

        for i in 0..100 {
            cache.insert(key(&format!("stream {i}")), Sentiment::Fallback(0.0));
        }
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&key("stream 99")), Some(Sentiment::Fallback(0.0)));
        assert_eq!(cache.get(&key("stream 96")), None);
    }

    #[test]
    fn zero_capacity_is_unbounded() {
        let cache = ScoreCache::new(false);
        assert_eq!(cache.max_entries(), None);
        for i in 0..500 {
            cache.insert(key(&format!("{i}")), Sentiment::Fallback(0.0));
        }
        assert_eq!(cache.len(), 500);
    }
}
