//! Short-lived lookup cache.
//!
//! The service only talks to [`LookupCache`], so the in-memory map below can
//! be swapped for another store without touching lookup logic. Freshness is
//! judged by the caller against its own [`Clock`]; the store just keeps the
//! insertion timestamp.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;

use crate::video::VideoSummary;

/// Source of "now" for cache timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedValue {
    Videos(Vec<VideoSummary>),
    Video(VideoSummary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub value: CachedValue,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(value: CachedValue, stored_at: DateTime<Utc>) -> Self {
        Self { value, stored_at }
    }

    /// Valid strictly while `now - stored_at < ttl`.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: TimeDelta) -> bool {
        now.signed_duration_since(self.stored_at) < ttl
    }
}

pub trait LookupCache: Send + Sync {
    fn get(&self, key: &str) -> Option<CacheEntry>;
    fn set(&self, key: String, entry: CacheEntry);
}

/// Process-local cache guarded by a `parking_lot` lock. Reads run in
/// parallel; writes are single map operations.
///
/// Bounded by `max_entries`: inserting a new key into a full cache drops the
/// entry with the oldest `stored_at` first.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    max_entries: usize,
}

impl MemoryCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drops every entry that is no longer fresh at `now`. Returns how many
    /// were removed.
    pub fn purge_expired(&self, now: DateTime<Utc>, ttl: TimeDelta) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now, ttl));
        before - entries.len()
    }
}

impl LookupCache for MemoryCache {
    fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries.read().get(key).cloned()
    }

    fn set(&self, key: String, entry: CacheEntry) {
        let mut entries = self.entries.write();
        if !entries.contains_key(&key) && entries.len() >= self.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
            }
        }
        entries.insert(key, entry);
    }
}
