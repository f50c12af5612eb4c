//! Cache manager implementation
//!
//! In-memory TTL cache for pages and single records. Expiry is lazy: a stale
//! entry is only removed when a read touches it.
//!
//! Every invalidation bumps a generation counter. A reader that records the
//! generation before going to the network and stores with
//! [`CacheManager::put_if_unchanged`] cannot put back a value that a write
//! invalidated while the request was in flight.

use super::fingerprint::Fingerprint;
use crate::pagination::Page;
use crate::types::Record;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Something the cache can hold
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    /// One page of a collection
    Page(Page),
    /// One resource
    Record(Record),
}

impl CacheValue {
    /// Get the page, if this is one
    pub fn into_page(self) -> Option<Page> {
        match self {
            Self::Page(page) => Some(page),
            Self::Record(_) => None,
        }
    }

    /// Get the record, if this is one
    pub fn into_record(self) -> Option<Record> {
        match self {
            Self::Record(record) => Some(record),
            Self::Page(_) => None,
        }
    }
}

impl From<Page> for CacheValue {
    fn from(page: Page) -> Self {
        Self::Page(page)
    }
}

impl From<Record> for CacheValue {
    fn from(record: Record) -> Self {
        Self::Record(record)
    }
}

/// A stored value with its freshness window
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: Fingerprint,
    pub value: CacheValue,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl CacheEntry {
    /// Stale once strictly more than `ttl` has elapsed
    pub fn is_stale(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) > self.ttl
    }
}

/// Hit/miss counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// `hits / (hits + misses)`, or 0 before any lookup
    pub hit_rate: f64,
}

/// TTL cache shared by every clone of a client
#[derive(Debug)]
pub struct CacheManager {
    entries: RwLock<HashMap<Fingerprint, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    generation: AtomicU64,
    default_ttl: Duration,
    enabled: bool,
}

impl CacheManager {
    /// Create a cache whose entries live for `default_ttl` unless told otherwise
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            generation: AtomicU64::new(0),
            default_ttl,
            enabled: true,
        }
    }

    /// Create a pass-through cache: nothing is stored, every lookup misses
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::new(Duration::ZERO)
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Look up a fresh value, counting a hit or a miss
    pub async fn get(&self, key: &Fingerprint) -> Option<CacheValue> {
        if !self.enabled {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let now = Instant::now();
        let stale = {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if !entry.is_stale(now) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    debug!("Cache hit: {}", key);
                    return Some(entry.value.clone());
                }
                Some(_) => true,
                None => false,
            }
        };

        if stale {
            let mut entries = self.entries.write().await;
            // a writer may have refreshed it between the two locks
            if entries.get(key).is_some_and(|e| e.is_stale(now)) {
                entries.remove(key);
                debug!("Cache entry expired: {}", key);
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!("Cache miss: {}", key);
        None
    }

    /// Store a value for `ttl`, replacing any previous entry
    pub async fn put(&self, key: Fingerprint, value: impl Into<CacheValue>, ttl: Duration) {
        if !self.enabled {
            return;
        }
        let entry = CacheEntry {
            key: key.clone(),
            value: value.into(),
            stored_at: Instant::now(),
            ttl,
        };
        self.entries.write().await.insert(key, entry);
    }

    /// Store a value for the default TTL
    pub async fn put_default(&self, key: Fingerprint, value: impl Into<CacheValue>) {
        self.put(key, value, self.default_ttl).await;
    }

    /// Invalidation generation, to be read before fetching a value that
    /// will be stored with [`put_if_unchanged`](Self::put_if_unchanged)
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Store a value for the default TTL unless an invalidation ran since
    /// `generation` was read; returns whether it was stored
    pub async fn put_if_unchanged(
        &self,
        key: Fingerprint,
        value: impl Into<CacheValue>,
        generation: u64,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        let mut entries = self.entries.write().await;
        // invalidations bump the counter while holding this lock
        if self.generation.load(Ordering::Acquire) != generation {
            debug!("Discarding value invalidated in flight: {}", key);
            return false;
        }
        let entry = CacheEntry {
            key: key.clone(),
            value: value.into(),
            stored_at: Instant::now(),
            ttl: self.default_ttl,
        };
        entries.insert(key, entry);
        true
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Drop one entry; returns whether it existed
    pub async fn invalidate(&self, key: &Fingerprint) -> bool {
        let removed = {
            let mut entries = self.entries.write().await;
            self.bump_generation();
            entries.remove(key).is_some()
        };
        if removed {
            debug!("Invalidated cache entry {}", key);
        }
        removed
    }

    /// Drop every entry under `prefix`; returns how many were removed
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.write().await;
        self.bump_generation();
        let before = entries.len();
        entries.retain(|key, _| !key.belongs_to(prefix));
        let removed = before - entries.len();
        debug!("Invalidated {} cache entries under '{}'", removed, prefix);
        removed
    }

    /// Remove entries that are already stale; returns how many were removed
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_stale(now));
        before - entries.len()
    }

    /// Drop everything; counters are kept
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        self.bump_generation();
        entries.clear();
    }

    /// Number of stored entries, stale ones included
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Current hit/miss counters
    pub fn get_stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        CacheStats {
            hits,
            misses,
            hit_rate: if total == 0 {
                0.0
            } else {
                hits as f64 / total as f64
            },
        }
    }
}
