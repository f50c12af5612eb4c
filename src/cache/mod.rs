//! Response cache module
//!
//! Keeps fetched pages and single records in memory for a TTL so repeated
//! reads do not spend rate budget.
//!
//! # Overview
//!
//! The cache module provides:
//! - `Fingerprint` - Key derived from endpoint, normalized parameters and page
//! - `CacheManager` - TTL store with lazy expiry and hit/miss counters
//! - Invalidation by key and by endpoint prefix

mod fingerprint;
mod manager;

pub use fingerprint::Fingerprint;
pub use manager::{CacheEntry, CacheManager, CacheStats, CacheValue};
