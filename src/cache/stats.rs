//! Cache Statistics Module
//!
//! Tracks lookup hits and misses, expirations and dropped hook deliveries.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time copy of the cache counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Lookups that returned a live value
    pub hits: u64,
    /// Lookups on missing or expired keys
    pub misses: u64,
    /// Entries removed because they expired
    pub expirations: u64,
    /// Expired keys that could not be queued for the hook
    pub hook_drops: u64,
    /// Live key count as reported by `len`
    pub len: usize,
    /// Entries physically held, including expired ones not yet evicted
    pub stored: usize,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Stats Recorder ==
/// Lock-free counters shared by every cache operation.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
    hook_drops: AtomicU64,
}

impl StatsRecorder {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hook_drop(&self) {
        self.hook_drops.fetch_add(1, Ordering::Relaxed);
    }

    /// Copies the counters, filling in the size figures supplied by the cache.
    pub fn snapshot(&self, len: usize, stored: usize) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
            hook_drops: self.hook_drops.load(Ordering::Relaxed),
            len,
            stored,
        }
    }
}
