//! Cache Statistics Module
//!
//! Counts how requests were resolved by the caching protocol.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Served from disk without contacting the origin
    pub hits: u64,
    /// Served from disk after the origin answered 304
    pub revalidated: u64,
    /// Fresh 200/206 bodies fetched from the origin
    pub misses: u64,
    /// Fresh bodies identical to the stored digest
    pub unchanged: u64,
    /// Requests forwarded without entering the cache
    pub bypassed: u64,
    /// Entries whose stored URL didn't match the request
    pub collisions: u64,
    /// Entries deleted by eviction sweeps
    pub evictions: u64,
    /// Entry files on disk when the snapshot was taken
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Share of cacheable requests answered with the stored body.
    ///
    /// Returns (hits + revalidated) / (hits + revalidated + misses), or 0.0 if
    /// no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let served = self.hits + self.revalidated;
        let total = served + self.misses;
        if total == 0 {
            0.0
        } else {
            served as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_revalidated(&mut self) {
        self.revalidated += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_unchanged(&mut self) {
        self.unchanged += 1;
    }

    pub fn record_bypass(&mut self) {
        self.bypassed += 1;
    }

    pub fn record_collision(&mut self) {
        self.collisions += 1;
    }

    // == Record Evictions ==
    /// Adds the entries removed by one sweep.
    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    // == Update Entry Count ==
    /// Updates the total entries count.
    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }
}
