//! Engine-wide, read-only configuration, shared by every segment.
//!
//! Treated as immutable after construction — segments hold an
//! `Arc<CacheOptions>` rather than copying it.

use serde::{Deserialize, Serialize};

/// Configuration shared by the cache engine and all of its segments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheOptions {
    /// Maximum total key+value bytes across the whole engine, in bytes.
    ///
    /// The CLI flag is named and parsed in gigabytes and converted here
    /// with `* 1024 * 1024 * 1024` (true GB).
    pub max_entry_bytes: i64,

    /// Number of segments; must be a power of two.
    pub segment_count: usize,

    /// Initial capacity hint for each segment's entry map.
    pub map_size_of_segment: usize,

    /// Max number of expired entries a single `gc()` pass deletes per segment.
    pub max_gc_count: usize,

    /// Minutes between background GC sweeps.
    pub gc_duration_minutes: u64,

    /// Minutes between background snapshot writes.
    pub dump_duration_minutes: u64,

    /// Path of the snapshot file.
    pub dump_file: String,

    /// Microseconds to sleep between spins while the snapshot gate is held.
    pub cas_sleep_micros: u64,
}

impl CacheOptions {
    /// Per-segment capacity limit, in bytes: `max_entry_bytes / segment_count`.
    pub fn max_entry_size_per_segment(&self) -> i64 {
        self.max_entry_bytes / self.segment_count as i64
    }
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            max_entry_bytes: 4 * 1024 * 1024 * 1024,
            segment_count: 1024,
            map_size_of_segment: 256,
            max_gc_count: 1000,
            gc_duration_minutes: 60,
            dump_duration_minutes: 30,
            dump_file: "kafo.dump".to_string(),
            cas_sleep_micros: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_segment_cap_divides_evenly() {
        let mut o = CacheOptions::default();
        o.max_entry_bytes = 1024;
        o.segment_count = 4;
        assert_eq!(o.max_entry_size_per_segment(), 256);
    }
}
