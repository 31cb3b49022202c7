//! The cache engine: a fixed array of segments plus the background GC and
//! snapshot loops.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::time::{self, Duration};
use tracing::{debug, info};

use crate::{
    cache::{options::CacheOptions, segment::Segment, status::Status},
    error::Result,
};

/// Deterministic polynomial hash of `key`'s bytes: `h = 31*h + b`.
///
/// Used only for segment routing. The ring in `cluster::ring` uses a
/// different hash (xxh3) — nothing requires the two to agree.
fn segment_hash(key: &str) -> u64 {
    let mut h: u64 = 0;
    for b in key.as_bytes() {
        h = h.wrapping_mul(31).wrapping_add(*b as u64);
    }
    h
}

/// The segmented, in-memory cache.
///
/// Every public operation waits on the `dumping` gate before touching a
/// segment: while a snapshot is in flight, callers spin rather than race
/// the serializer.
pub struct CacheEngine {
    segments: Vec<Segment>,
    options: Arc<CacheOptions>,
    dumping: AtomicBool,
}

impl CacheEngine {
    /// Builds an empty engine with `options.segment_count` fresh segments.
    ///
    /// `segment_count` must be a power of two; callers are expected to
    /// validate this at configuration time (see `config.rs`).
    pub fn new(options: CacheOptions) -> Arc<Self> {
        let options = Arc::new(options);
        let segments = (0..options.segment_count)
            .map(|_| Segment::new(options.clone()))
            .collect();
        let engine = Arc::new(Self {
            segments,
            options,
            dumping: AtomicBool::new(false),
        });
        engine.clone().spawn_background_loops();
        engine
    }

    /// Restores an engine from segment snapshots taken by a prior process.
    ///
    /// Used by `cache::snapshot::restore`; does not itself read any file.
    pub(crate) fn from_segments(segments: Vec<Segment>, options: Arc<CacheOptions>) -> Arc<Self> {
        let engine = Arc::new(Self {
            segments,
            options,
            dumping: AtomicBool::new(false),
        });
        engine.clone().spawn_background_loops();
        engine
    }

    fn spawn_background_loops(self: Arc<Self>) {
        let gc = self.clone();
        tokio::spawn(async move { gc.gc_loop().await });

        let snapshot = self.clone();
        tokio::spawn(async move { snapshot.snapshot_loop().await });
    }

    fn segment_for(&self, key: &str) -> &Segment {
        let mask = self.segments.len() as u64 - 1;
        let index = segment_hash(key) & mask;
        &self.segments[index as usize]
    }

    /// Spin-waits on the snapshot gate, sleeping `cas_sleep_micros` per spin.
    async fn wait_for_dumping(&self) {
        while self.dumping.load(Ordering::Acquire) {
            time::sleep(Duration::from_micros(self.options.cas_sleep_micros)).await;
        }
    }

    /// Reads `key`, returning its payload if present and alive.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.wait_for_dumping().await;
        self.segment_for(key).get(key)
    }

    /// Inserts or overwrites `key` with `ttl_seconds` (0 = never expires).
    pub async fn set(&self, key: &str, payload: &[u8], ttl_seconds: u64) -> Result<()> {
        self.wait_for_dumping().await;
        self.segment_for(key).set(key, payload, ttl_seconds)
    }

    /// Removes `key` if present.
    pub async fn delete(&self, key: &str) {
        self.wait_for_dumping().await;
        self.segment_for(key).delete(key);
    }

    /// Sums every segment's status into one aggregate.
    pub async fn status(&self) -> Status {
        self.wait_for_dumping().await;
        self.segments
            .iter()
            .map(Segment::status)
            .fold(Status::default(), std::ops::Add::add)
    }

    /// This engine's configuration.
    pub fn options(&self) -> &Arc<CacheOptions> {
        &self.options
    }

    pub(crate) fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub(crate) fn dumping_flag(&self) -> &AtomicBool {
        &self.dumping
    }

    async fn gc_loop(self: Arc<Self>) {
        let period = Duration::from_secs(self.options.gc_duration_minutes * 60);
        loop {
            time::sleep(period).await;
            self.wait_for_dumping().await;
            debug!("running gc across {} segments", self.segments.len());
            let handles: Vec<_> = self
                .segments
                .iter()
                .map(|_| ())
                .enumerate()
                .map(|(i, ())| {
                    let this = self.clone();
                    tokio::task::spawn_blocking(move || this.segments[i].gc())
                })
                .collect();
            for handle in handles {
                let _ = handle.await;
            }
        }
    }

    async fn snapshot_loop(self: Arc<Self>) {
        let period = Duration::from_secs(self.options.dump_duration_minutes * 60);
        loop {
            time::sleep(period).await;
            if let Err(err) = crate::cache::snapshot::dump(&self).await {
                tracing::warn!("background snapshot failed: {err}");
            } else {
                info!("wrote snapshot to {}", self.options.dump_file);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> CacheOptions {
        let mut o = CacheOptions::default();
        o.segment_count = 4;
        o.max_entry_bytes = 1024 * 1024;
        o
    }

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let engine = CacheEngine::new(options());
        engine.set("a", b"1", 0).await.unwrap();
        engine.set("b", b"2", 0).await.unwrap();
        assert_eq!(engine.get("a").await, Some(b"1".to_vec()));
        assert_eq!(engine.get("b").await, Some(b"2".to_vec()));
        assert_eq!(engine.get("missing").await, None);
    }

    #[tokio::test]
    async fn status_sums_every_segment() {
        let engine = CacheEngine::new(options());
        for i in 0..10 {
            engine.set(&format!("k{i}"), b"v", 0).await.unwrap();
        }
        assert_eq!(engine.status().await.count, 10);
    }

    #[tokio::test]
    async fn delete_removes_entry() {
        let engine = CacheEngine::new(options());
        engine.set("k", b"v", 0).await.unwrap();
        engine.delete("k").await;
        assert_eq!(engine.get("k").await, None);
    }

    #[test]
    fn segment_hash_is_deterministic() {
        assert_eq!(segment_hash("abc"), segment_hash("abc"));
        assert_ne!(segment_hash("abc"), segment_hash("abd"));
    }
}
