//! Atomic snapshot/restore of a [`CacheEngine`] to disk.
//!
//! Grounded on `caches/dump.go`: encode everything needed to rebuild the
//! engine, write to a sibling temp file, then rename into place so a
//! reader never observes a half-written snapshot.

use std::sync::{atomic::Ordering, Arc};

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::{
    cache::{
        engine::CacheEngine,
        options::CacheOptions,
        segment::{Segment, SegmentSnapshot},
    },
    error::{KafoError, Result},
};

#[derive(Serialize, Deserialize)]
struct Dump {
    segment_count: usize,
    options: CacheOptions,
    segments: Vec<SegmentSnapshot>,
}

fn to_io_err(err: impl std::fmt::Display) -> KafoError {
    KafoError::Snapshot(err.to_string())
}

/// Serializes `engine` to `engine.options().dump_file` via an atomic rename.
///
/// Sets the engine's `dumping` gate for the duration of the encode so
/// concurrent readers and writers spin rather than observe a torn view;
/// the gate is always cleared on the way out, success or failure.
pub async fn dump(engine: &Arc<CacheEngine>) -> Result<()> {
    engine.dumping_flag().store(true, Ordering::Release);
    let result = dump_inner(engine).await;
    engine.dumping_flag().store(false, Ordering::Release);
    result
}

async fn dump_inner(engine: &Arc<CacheEngine>) -> Result<()> {
    let options = engine.options().clone();
    let snapshot = Dump {
        segment_count: engine.segments().len(),
        options: (*options).clone(),
        segments: engine.segments().iter().map(Segment::snapshot).collect(),
    };

    let dump_file = options.dump_file.clone();
    let temp_path = format!("{dump_file}.{}", timestamp());

    let encoded = tokio::task::spawn_blocking(move || bincode::serialize(&snapshot))
        .await
        .map_err(to_io_err)?
        .map_err(to_io_err)?;

    if let Err(err) = tokio::fs::write(&temp_path, &encoded).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(to_io_err(err));
    }

    if tokio::fs::metadata(&dump_file).await.is_ok() {
        tokio::fs::remove_file(&dump_file).await.map_err(to_io_err)?;
    }
    tokio::fs::rename(&temp_path, &dump_file).await.map_err(to_io_err)?;
    Ok(())
}

/// Loads a previously dumped engine from `dump_file`.
///
/// On any failure — missing file, corrupt encoding — returns `None` so
/// callers fall back to an empty engine rather than failing startup.
pub async fn restore(dump_file: &str) -> Option<Arc<CacheEngine>> {
    let bytes = tokio::fs::read(dump_file).await.ok()?;
    let decoded: Dump = tokio::task::spawn_blocking(move || bincode::deserialize(&bytes))
        .await
        .ok()?
        .ok()?;

    let options = Arc::new(decoded.options);
    let segments = decoded
        .segments
        .into_iter()
        .map(|s| Segment::from_snapshot(s, options.clone()))
        .collect();

    Some(CacheEngine::from_segments(segments, options))
}

/// `YYYYMMDDhhmmss`, matching the temp-sibling naming in `caches/dump.go`.
fn timestamp() -> String {
    Local::now().format("%Y%m%d%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dump_then_restore_round_trips_entries() {
        let dir = tempfile::tempdir().unwrap();
        let dump_path = dir.path().join("kafo.dump");

        let mut options = CacheOptions::default();
        options.segment_count = 4;
        options.max_entry_bytes = 1024 * 1024;
        options.dump_file = dump_path.to_str().unwrap().to_string();

        let engine = CacheEngine::new(options);
        engine.set("k1", b"v1", 0).await.unwrap();
        engine.set("k2", b"v2", 0).await.unwrap();

        dump(&engine).await.unwrap();
        assert!(dump_path.exists());

        let restored = restore(dump_path.to_str().unwrap()).await.unwrap();
        assert_eq!(restored.get("k1").await, Some(b"v1".to_vec()));
        assert_eq!(restored.get("k2").await, Some(b"v2".to_vec()));
        assert_eq!(restored.status().await.count, 2);
    }

    #[tokio::test]
    async fn restore_of_missing_file_returns_none() {
        assert!(restore("/nonexistent/path/kafo.dump").await.is_none());
    }
}
