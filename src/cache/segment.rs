//! A single shard of the cache: its own lock, entry map, and status.

use std::{collections::HashMap, sync::Arc};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{
    cache::{options::CacheOptions, status::Status, value::Value},
    error::{KafoError, Result},
};

/// On-disk representation of a segment: entries and status, no lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentSnapshot {
    pub entries: HashMap<String, Value>,
    pub status: Status,
}

/// A shard of the cache guarded by a single read-write lock.
///
/// Fixed for the process's lifetime once constructed or restored: the set
/// of segments never grows or shrinks, only the entries inside one segment
/// change.
pub struct Segment {
    entries: RwLock<HashMap<String, Value>>,
    status: RwLock<Status>,
    options: Arc<CacheOptions>,
}

impl Segment {
    /// Creates an empty segment pre-sized to `options.map_size_of_segment`.
    pub fn new(options: Arc<CacheOptions>) -> Self {
        Self {
            entries: RwLock::new(HashMap::with_capacity(options.map_size_of_segment)),
            status: RwLock::new(Status::default()),
            options,
        }
    }

    /// Rebuilds a segment from a snapshot, re-attaching a fresh lock and the
    /// engine's (possibly new) options reference.
    pub fn from_snapshot(snapshot: SegmentSnapshot, options: Arc<CacheOptions>) -> Self {
        Self {
            entries: RwLock::new(snapshot.entries),
            status: RwLock::new(snapshot.status),
            options,
        }
    }

    /// Produces a lock-free snapshot of this segment's contents.
    pub fn snapshot(&self) -> SegmentSnapshot {
        SegmentSnapshot {
            entries: self.entries.read().clone(),
            status: *self.status.read(),
        }
    }

    /// Looks up `key`.
    ///
    /// If the stored value is dead, it is deleted under a single write-lock
    /// critical section and `None` is returned — the lock is never dropped
    /// and reacquired mid-operation, so a concurrent `set` can't slip an
    /// entry back in between the expiry check and the delete.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut entries = self.entries.write();
        match entries.get_mut(key) {
            Some(value) if value.is_alive() => Some(value.touch()),
            Some(dead) => {
                let len = dead.len();
                entries.remove(key);
                self.status.write().sub_entry(key, len);
                None
            }
            None => None,
        }
    }

    /// Inserts or overwrites `key`.
    ///
    /// If `key` already holds an entry, its size is provisionally
    /// subtracted from status; if the new entry would exceed this
    /// segment's capacity, the subtraction is undone and the old entry is
    /// left intact, leaving the segment observably unchanged.
    pub fn set(&self, key: &str, payload: &[u8], ttl_seconds: u64) -> Result<()> {
        let mut entries = self.entries.write();
        let mut status = self.status.write();

        let old_len = entries.get(key).map(Value::len);
        if let Some(len) = old_len {
            status.sub_entry(key, len);
        }

        let projected = status.entry_size() + key.len() as i64 + payload.len() as i64;
        if projected > self.options.max_entry_size_per_segment() {
            if let Some(len) = old_len {
                status.add_entry(key, len);
            }
            return Err(KafoError::CapacityExceeded);
        }

        status.add_entry(key, payload.len());
        entries.insert(key.to_string(), Value::new(payload, ttl_seconds));
        Ok(())
    }

    /// Removes `key` if present.
    pub fn delete(&self, key: &str) {
        let mut entries = self.entries.write();
        if let Some(old) = entries.remove(key) {
            self.status.write().sub_entry(key, old.len());
        }
    }

    /// Deletes dead entries, stopping after `max_gc_count` deletions.
    pub fn gc(&self) {
        let mut entries = self.entries.write();
        let mut status = self.status.write();

        let dead: Vec<String> = entries
            .iter()
            .filter(|(_, v)| !v.is_alive())
            .take(self.options.max_gc_count)
            .map(|(k, _)| k.clone())
            .collect();

        for key in dead {
            if let Some(v) = entries.remove(&key) {
                status.sub_entry(&key, v.len());
            }
        }
    }

    /// This segment's current status.
    pub fn status(&self) -> Status {
        *self.status.read()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment() -> Segment {
        let mut options = CacheOptions::default();
        options.segment_count = 1;
        options.max_entry_bytes = 1024;
        Segment::new(Arc::new(options))
    }

    #[test]
    fn set_then_get_round_trips() {
        let s = segment();
        s.set("key", b"value", 0).unwrap();
        assert_eq!(s.get("key"), Some(b"value".to_vec()));
        assert_eq!(s.status().count, 1);
    }

    #[test]
    fn delete_removes_and_updates_status() {
        let s = segment();
        s.set("key", b"value", 0).unwrap();
        s.delete("key");
        assert_eq!(s.get("key"), None);
        assert_eq!(s.status(), Status::default());
    }

    #[test]
    fn overwriting_a_key_that_would_exceed_capacity_leaves_old_entry_intact() {
        let mut options = CacheOptions::default();
        options.segment_count = 1;
        options.max_entry_bytes = 10; // tiny
        let s = Segment::new(Arc::new(options));

        s.set("k", b"12345", 0).unwrap();
        let before = s.status();

        let err = s.set("k", b"this is definitely too big", 0).unwrap_err();
        assert!(matches!(err, KafoError::CapacityExceeded));
        assert_eq!(s.status(), before);
        assert_eq!(s.get("k"), Some(b"12345".to_vec()));
    }

    #[test]
    fn empty_payload_is_valid_and_consumes_key_bytes_only() {
        let s = segment();
        s.set("key", b"", 0).unwrap();
        assert_eq!(s.status().value_size, 0);
        assert_eq!(s.status().key_size, 3);
    }

    #[test]
    fn gc_stops_after_max_gc_count_deletions() {
        let mut options = CacheOptions::default();
        options.segment_count = 1;
        options.max_entry_bytes = 1024 * 1024;
        options.max_gc_count = 2;
        let s = Segment::new(Arc::new(options));

        for i in 0..5 {
            s.set(&format!("key{i}"), b"v", 1).unwrap();
        }
        std::thread::sleep(std::time::Duration::from_millis(1100));
        s.gc();
        assert_eq!(s.status().count, 3);
    }
}
