//! A single cached entry: payload, TTL, and creation time.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// `ttl == NEVER` means the value never expires.
pub const NEVER: u64 = 0;

/// A box of data, owned by exactly one segment.
///
/// The payload is copied on construction so callers cannot mutate state
/// that the engine holds onto, and `touch` hands back a clone rather than
/// a reference so the caller can't mutate it after the fact either.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Value {
    payload: Vec<u8>,
    ttl_seconds: u64,
    created_at: u64,
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}

impl Value {
    /// Creates a new value, defensively copying `payload`.
    pub fn new(payload: &[u8], ttl_seconds: u64) -> Self {
        Self {
            payload: payload.to_vec(),
            ttl_seconds,
            created_at: now(),
        }
    }

    /// Number of bytes the payload occupies.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// True if there is no payload.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// `ttl == NEVER` or the value was created less than `ttl` seconds ago.
    pub fn is_alive(&self) -> bool {
        self.ttl_seconds == NEVER || now().saturating_sub(self.created_at) < self.ttl_seconds
    }

    /// Refreshes `created_at` to now and returns a copy of the payload.
    ///
    /// Callers receive an owned `Vec<u8>`; mutating it cannot corrupt the
    /// stored value.
    pub fn touch(&mut self) -> Vec<u8> {
        self.created_at = now();
        self.payload.clone()
    }

    /// Reads the payload without refreshing `created_at`.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{thread::sleep, time::Duration};

    #[test]
    fn never_expires_when_ttl_is_zero() {
        let v = Value::new(b"hello", NEVER);
        assert!(v.is_alive());
    }

    #[test]
    fn expires_after_ttl_elapses() {
        let v = Value::new(b"hello", 1);
        assert!(v.is_alive());
        sleep(Duration::from_millis(1100));
        assert!(!v.is_alive());
    }

    #[test]
    fn touch_returns_a_copy_and_refreshes_created_at() {
        let mut v = Value::new(b"hello", NEVER);
        let out = v.touch();
        assert_eq!(out, b"hello");
    }

    #[test]
    fn new_value_copies_the_payload() {
        let mut src = vec![1, 2, 3];
        let v = Value::new(&src, NEVER);
        src[0] = 9;
        assert_eq!(v.payload(), &[1, 2, 3]);
    }
}
