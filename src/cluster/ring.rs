//! Consistent-hash ring: maps a key to the node that owns it.
//!
//! `VirtualNodeCount` points per physical node are placed on a 2^32 circle;
//! the ring is a plain `BTreeMap` keyed by point, hashed with
//! `xxhash-rust`'s xxh3.

use std::collections::BTreeMap;

use xxhash_rust::xxh3::xxh3_64;

use crate::error::{KafoError, Result};

/// A point on the ring's 2^32 circle, owned by one physical node.
fn ring_hash(input: &str) -> u32 {
    (xxh3_64(input.as_bytes()) & 0xFFFF_FFFF) as u32
}

/// Consistent-hash ring with virtual nodes.
///
/// Immutable once built: `refresh` replaces the whole ring rather than
/// mutating it in place, so readers racing a refresh each see one
/// coherent ring (see `cluster::node`, which holds this behind `ArcSwap`).
#[derive(Debug, Clone, Default)]
pub struct Ring {
    points: BTreeMap<u32, String>,
}

impl Ring {
    /// Builds a ring with `virtual_node_count` points per member, evenly
    /// spread by hashing `"<address>#<replica index>"`.
    pub fn new(members: &[String], virtual_node_count: usize) -> Self {
        let mut points = BTreeMap::new();
        for address in members {
            for replica in 0..virtual_node_count {
                let point = ring_hash(&format!("{address}#{replica}"));
                points.insert(point, address.clone());
            }
        }
        Self { points }
    }

    /// The physical node owning `key`: the first point at or clockwise of
    /// the key's hash, wrapping back to the first point past the end.
    pub fn select_owner(&self, key: &str) -> Result<String> {
        if self.points.is_empty() {
            return Err(KafoError::RingUnavailable);
        }
        let point = ring_hash(key);
        let owner = self
            .points
            .range(point..)
            .next()
            .or_else(|| self.points.iter().next())
            .map(|(_, address)| address.clone());
        owner.ok_or(KafoError::RingUnavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring_has_no_owner() {
        let ring = Ring::new(&[], 8);
        assert!(matches!(ring.select_owner("k"), Err(KafoError::RingUnavailable)));
    }

    #[test]
    fn single_member_owns_every_key() {
        let ring = Ring::new(&["a:1".to_string()], 16);
        assert_eq!(ring.select_owner("x").unwrap(), "a:1");
        assert_eq!(ring.select_owner("y").unwrap(), "a:1");
    }

    #[test]
    fn lookup_is_deterministic() {
        let members = vec!["a:1".to_string(), "b:2".to_string(), "c:3".to_string()];
        let ring = Ring::new(&members, 64);
        let first = ring.select_owner("some-key").unwrap();
        let second = ring.select_owner("some-key").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn distributes_keys_across_all_members() {
        let members = vec!["a:1".to_string(), "b:2".to_string(), "c:3".to_string()];
        let ring = Ring::new(&members, 128);
        let mut seen = std::collections::HashSet::new();
        for i in 0..500 {
            seen.insert(ring.select_owner(&format!("key-{i}")).unwrap());
        }
        assert_eq!(seen.len(), 3);
    }
}
