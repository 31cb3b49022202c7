//! Ties membership and the consistent-hash ring together into one handle
//! every request-handling path consults to find a key's owner.

use std::{sync::Arc, time::Duration};

use arc_swap::ArcSwap;
use tracing::info;

use crate::{
    cluster::{
        membership::{GossipTransport, Membership},
        ring::Ring,
    },
    error::Result,
};

/// A cluster node: this process's identity, its view of the membership
/// list, and the ring built from that list.
pub struct Node {
    membership: Arc<Membership>,
    ring: ArcSwap<Ring>,
    virtual_node_count: usize,
}

impl Node {
    /// Joins (or seeds) a cluster at `self_address`, building an initial
    /// ring from the seed list. `transport` must match the server surface
    /// this process actually runs (§4.F binary RPC or §4.G HTTP), since
    /// that's what gossip uses to poll peers for their member list.
    pub fn join(
        self_address: String,
        seeds: &[String],
        virtual_node_count: usize,
        transport: GossipTransport,
    ) -> Arc<Self> {
        let membership = Membership::new(self_address, seeds, transport);
        let ring = Ring::new(&membership.members(), virtual_node_count);
        Arc::new(Self {
            membership,
            ring: ArcSwap::from_pointee(ring),
            virtual_node_count,
        })
    }

    /// The address that owns `key`.
    pub fn select_owner(&self, key: &str) -> Result<String> {
        self.ring.load().select_owner(key)
    }

    /// True if `address` names this process.
    pub fn is_self(&self, address: &str) -> bool {
        self.membership.is_self(address)
    }

    pub fn self_address(&self) -> &str {
        self.membership.self_address()
    }

    /// The current cluster membership, sorted and de-duplicated.
    pub fn members(&self) -> Vec<String> {
        self.membership.members()
    }

    /// Replaces the ring's node set with the current membership view.
    pub fn refresh_ring(&self) {
        let ring = Ring::new(&self.membership.members(), self.virtual_node_count);
        self.ring.store(Arc::new(ring));
    }

    /// Runs membership gossip and ring refresh on `period`, forever.
    ///
    /// Started once at process startup; also runs an immediate refresh so
    /// the ring reflects gossip results from the very first round.
    pub async fn run_background_refresh(self: Arc<Self>, period: Duration) {
        let membership = self.membership.clone();
        tokio::spawn(membership.run(period));

        loop {
            tokio::time::sleep(period).await;
            self.refresh_ring();
            info!("ring refreshed, {} members", self.members().len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeding_alone_owns_every_key() {
        let node = Node::join("127.0.0.1:5837".to_string(), &[], 32, GossipTransport::Rpc);
        assert_eq!(node.select_owner("any-key").unwrap(), "127.0.0.1:5837");
        assert!(node.is_self("127.0.0.1:5837"));
    }

    #[test]
    fn refresh_ring_picks_up_membership_changes() {
        let node = Node::join("127.0.0.1:5837".to_string(), &[], 32, GossipTransport::Rpc);
        assert_eq!(node.members().len(), 1);
    }
}
