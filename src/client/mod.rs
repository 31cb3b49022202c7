//! Cluster-aware client: resolves a key's owner, follows redirects, and
//! keeps a TTL-bounded pool of per-node connections.

use std::{sync::Arc, time::Duration};

use arc_swap::ArcSwap;
use moka::future::Cache;

use crate::{
    cache::Status,
    cluster::ring::Ring,
    error::{KafoError, Result},
    proto::{rpc_client::RpcClient, wire::Command},
};

/// After this many redirect/retry attempts, a command gives up.
const MAX_REDIRECTS: usize = 5;

/// How long an idle per-node connection is kept before the pool drops it.
const CONNECTION_TTL: Duration = Duration::from_secs(15 * 60);

/// A client that talks to the whole cluster as if it were one node.
///
/// Holds its own ring mirror (refreshed by asking any known member for its
/// authoritative node list) and a pool of per-node connections, each
/// evicted after sitting idle for `ttlOfClient`.
pub struct ClusterClient {
    members: ArcSwap<Vec<String>>,
    ring: ArcSwap<Ring>,
    virtual_node_count: usize,
    connections: Cache<String, Arc<RpcClient>>,
}

impl ClusterClient {
    /// Builds a client seeded with `seeds`. Call [`ClusterClient::refresh_ring`]
    /// on a timer (driven by `updateCircleDuration`) to learn about
    /// members the seed list didn't mention.
    pub fn new(seeds: &[String], virtual_node_count: usize) -> Self {
        let members = seeds.to_vec();
        let ring = Ring::new(&members, virtual_node_count);
        Self {
            members: ArcSwap::from_pointee(members),
            ring: ArcSwap::from_pointee(ring),
            virtual_node_count,
            connections: Cache::builder().time_to_live(CONNECTION_TTL).build(),
        }
    }

    fn select_owner(&self, key: &str) -> Result<String> {
        self.ring.load().select_owner(key)
    }

    /// This client's current membership view.
    pub fn nodes(&self) -> Vec<String> {
        (**self.members.load()).clone()
    }

    /// Asks the first reachable known member for its authoritative node
    /// list and rebuilds the ring from it.
    pub async fn refresh_ring(&self) {
        for member in self.nodes() {
            let Ok(client) = self.connection(&member).await else {
                continue;
            };
            if let Ok(nodes) = client.nodes().await {
                self.ring.store(Arc::new(Ring::new(&nodes, self.virtual_node_count)));
                self.members.store(Arc::new(nodes));
                return;
            }
        }
    }

    async fn connection(&self, address: &str) -> Result<Arc<RpcClient>> {
        self.connections
            .try_get_with(address.to_string(), async move {
                RpcClient::connect(address).await.map(Arc::new)
            })
            .await
            .map_err(|err| (*err).clone())
    }

    /// Looks up `key`, following redirects and refreshing the ring on a
    /// broken connection, up to `MAX_REDIRECTS` attempts.
    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let mut address = self.select_owner(key)?;
        for _ in 0..MAX_REDIRECTS {
            let client = self.connection(&address).await?;
            match client.get(key).await {
                Ok(value) => return Ok(value),
                Err(KafoError::Redirect(addr)) => address = addr,
                Err(KafoError::Transport(_)) => {
                    self.refresh_ring().await;
                    address = self.select_owner(key)?;
                }
                Err(err) => return Err(err),
            }
        }
        Err(KafoError::MaxRedirects)
    }

    pub async fn set(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<()> {
        let mut address = self.select_owner(key)?;
        for _ in 0..MAX_REDIRECTS {
            let client = self.connection(&address).await?;
            match client.set(key, value, ttl_seconds).await {
                Ok(()) => return Ok(()),
                Err(KafoError::Redirect(addr)) => address = addr,
                Err(KafoError::Transport(_)) => {
                    self.refresh_ring().await;
                    address = self.select_owner(key)?;
                }
                Err(err) => return Err(err),
            }
        }
        Err(KafoError::MaxRedirects)
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut address = self.select_owner(key)?;
        for _ in 0..MAX_REDIRECTS {
            let client = self.connection(&address).await?;
            match client.delete(key).await {
                Ok(()) => return Ok(()),
                Err(KafoError::Redirect(addr)) => address = addr,
                Err(KafoError::Transport(_)) => {
                    self.refresh_ring().await;
                    address = self.select_owner(key)?;
                }
                Err(err) => return Err(err),
            }
        }
        Err(KafoError::MaxRedirects)
    }

    /// Aggregates status across every known member: fans out, sums
    /// counters, ignores peers that are unreachable, but propagates a
    /// decode failure from a peer that did respond.
    pub async fn status(&self) -> Result<Status> {
        let mut total = Status::default();
        for member in self.nodes() {
            let client = match self.connection(&member).await {
                Ok(client) => client,
                Err(_) => continue,
            };
            match client.call(Command::Status, &[]).await {
                Ok(body) => {
                    let status: Status = serde_json::from_slice(&body)
                        .map_err(|e| KafoError::Transport(e.to_string()))?;
                    total = total + status;
                }
                Err(_) => continue,
            }
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_client_starts_with_seed_membership() {
        let client = ClusterClient::new(&["127.0.0.1:5837".to_string()], 16);
        assert_eq!(client.nodes(), vec!["127.0.0.1:5837".to_string()]);
    }

    #[tokio::test]
    async fn command_against_an_empty_ring_fails_fast() {
        let client = ClusterClient::new(&[], 16);
        let err = client.get("key").await.unwrap_err();
        assert!(matches!(err, KafoError::RingUnavailable));
    }
}
