//! Cluster membership via anti-entropy pull-gossip.
//!
//! Since the cluster already speaks a binary RPC protocol (`proto::wire`)
//! with a `nodes` command built for exactly this purpose, membership is
//! maintained by periodically asking every known member for its view of
//! the cluster and unioning the results, rather than pulling in a
//! separate gossip transport. A node in `serverType=http` mode never
//! opens the binary RPC port, so gossip has to ask peers the same way a
//! client would reach this node — `GET /v1/nodes` — instead; see
//! [`GossipTransport`].

use std::{sync::Arc, time::Duration};

use arc_swap::ArcSwap;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::client::conn::http1 as client_http1;
use hyper_util::rt::TokioIo;
use tokio::{net::TcpStream, time};
use tracing::debug;

use crate::proto::wire::{self, Command};

/// Which surface this node's peers serve, and so which protocol gossip
/// must speak to ask them for their member list.
///
/// A node only ever runs one of the two servers (`config::ServerType`), so
/// gossip has to match it: there is no binary RPC port to dial in HTTP
/// mode, and no HTTP server to ask in TCP mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GossipTransport {
    /// Ask via the binary RPC `nodes` command (TCP `serverType`).
    Rpc,
    /// Ask via `GET /v1/nodes` (HTTP `serverType`).
    Http,
}

/// The set of addresses this node currently believes are cluster members.
///
/// Always includes this node's own address. Replaced wholesale on each
/// refresh so concurrent readers never observe a torn membership list.
pub struct Membership {
    self_address: String,
    members: ArcSwap<Vec<String>>,
    transport: GossipTransport,
}

impl Membership {
    /// Seeds membership with `seeds`. An empty seed list means this node is
    /// starting a new cluster, so it seeds with just itself. `transport`
    /// picks which surface gossip dials when polling peers.
    pub fn new(self_address: String, seeds: &[String], transport: GossipTransport) -> Arc<Self> {
        let mut members: Vec<String> = if seeds.is_empty() {
            vec![self_address.clone()]
        } else {
            seeds.to_vec()
        };
        if !members.contains(&self_address) {
            members.push(self_address.clone());
        }
        members.sort();
        members.dedup();

        Arc::new(Self {
            self_address,
            members: ArcSwap::from_pointee(members),
            transport,
        })
    }

    /// The current member list, sorted and de-duplicated.
    pub fn members(&self) -> Vec<String> {
        (**self.members.load()).clone()
    }

    pub fn self_address(&self) -> &str {
        &self.self_address
    }

    pub fn is_self(&self, address: &str) -> bool {
        address == self.self_address
    }

    /// Polls every known peer for its `nodes` view and unions the results
    /// with the current membership, then swaps the list in atomically.
    /// Unreachable peers are skipped; this node's own address is always
    /// asserted present.
    pub async fn gossip_once(&self) {
        let current = self.members();
        let mut union = current.clone();

        for peer in &current {
            if self.is_self(peer) {
                continue;
            }
            match fetch_peer_nodes(peer, self.transport).await {
                Ok(peer_nodes) => union.extend(peer_nodes),
                Err(err) => debug!("gossip: peer {peer} unreachable: {err}"),
            }
        }

        union.push(self.self_address.clone());
        union.sort();
        union.dedup();

        if union != current {
            debug!("membership changed: {current:?} -> {union:?}");
        }
        self.members.store(Arc::new(union));
    }

    /// Runs `gossip_once` every `period`, forever.
    pub async fn run(self: Arc<Self>, period: Duration) {
        loop {
            time::sleep(period).await;
            self.gossip_once().await;
        }
    }
}

async fn fetch_peer_nodes(address: &str, transport: GossipTransport) -> anyhow::Result<Vec<String>> {
    match transport {
        GossipTransport::Rpc => fetch_peer_nodes_rpc(address).await,
        GossipTransport::Http => fetch_peer_nodes_http(address).await,
    }
}

async fn fetch_peer_nodes_rpc(address: &str) -> anyhow::Result<Vec<String>> {
    let mut stream = TcpStream::connect(address).await?;
    wire::write_request(&mut stream, Command::Nodes, &[]).await?;
    let response = wire::read_response(&mut stream).await?;
    let body = response.into_result()?;
    let nodes: Vec<String> = serde_json::from_slice(&body)?;
    Ok(nodes)
}

/// Asks a peer's HTTP surface for its node list the same way a cluster
/// client would: a plain `GET /v1/nodes`. Built directly on
/// `hyper::client::conn::http1`, the client-side counterpart of the raw
/// `hyper::server::conn::http1` the HTTP server drives in `http::server`.
async fn fetch_peer_nodes_http(address: &str) -> anyhow::Result<Vec<String>> {
    let stream = TcpStream::connect(address).await?;
    let io = TokioIo::new(stream);
    let (mut sender, conn) = client_http1::handshake(io).await?;
    tokio::spawn(async move {
        if let Err(err) = conn.await {
            debug!("gossip: http connection to peer ended: {err}");
        }
    });

    let request = hyper::Request::builder()
        .method("GET")
        .uri("/v1/nodes")
        .header("Host", address)
        .body(Empty::<Bytes>::new())?;

    let response = sender.send_request(request).await?;
    let body = response.into_body().collect().await?.to_bytes();
    let nodes: Vec<String> = serde_json::from_slice(&body)?;
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_seed_list_seeds_with_self() {
        let m = Membership::new("127.0.0.1:5837".to_string(), &[], GossipTransport::Rpc);
        assert_eq!(m.members(), vec!["127.0.0.1:5837".to_string()]);
    }

    #[test]
    fn seed_list_always_includes_self() {
        let m = Membership::new(
            "127.0.0.1:5837".to_string(),
            &["127.0.0.1:5838".to_string()],
            GossipTransport::Rpc,
        );
        let members = m.members();
        assert!(members.contains(&"127.0.0.1:5837".to_string()));
        assert!(members.contains(&"127.0.0.1:5838".to_string()));
    }

    #[test]
    fn is_self_matches_only_own_address() {
        let m = Membership::new("127.0.0.1:5837".to_string(), &[], GossipTransport::Rpc);
        assert!(m.is_self("127.0.0.1:5837"));
        assert!(!m.is_self("127.0.0.1:5838"));
    }

    #[tokio::test]
    async fn gossip_with_no_reachable_peers_keeps_self_present() {
        let m = Membership::new(
            "127.0.0.1:5837".to_string(),
            &["127.0.0.1:1".to_string()],
            GossipTransport::Rpc,
        );
        m.gossip_once().await;
        assert!(m.members().contains(&"127.0.0.1:5837".to_string()));
    }

    #[tokio::test]
    async fn http_transport_also_keeps_self_present_when_peers_are_unreachable() {
        let m = Membership::new(
            "127.0.0.1:5837".to_string(),
            &["127.0.0.1:1".to_string()],
            GossipTransport::Http,
        );
        m.gossip_once().await;
        assert!(m.members().contains(&"127.0.0.1:5837".to_string()));
    }
}
