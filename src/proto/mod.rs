//! Binary wire protocol: framing, TCP server, and a raw per-node client.

pub mod rpc_client;
pub mod rpc_server;
pub mod wire;

pub use rpc_client::RpcClient;
