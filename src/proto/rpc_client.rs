//! A raw connection to one node, speaking the binary RPC protocol.
//!
//! The protocol is not concurrency-safe over a single connection (per-frame
//! request/response, no multiplexing), so every call takes the connection's
//! mutex for its entire round trip.

use tokio::{net::TcpStream, sync::Mutex};

use crate::{
    cache::Status,
    error::{KafoError, Result},
    proto::wire::{self, Command},
};

/// One TCP connection to a cluster member.
pub struct RpcClient {
    stream: Mutex<TcpStream>,
}

impl RpcClient {
    pub async fn connect(address: &str) -> Result<Self> {
        let stream = TcpStream::connect(address)
            .await
            .map_err(|e| KafoError::Transport(e.to_string()))?;
        Ok(Self {
            stream: Mutex::new(stream),
        })
    }

    /// Sends `command` with `args` and returns the raw response body.
    ///
    /// Exposed beyond this module so callers that need to distinguish a
    /// transport failure from a body-decode failure (e.g. status
    /// aggregation) can parse the body themselves.
    pub async fn call(&self, command: Command, args: &[&[u8]]) -> Result<Vec<u8>> {
        let mut stream = self.stream.lock().await;
        wire::write_request(&mut *stream, command, args).await?;
        let response = wire::read_response(&mut *stream).await?;
        response.into_result()
    }

    pub async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.call(Command::Get, &[key.as_bytes()]).await
    }

    pub async fn set(&self, key: &str, value: &[u8], ttl_seconds: u64) -> Result<()> {
        self.call(
            Command::Set,
            &[&ttl_seconds.to_be_bytes(), key.as_bytes(), value],
        )
        .await
        .map(|_| ())
    }

    pub async fn delete(&self, key: &str) -> Result<()> {
        self.call(Command::Delete, &[key.as_bytes()]).await.map(|_| ())
    }

    pub async fn status(&self) -> Result<Status> {
        let body = self.call(Command::Status, &[]).await?;
        serde_json::from_slice(&body).map_err(|e| KafoError::Transport(e.to_string()))
    }

    pub async fn nodes(&self) -> Result<Vec<String>> {
        let body = self.call(Command::Nodes, &[]).await?;
        serde_json::from_slice(&body).map_err(|e| KafoError::Transport(e.to_string()))
    }
}
