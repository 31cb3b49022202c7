//! TCP accept loop and per-connection command dispatch for the binary RPC protocol.

use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use crate::{
    cache::CacheEngine,
    cluster::Node,
    error::KafoError,
    proto::wire::{self, Command, RequestFrame, ResponseFrame},
};

/// Accepts connections on `listener` forever, spawning one task per connection.
pub async fn serve(listener: TcpListener, engine: Arc<CacheEngine>, node: Arc<Node>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!("accepted tcp connection from {peer}");
                let engine = engine.clone();
                let node = node.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_connection(stream, engine, node).await {
                        debug!("connection from {peer} closed: {err}");
                    }
                });
            }
            Err(err) => warn!("accept failed: {err}"),
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    engine: Arc<CacheEngine>,
    node: Arc<Node>,
) -> anyhow::Result<()> {
    loop {
        let frame = match wire::read_request(&mut stream).await {
            Ok(frame) => frame,
            Err(KafoError::ProtocolMismatch) => {
                let response = ResponseFrame::err(KafoError::ProtocolMismatch.to_string());
                wire::write_response(&mut stream, &response).await?;
                return Ok(());
            }
            Err(_) => return Ok(()),
        };

        let response = dispatch(frame, &engine, &node).await;
        wire::write_response(&mut stream, &response).await?;
    }
}

/// Resolves the owner of `key`; `Ok(None)` means this node owns it.
fn redirect_unless_owner(node: &Node, key: &str) -> Result<Option<ResponseFrame>, KafoError> {
    let owner = node.select_owner(key)?;
    if node.is_self(&owner) {
        Ok(None)
    } else {
        Ok(Some(ResponseFrame::err(format!("redirect to node {owner}"))))
    }
}

async fn dispatch(frame: RequestFrame, engine: &CacheEngine, node: &Node) -> ResponseFrame {
    let command = match frame.command() {
        Ok(command) => command,
        Err(err) => return ResponseFrame::err(err.to_string()),
    };
    match command {
        Command::Get => {
            let Some(key) = frame.args.first() else {
                return ResponseFrame::err(KafoError::InvalidArguments.to_string());
            };
            let key = String::from_utf8_lossy(key);
            match redirect_unless_owner(node, &key) {
                Ok(Some(redirect)) => return redirect,
                Err(err) => return ResponseFrame::err(err.to_string()),
                Ok(None) => {}
            }
            match engine.get(&key).await {
                Some(value) => ResponseFrame::ok(value),
                None => ResponseFrame::err(KafoError::NotFound.to_string()),
            }
        }
        Command::Set => {
            if frame.args.len() != 3 {
                return ResponseFrame::err(KafoError::InvalidArguments.to_string());
            }
            let ttl = frame.args[0]
                .as_slice()
                .try_into()
                .map(u64::from_be_bytes)
                .unwrap_or(0);
            let key = String::from_utf8_lossy(&frame.args[1]).into_owned();
            let value = &frame.args[2];

            match redirect_unless_owner(node, &key) {
                Ok(Some(redirect)) => return redirect,
                Err(err) => return ResponseFrame::err(err.to_string()),
                Ok(None) => {}
            }
            match engine.set(&key, value, ttl).await {
                Ok(()) => ResponseFrame::ok(Vec::new()),
                Err(err) => ResponseFrame::err(err.to_string()),
            }
        }
        Command::Delete => {
            let Some(key) = frame.args.first() else {
                return ResponseFrame::err(KafoError::InvalidArguments.to_string());
            };
            let key = String::from_utf8_lossy(key);
            match redirect_unless_owner(node, &key) {
                Ok(Some(redirect)) => return redirect,
                Err(err) => return ResponseFrame::err(err.to_string()),
                Ok(None) => {}
            }
            engine.delete(&key).await;
            ResponseFrame::ok(Vec::new())
        }
        Command::Status => {
            let status = engine.status().await;
            match serde_json::to_vec(&status) {
                Ok(body) => ResponseFrame::ok(body),
                Err(err) => ResponseFrame::err(err.to_string()),
            }
        }
        Command::Nodes => match serde_json::to_vec(&node.members()) {
            Ok(body) => ResponseFrame::ok(body),
            Err(err) => ResponseFrame::err(err.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    use crate::{cache::CacheOptions, cluster::GossipTransport};

    fn engine() -> Arc<CacheEngine> {
        let mut options = CacheOptions::default();
        options.segment_count = 4;
        options.max_entry_bytes = 1024 * 1024;
        CacheEngine::new(options)
    }

    #[tokio::test]
    async fn unrecognized_command_gets_an_error_reply_and_the_connection_stays_open() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let node = Node::join(addr.to_string(), &[], 4, GossipTransport::Rpc);
        tokio::spawn(serve(listener, engine(), node));

        let mut stream = TcpStream::connect(addr).await.unwrap();

        stream.write_u8(wire::PROTOCOL_VERSION).await.unwrap();
        stream.write_u8(99).await.unwrap();
        stream.write_u8(0).await.unwrap();
        stream.flush().await.unwrap();

        let response = wire::read_response(&mut stream).await.unwrap();
        assert_eq!(response.reply, wire::Reply::Error);
        assert_eq!(response.body, KafoError::UnknownCommand.to_string().into_bytes());

        // the connection was not dropped: a well-formed request right
        // after the bad one still gets served.
        wire::write_request(&mut stream, Command::Nodes, &[]).await.unwrap();
        let nodes = wire::read_response(&mut stream).await.unwrap();
        assert!(nodes.into_result().is_ok());
    }
}
