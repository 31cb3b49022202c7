use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;

use kafo::{
    cache::{self, CacheEngine},
    cluster::GossipTransport,
    config::{Config, ServerType},
    http,
    proto::rpc_server,
    tracing::init_tracing,
    Node,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Config::parse();
    let options = config.cache_options();

    let engine = match cache::snapshot::restore(&options.dump_file).await {
        Some(engine) => {
            info!("restored cache state from {}", options.dump_file);
            engine
        }
        None => CacheEngine::new(options),
    };

    let gossip_transport = match config.server_type {
        ServerType::Tcp => GossipTransport::Rpc,
        ServerType::Http => GossipTransport::Http,
    };
    let node = Node::join(
        config.address(),
        &config.seeds(),
        config.virtual_node_count,
        gossip_transport,
    );
    tokio::spawn(
        node.clone()
            .run_background_refresh(Duration::from_secs(config.update_circle_duration)),
    );

    let listener = TcpListener::bind(config.address()).await?;
    info!("kafo node starting on {}", config.address());

    match config.server_type {
        ServerType::Tcp => rpc_server::serve(listener, engine, node).await,
        ServerType::Http => {
            let mut router = kafo::router::Router::new();
            http::routes::register(&mut router, engine, node);
            http::server::serve(listener, router).await?;
        }
    }

    Ok(())
}
