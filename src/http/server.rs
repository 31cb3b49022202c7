//! The HTTP server loop: accepts connections and dispatches through the router.

use std::{convert::Infallible, sync::Arc};

use hyper::{server::conn::http1, service::service_fn, Request};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::{router::Router, types::BoxError};

/// Serves HTTP/1.1 connections from `listener`, dispatching each request
/// through `router`. Runs until the process exits; each connection gets
/// its own task.
pub async fn serve(listener: TcpListener, router: Router) -> Result<(), BoxError> {
    let router = Arc::new(router);
    info!("http listening on {}", listener.local_addr()?);

    loop {
        let (stream, addr) = listener.accept().await?;
        let io = hyper_util::rt::TokioIo::new(stream);
        let router = router.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |mut req: Request<_>| {
                let router = router.clone();
                async move {
                    req.extensions_mut().insert(addr);
                    Ok::<_, Infallible>(router.dispatch(req).await)
                }
            });

            let mut http = http1::Builder::new();
            http.keep_alive(true);
            if let Err(err) = http.serve_connection(io, svc).await {
                error!("error serving connection from {addr}: {err}");
            }
        });
    }
}
