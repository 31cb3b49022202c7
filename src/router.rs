//! HTTP request routing and dispatch.
//!
//! The route table is small and fixed at startup (five endpoints, see
//! `http::routes`), so it's a plain `Vec` rather than a concurrent map —
//! there's no need for `DashMap` here.

use std::sync::{Arc, RwLock};

use http::StatusCode;
use hyper::Method;

use crate::{
    body::KafoBody,
    handler::{BoxHandler, Handler},
    middleware::Next,
    responder::Responder,
    route::{PathParams, Route},
    types::{BoxMiddleware, Request, Response},
};

/// Routes incoming requests to registered handlers through the middleware chain.
pub struct Router {
    routes: Vec<Arc<Route>>,
    middlewares: RwLock<Vec<BoxMiddleware>>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            middlewares: RwLock::new(Vec::new()),
        }
    }

    /// Registers `handler` for `method`/`path`. `path` may contain `{name}`
    /// segments (see [`Route::match_path`]).
    pub fn route<H>(&mut self, method: Method, path: &str, handler: H) -> Arc<Route>
    where
        H: Handler<(Request,)> + Clone + 'static,
    {
        let route = Arc::new(Route::new(
            path.to_string(),
            method,
            BoxHandler::new(handler),
        ));
        self.routes.push(route.clone());
        route
    }

    /// Dispatches `req` to the first matching route, running the global and
    /// route-level middleware chains first. Falls back to 404.
    pub async fn dispatch(&self, mut req: Request) -> Response {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        for route in &self.routes {
            if route.method != method {
                continue;
            }
            if let Some(params) = route.match_path(&path) {
                if !params.is_empty() {
                    req.extensions_mut().insert(PathParams(params));
                }

                let g_mws = self.middlewares.read().unwrap().clone();
                let r_mws = route.middlewares.read().unwrap().clone();
                let mut chain = g_mws;
                chain.extend(r_mws);

                let next = Next {
                    middlewares: Arc::new(chain),
                    endpoint: Arc::new(route.handler.clone()),
                };
                return next.run(req).await;
            }
        }

        hyper::Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(KafoBody::empty())
            .unwrap()
    }

    /// Adds middleware run, in order, ahead of every route.
    pub fn middleware<F, Fut, R>(&self, f: F) -> &Self
    where
        F: Fn(Request, Next) -> Fut + Clone + Send + Sync + 'static,
        Fut: std::future::Future<Output = R> + Send + 'static,
        R: Responder + Send + 'static,
    {
        let mw: BoxMiddleware = Arc::new(move |req, next| {
            let fut = f(req, next);
            Box::pin(async move { fut.await.into_response() })
        });

        self.middlewares.write().unwrap().push(mw);
        self
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}
