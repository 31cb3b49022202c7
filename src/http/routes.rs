//! The five HTTP endpoints under `/v1`: cache CRUD, cluster status, and
//! cluster membership.

use std::sync::Arc;

use http::{HeaderValue, StatusCode};
use http_body_util::BodyExt;
use hyper::Method;

use crate::{
    cache::CacheEngine,
    cluster::Node,
    error::KafoError,
    redirect,
    responder::Responder,
    route::PathParams,
    router::Router,
    types::{Request, Response},
};

fn path_key(req: &Request) -> Option<String> {
    req.extensions()
        .get::<PathParams>()
        .and_then(|params| params.0.get("key").cloned())
}

/// Redirects the caller to the owner of `key` unless this node owns it.
///
/// `original` is the request's full path and query, appended to the
/// owner's address so the caller retries the same operation there.
fn redirect_unless_owner(node: &Node, key: &str, original: &str) -> Result<(), Response> {
    match node.select_owner(key) {
        Ok(owner) if node.is_self(&owner) => Ok(()),
        Ok(owner) => Err(redirect::temporary(format!("{owner}{original}")).into_response()),
        Err(err) => Err(err.into_response()),
    }
}

async fn get_cache(req: Request, engine: Arc<CacheEngine>, node: Arc<Node>) -> Response {
    let Some(key) = path_key(&req) else {
        return KafoError::InvalidArguments.into_response();
    };
    let original = req.uri().path_and_query().map(|p| p.as_str().to_string()).unwrap_or_default();

    if let Err(response) = redirect_unless_owner(&node, &key, &original) {
        return response;
    }

    match engine.get(&key).await {
        Some(value) => value.into_response(),
        None => KafoError::NotFound.into_response(),
    }
}

async fn put_cache(mut req: Request, engine: Arc<CacheEngine>, node: Arc<Node>) -> Response {
    let Some(key) = path_key(&req) else {
        return KafoError::InvalidArguments.into_response();
    };
    let original = req.uri().path_and_query().map(|p| p.as_str().to_string()).unwrap_or_default();

    if let Err(response) = redirect_unless_owner(&node, &key, &original) {
        return response;
    }

    let ttl_seconds = req
        .headers()
        .get("Ttl")
        .and_then(|v: &HeaderValue| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);

    let body = match req.body_mut().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(_) => return KafoError::InvalidArguments.into_response(),
    };

    match engine.set(&key, &body, ttl_seconds).await {
        Ok(()) => (StatusCode::CREATED, Vec::new()).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn delete_cache(req: Request, engine: Arc<CacheEngine>, node: Arc<Node>) -> Response {
    let Some(key) = path_key(&req) else {
        return KafoError::InvalidArguments.into_response();
    };
    let original = req.uri().path_and_query().map(|p| p.as_str().to_string()).unwrap_or_default();

    if let Err(response) = redirect_unless_owner(&node, &key, &original) {
        return response;
    }

    engine.delete(&key).await;
    (StatusCode::OK, Vec::new()).into_response()
}

async fn get_status(_req: Request, engine: Arc<CacheEngine>) -> Response {
    match serde_json::to_vec(&engine.status().await) {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(err) => anyhow::Error::from(err).into_response(),
    }
}

async fn get_nodes(_req: Request, node: Arc<Node>) -> Response {
    match serde_json::to_vec(&node.members()) {
        Ok(body) => (StatusCode::OK, body).into_response(),
        Err(err) => anyhow::Error::from(err).into_response(),
    }
}

/// Registers the five `/v1` endpoints onto `router`, closing over `engine`
/// and `node` so handlers have direct access without global state.
pub fn register(router: &mut Router, engine: Arc<CacheEngine>, node: Arc<Node>) {
    let e = engine.clone();
    let n = node.clone();
    router.route(Method::GET, "/v1/cache/{key}", move |req| {
        get_cache(req, e.clone(), n.clone())
    });

    let e = engine.clone();
    let n = node.clone();
    router.route(Method::PUT, "/v1/cache/{key}", move |req| {
        put_cache(req, e.clone(), n.clone())
    });

    let e = engine.clone();
    let n = node.clone();
    router.route(Method::DELETE, "/v1/cache/{key}", move |req| {
        delete_cache(req, e.clone(), n.clone())
    });

    let e = engine.clone();
    router.route(Method::GET, "/v1/status", move |req| get_status(req, e.clone()));

    let n = node.clone();
    router.route(Method::GET, "/v1/nodes", move |req| get_nodes(req, n.clone()));
}
