//! Core type aliases shared by the router, middleware, and handlers.

use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use http_body_util::combinators::UnsyncBoxBody;
use hyper::body::Incoming;

use crate::{body::KafoBody, middleware::Next};

/// Incoming HTTP request with a streaming body.
pub type Request = hyper::Request<Incoming>;

/// Outgoing HTTP response with our body type.
pub type Response = hyper::Response<KafoBody>;

pub(crate) type BoxBody = UnsyncBoxBody<Bytes, BoxError>;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A boxed middleware closure in the request/response pipeline.
pub type BoxMiddleware = Arc<dyn Fn(Request, Next) -> BoxFuture<'static, Response> + Send + Sync>;
