//! Request handler trait and its type-erased wrapper.
//!
//! Our HTTP surface has a fixed, small set of routes, so handlers only need
//! two shapes: zero-argument, and single-`Request`-argument. No extractor
//! machinery is needed beyond that.

use std::{future::Future, pin::Pin, sync::Arc};

use futures_util::future::BoxFuture;

use crate::{
    responder::Responder,
    types::{Request, Response},
};

/// An asynchronous HTTP request handler.
pub trait Handler<T>: Send + Sync + 'static {
    type Future: Future<Output = Response> + Send + 'static;

    fn call(self, req: Request) -> Self::Future;
}

/// Type-erased handler for storage in a [`crate::route::Route`].
#[derive(Clone)]
pub struct BoxHandler {
    inner: Arc<dyn Fn(Request) -> BoxFuture<'static, Response> + Send + Sync>,
}

impl BoxHandler {
    pub(crate) fn new<H, T>(h: H) -> Self
    where
        H: Handler<T> + Clone,
    {
        let inner = Arc::new(move |req: Request| {
            let handler = h.clone();
            Box::pin(async move { handler.call(req).await }) as BoxFuture<'_, Response>
        });

        Self { inner }
    }

    pub(crate) fn call(&self, req: Request) -> BoxFuture<'_, Response> {
        (self.inner)(req)
    }
}

/// `async fn handler() -> impl Responder`
impl<F, Fut, R> Handler<()> for F
where
    F: FnOnce() -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Responder,
{
    type Future = Pin<Box<dyn Future<Output = Response> + Send>>;

    fn call(self, _req: Request) -> Self::Future {
        Box::pin(async move { (self)().await.into_response() })
    }
}

/// `async fn handler(req: Request) -> impl Responder`
impl<F, Fut, R> Handler<(Request,)> for F
where
    F: FnOnce(Request) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Responder,
{
    type Future = Pin<Box<dyn Future<Output = Response> + Send>>;

    fn call(self, req: Request) -> Self::Future {
        Box::pin(async move { (self)(req).await.into_response() })
    }
}
