//! Middleware pipeline: request/response processing chained in front of a handler.

use std::{future::Future, pin::Pin, sync::Arc};

use crate::{
    handler::BoxHandler,
    types::{BoxMiddleware, Request, Response},
};

pub trait IntoMiddleware {
    fn into_middleware(
        self,
    ) -> impl Fn(Request, Next) -> Pin<Box<dyn Future<Output = Response> + Send + 'static>>
    + Clone
    + Send
    + Sync
    + 'static;
}

/// The remaining middleware chain plus the final endpoint handler.
pub struct Next {
    pub middlewares: Arc<Vec<BoxMiddleware>>,
    pub endpoint: Arc<BoxHandler>,
}

impl Next {
    pub async fn run(self, req: Request) -> Response {
        if let Some((mw, rest)) = self.middlewares.split_first() {
            let rest = Arc::new(rest.to_vec());
            mw(
                req,
                Next {
                    middlewares: rest,
                    endpoint: self.endpoint.clone(),
                },
            )
            .await
        } else {
            self.endpoint.call(req).await
        }
    }
}
