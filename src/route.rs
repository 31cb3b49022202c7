//! A single registered route: method, path pattern, and handler.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use http::Method;

use crate::{handler::BoxHandler, types::BoxMiddleware};

/// Path parameters captured from a matched route, stored in the request's
/// extensions by the router.
#[derive(Debug, Clone, Default)]
pub struct PathParams(pub HashMap<String, String>);

/// HTTP route with path pattern matching.
pub struct Route {
    pub path: String,
    pub method: Method,
    pub handler: BoxHandler,
    pub middlewares: RwLock<VecDeque<BoxMiddleware>>,
}

impl Route {
    pub fn new(path: String, method: Method, handler: BoxHandler) -> Self {
        Self {
            path,
            method,
            handler,
            middlewares: RwLock::new(VecDeque::new()),
        }
    }

    /// Matches `path` against this route's pattern.
    ///
    /// Patterns use `{name}` segments (e.g. `/v1/cache/{key}`) to capture a
    /// single path segment; every other segment must match literally.
    pub fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
        let pattern: Vec<&str> = self.path.trim_matches('/').split('/').collect();
        let actual: Vec<&str> = path.trim_matches('/').split('/').collect();
        if pattern.len() != actual.len() {
            return None;
        }

        let mut params = HashMap::new();
        for (p, a) in pattern.iter().zip(actual.iter()) {
            match p.strip_prefix('{').and_then(|p| p.strip_suffix('}')) {
                Some(name) => {
                    params.insert(name.to_string(), a.to_string());
                }
                None if p == a => {}
                None => return None,
            }
        }
        Some(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::BoxHandler;

    async fn noop() -> &'static str {
        "ok"
    }

    fn route(path: &str) -> Route {
        Route::new(path.to_string(), Method::GET, BoxHandler::new(noop))
    }

    #[test]
    fn matches_literal_segments() {
        let r = route("/v1/status");
        assert_eq!(r.match_path("/v1/status"), Some(HashMap::new()));
        assert_eq!(r.match_path("/v1/other"), None);
    }

    #[test]
    fn captures_a_single_param() {
        let r = route("/v1/cache/{key}");
        let params = r.match_path("/v1/cache/hello").unwrap();
        assert_eq!(params.get("key"), Some(&"hello".to_string()));
    }

    #[test]
    fn rejects_mismatched_segment_count() {
        let r = route("/v1/cache/{key}");
        assert_eq!(r.match_path("/v1/cache/a/b"), None);
    }
}
