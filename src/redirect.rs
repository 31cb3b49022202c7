//! Redirect responses, used to send a client to the node that owns a key.

use http::header::LOCATION;
use hyper::StatusCode;

use crate::{body::KafoBody, responder::Responder, types::Response};

/// A redirect response builder that implements `Responder`.
pub struct Redirect {
    status: StatusCode,
    location: String,
}

impl Redirect {
    pub fn with_status(location: impl Into<String>, status: StatusCode) -> Self {
        Self {
            status,
            location: location.into(),
        }
    }

    /// 307 Temporary Redirect — preserves the HTTP method, used when a node
    /// does not own the requested key.
    pub fn temporary(location: impl Into<String>) -> Self {
        Self::with_status(location, StatusCode::TEMPORARY_REDIRECT)
    }
}

impl Responder for Redirect {
    fn into_response(self) -> Response {
        hyper::Response::builder()
            .status(self.status)
            .header(LOCATION, self.location)
            .body(KafoBody::empty())
            .unwrap()
    }
}

/// Shorthand for a 307 Temporary Redirect to `location`.
pub fn temporary(location: impl Into<String>) -> Redirect {
    Redirect::temporary(location)
}
