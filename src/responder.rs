//! Converts handler return values into HTTP responses.

use std::convert::Infallible;

use bytes::Bytes;
use http::{Response, StatusCode};
use http_body_util::Full;

use crate::{body::KafoBody, error::KafoError};

/// Converts a type into an HTTP response.
///
/// Implemented for the handful of return types our handlers actually use:
/// plain strings for simple bodies, `(StatusCode, R)` pairs, and the
/// engine's own error type.
pub trait Responder {
    fn into_response(self) -> Response<KafoBody>;
}

impl Responder for Response<KafoBody> {
    fn into_response(self) -> Response<KafoBody> {
        self
    }
}

impl Responder for &'static str {
    fn into_response(self) -> Response<KafoBody> {
        Response::new(KafoBody::new(Full::from(Bytes::from_static(
            self.as_bytes(),
        ))))
    }
}

impl Responder for String {
    fn into_response(self) -> Response<KafoBody> {
        Response::new(KafoBody::new(Full::from(Bytes::from(self))))
    }
}

impl Responder for Vec<u8> {
    fn into_response(self) -> Response<KafoBody> {
        Response::new(KafoBody::new(Full::from(Bytes::from(self))))
    }
}

impl Responder for () {
    fn into_response(self) -> Response<KafoBody> {
        Response::new(KafoBody::empty())
    }
}

impl Responder for Infallible {
    fn into_response(self) -> Response<KafoBody> {
        match self {}
    }
}

impl<R> Responder for (StatusCode, R)
where
    R: Responder,
{
    fn into_response(self) -> Response<KafoBody> {
        let (status, body) = self;
        let mut res = body.into_response();
        *res.status_mut() = status;
        res
    }
}

/// Lets handlers return `Result<T, KafoError>` directly; both arms convert
/// through their own `Responder` impl.
impl<T, E> Responder for std::result::Result<T, E>
where
    T: Responder,
    E: Responder,
{
    fn into_response(self) -> Response<KafoBody> {
        match self {
            Ok(value) => value.into_response(),
            Err(err) => err.into_response(),
        }
    }
}

impl Responder for KafoBody {
    fn into_response(self) -> Response<KafoBody> {
        Response::new(self)
    }
}

impl Responder for anyhow::Error {
    fn into_response(self) -> Response<KafoBody> {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

/// Maps each engine error to the status code the HTTP surface contracts for it.
impl Responder for KafoError {
    fn into_response(self) -> Response<KafoBody> {
        let status = match &self {
            KafoError::NotFound => StatusCode::NOT_FOUND,
            KafoError::CapacityExceeded => StatusCode::PAYLOAD_TOO_LARGE,
            KafoError::InvalidArguments | KafoError::UnknownCommand => StatusCode::BAD_REQUEST,
            KafoError::ProtocolMismatch => StatusCode::BAD_REQUEST,
            KafoError::Redirect(_) => StatusCode::TEMPORARY_REDIRECT,
            KafoError::RingUnavailable | KafoError::MaxRedirects | KafoError::Transport(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            KafoError::Snapshot(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, self.to_string()).into_response()
    }
}
