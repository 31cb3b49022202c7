//! HTTP body wrapper used by every response this crate's server sends.

use std::{
    fmt::Debug,
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;

use anyhow::Result;
use futures_util::{Stream, TryStream, TryStreamExt};
use http_body_util::{BodyExt, Empty, StreamBody};
use hyper::body::{Body, Frame, SizeHint};

use crate::types::{BoxBody, BoxError};

/// A boxed, type-erased HTTP body.
///
/// Wraps any `Body` implementation behind one concrete type so handlers and
/// the router don't need to be generic over body type.
pub struct KafoBody(BoxBody);

impl KafoBody {
    /// Wraps any body implementing `Body<Data = Bytes>`.
    pub fn new<B>(body: B) -> Self
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        Self(body.map_err(|e| e.into()).boxed_unsync())
    }

    /// Builds a streaming body from a stream of byte chunks.
    pub fn from_stream<S, E>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<BoxError> + Debug + 'static,
    {
        let stream = stream.map_err(Into::into).map_ok(hyper::body::Frame::data);
        let body = StreamBody::new(stream).boxed_unsync();
        Self(body)
    }

    /// Builds a body from a stream of raw HTTP frames (data or trailers).
    pub fn from_try_stream<S, E>(stream: S) -> Self
    where
        S: TryStream<Ok = Frame<Bytes>, Error = E> + Send + 'static,
        E: Into<BoxError> + 'static,
    {
        let body = StreamBody::new(stream.map_err(Into::into)).boxed_unsync();
        Self(body)
    }

    /// A body with no content.
    pub fn empty() -> Self {
        Self::new(Empty::new())
    }
}

impl Default for KafoBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<()> for KafoBody {
    fn from(_: ()) -> Self {
        Self::empty()
    }
}

impl From<&str> for KafoBody {
    fn from(buf: &str) -> Self {
        let owned = buf.to_owned();
        Self::new(http_body_util::Full::from(owned))
    }
}

macro_rules! body_from_impl {
    ($ty:ty) => {
        impl From<$ty> for KafoBody {
            fn from(buf: $ty) -> Self {
                Self::new(http_body_util::Full::from(buf))
            }
        }
    };
}

body_from_impl!(String);
body_from_impl!(Vec<u8>);
body_from_impl!(Bytes);

impl Body for KafoBody {
    type Data = Bytes;
    type Error = BoxError;

    #[inline]
    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        Pin::new(&mut self.0).poll_frame(cx)
    }

    #[inline]
    fn size_hint(&self) -> SizeHint {
        self.0.size_hint()
    }

    #[inline]
    fn is_end_stream(&self) -> bool {
        self.0.is_end_stream()
    }
}
