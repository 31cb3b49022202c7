//! Crate-wide error kinds.
//!
//! A fixed, small set of domain error kinds, so a closed `thiserror` enum
//! is used here rather than `anyhow`. `anyhow` is still used at the
//! binary's outer edge (`main.rs`) for one-shot startup failures that
//! don't need matching.

use thiserror::Error;

/// Errors produced by the cache engine, cluster, and protocol layers.
#[derive(Debug, Error, Clone)]
pub enum KafoError {
    /// The key is missing or its entry has expired.
    #[error("not found")]
    NotFound,

    /// Writing this entry would exceed the owning segment's capacity.
    #[error("the entry size will exceed if you set this entry")]
    CapacityExceeded,

    /// A command frame carried the wrong number of arguments.
    #[error("invalid arguments")]
    InvalidArguments,

    /// The request's protocol version did not match the server's.
    #[error("the version between client and server is mismatched")]
    ProtocolMismatch,

    /// The command byte has no registered handler.
    #[error("the command is invalid")]
    UnknownCommand,

    /// This node does not own the key; retry against `addr`.
    #[error("redirect to node {0}")]
    Redirect(String),

    /// The ring has no members to answer ownership queries.
    #[error("ring has no members")]
    RingUnavailable,

    /// The client exhausted its redirect budget without success.
    #[error("reached max redirects")]
    MaxRedirects,

    /// The underlying connection failed to read or write.
    #[error("transport error: {0}")]
    Transport(String),

    /// Dumping or restoring the snapshot file failed.
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

impl KafoError {
    /// True if the wire body text names this as a redirect and, if so, the target address.
    pub fn parse_redirect(body: &str) -> Option<&str> {
        body.strip_prefix("redirect to node ")
    }
}

/// Convenience alias used throughout the engine and protocol layers.
pub type Result<T> = std::result::Result<T, KafoError>;
