//! The HTTP surface: `/v1` routes and the server loop that dispatches to them.

pub mod routes;
pub mod server;
