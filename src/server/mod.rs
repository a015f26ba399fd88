//! Chatter server implementation
//!
//! Serves the polling chat API over HTTP: post, fetch-since-cursor, history,
//! and single-message reads.

mod http;
mod routes;

pub use http::{ChatterServer, ChatterServerConfig};
pub use routes::{create_router, AppState, ErrorBody, RequestCaller};
