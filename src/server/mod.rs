//! HTTP server: routes proxying to the remote inference endpoint.
//!
//! - [`routes`]: request/response types and route handlers
//! - [`streaming`]: re-framing of upstream fragments into relay SSE events

pub mod routes;
pub mod streaming;
