//! llm-relay: streaming relay proxy for OpenAI-compatible inference APIs.
//!
//! Sits between a caller and a remote chat-completions endpoint and exposes
//! four flavors of the same request:
//!   buffered JSON (`/generate`), native SSE pass-through (`/stream`),
//!   re-framed line-oriented events (`/stream-debug`), and a raw diagnostic
//!   probe (`/test-raw`).
//!
//! The library half also ships the consumer side: an incremental SSE decoder
//! and a pull-loop [`client::StreamConsumer`] that reassembles streamed text.

pub mod client;
pub mod config;
pub mod error;
pub mod provider;
pub mod server;
pub mod sse;
