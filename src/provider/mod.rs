//! Provider adapter: a uniform call surface over the remote inference endpoint.
//!
//! - [`openai`]: wire types for the OpenAI-compatible chat-completions API
//! - [`adapter`]: buffered and streaming calls against a configured endpoint

pub mod adapter;
pub mod openai;

pub use adapter::{BufferedGeneration, GenerationParams, ProviderAdapter, UpstreamEvent};
