//! Asynchronous analysis gateway.
//!
//! Accepts text fragments from many concurrent clients, coalesces them into
//! batches, dispatches each batch to an external LLM chat-completion
//! endpoint, and makes per-item structured results available by opaque
//! request id. See `Gateway` for the constructed, runnable server value.

pub mod cache;
pub mod config;
pub mod data;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod metrics;
pub mod parsing;
pub mod queue;
pub mod store;
mod util;
pub mod worker;

pub use config::{Config, ConfigError};
pub use lifecycle::Gateway;
