//! Environment-driven configuration.
//!
//! Every setting has a documented default and can be overridden by an
//! environment variable of the same name. `Config::from_env` also loads a
//! `.env` file if present (via `dotenvy`), so local development doesn't
//! require exporting a dozen variables by hand.

use std::env;
use std::time::Duration;

const DEFAULT_MAX_QUEUE_SIZE: usize = 20_000;
const DEFAULT_WORKER_COUNT: usize = 2;
const DEFAULT_BACKPRESSURE_THRESHOLD: f64 = 0.9;
const DEFAULT_BATCH_SIZE: usize = 8;
const DEFAULT_BATCH_TIMEOUT_SECS: f64 = 0.12;
const DEFAULT_MAX_INFLIGHT: usize = 2;
const DEFAULT_CACHE_TTL_SECS: u64 = 3600;
const DEFAULT_CACHE_CAPACITY: u64 = 100_000;
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_LLM_MODEL: &str = "llama-3.3-70b-versatile";

fn default_max_queue_size() -> usize {
    DEFAULT_MAX_QUEUE_SIZE
}

fn default_worker_count() -> usize {
    DEFAULT_WORKER_COUNT
}

fn default_backpressure_threshold() -> f64 {
    DEFAULT_BACKPRESSURE_THRESHOLD
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_batch_timeout() -> Duration {
    Duration::from_secs_f64(DEFAULT_BATCH_TIMEOUT_SECS)
}

fn default_max_inflight() -> usize {
    DEFAULT_MAX_INFLIGHT
}

fn default_cache_capacity() -> u64 {
    DEFAULT_CACHE_CAPACITY
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Fully resolved gateway configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Capacity of the Work Queue.
    pub max_queue_size: usize,
    /// Number of worker tasks draining the Work Queue.
    pub worker_count: usize,
    /// Fraction of `max_queue_size` at which admission starts returning 429.
    pub backpressure_threshold: f64,
    /// Maximum number of items coalesced into a single batch call.
    pub batch_size: usize,
    /// Maximum time a worker waits (after the first item) before dispatching a partial batch.
    pub batch_timeout: Duration,
    /// Depth of the outbound-call permit semaphore.
    pub max_inflight: usize,
    /// Time-to-live of a Result Cache entry.
    pub cache_ttl: Duration,
    /// Maximum number of entries retained in the Result Cache.
    pub cache_capacity: u64,
    /// Port the HTTP surface binds to.
    pub port: u16,
    /// Chat-completion endpoint URL.
    pub llm_url: String,
    /// Model identifier sent in every chat-completion request.
    pub llm_model: String,
    /// Bearer token used to authenticate against the LLM endpoint.
    pub llm_api_key: String,
}

/// Error produced when required configuration is missing or malformed.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable was not set.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    /// An environment variable was set but could not be parsed.
    #[error("invalid value for {name}: {value:?} ({source})")]
    Invalid {
        /// Name of the offending environment variable.
        name: &'static str,
        /// Raw string value that failed to parse.
        value: String,
        /// Underlying parse error, rendered as text.
        source: String,
    },
}

fn parse_env<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(value) => value.parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            value,
            source: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Load configuration from the process environment, optionally seeded
    /// by a `.env` file in the current directory.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Missing .env is not an error; a real one failing to parse is logged by dotenvy itself.
        let _ = dotenvy::dotenv();

        let batch_timeout_secs: f64 = parse_env("BATCH_TIMEOUT", DEFAULT_BATCH_TIMEOUT_SECS)?;
        let cache_ttl_secs: u64 = parse_env("CACHE_TTL", DEFAULT_CACHE_TTL_SECS)?;

        let llm_url = env::var("LLM_API_URL")
            .unwrap_or_else(|_| "https://api.groq.com/openai/v1/chat/completions".to_string());
        let llm_model = env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string());
        let llm_api_key =
            env::var("LLM_API_KEY").map_err(|_| ConfigError::Missing("LLM_API_KEY"))?;

        Ok(Config {
            max_queue_size: parse_env("MAX_QUEUE_SIZE", default_max_queue_size())?,
            worker_count: parse_env("WORKER_COUNT", default_worker_count())?,
            backpressure_threshold: parse_env(
                "BACKPRESSURE_THRESHOLD",
                default_backpressure_threshold(),
            )?,
            batch_size: parse_env("BATCH_SIZE", default_batch_size())?,
            batch_timeout: if batch_timeout_secs > 0.0 {
                Duration::from_secs_f64(batch_timeout_secs)
            } else {
                default_batch_timeout()
            },
            max_inflight: parse_env("MAX_INFLIGHT", default_max_inflight())?,
            cache_ttl: Duration::from_secs(cache_ttl_secs),
            cache_capacity: parse_env("CACHE_CAPACITY", default_cache_capacity())?,
            port: parse_env("PORT", default_port())?,
            llm_url,
            llm_model,
            llm_api_key,
        })
    }

    /// Queue depth at or above which admission rejects new work with `429`.
    pub fn backpressure_cutoff(&self) -> usize {
        ((self.max_queue_size as f64) * self.backpressure_threshold).floor() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backpressure_cutoff_uses_floor() {
        let cfg = Config {
            max_queue_size: 100,
            worker_count: 2,
            backpressure_threshold: 0.9,
            batch_size: 8,
            batch_timeout: Duration::from_millis(120),
            max_inflight: 2,
            cache_ttl: Duration::from_secs(3600),
            cache_capacity: 1000,
            port: 8000,
            llm_url: String::new(),
            llm_model: String::new(),
            llm_api_key: String::new(),
        };
        assert_eq!(cfg.backpressure_cutoff(), 90);
    }

    #[test]
    fn defaults_match_spec() {
        assert_eq!(default_max_queue_size(), 20_000);
        assert_eq!(default_worker_count(), 2);
        assert_eq!(default_batch_size(), 8);
        assert_eq!(default_max_inflight(), 2);
        assert_eq!(default_port(), 8000);
    }
}
