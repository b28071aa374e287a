use thiserror::Error;

/// Errors surfaced at admission time. These never reach the Request Store —
/// the caller gets an HTTP error and no lifecycle record is created.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// `title`/`abstract`/`text`/`url` were all empty after trimming.
    #[error("empty_input")]
    EmptyInput,
    /// The Work Queue is at or above the backpressure threshold.
    #[error("overloaded")]
    Overloaded,
}

impl AdmissionError {
    /// Stable machine-readable tag used in the HTTP error body and in metrics.
    pub fn code(&self) -> &'static str {
        match self {
            AdmissionError::EmptyInput => "empty_input",
            AdmissionError::Overloaded => "overloaded",
        }
    }
}

/// Errors raised by the LLM Dispatcher. These are never surfaced as HTTP
/// errors — the Worker turns them into `error` lifecycle records.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The permit semaphore was closed (dispatcher shutting down).
    #[error("dispatcher is shutting down")]
    ShuttingDown,
    /// The outbound HTTP call itself failed (connect, TLS, timeout, ...).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The endpoint responded with a non-success status.
    #[error("upstream returned {status}: {body}")]
    Upstream {
        /// HTTP status code returned by the LLM endpoint.
        status: u16,
        /// Response body, truncated for logging.
        body: String,
    },
    /// The response envelope didn't contain the expected `choices[0].message.content` path.
    #[error("malformed response envelope: {0}")]
    Envelope(String),
}

impl DispatchError {
    /// Human-readable message stored in a lifecycle record's `error` field.
    pub fn as_record_message(&self) -> String {
        format!("upstream_error: {self}")
    }
}
