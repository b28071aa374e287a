//! LLM Dispatcher — owns the process-wide permit semaphore bounding
//! outbound chat-completion concurrency, and the two request shapes
//! (single item, batch) the Worker drives it with.
//!
//! Built on `reqwest`, configured the same way as the `http` output
//! module's client (`pool_max_idle_per_host`/`pool_idle_timeout`), but
//! with bearer auth fixed rather than pluggable, since this gateway
//! talks to exactly one upstream.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tracing::instrument;

use crate::error::DispatchError;

const SYSTEM_PROMPT_SINGLE: &str = "You are an analysis engine. Respond with a single JSON object \
only, no surrounding commentary, with the fields: summary (string), key_points (array of strings), \
recommendation (string).";

const SYSTEM_PROMPT_BATCH: &str = "You are an analysis engine. You will receive several inputs, each \
prefixed with its id. Respond with a single JSON array only, no surrounding commentary, containing \
exactly one object per input in the same order, each with the fields: id (string, copied from the \
input's id), summary (string), key_points (array of strings), recommendation (string).";

const SINGLE_MAX_TOKENS: u32 = 1200;
const BATCH_MAX_TOKENS: u32 = 1600;
const SINGLE_TIMEOUT: Duration = Duration::from_secs(60);
const BATCH_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
    max_tokens: u32,
}

/// Holds the outbound HTTP client, endpoint, and the permit semaphore
/// bounding concurrent calls to `MAX_INFLIGHT`.
pub struct Dispatcher {
    client: reqwest::Client,
    url: String,
    model: String,
    api_key: String,
    permits: Arc<Semaphore>,
    max_inflight: usize,
}

impl Dispatcher {
    /// Build a dispatcher against `url`/`model`, authenticating with
    /// `api_key`, allowing at most `max_inflight` concurrent outbound
    /// calls.
    pub fn new(url: String, model: String, api_key: String, max_inflight: usize) -> Self {
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .expect("reqwest client configuration is valid");

        let max_inflight = max_inflight.max(1);
        Dispatcher {
            client,
            url,
            model,
            api_key,
            permits: Arc::new(Semaphore::new(max_inflight)),
            max_inflight,
        }
    }

    /// Number of permits currently checked out, for the in-flight gauge.
    pub fn in_flight(&self) -> usize {
        self.max_inflight - self.permits.available_permits()
    }

    /// Single-item call: one user message carrying `prompt`, low token cap,
    /// 60-second deadline. Returns the raw `content` string from the first
    /// choice; parsing is the caller's responsibility.
    #[instrument(skip(self, prompt), fields(chars = prompt.len()))]
    pub async fn call_single(&self, prompt: &str) -> Result<String, DispatchError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| DispatchError::ShuttingDown)?;

        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT_SINGLE.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt.to_string(),
                },
            ],
            temperature: 0.0,
            max_tokens: SINGLE_MAX_TOKENS,
        };

        self.send(&body, SINGLE_TIMEOUT).await
    }

    /// Batch call: one user message per input, each prefixed with
    /// `ID:<id>\n` to anchor identity, higher token cap, 120-second
    /// deadline. `prompts` and `ids` must be the same non-zero length.
    #[instrument(skip(self, prompts, ids), fields(batch_size = prompts.len()))]
    pub async fn call_batch(
        &self,
        prompts: &[String],
        ids: &[String],
    ) -> Result<String, DispatchError> {
        debug_assert_eq!(prompts.len(), ids.len());
        debug_assert!(!prompts.is_empty());

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| DispatchError::ShuttingDown)?;

        let mut messages = vec![ChatMessage {
            role: "system",
            content: SYSTEM_PROMPT_BATCH.to_string(),
        }];
        for (id, prompt) in ids.iter().zip(prompts.iter()) {
            messages.push(ChatMessage {
                role: "user",
                content: format!("ID:{id}\n{prompt}"),
            });
        }

        let body = ChatRequest {
            model: &self.model,
            messages,
            temperature: 0.0,
            max_tokens: BATCH_MAX_TOKENS,
        };

        self.send(&body, BATCH_TIMEOUT).await
    }

    async fn send(&self, body: &ChatRequest<'_>, timeout: Duration) -> Result<String, DispatchError> {
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(DispatchError::Upstream {
                status,
                body: text.chars().take(500).collect(),
            });
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| DispatchError::Envelope(e.to_string()))?;

        envelope
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| DispatchError::Envelope("missing choices[0].message.content".into()))
    }
}
