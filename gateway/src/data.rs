//! Shared data shapes that flow between the Admission Controller, Work
//! Queue, Worker, and LLM Dispatcher.

use serde::{Deserialize, Serialize};

/// Inbound analysis request as accepted by `POST /analyze`.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub abstract_: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub url: String,
}

impl AnalyzeRequest {
    /// The canonicalized blob that is both fingerprinted for the cache and
    /// sent to the LLM: the four fields trimmed and joined, skipping any
    /// that are empty after trimming.
    pub fn canonical_text(&self) -> String {
        [&self.title, &self.abstract_, &self.text, &self.url]
            .into_iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// An item that has passed admission and is waiting on, or moving through,
/// the Work Queue.
#[derive(Debug, Clone)]
pub struct AdmittedItem {
    /// Opaque request id returned to the caller.
    pub id: String,
    /// Canonicalized text sent to the LLM.
    pub text_blob: String,
    /// SHA-256 fingerprint of `text_blob`, used as the cache key.
    pub cache_key: String,
    /// Unix epoch seconds at admission time.
    pub queued_at: f64,
}

/// Body returned by `POST /analyze`.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    pub request_id: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
}
