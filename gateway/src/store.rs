//! Request Store — process-local mapping from request id to lifecycle
//! record. Exclusively owned by the gateway: created by the Admission
//! Controller, mutated only by Workers, read by the HTTP surface.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status of a lifecycle record. `Done` and `Error` are terminal; no
/// transition leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Admitted and waiting on the Work Queue.
    Queued,
    /// Pulled by a Worker and included in an in-flight batch or single call.
    Processing,
    /// Resolved with a result (including the `{"raw": ...}` parse-fallback shape).
    Done,
    /// Resolved with an upstream or cancellation failure.
    Error,
}

impl Status {
    fn is_terminal(self) -> bool {
        matches!(self, Status::Done | Status::Error)
    }
}

/// A single request's lifecycle record, as returned by `GET /result/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    /// Current lifecycle status.
    pub status: Status,
    /// Wall-clock time (unix seconds) the request was admitted.
    pub queued_at: f64,
    /// Wall-clock time the record reached a terminal status, if it has.
    pub finished_at: Option<f64>,
    /// The analysis result, once `status == Done`.
    pub result: Option<Value>,
    /// Human-readable failure message, once `status == Error`.
    pub error: Option<String>,
}

impl Record {
    fn queued(queued_at: f64) -> Self {
        Record {
            status: Status::Queued,
            queued_at,
            finished_at: None,
            result: None,
            error: None,
        }
    }
}

/// Process-local store of lifecycle records, keyed by opaque request id.
pub struct RequestStore {
    records: Mutex<HashMap<String, Record>>,
}

impl RequestStore {
    /// Create an empty store.
    pub fn new() -> Self {
        RequestStore {
            records: Mutex::new(HashMap::new()),
        }
    }

    /// Create a fresh `queued` record for `id`. Overwrites any prior record
    /// for the same id (ids are assumed unique).
    pub fn create(&self, id: &str, queued_at: f64) {
        let mut records = self.records.lock().expect("request store mutex poisoned");
        records.insert(id.to_string(), Record::queued(queued_at));
    }

    /// Create a record that is immediately `done`, used for cache hits
    /// (`finished_at` equals `queued_at`, since no queueing ever happened).
    pub fn create_done(&self, id: &str, now: f64, result: Value) {
        let mut records = self.records.lock().expect("request store mutex poisoned");
        records.insert(
            id.to_string(),
            Record {
                status: Status::Done,
                queued_at: now,
                finished_at: Some(now),
                result: Some(result),
                error: None,
            },
        );
    }

    /// Fetch a snapshot of the record for `id`, if any.
    pub fn get(&self, id: &str) -> Option<Record> {
        let records = self.records.lock().expect("request store mutex poisoned");
        records.get(id).cloned()
    }

    /// Mark `id` `processing`. No-op if the record is already terminal or
    /// doesn't exist.
    pub fn mark_processing(&self, id: &str) {
        let mut records = self.records.lock().expect("request store mutex poisoned");
        if let Some(rec) = records.get_mut(id) {
            if !rec.status.is_terminal() {
                rec.status = Status::Processing;
            }
        }
    }

    /// Mark `id` `done` with `result`. No-op if already terminal or unknown.
    pub fn mark_done(&self, id: &str, result: Value, finished_at: f64) {
        let mut records = self.records.lock().expect("request store mutex poisoned");
        if let Some(rec) = records.get_mut(id) {
            if !rec.status.is_terminal() {
                rec.status = Status::Done;
                rec.result = Some(result);
                rec.finished_at = Some(finished_at);
            }
        }
    }

    /// Mark `id` `error` with `message`. No-op if already terminal or unknown.
    pub fn mark_error(&self, id: &str, message: String, finished_at: f64) {
        let mut records = self.records.lock().expect("request store mutex poisoned");
        if let Some(rec) = records.get_mut(id) {
            if !rec.status.is_terminal() {
                rec.status = Status::Error;
                rec.error = Some(message);
                rec.finished_at = Some(finished_at);
            }
        }
    }
}

impl Default for RequestStore {
    fn default() -> Self {
        Self::new()
    }
}
