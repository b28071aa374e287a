//! Small shared helpers that don't belong to any one component.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time as Unix epoch seconds, matching the original
/// implementation's `time.time()` and used for every `queued_at`/
/// `finished_at` timestamp.
pub fn now_epoch() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
