//! Worker — drains the Work Queue, coalesces items into batches within a
//! short time window, drives the Dispatcher, and demultiplexes the
//! response back into the Request Store and Result Cache.
//!
//! `WORKER_COUNT` of these run the same loop concurrently; a worker holds
//! no state beyond the batch it is currently assembling.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::ResultCache;
use crate::data::AdmittedItem;
use crate::dispatcher::Dispatcher;
use crate::metrics;
use crate::parsing::extract_json;
use crate::queue::WorkQueue;
use crate::store::RequestStore;
use crate::util::now_epoch;

/// Configuration a worker needs beyond its shared collaborators.
pub struct WorkerConfig {
    pub batch_size: usize,
    pub batch_timeout: Duration,
}

/// A single worker loop. Cloneable handles (`queue`, `store`, `cache`,
/// `dispatcher`) are shared across the whole pool.
pub struct Worker {
    id: usize,
    queue: WorkQueue,
    store: Arc<RequestStore>,
    cache: ResultCache,
    dispatcher: Arc<Dispatcher>,
    config: WorkerConfig,
    shutdown: flume::Receiver<()>,
    alive: Arc<AtomicUsize>,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        queue: WorkQueue,
        store: Arc<RequestStore>,
        cache: ResultCache,
        dispatcher: Arc<Dispatcher>,
        config: WorkerConfig,
        shutdown: flume::Receiver<()>,
        alive: Arc<AtomicUsize>,
    ) -> Self {
        Worker {
            id,
            queue,
            store,
            cache,
            dispatcher,
            config,
            shutdown,
            alive,
        }
    }

    /// Run until the queue closes or a shutdown signal arrives.
    pub async fn run(self) {
        self.alive.fetch_add(1, Ordering::SeqCst);
        info!(worker = self.id, "worker started");

        loop {
            let first = tokio::select! {
                biased;
                _ = self.shutdown.recv_async() => {
                    debug!(worker = self.id, "shutdown signal received, exiting");
                    break;
                }
                item = self.queue.take() => item,
            };

            let Some(first) = first else {
                debug!(worker = self.id, "queue closed, exiting");
                break;
            };

            let batch = self.coalesce(first).await;
            self.process_batch(batch).await;
        }

        self.alive.fetch_sub(1, Ordering::SeqCst);
        info!(worker = self.id, "worker stopped");
    }

    /// Assemble a batch starting from `first`: the first item opens a
    /// `BATCH_TIMEOUT` window that does not reset on later arrivals, and the
    /// batch closes early once it reaches `BATCH_SIZE`.
    async fn coalesce(&self, first: AdmittedItem) -> Vec<(AdmittedItem, Instant)> {
        let t0 = Instant::now();
        let mut batch = vec![(first, Instant::now())];

        while batch.len() < self.config.batch_size {
            let elapsed = t0.elapsed();
            if elapsed >= self.config.batch_timeout {
                break;
            }
            let remaining = self.config.batch_timeout - elapsed;
            match self.queue.take_with_deadline(remaining).await {
                Some(item) => batch.push((item, Instant::now())),
                None => break,
            }
        }

        batch
    }

    async fn process_batch(&self, batch: Vec<(AdmittedItem, Instant)>) {
        if batch.is_empty() {
            return;
        }

        for (item, _) in &batch {
            self.store.mark_processing(&item.id);
        }

        if self.shutdown.try_recv().is_ok() {
            for (item, started) in &batch {
                self.finish_error(item, started, "cancelled".to_string());
            }
            return;
        }

        let prompts: Vec<String> = batch.iter().map(|(i, _)| i.text_blob.clone()).collect();
        let ids: Vec<String> = batch.iter().map(|(i, _)| i.id.clone()).collect();

        match self.dispatcher.call_batch(&prompts, &ids).await {
            Err(e) => {
                let message = e.as_record_message();
                warn!(error = %e, batch_size = batch.len(), "batch call failed");
                for (item, started) in &batch {
                    self.finish_error(item, started, message.clone());
                }
            }
            Ok(content) => {
                let resolved = self.demultiplex(&content, &batch).await;
                let mut remaining: Vec<&(AdmittedItem, Instant)> = batch
                    .iter()
                    .filter(|(item, _)| !resolved.contains(&item.id))
                    .collect();

                for (item, started) in remaining.drain(..) {
                    self.fallback(item, started).await;
                }
            }
        }
    }

    /// Match a parsed response array to batch items by `id`. Returns the
    /// set of ids resolved this way; any item whose id is absent falls
    /// through to the per-item fallback call.
    async fn demultiplex(
        &self,
        content: &str,
        batch: &[(AdmittedItem, Instant)],
    ) -> std::collections::HashSet<String> {
        let mut resolved = std::collections::HashSet::new();

        let Some(Value::Array(elements)) = extract_json(content) else {
            return resolved;
        };

        for element in elements {
            let Some(id) = element.get("id").and_then(Value::as_str) else {
                continue;
            };
            let Some((item, started)) = batch.iter().find(|(i, _)| i.id == id) else {
                continue;
            };
            self.finish_done(item, started, element).await;
            resolved.insert(id.to_string());
        }

        resolved
    }

    /// Per-item fallback call for an item the batch response didn't cover.
    async fn fallback(&self, item: &AdmittedItem, started: &Instant) {
        match self.dispatcher.call_single(&item.text_blob).await {
            Ok(content) => {
                let result = extract_json(&content).unwrap_or_else(|| {
                    serde_json::json!({ "raw": content })
                });
                self.finish_done(item, started, result).await;
            }
            Err(e) => {
                self.finish_error(item, started, e.as_record_message());
            }
        }
    }

    async fn finish_done(&self, item: &AdmittedItem, started: &Instant, result: Value) {
        let now = now_epoch();
        self.store.mark_done(&item.id, result.clone(), now);
        self.cache.put(item.cache_key.clone(), result).await;
        metrics::record_latency_seconds(started.elapsed().as_secs_f64());
    }

    fn finish_error(&self, item: &AdmittedItem, started: &Instant, message: String) {
        let now = now_epoch();
        self.store.mark_error(&item.id, message, now);
        metrics::record_error();
        metrics::record_latency_seconds(started.elapsed().as_secs_f64());
    }
}
