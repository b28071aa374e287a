//! Lifecycle — construction, the Admission Controller, and graceful
//! shutdown of the whole gateway.
//!
//! Startup builds the Cache, Store, Queue, Dispatcher, and metrics
//! recorder, then spawns `WORKER_COUNT` worker tasks onto a
//! `tokio::task::JoinSet` for supervising a dynamic set of background
//! tasks, alongside the HTTP listener task. Shutdown is triggered by
//! `tokio::signal::ctrl_c()`.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinSet;
use tracing::info;

use crate::cache::{self, ResultCache};
use crate::config::Config;
use crate::data::{AdmittedItem, AnalyzeRequest, AnalyzeResponse};
use crate::dispatcher::Dispatcher;
use crate::error::AdmissionError;
use crate::metrics::{self, MetricsSurface};
use crate::queue::WorkQueue;
use crate::store::{Record, RequestStore};
use crate::util::now_epoch;
use crate::worker::{Worker, WorkerConfig};

/// All constructed collaborators, shared between the HTTP surface and the
/// worker pool. This is the single server value the design notes call for
/// in place of module-level singletons.
pub struct Gateway {
    pub config: Config,
    pub cache: ResultCache,
    pub store: Arc<RequestStore>,
    pub queue: WorkQueue,
    pub dispatcher: Arc<Dispatcher>,
    pub metrics: MetricsSurface,
    alive_workers: Arc<AtomicUsize>,
    shutdown_tx: Mutex<Option<flume::Sender<()>>>,
    shutdown_rx: flume::Receiver<()>,
}

impl Gateway {
    /// Construct every component from `config`. Does not yet spawn workers
    /// or bind the HTTP listener — see `spawn_workers`/`run`.
    pub fn new(config: Config) -> Self {
        let cache = ResultCache::new(config.cache_capacity, config.cache_ttl);
        let store = Arc::new(RequestStore::new());
        let queue = WorkQueue::new(config.max_queue_size);
        let dispatcher = Arc::new(Dispatcher::new(
            config.llm_url.clone(),
            config.llm_model.clone(),
            config.llm_api_key.clone(),
            config.max_inflight,
        ));
        let metrics = MetricsSurface::install();
        let (shutdown_tx, shutdown_rx) = flume::bounded(0);

        Gateway {
            config,
            cache,
            store,
            queue,
            dispatcher,
            metrics,
            alive_workers: Arc::new(AtomicUsize::new(0)),
            shutdown_tx: Mutex::new(Some(shutdown_tx)),
            shutdown_rx,
        }
    }

    /// Number of workers currently in their run loop. Used by `/ready`.
    pub fn workers_alive(&self) -> usize {
        self.alive_workers.load(Ordering::SeqCst)
    }

    /// Total worker count this gateway was configured to run.
    pub fn total_workers(&self) -> usize {
        self.config.worker_count
    }

    /// Admission Controller: validate, consult the cache, apply
    /// backpressure, assign an id, and enqueue.
    pub async fn admit(&self, req: AnalyzeRequest) -> Result<AnalyzeResponse, AdmissionError> {
        metrics::record_request();

        let text_blob = req.canonical_text();
        if text_blob.is_empty() {
            return Err(AdmissionError::EmptyInput);
        }

        let cache_key = cache::fingerprint(&text_blob);

        if let Some(cached) = self.cache.get(&cache_key).await {
            metrics::record_cache_hit();
            let id = uuid::Uuid::new_v4().simple().to_string();
            let now = now_epoch();
            self.store.create_done(&id, now, cached);
            return Ok(AnalyzeResponse {
                request_id: id,
                status: "done",
                cached: Some(true),
            });
        }

        let queue_size = self.queue.size();
        if queue_size >= self.config.backpressure_cutoff() {
            return Err(AdmissionError::Overloaded);
        }

        let id = uuid::Uuid::new_v4().simple().to_string();
        let now = now_epoch();

        let item = AdmittedItem {
            id: id.clone(),
            text_blob,
            cache_key,
            queued_at: now,
        };

        if self.queue.try_put(item).is_err() {
            // Raced past the threshold check above; the Queue itself is the
            // final absolute cap. No Store record was ever created for this
            // id, so there is nothing to clean up: admission-time errors
            // produce no Store record.
            return Err(AdmissionError::Overloaded);
        }

        self.store.create(&id, now);
        metrics::record_queued();
        metrics::set_queue_size(self.queue.size());
        Ok(AnalyzeResponse {
            request_id: id,
            status: "queued",
            cached: None,
        })
    }

    /// Look up a lifecycle record by id.
    pub fn result(&self, id: &str) -> Option<Record> {
        self.store.get(id)
    }

    /// Spawn `WORKER_COUNT` workers onto `handles`, sharing this gateway's
    /// collaborators and shutdown signal.
    pub fn spawn_workers(self: &Arc<Self>, handles: &mut JoinSet<()>) {
        for id in 0..self.config.worker_count {
            let worker = Worker::new(
                id,
                self.queue.clone(),
                self.store.clone(),
                self.cache.clone(),
                self.dispatcher.clone(),
                WorkerConfig {
                    batch_size: self.config.batch_size,
                    batch_timeout: self.config.batch_timeout,
                },
                self.shutdown_rx.clone(),
                self.alive_workers.clone(),
            );
            handles.spawn(worker.run());
        }
    }

    /// Broadcast the shutdown signal to every worker by dropping the sole
    /// shutdown sender — a `recv_async` on a closed, empty channel resolves
    /// immediately, waking every worker's `select!`.
    pub fn shutdown(&self) {
        info!("shutting down gateway, signalling workers");
        self.shutdown_tx
            .lock()
            .expect("shutdown sender mutex poisoned")
            .take();
    }
}
