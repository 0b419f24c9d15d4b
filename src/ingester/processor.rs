//! Queue processor: dedup, bounding and rate-aware draining
//!
//! Discovery monitors fire far faster than tokens can be analyzed, so the
//! queue enforces admission before anything reaches the pipeline: one
//! pending entry per mint, FIFO eviction past the size cap, and a drain
//! loop that respects the send gate and a fixed analysis concurrency.

use super::QueueItem;
use crate::error::Result;
use crate::gate::RateGate;
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// The downstream analysis chain. Implemented by the signal service.
#[async_trait::async_trait]
pub trait QueueWorker: Send + Sync {
    async fn process(&self, item: QueueItem) -> Result<()>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Pending-queue cap; overflowing evicts the oldest batch
    pub max_queue_size: usize,
    /// How many oldest entries to evict on overflow
    pub overflow_evict_count: usize,
    /// Max analyses in flight at once
    pub concurrency: usize,
    /// Pause between drained batches
    pub batch_delay_ms: u64,
    /// Poll interval while the queue is empty
    pub idle_poll_ms: u64,
    /// Wait when the send gate is exhausted
    pub rate_wait_ms: u64,
    /// Delivery channel consulted on the gate
    pub delivery_chat: String,
    /// Analyzed-mint cache cap; cleared when exceeded
    pub analyzed_cache_size: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_queue_size: 500,
            overflow_evict_count: 50,
            concurrency: 4,
            batch_delay_ms: 500,
            idle_poll_ms: 3000,
            rate_wait_ms: 2000,
            delivery_chat: "primary".to_string(),
            analyzed_cache_size: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QueueStats {
    pub queue_size: usize,
    pub active_analyses: usize,
    pub concurrency: usize,
}

// Pending queue and its membership set move together; both live behind one
// mutex so check-then-add never interleaves across concurrent enqueues.
struct QueueState {
    pending: VecDeque<QueueItem>,
    queued: HashSet<String>,
    analyzed: HashSet<String>,
}

pub struct QueueProcessor {
    config: QueueConfig,
    state: Mutex<QueueState>,
    semaphore: Arc<Semaphore>,
    active: Arc<AtomicUsize>,
    running: Arc<AtomicBool>,
    gate: Arc<dyn RateGate>,
    worker: Arc<dyn QueueWorker>,
    drain_handle: Mutex<Option<JoinHandle<()>>>,
}

impl QueueProcessor {
    pub fn new(config: QueueConfig, gate: Arc<dyn RateGate>, worker: Arc<dyn QueueWorker>) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(config.concurrency)),
            config,
            state: Mutex::new(QueueState {
                pending: VecDeque::new(),
                queued: HashSet::new(),
                analyzed: HashSet::new(),
            }),
            active: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            gate,
            worker,
            drain_handle: Mutex::new(None),
        }
    }

    /// Accept a discovery event. Returns false when the mint was already
    /// analyzed or is already pending.
    pub fn enqueue(&self, item: QueueItem) -> bool {
        let mut state = self.state.lock();

        if state.analyzed.contains(&item.mint) || state.queued.contains(&item.mint) {
            return false;
        }

        if state.pending.len() >= self.config.max_queue_size {
            let evict = self.config.overflow_evict_count.min(state.pending.len());
            for _ in 0..evict {
                if let Some(old) = state.pending.pop_front() {
                    state.queued.remove(&old.mint);
                }
            }
            warn!("Discovery queue full, evicted {} oldest entries", evict);
        }

        state.queued.insert(item.mint.clone());
        state.pending.push_back(item);
        true
    }

    /// Cache a mint as analyzed so rediscoveries are ignored
    pub fn mark_analyzed(&self, mint: &str) {
        let mut state = self.state.lock();
        if state.analyzed.len() >= self.config.analyzed_cache_size {
            debug!("Analyzed cache full, clearing");
            state.analyzed.clear();
        }
        state.analyzed.insert(mint.to_string());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            queue_size: self.state.lock().pending.len(),
            active_analyses: self.active.load(Ordering::SeqCst),
            concurrency: self.config.concurrency,
        }
    }

    /// Spawn the drain loop
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let this = self.clone();
        let handle = tokio::spawn(async move { this.drain_loop().await });
        *self.drain_handle.lock() = Some(handle);
        info!(
            "Queue processor started (concurrency {})",
            self.config.concurrency
        );
    }

    /// Stop scheduling new batches. In-flight analyses finish; the call
    /// returns once the drain task has exited.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let handle = self.drain_handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!("Drain task join failed: {}", e);
            }
        }
        info!("Queue processor stopped");
    }

    async fn drain_loop(self: Arc<Self>) {
        while self.running.load(Ordering::SeqCst) {
            if self.state.lock().pending.is_empty() {
                sleep(std::time::Duration::from_millis(self.config.idle_poll_ms)).await;
                continue;
            }

            if !self.gate.can_send_any(&self.config.delivery_chat) {
                sleep(std::time::Duration::from_millis(self.config.rate_wait_ms)).await;
                continue;
            }

            let batch = self.pull_batch();
            if batch.is_empty() {
                // Everything pending is on a token cooldown
                sleep(std::time::Duration::from_millis(self.config.rate_wait_ms)).await;
                continue;
            }

            let mut handles = Vec::with_capacity(batch.len());
            for item in batch {
                let permit = match self.semaphore.clone().acquire_owned().await {
                    Ok(p) => p,
                    Err(_) => break, // semaphore closed, shutting down
                };
                let this = self.clone();
                handles.push(tokio::spawn(async move {
                    this.active.fetch_add(1, Ordering::SeqCst);
                    let mint = item.mint.clone();
                    match this.worker.process(item).await {
                        Ok(()) => this.mark_analyzed(&mint),
                        Err(e) => warn!("Processing failed for {}: {}", mint, e),
                    }
                    this.active.fetch_sub(1, Ordering::SeqCst);
                    drop(permit);
                }));
            }
            futures_util::future::join_all(handles).await;

            sleep(std::time::Duration::from_millis(self.config.batch_delay_ms)).await;
        }
        debug!("Drain loop exited");
    }

    /// Pull up to `concurrency` items in FIFO order, skipping mints still on
    /// their send cooldown. Skipped items keep their queue position.
    fn pull_batch(&self) -> Vec<QueueItem> {
        let mut state = self.state.lock();
        let mut batch = Vec::new();
        let mut skipped = Vec::new();

        while batch.len() < self.config.concurrency {
            let Some(item) = state.pending.pop_front() else {
                break;
            };
            if self.gate.can_send(&self.config.delivery_chat, &item.mint) {
                state.queued.remove(&item.mint);
                batch.push(item);
            } else {
                skipped.push(item);
            }
        }

        for item in skipped.into_iter().rev() {
            state.pending.push_front(item);
        }

        batch
    }
}
