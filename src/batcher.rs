//! Micro-batching ring buffer (C5): dual dispatch trigger (size or
//! periodic timeout), gated by worker-pool back-pressure. Grounded on
//! `original_source/server/core/LogBatcher.cpp`.
//!
//! Dispatch is driven by a periodic poll rather than a per-push timer
//! reset. Resetting a timer on every push means the reset rate scales
//! with QPS, which under load turns into a storm of timer syscalls; a
//! fixed-rate poll costs the same regardless of load and, paired with the
//! mutex's double check (`count_ > 0` before trying to dispatch), is the
//! steadier choice at the cost of a worst-case half-tick of added latency.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::types::AnalysisTask;
use crate::worker_pool::WorkerPool;

pub struct BatcherConfig {
    pub capacity: usize,
    pub batch_size: usize,
    pub pool_threshold: usize,
    pub tick_interval: Duration,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            batch_size: 100,
            pool_threshold: 50,
            tick_interval: Duration::from_millis(500),
        }
    }
}

struct RingState {
    buffer: VecDeque<AnalysisTask>,
    capacity: usize,
}

/// A batch ready for dispatch, along with the instant it was pulled from
/// the ring (used for the processing-time gauge).
pub struct DispatchedBatch {
    pub tasks: Vec<AnalysisTask>,
    pub dispatched_at: Instant,
}

pub struct Batcher {
    state: Mutex<RingState>,
    config: BatcherConfig,
    total_processed: std::sync::atomic::AtomicU64,
}

impl Batcher {
    pub fn new(config: BatcherConfig) -> Self {
        Self {
            state: Mutex::new(RingState {
                buffer: VecDeque::with_capacity(config.capacity),
                capacity: config.capacity,
            }),
            config,
            total_processed: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Pushes one task, dispatching a batch inline if this push crossed
    /// the size threshold. Returns `false` when the ring is full — the
    /// caller should answer the client with 503.
    pub async fn push<F>(&self, task: AnalysisTask, pool: &WorkerPool, dispatch: F) -> bool
    where
        F: Fn(DispatchedBatch) + Send,
    {
        let mut guard = self.state.lock().await;
        if guard.buffer.len() >= guard.capacity {
            warn!("batcher ring buffer full, rejecting push");
            return false;
        }
        guard.buffer.push_back(task);
        if guard.buffer.len() >= self.config.batch_size {
            self.try_dispatch_locked(&mut guard, self.config.batch_size, pool, &dispatch);
        }
        true
    }

    /// Called from the periodic scheduler tick (not a worker thread).
    pub async fn on_timeout<F>(&self, pool: &WorkerPool, dispatch: F)
    where
        F: Fn(DispatchedBatch) + Send,
    {
        let mut guard = self.state.lock().await;
        if guard.buffer.is_empty() {
            return;
        }
        let limit = guard.buffer.len().min(self.config.batch_size);
        self.try_dispatch_locked(&mut guard, limit, pool, &dispatch);
    }

    fn try_dispatch_locked<F>(
        &self,
        guard: &mut RingState,
        limit: usize,
        pool: &WorkerPool,
        dispatch: &F,
    ) where
        F: Fn(DispatchedBatch) + Send,
    {
        if pool.pending_tasks() >= self.config.pool_threshold {
            return;
        }
        let mut tasks = Vec::with_capacity(limit);
        for _ in 0..limit {
            match guard.buffer.pop_front() {
                Some(t) => tasks.push(t),
                None => break,
            }
        }
        if tasks.is_empty() {
            return;
        }
        let batch = DispatchedBatch {
            tasks,
            dispatched_at: Instant::now(),
        };
        dispatch(batch);
    }

    /// Re-queues a batch that failed to submit to the worker pool after
    /// already being pulled from the ring. Pushed back at the head so
    /// FIFO order for not-yet-dispatched tasks is preserved.
    pub async fn requeue_front(&self, mut tasks: Vec<AnalysisTask>) {
        let mut guard = self.state.lock().await;
        while let Some(task) = tasks.pop() {
            guard.buffer.push_front(task);
        }
    }

    pub fn record_processed(&self, count: u64) {
        self.total_processed
            .fetch_add(count, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn total_processed(&self) -> u64 {
        self.total_processed.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub fn tick_interval(&self) -> Duration {
        self.config.tick_interval
    }
}

/// Spawns the dedicated periodic-tick task that drives `on_timeout` and
/// samples live gauges into the repository's dashboard snapshot.
pub fn spawn_scheduler(
    batcher: Arc<Batcher>,
    pool: Arc<WorkerPool>,
    repo: Arc<crate::repository::LogRepository>,
    dispatch: impl Fn(DispatchedBatch) + Send + Sync + 'static,
) -> tokio::task::JoinHandle<()> {
    let interval = batcher.tick_interval();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        let mut last_processed = 0u64;
        loop {
            ticker.tick().await;
            batcher.on_timeout(&pool, &dispatch).await;

            let processed = batcher.total_processed();
            let qps = (processed.saturating_sub(last_processed)) as f64 / interval.as_secs_f64();
            last_processed = processed;
            let pending = pool.pending_tasks() as f64;
            let backpressure = if pending > 0.0 {
                pending / crate::worker_pool::DEFAULT_QUEUE_CAPACITY as f64
            } else {
                0.0
            };
            repo.update_realtime_metrics(qps, backpressure);
            info!(qps, backpressure, "sampled live gauges");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant as StdInstant;

    fn task(trace_id: &str) -> AnalysisTask {
        AnalysisTask {
            trace_id: trace_id.to_string(),
            raw_request_body: "body".to_string(),
            ai_api_key: String::new(),
            ai_model: String::new(),
            ai_provider: String::new(),
            active_prompt: String::new(),
            started_at: StdInstant::now(),
        }
    }

    #[tokio::test]
    async fn push_dispatches_on_reaching_batch_size() {
        let batcher = Batcher::new(BatcherConfig {
            capacity: 10,
            batch_size: 2,
            pool_threshold: 100,
            tick_interval: Duration::from_secs(60),
        });
        let pool = WorkerPool::new(1, 8);
        let dispatched = Arc::new(AtomicUsize::new(0));
        let d2 = dispatched.clone();
        batcher.push(task("a"), &pool, |_| {}).await;
        batcher
            .push(task("b"), &pool, move |batch| {
                d2.fetch_add(batch.tasks.len(), Ordering::SeqCst);
            })
            .await;
        assert_eq!(dispatched.load(Ordering::SeqCst), 2);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn push_rejects_when_ring_is_full() {
        let batcher = Batcher::new(BatcherConfig {
            capacity: 1,
            batch_size: 100,
            pool_threshold: 100,
            tick_interval: Duration::from_secs(60),
        });
        let pool = WorkerPool::new(1, 8);
        assert!(batcher.push(task("a"), &pool, |_| {}).await);
        assert!(!batcher.push(task("b"), &pool, |_| {}).await);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn on_timeout_dispatches_partial_batch() {
        let batcher = Batcher::new(BatcherConfig {
            capacity: 10,
            batch_size: 50,
            pool_threshold: 100,
            tick_interval: Duration::from_secs(60),
        });
        let pool = WorkerPool::new(1, 8);
        batcher.push(task("a"), &pool, |_| {}).await;
        let dispatched = Arc::new(AtomicUsize::new(0));
        let d2 = dispatched.clone();
        batcher
            .on_timeout(&pool, move |batch| {
                d2.fetch_add(batch.tasks.len(), Ordering::SeqCst);
            })
            .await;
        assert_eq!(dispatched.load(Ordering::SeqCst), 1);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn dispatch_is_gated_by_pool_threshold() {
        let batcher = Batcher::new(BatcherConfig {
            capacity: 10,
            batch_size: 1,
            pool_threshold: 0,
            tick_interval: Duration::from_secs(60),
        });
        let pool = WorkerPool::new(1, 8);
        let dispatched = Arc::new(AtomicUsize::new(0));
        let d2 = dispatched.clone();
        batcher
            .push(task("a"), &pool, move |batch| {
                d2.fetch_add(batch.tasks.len(), Ordering::SeqCst);
            })
            .await;
        assert_eq!(dispatched.load(Ordering::SeqCst), 0);
        pool.shutdown().await;
    }
}
