//! Bounded, non-blocking worker pool (C3). Submission never waits on a
//! full queue; callers get back `false` immediately and can respond 503.
//! Grounded on `original_source/server/threadpool/ThreadPool.cpp`.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, warn};

type BoxedTask = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Default channel capacity, matching the ring buffer's default so the
/// back-pressure gate and the pool's own queue saturate at comparable
/// volumes.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

pub struct WorkerPool {
    sender: mpsc::Sender<BoxedTask>,
    pending: Arc<AtomicUsize>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `worker_count` consumer tasks sharing one bounded channel.
    pub fn new(worker_count: usize, queue_capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel::<BoxedTask>(queue_capacity);
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        let pending = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(worker_count);
        for id in 0..worker_count.max(1) {
            let receiver = receiver.clone();
            let pending = pending.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    let task = {
                        let mut guard = receiver.lock().await;
                        guard.recv().await
                    };
                    let Some(task) = task else {
                        break;
                    };
                    if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
                        error!(worker = id, ?panic, "worker task panicked");
                    }
                    pending.fetch_sub(1, Ordering::SeqCst);
                }
            }));
        }

        Self { sender, pending, handles }
    }

    /// Non-blocking submit. Returns `false` (without awaiting) when the
    /// queue is at capacity or the pool has been shut down.
    pub fn submit<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match self.sender.try_send(Box::pin(task)) {
            Ok(()) => {
                self.pending.fetch_add(1, Ordering::SeqCst);
                true
            }
            Err(_) => {
                warn!("worker pool queue full, rejecting submission");
                false
            }
        }
    }

    pub fn pending_tasks(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Closes the channel (no more submissions accepted), waits for
    /// already-queued tasks to drain, then joins every worker.
    pub async fn shutdown(self) {
        drop(self.sender);
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}
