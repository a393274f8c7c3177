//! HTTP request handlers (C7), one module per endpoint group, mirroring
//! the teacher's `hub/api/*.rs` file-per-concern layout.

pub mod dashboard;
pub mod history;
pub mod ingest;
pub mod results;
pub mod settings;

use std::sync::Arc;

use tracing::warn;

use crate::batch_processor::process_batch;
use crate::batcher::DispatchedBatch;
use crate::state::AppState;

/// Builds the closure passed to `Batcher::push`/`on_timeout`: submits the
/// batch to the worker pool, and — per the resolved Open Question on
/// submit-after-dispatch races — re-queues at the ring head rather than
/// dropping it if the pool's queue is momentarily full.
pub fn make_dispatcher(state: &Arc<AppState>) -> impl Fn(DispatchedBatch) + Send + Sync + 'static {
    let repo = state.repo.clone();
    let analyzer = state.analyzer.clone();
    let notifier = state.notifier.clone();
    let pool = state.pool.clone();
    let batcher = state.batcher.clone();

    move |batch: DispatchedBatch| {
        let repo = repo.clone();
        let analyzer = analyzer.clone();
        let notifier = notifier.clone();
        let batcher = batcher.clone();
        let count = batch.tasks.len() as u64;

        let tasks = batch.tasks;
        let submit_tasks = tasks.clone();
        let submitted = pool.submit(async move {
            process_batch(submit_tasks, repo, analyzer, notifier).await;
        });

        if submitted {
            batcher.record_processed(count);
        } else {
            warn!("worker pool full after dispatch, re-queuing batch at ring head");
            tokio::spawn(async move {
                batcher.requeue_front(tasks).await;
            });
        }
    }
}
