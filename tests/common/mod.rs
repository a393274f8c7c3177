//! Shared test harness: an ephemeral SQLite-backed stack wired the same
//! way `main.rs` wires the live one, but with a swappable analyzer.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use log_sentinel::analyzer::{AnalyzerClient, MockAnalyzerClient};
use log_sentinel::batcher::{Batcher, BatcherConfig};
use log_sentinel::config_store::ConfigStore;
use log_sentinel::error::ServiceError;
use log_sentinel::notifier::WebhookNotifier;
use log_sentinel::repository::{create_pool, LogRepository};
use log_sentinel::types::{AnalysisTask, LogAnalysisResult};
use log_sentinel::worker_pool::WorkerPool;
use sqlx::SqlitePool;
use tempfile::NamedTempFile;

pub struct Harness {
    pub repo: Arc<LogRepository>,
    pub config_store: Arc<ConfigStore>,
    pub batcher: Arc<Batcher>,
    pub pool: Arc<WorkerPool>,
    pub analyzer: Arc<dyn AnalyzerClient>,
    pub notifier: Arc<WebhookNotifier>,
    pub db_path: String,
    pub _db_file: NamedTempFile,
}

pub async fn build(batcher_config: BatcherConfig, analyzer: Arc<dyn AnalyzerClient>) -> Harness {
    let db_file = NamedTempFile::new().expect("tempfile");
    let db_path = db_file.path().to_str().expect("utf8 path").to_string();
    let db_pool = seeded_pool(&db_path).await;

    let repo = Arc::new(LogRepository::new(db_pool.clone()).await.expect("repo init"));
    let config_store = Arc::new(ConfigStore::load(db_pool).await.expect("config load"));
    let worker_pool = Arc::new(WorkerPool::new(2, 64));
    let batcher = Arc::new(Batcher::new(batcher_config));
    let notifier = Arc::new(WebhookNotifier::new(vec![]));

    Harness {
        repo,
        config_store,
        batcher,
        pool: worker_pool,
        analyzer,
        notifier,
        db_path,
        _db_file: db_file,
    }
}

/// Opens an independent connection to the same on-disk database for
/// assertions the repository's own API doesn't expose (raw row counts,
/// status columns).
pub async fn raw_pool(path: &str) -> SqlitePool {
    create_pool(path).await.expect("create_pool")
}

impl Harness {
    /// Builds the same submit-or-requeue dispatch closure `main.rs` wires
    /// up via `handlers::make_dispatcher`, without needing an `AppState`.
    pub fn dispatcher(&self) -> impl Fn(log_sentinel::batcher::DispatchedBatch) + Send + Sync + 'static {
        let repo = self.repo.clone();
        let analyzer = self.analyzer.clone();
        let notifier = self.notifier.clone();
        let pool = self.pool.clone();
        let batcher = self.batcher.clone();

        move |batch: log_sentinel::batcher::DispatchedBatch| {
            let repo = repo.clone();
            let analyzer = analyzer.clone();
            let notifier = notifier.clone();
            let batcher = batcher.clone();
            let count = batch.tasks.len() as u64;
            let tasks = batch.tasks;
            let submit_tasks = tasks.clone();
            let submitted = pool.submit(async move {
                log_sentinel::batch_processor::process_batch(submit_tasks, repo, analyzer, notifier).await;
            });
            if submitted {
                batcher.record_processed(count);
            } else {
                tokio::spawn(async move {
                    batcher.requeue_front(tasks).await;
                });
            }
        }
    }
}

async fn seeded_pool(path: &str) -> SqlitePool {
    create_pool(path).await.expect("create_pool")
}

pub fn task(trace_id: &str) -> AnalysisTask {
    AnalysisTask {
        trace_id: trace_id.to_string(),
        raw_request_body: format!("log for {trace_id}"),
        ai_api_key: String::new(),
        ai_model: "test-model".to_string(),
        ai_provider: "mock".to_string(),
        active_prompt: String::new(),
        started_at: std::time::Instant::now(),
    }
}

/// Polls `repo.query_struct_result_by_trace_id(trace_id)` until it returns
/// `Some`, or `attempts` have elapsed.
pub async fn poll_for_result(
    repo: &LogRepository,
    trace_id: &str,
    attempts: u32,
    interval: Duration,
) -> bool {
    for _ in 0..attempts {
        if repo
            .query_struct_result_by_trace_id(trace_id)
            .await
            .expect("query should not error")
            .is_some()
        {
            return true;
        }
        tokio::time::sleep(interval).await;
    }
    repo.query_struct_result_by_trace_id(trace_id)
        .await
        .expect("query should not error")
        .is_some()
}

/// Records the prompt each `analyze_batch` call receives; answers with a
/// fixed `Safe` result for every log so tests can focus on batching and
/// config-isolation semantics rather than classification.
pub struct RecordingAnalyzer {
    pub seen_prompts: Mutex<Vec<String>>,
}

impl RecordingAnalyzer {
    pub fn new() -> Self {
        Self { seen_prompts: Mutex::new(Vec::new()) }
    }
}

#[async_trait]
impl AnalyzerClient for RecordingAnalyzer {
    async fn analyze_batch(
        &self,
        logs: &[(String, String)],
        _api_key: &str,
        _model: &str,
        prompt: &str,
    ) -> Result<HashMap<String, LogAnalysisResult>, ServiceError> {
        self.seen_prompts.lock().expect("lock").push(prompt.to_string());
        Ok(logs
            .iter()
            .map(|(id, _)| {
                (
                    id.clone(),
                    LogAnalysisResult {
                        summary: "ok".to_string(),
                        risk_level: log_sentinel::types::RiskLevel::Safe,
                        root_cause: String::new(),
                        solution: String::new(),
                    },
                )
            })
            .collect())
    }

    async fn summarize(
        &self,
        _results: &[LogAnalysisResult],
        _api_key: &str,
        _model: &str,
        _prompt: &str,
    ) -> String {
        "recording summary".to_string()
    }
}

/// Always fails the Map phase — used to exercise the FAILURE-row
/// degrade path.
pub struct FailingAnalyzer;

#[async_trait]
impl AnalyzerClient for FailingAnalyzer {
    async fn analyze_batch(
        &self,
        _logs: &[(String, String)],
        _api_key: &str,
        _model: &str,
        _prompt: &str,
    ) -> Result<HashMap<String, LogAnalysisResult>, ServiceError> {
        Err(ServiceError::ExternalFailure("simulated analyzer outage".to_string()))
    }

    async fn summarize(
        &self,
        _results: &[LogAnalysisResult],
        _api_key: &str,
        _model: &str,
        _prompt: &str,
    ) -> String {
        "Summary generation failed.".to_string()
    }
}

pub fn mock_analyzer() -> Arc<dyn AnalyzerClient> {
    Arc::new(MockAnalyzerClient)
}
