//! Shared application state threaded through every handler.

use std::sync::Arc;

use uuid::Uuid;

use crate::analyzer::AnalyzerClient;
use crate::batcher::Batcher;
use crate::config_store::ConfigStore;
use crate::notifier::WebhookNotifier;
use crate::repository::LogRepository;
use crate::worker_pool::WorkerPool;

pub struct AppState {
    pub repo: Arc<LogRepository>,
    pub config_store: Arc<ConfigStore>,
    pub batcher: Arc<Batcher>,
    pub pool: Arc<WorkerPool>,
    pub analyzer: Arc<dyn AnalyzerClient>,
    pub notifier: Arc<WebhookNotifier>,
}

impl AppState {
    /// Generates a fresh trace id for an incoming log. Trace-id generation
    /// is treated as an external collaborator the service depends on but
    /// does not specify the algorithm for; a random v4 UUID satisfies the
    /// "globally unique, opaque" contract.
    pub fn generate_trace_id(&self) -> String {
        Uuid::new_v4().to_string()
    }
}
