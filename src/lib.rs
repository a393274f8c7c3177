//! log-sentinel: back-pressured, micro-batched log analysis ingestion.
//!
//! ## Pipeline
//!
//! Ingest -> ring-buffer batcher -> worker pool -> Map (per-log
//! classification) -> Reduce (cross-batch narrative) -> persistence.

pub mod analyzer;
pub mod batch_processor;
pub mod batcher;
pub mod config_store;
pub mod error;
pub mod handlers;
pub mod notifier;
pub mod repository;
pub mod router;
pub mod state;
pub mod types;
pub mod worker_pool;

pub use error::ServiceError;
pub use state::AppState;
