//! log-sentinel server entry point.
//!
//! # Usage
//!
//! ```bash
//! log-sentinel --db LogSentinel.db --port 8080
//! ```
//!
//! # Environment Variables
//!
//! - `ANALYZER_BASE_URL`: base URL of the external analyzer proxy.
//! - `RUST_LOG`: tracing filter (default: `info`).

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use log_sentinel::analyzer::HttpAnalyzerClient;
use log_sentinel::batcher::{spawn_scheduler, Batcher, BatcherConfig};
use log_sentinel::config_store::ConfigStore;
use log_sentinel::handlers::make_dispatcher;
use log_sentinel::notifier::WebhookNotifier;
use log_sentinel::repository::{create_pool, LogRepository};
use log_sentinel::router::build_router;
use log_sentinel::state::AppState;
use log_sentinel::worker_pool::WorkerPool;

#[derive(Parser, Debug)]
#[command(name = "log-sentinel")]
#[command(about = "Back-pressured, micro-batched log analysis ingestion service")]
#[command(version)]
struct CliArgs {
    /// Path to the SQLite database file.
    #[arg(long, default_value = "LogSentinel.db")]
    db: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8080)]
    port: u16,

    /// Interface to bind to.
    #[arg(long, default_value = "0.0.0.0")]
    bind_address: String,

    /// Base URL of the external analyzer proxy.
    #[arg(long, env = "ANALYZER_BASE_URL", default_value = "http://localhost:9000")]
    analyzer_url: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = CliArgs::parse();

    let pool = create_pool(&args.db)
        .await
        .context("failed to initialize persistence layer")?;

    let repo = Arc::new(
        LogRepository::new(pool.clone())
            .await
            .context("failed to rebuild dashboard stats from database")?,
    );
    let config_store = Arc::new(
        ConfigStore::load(pool)
            .await
            .context("failed to load system configuration")?,
    );

    let num_cpu_cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let num_io_threads = 1;
    let num_worker_threads = if num_cpu_cores > 1 {
        num_cpu_cores - num_io_threads
    } else {
        1
    };
    info!(num_cpu_cores, num_worker_threads, "system info");

    let worker_pool = Arc::new(WorkerPool::new(num_worker_threads, 10_000));
    let snapshot = config_store.get_snapshot();
    let analyzer = Arc::new(HttpAnalyzerClient::new(
        args.analyzer_url.clone(),
        snapshot.app_config.ai_provider.clone(),
    ));
    let notifier = Arc::new(WebhookNotifier::new(
        snapshot
            .channels
            .iter()
            .filter(|c| c.is_active)
            .map(|c| c.webhook_url.clone())
            .collect(),
    ));
    let batcher = Arc::new(Batcher::new(BatcherConfig {
        capacity: 10_000,
        batch_size: snapshot.app_config.kernel_max_batch.max(1) as usize,
        pool_threshold: 50,
        tick_interval: std::time::Duration::from_millis(
            snapshot.app_config.kernel_refresh_interval.max(1) as u64,
        ),
    }));

    let state = Arc::new(AppState {
        repo: repo.clone(),
        config_store,
        batcher: batcher.clone(),
        pool: worker_pool.clone(),
        analyzer,
        notifier,
    });

    let dispatch = make_dispatcher(&state);
    let _scheduler = spawn_scheduler(batcher, worker_pool, repo, dispatch);

    let router = build_router(state);
    let listen_addr = format!("{}:{}", args.bind_address, args.port);
    let listener = tokio::net::TcpListener::bind(&listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;
    info!(addr = %listen_addr, "log-sentinel listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
