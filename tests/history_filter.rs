//! Scenario 4: filtering `/history` by risk level narrows results;
//! an empty filter returns everything. Grounded on
//! `original_source/server/handlers/HistoryHandler.cpp`.

mod common;

use std::time::Duration;

use common::{build, mock_analyzer};
use log_sentinel::batcher::BatcherConfig;

#[tokio::test]
async fn history_filter() {
    let harness = build(
        BatcherConfig {
            capacity: 100,
            batch_size: 3,
            pool_threshold: 100,
            tick_interval: Duration::from_secs(60),
        },
        mock_analyzer(),
    )
    .await;

    // MockAnalyzerClient classifies by whether the log text contains
    // "error"; craft three distinct outcomes across the closed set by
    // persisting directly through the repository instead, since the mock
    // only distinguishes error/safe.
    harness
        .repo
        .save_raw_log_batch(&[
            ("h-critical".to_string(), "disk failure".to_string()),
            ("h-warning".to_string(), "slow query".to_string()),
            ("h-info".to_string(), "heartbeat".to_string()),
        ])
        .await
        .expect("save raw logs");

    let items = vec![
        log_sentinel::types::AnalysisResultItem {
            trace_id: "h-critical".to_string(),
            result: log_sentinel::types::LogAnalysisResult {
                summary: "critical summary".to_string(),
                risk_level: log_sentinel::types::RiskLevel::Critical,
                root_cause: "rc".to_string(),
                solution: "sol".to_string(),
            },
            response_time_ms: 1,
            status: "SUCCESS",
        },
        log_sentinel::types::AnalysisResultItem {
            trace_id: "h-warning".to_string(),
            result: log_sentinel::types::LogAnalysisResult {
                summary: "warning summary".to_string(),
                risk_level: log_sentinel::types::RiskLevel::Warning,
                root_cause: "rc".to_string(),
                solution: "sol".to_string(),
            },
            response_time_ms: 1,
            status: "SUCCESS",
        },
        log_sentinel::types::AnalysisResultItem {
            trace_id: "h-info".to_string(),
            result: log_sentinel::types::LogAnalysisResult {
                summary: "info summary".to_string(),
                risk_level: log_sentinel::types::RiskLevel::Info,
                root_cause: "rc".to_string(),
                solution: "sol".to_string(),
            },
            response_time_ms: 1,
            status: "SUCCESS",
        },
    ];
    let summary = log_sentinel::types::BatchSummary::default();
    let stats = harness.repo.get_dashboard_stats();
    let batch_id = harness
        .repo
        .save_batch_summary(&summary, &stats)
        .await
        .expect("save batch summary");
    harness
        .repo
        .save_analysis_result_batch(&items, batch_id)
        .await
        .expect("save analysis results");

    let critical_only = harness
        .repo
        .get_historical_logs(1, 20, "critical", "")
        .await
        .expect("query history");
    assert_eq!(critical_only.logs.len(), 1);
    assert_eq!(critical_only.logs[0].trace_id, "h-critical");

    let all = harness
        .repo
        .get_historical_logs(1, 20, "", "")
        .await
        .expect("query history");
    assert_eq!(all.logs.len(), 3);
}
