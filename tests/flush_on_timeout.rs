//! Scenario 2: a single task below the size trigger still flushes once
//! the periodic tick fires. Grounded on
//! `original_source/server/tests/LogBatcher_test.cpp::FlushOnTimeout`.

mod common;

use std::time::Duration;

use common::{build, mock_analyzer, poll_for_result, task};
use log_sentinel::batcher::BatcherConfig;

#[tokio::test]
async fn flush_on_timeout() {
    let harness = build(
        BatcherConfig {
            capacity: 100,
            batch_size: 50,
            pool_threshold: 100,
            tick_interval: Duration::from_millis(200),
        },
        mock_analyzer(),
    )
    .await;

    let dispatch = harness.dispatcher();
    let accepted = harness.batcher.push(task("tx"), &harness.pool, &dispatch).await;
    assert!(accepted);

    let immediate = harness
        .repo
        .query_struct_result_by_trace_id("tx")
        .await
        .expect("query should not error");
    assert!(immediate.is_none(), "single push below batch_size must not flush immediately");

    for _ in 0..6 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        harness.batcher.on_timeout(&harness.pool, &dispatch).await;
    }

    let found = poll_for_result(&harness.repo, "tx", 20, Duration::from_millis(100)).await;
    assert!(found, "timeout trigger should eventually flush the lone task");
}
