//! Scenario 1: pushing enough tasks to cross `batch_size` dispatches
//! without waiting for the timeout tick. Grounded on
//! `original_source/server/tests/LogBatcher_test.cpp::FlushWhenFull`.

mod common;

use std::time::Duration;

use common::{build, mock_analyzer, poll_for_result, task};
use log_sentinel::batcher::BatcherConfig;

#[tokio::test]
async fn flush_on_size() {
    let harness = build(
        BatcherConfig {
            capacity: 100,
            batch_size: 5,
            pool_threshold: 100,
            tick_interval: Duration::from_secs(60),
        },
        mock_analyzer(),
    )
    .await;

    let dispatch = harness.dispatcher();
    for i in 1..=5 {
        let accepted = harness
            .batcher
            .push(task(&format!("t{i}")), &harness.pool, &dispatch)
            .await;
        assert!(accepted);
    }

    let found = poll_for_result(&harness.repo, "t5", 20, Duration::from_millis(100)).await;
    assert!(found, "t5 should be persisted once the size trigger fires");
}
