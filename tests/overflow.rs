//! Scenario 3: a full ring rejects the next push, and accepts again once
//! the backlog has drained. Grounded on
//! `original_source/server/tests/LogBatcher_test.cpp::RejectWhenFull`.

mod common;

use std::time::Duration;

use common::{build, mock_analyzer, task};
use log_sentinel::batcher::BatcherConfig;

#[tokio::test]
async fn overflow() {
    let harness = build(
        BatcherConfig {
            capacity: 5,
            batch_size: 1_000, // never auto-dispatch on size for this test
            pool_threshold: 100,
            tick_interval: Duration::from_secs(60),
        },
        mock_analyzer(),
    )
    .await;

    let dispatch = harness.dispatcher();
    for i in 0..5 {
        let accepted = harness
            .batcher
            .push(task(&format!("fill{i}")), &harness.pool, &dispatch)
            .await;
        assert!(accepted, "ring has room for the first 5 pushes");
    }

    let rejected = harness.batcher.push(task("overflow"), &harness.pool, &dispatch).await;
    assert!(!rejected, "a 6th push into a full ring must be rejected");

    // Drain the backlog via a timeout dispatch, then the ring has room again.
    harness.batcher.on_timeout(&harness.pool, &dispatch).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let accepted_after_drain = harness.batcher.push(task("after-drain"), &harness.pool, &dispatch).await;
    assert!(accepted_after_drain, "push should succeed again once the backlog has drained");
}
