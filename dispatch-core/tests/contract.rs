//! End-to-end scenarios driven through an in-memory mock broker,
//! covering the dispatcher's documented behavior under a bounded pool,
//! a single filtered handler, and both kinds of timer.

use std::sync::Arc;
use std::time::Duration;

use dispatch_core::broker::mock::{Commit, MockBroker};
use dispatch_core::filter::{Filter, FilterSet};
use dispatch_core::model::TaskStatus;
use dispatch_core::{classify_and_admit, Dispatcher};

fn type_event_is(expected: &'static str) -> FilterSet {
    FilterSet::new(vec![Filter::predicate(move |m, _| {
        m.as_task().map(|t| t.type_event.as_str()) == Some(expected)
    })])
}

/// Builds the dispatcher used by every scenario: `max_pool_size=3`,
/// one handler on `type_event == "T"` with `execution_timeout=200ms`,
/// `close_timeout=700ms`, sleeping 400ms — scaled down from the
/// second-granularity example in the spec to keep the suite fast.
fn build_dispatcher() -> Arc<Dispatcher> {
    let mut dispatcher = Dispatcher::new(3);
    dispatcher.router_mut().include_handler(
        type_event_is("T"),
        |_uuid, _metadata, _data| async {
            tokio::time::sleep(Duration::from_millis(400)).await;
            Ok(())
        },
        Some(Duration::from_millis(200)),
        Some(Duration::from_millis(700)),
        None,
        None,
    );
    Arc::new(dispatcher)
}

#[tokio::test]
async fn normal_completion() {
    let dispatcher = build_dispatcher();
    let mut broker = MockBroker::new();
    let log = broker.log();

    broker.publish(serde_json::json!({"uuid": "a", "type_event": "T", "data": {}}));
    let frame = broker.recv().await.unwrap();
    classify_and_admit(&dispatcher, frame).await;

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(dispatcher.pool_len().await >= 1);

    tokio::time::sleep(Duration::from_millis(450)).await;
    assert_eq!(dispatcher.pool_len().await, 0);

    let outcomes = log.outcomes().await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].1, Commit::Acked);
}

#[tokio::test]
async fn forced_close() {
    let dispatcher = build_dispatcher();
    let mut broker = MockBroker::new();

    broker.publish(serde_json::json!({"uuid": "b", "type_event": "T"}));
    let frame = broker.recv().await.unwrap();
    classify_and_admit(&dispatcher, frame).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(dispatcher.pool_len().await >= 1);

    broker.publish(serde_json::json!({"uuid": "b", "command": "CLOSING"}));
    let frame = broker.recv().await.unwrap();
    classify_and_admit(&dispatcher, frame).await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(dispatcher.pool_len().await, 0);
}

#[tokio::test]
async fn status_query() {
    let dispatcher = build_dispatcher();
    let mut broker = MockBroker::new();

    broker.publish(serde_json::json!({"uuid": "c", "type_event": "T"}));
    let frame = broker.recv().await.unwrap();
    classify_and_admit(&dispatcher, frame).await;

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(
        dispatcher.pool_status("c").await,
        TaskStatus::Running
    );

    tokio::time::sleep(Duration::from_millis(450)).await;
    assert_eq!(
        dispatcher.pool_status("c").await,
        TaskStatus::Unknown
    );
}

#[tokio::test]
async fn back_pressure_delays_admission_until_a_slot_frees() {
    let dispatcher = build_dispatcher();
    let mut broker = MockBroker::new();
    let log = broker.log();

    for uuid in ["d1", "d2", "d3", "d4"] {
        broker.publish(serde_json::json!({"uuid": uuid, "type_event": "T"}));
    }

    // Drain and classify all four frames; d4 should be nack'd back-pressure.
    for _ in 0..4 {
        let frame = broker.recv().await.unwrap();
        classify_and_admit(&dispatcher, frame).await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(dispatcher.pool_len().await, 3);
    let outcomes = log.outcomes().await;
    assert_eq!(outcomes.len(), 4);
    assert_eq!(outcomes[3].1, Commit::Nacked);

    // Redeliver d4 once a slot frees up.
    tokio::time::sleep(Duration::from_millis(450)).await;
    assert!(dispatcher.pool_len().await < 3);

    broker.publish(serde_json::json!({"uuid": "d4", "type_event": "T"}));
    let frame = broker.recv().await.unwrap();
    classify_and_admit(&dispatcher, frame).await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(dispatcher.pool_status("d4").await == TaskStatus::Running);
}

#[tokio::test]
async fn service_bypasses_a_full_pool() {
    let dispatcher = build_dispatcher();
    let mut broker = MockBroker::new();
    let log = broker.log();

    for uuid in ["e1", "e2", "e3"] {
        broker.publish(serde_json::json!({"uuid": uuid, "type_event": "T"}));
        let frame = broker.recv().await.unwrap();
        classify_and_admit(&dispatcher, frame).await;
    }
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(dispatcher.pool_full().await);

    broker.publish(serde_json::json!({"uuid": "e1", "command": "GET_STATUS"}));
    let frame = broker.recv().await.unwrap();
    classify_and_admit(&dispatcher, frame).await;
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert_eq!(dispatcher.pool_len().await, 3);
    let outcomes = log.outcomes().await;
    assert_eq!(outcomes.last().unwrap().1, Commit::Acked);
}

#[tokio::test]
async fn hard_timeout_cancels_a_stuck_handler() {
    let mut dispatcher = Dispatcher::new(3);
    dispatcher.router_mut().include_handler(
        type_event_is("Forever"),
        |_uuid, _m, _d| async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        },
        None,
        Some(Duration::from_millis(50)),
        None,
        None,
    );
    let dispatcher = Arc::new(dispatcher);
    let mut broker = MockBroker::new();

    broker.publish(serde_json::json!({"uuid": "f", "type_event": "Forever"}));
    let frame = broker.recv().await.unwrap();
    classify_and_admit(&dispatcher, frame).await;

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(dispatcher.pool_len().await >= 1);

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert_eq!(dispatcher.pool_len().await, 0);
}

#[tokio::test]
async fn malformed_and_unknown_payloads_are_acked_and_dropped() {
    let dispatcher = build_dispatcher();
    let mut broker = MockBroker::new();
    let log = broker.log();

    broker.publish(serde_json::json!(42));
    broker.publish(serde_json::json!({"foo": "bar"}));

    for _ in 0..2 {
        let frame = broker.recv().await.unwrap();
        classify_and_admit(&dispatcher, frame).await;
    }

    assert_eq!(dispatcher.pool_len().await, 0);
    let outcomes = log.outcomes().await;
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(|(_, commit)| *commit == Commit::Acked));
}
