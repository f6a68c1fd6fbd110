//! The broker-facing seam: a decoded payload plus two-phase
//! offer/commit (`ack`/`nack`). The classifier and dispatcher are
//! written against this trait only; no concrete transport adapter
//! ships in this crate.

use async_trait::async_trait;

use serde_json::Value;

/// One delivered, not-yet-committed frame from the broker.
#[async_trait]
pub trait BrokerFrame: Send + Sync {
    /// The decoded payload. Borrowed, not consumed, so the classifier
    /// can inspect it before deciding how to commit the frame.
    fn payload(&self) -> &Value;

    /// Commit: the frame was handled (delivered to `listen`, or
    /// dropped as malformed/unknown). The broker will not redeliver it.
    async fn ack(self: Box<Self>);

    /// Decline: leave the frame unacknowledged so the broker redelivers
    /// it after its visibility timeout. Used only for back-pressure
    /// (§4.8 step 5): a task message arriving while the pool is full.
    async fn nack(self: Box<Self>);
}

#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    //! An in-memory `BrokerFrame` double backed by an `mpsc` channel,
    //! with a side-channel so tests can assert whether a given frame
    //! was ack'd, nack'd, or left pending.

    use super::*;
    use std::sync::Arc;
    use tokio::sync::{mpsc, Mutex};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Commit {
        Acked,
        Nacked,
    }

    /// Shared observer: records the commit outcome of every frame built
    /// from the same `MockBroker`.
    #[derive(Clone, Default)]
    pub struct CommitLog(Arc<Mutex<Vec<(Value, Commit)>>>);

    impl CommitLog {
        pub async fn outcomes(&self) -> Vec<(Value, Commit)> {
            self.0.lock().await.clone()
        }
    }

    pub struct MockFrame {
        payload: Value,
        log: CommitLog,
    }

    #[async_trait]
    impl BrokerFrame for MockFrame {
        fn payload(&self) -> &Value {
            &self.payload
        }

        async fn ack(self: Box<Self>) {
            self.log.0.lock().await.push((self.payload, Commit::Acked));
        }

        async fn nack(self: Box<Self>) {
            self.log
                .0
                .lock()
                .await
                .push((self.payload, Commit::Nacked));
        }
    }

    /// A channel-backed stand-in for a durable subscription. Pushing a
    /// payload simulates a broker delivery; frames yielded from `recv`
    /// report their commit outcome through a shared [`CommitLog`].
    pub struct MockBroker {
        tx: mpsc::UnboundedSender<Value>,
        rx: mpsc::UnboundedReceiver<Value>,
        log: CommitLog,
    }

    impl MockBroker {
        pub fn new() -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            Self {
                tx,
                rx,
                log: CommitLog::default(),
            }
        }

        pub fn log(&self) -> CommitLog {
            self.log.clone()
        }

        pub fn publish(&self, payload: Value) {
            self.tx.send(payload).expect("mock broker channel open");
        }

        pub async fn recv(&mut self) -> Option<Box<dyn BrokerFrame>> {
            let payload = self.rx.recv().await?;
            Some(Box::new(MockFrame {
                payload,
                log: self.log.clone(),
            }))
        }
    }

    impl Default for MockBroker {
        fn default() -> Self {
            Self::new()
        }
    }

    #[tokio::test]
    async fn publish_then_ack_is_observed() {
        let mut broker = MockBroker::new();
        let log = broker.log();
        broker.publish(serde_json::json!({"uuid": "a"}));

        let frame = broker.recv().await.unwrap();
        frame.ack().await;

        let outcomes = log.outcomes().await;
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].1, Commit::Acked);
    }

    #[tokio::test]
    async fn nack_is_distinguished_from_ack() {
        let mut broker = MockBroker::new();
        let log = broker.log();
        broker.publish(serde_json::json!({"uuid": "a"}));

        let frame = broker.recv().await.unwrap();
        frame.nack().await;

        let outcomes = log.outcomes().await;
        assert_eq!(outcomes[0].1, Commit::Nacked);
    }
}
