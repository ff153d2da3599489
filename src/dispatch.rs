//! Handing out a node's work to concurrent consumers.
//!
//! Each attached device gets one [`BatchConsumer`]. [`dispatch`] runs all
//! consumers concurrently against a single shared [`WorkQueue`]; every
//! consumer keeps pulling batches until the queue is exhausted.
//!
//! ```text
//!                  ┌──► consumer "emulator-5554" ── consume(batch)
//!  WorkQueue ──────┼──► consumer "emulator-5556" ── consume(batch)
//!  take_batch(n)   └──► consumer "device-R58M"   ── consume(batch)
//! ```
//!
//! A consumer that fails stops pulling. Its in-flight batch is not handed to
//! anyone else, and the remaining consumers keep draining the queue.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::discovery::TestClass;
use crate::queue::WorkQueue;

/// Something that executes batches of test classes, typically one device.
#[async_trait]
pub trait BatchConsumer: Send + Sync {
    /// Identifier used in logs and reports (e.g. a device serial).
    fn id(&self) -> &str;

    /// Executes one batch.
    async fn consume(&self, batch: &[TestClass]) -> anyhow::Result<()>;
}

/// What one consumer received during a dispatch.
#[derive(Debug, Clone, Serialize)]
pub struct ConsumerAssignment {
    /// Consumer identifier.
    pub consumer: String,

    /// Batches handed to the consumer, in the order they were taken.
    pub batches: Vec<Vec<String>>,

    /// Error from the batch that stopped this consumer, if any.
    pub error: Option<String>,
}

impl ConsumerAssignment {
    /// Total classes handed to this consumer.
    pub fn class_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    /// Returns `true` if the consumer stopped on an error.
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Outcome of draining a queue.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    /// One entry per consumer, in the order consumers were given.
    pub assignments: Vec<ConsumerAssignment>,

    /// Classes still queued when every consumer stopped.
    pub remaining: usize,
}

impl DispatchReport {
    /// Total classes handed out across all consumers.
    pub fn dispatched(&self) -> usize {
        self.assignments.iter().map(ConsumerAssignment::class_count).sum()
    }

    /// Identifiers of consumers that stopped on an error.
    pub fn failed_consumers(&self) -> Vec<&str> {
        self.assignments
            .iter()
            .filter(|a| a.failed())
            .map(|a| a.consumer.as_str())
            .collect()
    }
}

async fn drain_one<C: BatchConsumer + ?Sized>(
    queue: &WorkQueue,
    consumer: &C,
    batch_size: usize,
) -> ConsumerAssignment {
    let mut assignment = ConsumerAssignment {
        consumer: consumer.id().to_string(),
        batches: Vec::new(),
        error: None,
    };

    while let Some(batch) = queue.take_batch(batch_size) {
        debug!("[{}] took {} classes", consumer.id(), batch.len());
        assignment
            .batches
            .push(batch.iter().map(|c| c.name().to_string()).collect());

        if let Err(e) = consumer.consume(&batch).await {
            warn!("[{}] batch failed, consumer stops: {:#}", consumer.id(), e);
            assignment.error = Some(format!("{:#}", e));
            break;
        }

        // Let the other consumers reach the queue between batches.
        tokio::task::yield_now().await;
    }

    assignment
}

/// Drains `queue` with all `consumers` concurrently.
///
/// Every consumer repeatedly takes up to `batch_size` classes and hands them
/// to [`BatchConsumer::consume`] until the queue is exhausted or the consumer
/// fails. With no consumers, nothing is taken.
pub async fn dispatch<C>(queue: &WorkQueue, consumers: &[C], batch_size: usize) -> DispatchReport
where
    C: BatchConsumer,
{
    let batch_size = batch_size.max(1);
    info!(
        "Dispatching {} classes to {} consumers in batches of {}",
        queue.len(),
        consumers.len(),
        batch_size
    );

    let assignments = join_all(
        consumers
            .iter()
            .map(|consumer| drain_one(queue, consumer, batch_size)),
    )
    .await;

    let report = DispatchReport {
        assignments,
        remaining: queue.len(),
    };

    if report.remaining > 0 {
        warn!(
            "{} classes were not dispatched; all consumers stopped",
            report.remaining
        );
    }

    report
}

/// Consumer that only logs what it receives.
///
/// Used for dry runs to preview how work would be spread across devices.
#[derive(Debug, Clone)]
pub struct LoggingConsumer {
    id: String,
}

impl LoggingConsumer {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl BatchConsumer for LoggingConsumer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn consume(&self, batch: &[TestClass]) -> anyhow::Result<()> {
        let names: Vec<&str> = batch.iter().map(TestClass::name).collect();
        info!("[{}] {}", self.id, names.join(", "));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    fn classes(count: usize) -> Vec<TestClass> {
        (0..count)
            .map(|i| TestClass::new(format!("com.example.Test{:03}", i)))
            .collect()
    }

    struct RecordingConsumer {
        id: String,
        delay: Duration,
        fail_on_batch: Option<usize>,
        seen: Mutex<Vec<String>>,
    }

    impl RecordingConsumer {
        fn new(id: &str, delay_ms: u64) -> Self {
            Self {
                id: id.to_string(),
                delay: Duration::from_millis(delay_ms),
                fail_on_batch: None,
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing_on(mut self, batch: usize) -> Self {
            self.fail_on_batch = Some(batch);
            self
        }
    }

    #[async_trait]
    impl BatchConsumer for RecordingConsumer {
        fn id(&self) -> &str {
            &self.id
        }

        async fn consume(&self, batch: &[TestClass]) -> anyhow::Result<()> {
            tokio::time::sleep(self.delay).await;
            let mut seen = self.seen.lock().unwrap();
            let batches_done = seen.len();
            seen.extend(batch.iter().map(|c| c.name().to_string()));
            if self.fail_on_batch.is_some_and(|n| batches_done >= n) {
                anyhow::bail!("device offline");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_every_class_dispatched_once() {
        let queue = WorkQueue::new(classes(53));
        let consumers = vec![
            RecordingConsumer::new("a", 1),
            RecordingConsumer::new("b", 2),
            RecordingConsumer::new("c", 3),
        ];

        let report = dispatch(&queue, &consumers, 5).await;

        assert_eq!(report.dispatched(), 53);
        assert_eq!(report.remaining, 0);
        assert!(report.failed_consumers().is_empty());

        let mut all = HashSet::new();
        for consumer in &consumers {
            for name in consumer.seen.lock().unwrap().iter() {
                assert!(all.insert(name.clone()), "{} dispatched twice", name);
            }
        }
        assert_eq!(all.len(), 53);
    }

    #[tokio::test]
    async fn test_work_is_shared_between_consumers() {
        let queue = WorkQueue::new(classes(40));
        let consumers = vec![RecordingConsumer::new("a", 5), RecordingConsumer::new("b", 5)];

        let report = dispatch(&queue, &consumers, 2).await;

        assert!(report.assignments.iter().all(|a| a.class_count() > 0));
        for assignment in &report.assignments {
            assert!(assignment.batches.iter().all(|b| b.len() == 2));
        }
    }

    #[tokio::test]
    async fn test_failed_consumer_stops_without_reassignment() {
        let queue = WorkQueue::new(classes(30));
        let consumers = vec![
            RecordingConsumer::new("flaky", 1).failing_on(0),
            RecordingConsumer::new("steady", 1),
        ];

        let report = dispatch(&queue, &consumers, 3).await;

        assert_eq!(report.failed_consumers(), vec!["flaky"]);
        assert_eq!(report.assignments[0].batches.len(), 1);
        assert_eq!(
            report.assignments[0].error.as_deref(),
            Some("device offline")
        );
        assert_eq!(report.dispatched(), 30);
        assert_eq!(report.remaining, 0);
    }

    #[tokio::test]
    async fn test_all_consumers_failing_leaves_work_queued() {
        let queue = WorkQueue::new(classes(10));
        let consumers = vec![RecordingConsumer::new("only", 0).failing_on(0)];

        let report = dispatch(&queue, &consumers, 4).await;

        assert_eq!(report.dispatched(), 4);
        assert_eq!(report.remaining, 6);
        assert_eq!(queue.len(), 6);
    }

    #[tokio::test]
    async fn test_no_consumers_takes_nothing() {
        let queue = WorkQueue::new(classes(3));
        let consumers: Vec<LoggingConsumer> = Vec::new();
        let report = dispatch(&queue, &consumers, 5).await;
        assert!(report.assignments.is_empty());
        assert_eq!(report.remaining, 3);
    }

    #[tokio::test]
    async fn test_logging_consumer_drains() {
        let queue = WorkQueue::new(classes(7));
        let consumers = vec![LoggingConsumer::new("emulator-5554")];
        let report = dispatch(&queue, &consumers, 5).await;
        assert_eq!(report.assignments[0].batches.len(), 2);
        assert_eq!(report.assignments[0].batches[1].len(), 2);
    }
}
