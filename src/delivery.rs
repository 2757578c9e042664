use std::future::Future;
use std::sync::Arc;

use futures::channel::oneshot::Canceled;
use rdkafka::error::KafkaError;
use rdkafka::message::Message;
use rdkafka::producer::future_producer::OwnedDeliveryResult;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::metrics::PipelineMetrics;

/// Final placement of one published message, as reported asynchronously
/// by the broker client.
#[derive(Debug, Clone)]
pub enum DeliveryOutcome {
    /// The broker accepted the message at the given position.
    Delivered {
        topic: String,
        partition: i32,
        offset: i64,
    },
    /// The client gave up on the message.
    Failed {
        topic: String,
        partition: i32,
        error: KafkaError,
    },
}

impl DeliveryOutcome {
    /// Convert the client's raw delivery result. The success arm of the
    /// raw result carries only (partition, offset), so the destination
    /// topic is supplied by the caller.
    pub fn from_result(topic: &str, result: OwnedDeliveryResult) -> Self {
        match result {
            Ok((partition, offset)) => Self::Delivered {
                topic: topic.to_string(),
                partition,
                offset,
            },
            Err((error, message)) => Self::Failed {
                topic: message.topic().to_string(),
                partition: message.partition(),
                error,
            },
        }
    }
}

/// Drain the delivery acknowledgements of one producer task.
///
/// Each queued publish hands its pending acknowledgement over `deliveries`;
/// this loop awaits them in order and logs exactly one outcome per message.
/// It runs until the sending side is dropped and the queue is empty, which
/// the owning producer does once it leaves its publish loop.
pub async fn report_deliveries<F>(
    task_id: String,
    topic: String,
    mut deliveries: mpsc::UnboundedReceiver<F>,
    metrics: Arc<PipelineMetrics>,
) where
    F: Future<Output = Result<OwnedDeliveryResult, Canceled>>,
{
    while let Some(pending) = deliveries.recv().await {
        let outcome = match pending.await {
            Ok(result) => DeliveryOutcome::from_result(&topic, result),
            // The producer was closed with this report still unresolved;
            // no acknowledgement will ever arrive. -1 is the client's
            // unassigned-partition marker.
            Err(Canceled) => DeliveryOutcome::Failed {
                topic: topic.clone(),
                partition: -1,
                error: KafkaError::Canceled,
            },
        };

        match outcome {
            DeliveryOutcome::Delivered {
                topic,
                partition,
                offset,
            } => {
                info!(
                    "✅ [{}] Delivered message to topic {} [{}] at offset {}",
                    task_id, topic, partition, offset
                );
                metrics.record_delivered();
            }
            DeliveryOutcome::Failed {
                topic,
                partition,
                error,
            } => {
                error!(
                    "❌ [{}] Delivery failed for topic {} [{}]: {}",
                    task_id, topic, partition, error
                );
                metrics.record_delivery_failure();
            }
        }
    }

    debug!("📪 [{}] Delivery reporter drained", task_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::{ready, Ready};
    use rdkafka::error::RDKafkaErrorCode;
    use rdkafka::message::{OwnedMessage, Timestamp};
    use std::time::Duration;

    fn delivered(partition: i32, offset: i64) -> Ready<Result<OwnedDeliveryResult, Canceled>> {
        ready(Ok(Ok((partition, offset))))
    }

    fn failed(topic: &str, partition: i32) -> Ready<Result<OwnedDeliveryResult, Canceled>> {
        let message = OwnedMessage::new(
            Some(b"payload".to_vec()),
            Some(b"key".to_vec()),
            topic.to_string(),
            Timestamp::NotAvailable,
            partition,
            -1,
            None,
        );
        ready(Ok(Err((
            KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut),
            message,
        ))))
    }

    fn canceled() -> Ready<Result<OwnedDeliveryResult, Canceled>> {
        ready(Err(Canceled))
    }

    // ============================================================
    // OUTCOME CONVERSION TESTS
    // ============================================================

    #[test]
    fn test_from_result_success_keeps_position() {
        let outcome = DeliveryOutcome::from_result("events-topic", Ok((3, 42)));
        match outcome {
            DeliveryOutcome::Delivered {
                topic,
                partition,
                offset,
            } => {
                assert_eq!(topic, "events-topic");
                assert_eq!(partition, 3);
                assert_eq!(offset, 42);
            }
            DeliveryOutcome::Failed { .. } => panic!("expected a delivered outcome"),
        }
    }

    #[test]
    fn test_from_result_failure_keeps_message_context() {
        let message = OwnedMessage::new(
            None,
            None,
            "events-topic".to_string(),
            Timestamp::NotAvailable,
            1,
            -1,
            None,
        );
        let outcome = DeliveryOutcome::from_result(
            "events-topic",
            Err((
                KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull),
                message,
            )),
        );

        match outcome {
            DeliveryOutcome::Failed {
                topic, partition, ..
            } => {
                assert_eq!(topic, "events-topic");
                assert_eq!(partition, 1);
            }
            DeliveryOutcome::Delivered { .. } => panic!("expected a failed outcome"),
        }
    }

    // ============================================================
    // REPORTER LOOP TESTS
    // ============================================================

    #[tokio::test]
    async fn test_reporter_counts_one_outcome_per_message() {
        let metrics = Arc::new(PipelineMetrics::new());
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(delivered(0, 1)).unwrap();
        tx.send(failed("events-topic", 0)).unwrap();
        tx.send(delivered(1, 7)).unwrap();
        drop(tx);

        report_deliveries(
            "producer1".to_string(),
            "events-topic".to_string(),
            rx,
            metrics.clone(),
        )
        .await;

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.delivered, 2);
        assert_eq!(snapshot.delivery_failures, 1);
        assert_eq!(snapshot.delivered + snapshot.delivery_failures, 3);
    }

    #[tokio::test]
    async fn test_reporter_treats_canceled_report_as_failure() {
        let metrics = Arc::new(PipelineMetrics::new());
        let (tx, rx) = mpsc::unbounded_channel();

        tx.send(delivered(0, 1)).unwrap();
        tx.send(canceled()).unwrap();
        drop(tx);

        report_deliveries(
            "producer1".to_string(),
            "events-topic".to_string(),
            rx,
            metrics.clone(),
        )
        .await;

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.delivered, 1);
        assert_eq!(snapshot.delivery_failures, 1);
    }

    #[tokio::test]
    async fn test_reporter_stops_when_sender_dropped() {
        let metrics = Arc::new(PipelineMetrics::new());
        let (tx, rx) = mpsc::unbounded_channel::<Ready<Result<OwnedDeliveryResult, Canceled>>>();
        drop(tx);

        let drained = tokio::time::timeout(
            Duration::from_secs(1),
            report_deliveries(
                "producer1".to_string(),
                "events-topic".to_string(),
                rx,
                metrics.clone(),
            ),
        )
        .await;

        assert!(drained.is_ok());
        assert_eq!(metrics.snapshot().delivered, 0);
    }

    #[tokio::test]
    async fn test_reporter_drains_backlog_after_sender_dropped() {
        let metrics = Arc::new(PipelineMetrics::new());
        let (tx, rx) = mpsc::unbounded_channel();

        for offset in 0..10 {
            tx.send(delivered(0, offset)).unwrap();
        }
        drop(tx);

        report_deliveries(
            "producer2".to_string(),
            "events-topic".to_string(),
            rx,
            metrics.clone(),
        )
        .await;

        assert_eq!(metrics.snapshot().delivered, 10);
    }
}
