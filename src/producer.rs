use std::sync::Arc;

use anyhow::{Context, Result};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::delivery;
use crate::event::Event;
use crate::metrics::PipelineMetrics;

/// Build the producer handle for one publishing task.
fn create_producer(config: &Config) -> Result<FutureProducer> {
    ClientConfig::new()
        .set("bootstrap.servers", &config.broker.bootstrap_servers)
        .set("message.timeout.ms", config.producer.message_timeout_ms.to_string())
        .set("acks", &config.producer.acks)
        .create()
        .context("Failed to create Kafka producer")
}

/// Publish events at a fixed cadence until shutdown is signaled.
///
/// Each publish is queued without waiting for the broker; the pending
/// acknowledgement is handed to this task's delivery reporter, which
/// confirms placement out of band. On shutdown the queue is flushed and
/// the reporter is joined before the task returns, so no acknowledgement
/// goes unreported.
pub async fn run_producer(
    task_id: String,
    config: Config,
    mut shutdown_rx: broadcast::Receiver<()>,
    metrics: Arc<PipelineMetrics>,
) -> Result<()> {
    let producer = create_producer(&config)
        .with_context(|| format!("Producer '{}' setup failed", task_id))?;

    let topic = config.broker.topic.clone();
    let interval = config.producer_interval();

    let (delivery_tx, delivery_rx) = mpsc::unbounded_channel();
    let reporter = tokio::spawn(delivery::report_deliveries(
        task_id.clone(),
        topic.clone(),
        delivery_rx,
        metrics.clone(),
    ));

    info!(
        "🚀 Producer '{}' started for topic '{}' (every {:?})",
        task_id, topic, interval
    );

    let mut sequence: u64 = 0;
    loop {
        let event = Event::next(&task_id, sequence);
        sequence += 1;

        match event.encode() {
            Ok(payload) => {
                let record = FutureRecord::to(&topic).payload(&payload).key(&event.id);
                match producer.send_result(record) {
                    Ok(pending) => {
                        metrics.record_published();
                        debug!("📤 [{}] Queued '{}' keyed by {}", task_id, event.name, event.id);
                        // The reporter holds the receiving side until this
                        // sender is dropped after the loop.
                        let _ = delivery_tx.send(pending);
                    }
                    Err((e, _)) => {
                        error!("❌ [{}] Failed to produce '{}': {}", task_id, event.name, e);
                    }
                }
            }
            Err(e) => {
                error!("❌ [{}] Failed to encode '{}': {}", task_id, event.name, e);
            }
        }

        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("🛑 Producer '{}' received shutdown signal", task_id);
                break;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }

    // Closing the channel lets the reporter finish once the backlog is done.
    drop(delivery_tx);

    if let Err(e) = producer.flush(config.flush_timeout()) {
        warn!("⚠️ Producer '{}' flush on close failed: {}", task_id, e);
    }
    if let Err(e) = reporter.await {
        warn!("⚠️ Producer '{}' delivery reporter failed: {}", task_id, e);
    }

    info!("✅ Producer '{}' stopped after {} events", task_id, sequence);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn create_test_config() -> Config {
        let mut config = Config::default();
        // No broker listens during tests; keep every client timeout short
        // so queued messages fail fast and shutdown stays quick.
        config.producer.message_timeout_ms = 100;
        config.producer.flush_timeout_ms = 500;
        config
    }

    // ============================================================
    // HANDLE CREATION TESTS
    // ============================================================

    #[test]
    fn test_create_producer_with_default_config() {
        // Creation validates configuration only; no connection is made.
        let result = create_producer(&Config::default());
        assert!(result.is_ok());
    }

    #[test]
    fn test_create_producer_rejects_invalid_acks() {
        let mut config = Config::default();
        config.producer.acks = "not-a-valid-acks-value".to_string();

        let error = create_producer(&config)
            .err()
            .expect("invalid acks value must fail handle creation");
        assert!(format!("{:#}", error).contains("Failed to create Kafka producer"));
    }

    // ============================================================
    // PUBLISH LOOP TESTS
    // ============================================================

    #[tokio::test]
    async fn test_producer_stops_on_shutdown_signal() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let metrics = Arc::new(PipelineMetrics::new());

        let handle = tokio::spawn(run_producer(
            "producer1".to_string(),
            create_test_config(),
            shutdown_rx,
            metrics.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(300)).await;
        shutdown_tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("producer did not stop after shutdown signal")
            .unwrap();
        assert!(result.is_ok());

        // One event is published immediately, then the loop parks on the
        // two-second interval until the signal lands.
        assert_eq!(metrics.snapshot().published, 1);
    }

    #[tokio::test]
    async fn test_producer_interval_wait_is_interruptible() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let metrics = Arc::new(PipelineMetrics::new());

        let mut config = create_test_config();
        config.producer.interval_secs = 60;

        let started = Instant::now();
        let handle = tokio::spawn(run_producer(
            "producer1".to_string(),
            config,
            shutdown_rx,
            metrics.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown_tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("producer stuck in its publish interval")
            .unwrap();
        assert!(result.is_ok());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_producer_reports_every_queued_message() {
        let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let metrics = Arc::new(PipelineMetrics::new());

        let handle = tokio::spawn(run_producer(
            "producer1".to_string(),
            create_test_config(),
            shutdown_rx,
            metrics.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(300)).await;
        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("producer did not stop after shutdown signal")
            .unwrap()
            .unwrap();

        // With no broker every queued message fails after its timeout, but
        // each one still gets exactly one reported outcome.
        let snapshot = metrics.snapshot();
        assert_eq!(
            snapshot.delivered + snapshot.delivery_failures,
            snapshot.published
        );
    }

    #[tokio::test]
    async fn test_producer_setup_failure_is_task_fatal() {
        let (_shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
        let metrics = Arc::new(PipelineMetrics::new());

        let mut config = create_test_config();
        config.producer.acks = "bogus".to_string();

        let result = run_producer("producer1".to_string(), config, shutdown_rx, metrics).await;
        assert!(result.is_err());
        let error = format!("{:#}", result.unwrap_err());
        assert!(error.contains("Producer 'producer1' setup failed"));
    }
}
