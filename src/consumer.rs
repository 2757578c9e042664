use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Message};
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace, warn};

use crate::config::Config;
use crate::event::Event;
use crate::metrics::PipelineMetrics;

/// Application-side destination for decoded events. The pipeline only
/// moves bytes; whatever should happen to an event once it arrives is
/// behind this trait.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn deliver(&self, consumer_id: &str, event: Event) -> Result<()>;
}

/// Default sink: log each received event.
pub struct LogSink;

#[async_trait]
impl EventSink for LogSink {
    async fn deliver(&self, consumer_id: &str, event: Event) -> Result<()> {
        info!("📨 [{}] Received {} {}", consumer_id, event.name, event.id);
        Ok(())
    }
}

/// Build the consumer handle for one reading task.
fn create_consumer(config: &Config, group_id: &str) -> Result<StreamConsumer> {
    ClientConfig::new()
        .set("bootstrap.servers", &config.broker.bootstrap_servers)
        .set("group.id", group_id)
        .set("auto.offset.reset", &config.consumer.auto_offset_reset)
        .create()
        .context("Failed to create Kafka consumer")
}

/// Consume events from the topic until shutdown is signaled.
///
/// Each poll is bounded by the configured window. A window that elapses
/// without a message is normal idling and only repeats the poll; transport
/// errors are logged and the loop continues. The shutdown signal wins the
/// race against an in-flight poll, so stopping never waits out a window.
pub async fn run_consumer(
    task_id: String,
    group_id: String,
    config: Config,
    mut shutdown_rx: broadcast::Receiver<()>,
    sink: Arc<dyn EventSink>,
    metrics: Arc<PipelineMetrics>,
) -> Result<()> {
    let consumer = create_consumer(&config, &group_id)
        .with_context(|| format!("Consumer '{}' setup failed", task_id))?;

    let topic = config.broker.topic.clone();
    consumer
        .subscribe(&[topic.as_str()])
        .with_context(|| format!("Consumer '{}' failed to subscribe to '{}'", task_id, topic))?;

    let poll_timeout = config.poll_timeout();
    info!(
        "🚀 Consumer '{}' subscribed to '{}' in group '{}'",
        task_id, topic, group_id
    );

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("🛑 Consumer '{}' received shutdown signal", task_id);
                break;
            }
            polled = tokio::time::timeout(poll_timeout, consumer.recv()) => {
                match polled {
                    Ok(Ok(message)) => {
                        handle_message(&task_id, &message, &sink, &metrics).await;
                    }
                    Ok(Err(e)) => {
                        warn!("⚠️ [{}] Poll error: {}", task_id, e);
                    }
                    Err(_) => {
                        record_idle_window(&task_id, poll_timeout, &metrics);
                    }
                }
            }
        }
    }

    info!("✅ Consumer '{}' stopped", task_id);
    Ok(())
}

/// An elapsed window means the topic was idle, not that anything failed.
fn record_idle_window(task_id: &str, window: Duration, metrics: &PipelineMetrics) {
    metrics.record_poll_timeout();
    trace!(
        "[{}] Poll window of {:?} elapsed without a message",
        task_id,
        window
    );
}

async fn handle_message(
    task_id: &str,
    message: &BorrowedMessage<'_>,
    sink: &Arc<dyn EventSink>,
    metrics: &PipelineMetrics,
) {
    debug!(
        "📬 [{}] Message on {} [{}] at offset {}",
        task_id,
        message.topic(),
        message.partition(),
        message.offset()
    );

    let payload = message.payload().unwrap_or_default();
    match Event::decode(payload) {
        Ok(event) => {
            metrics.record_consumed();
            if let Err(e) = sink.deliver(task_id, event).await {
                warn!("⚠️ [{}] Sink rejected event: {}", task_id, e);
            }
        }
        Err(e) => {
            // A malformed payload is skipped, not fatal; the stream goes on.
            metrics.record_decode_failure();
            error!(
                "❌ [{}] Failed to decode message at offset {}: {}",
                task_id,
                message.offset(),
                e
            );
        }
    }
}
