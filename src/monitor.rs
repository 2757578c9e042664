use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::error::KafkaError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Failed to create monitoring consumer: {0}")]
    Handle(#[source] KafkaError),
    #[error("Metadata fetch failed: {0}")]
    Metadata(#[source] KafkaError),
}

/// Unread-message count for one topic, taken from a watermark scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicLag {
    pub topic: String,
    pub unread: i64,
}

/// Sum of unread messages across a set of (low, high) watermark pairs.
/// Inverted or overflowing pairs clamp to zero instead of wrapping.
pub fn unread_total(watermarks: &[(i64, i64)]) -> i64 {
    watermarks.iter().fold(0i64, |total, (low, high)| {
        total.saturating_add(high.saturating_sub(*low).max(0))
    })
}

/// One-shot scan of the broker: report the unread message count for every
/// user topic. A partition whose watermark query fails contributes zero
/// and is logged; only handle creation and the metadata fetch itself can
/// fail the scan.
///
/// The scan runs under its own group id so it never joins, rebalances or
/// commits against the groups doing real work. Both the metadata and the
/// watermark queries block, so callers on an async runtime should wrap
/// this in `spawn_blocking`.
pub fn scan_unread(config: &Config) -> Result<Vec<TopicLag>, MonitorError> {
    let consumer: BaseConsumer = ClientConfig::new()
        .set("bootstrap.servers", &config.broker.bootstrap_servers)
        .set("group.id", &config.monitor.group_id)
        .create()
        .map_err(MonitorError::Handle)?;

    let timeout = config.monitor_timeout();
    let metadata = consumer
        .fetch_metadata(None, timeout)
        .map_err(MonitorError::Metadata)?;

    let mut report = Vec::new();
    for topic in metadata.topics() {
        let name = topic.name();
        if name.starts_with("__") {
            // Broker-internal bookkeeping topics.
            continue;
        }

        let mut watermarks = Vec::with_capacity(topic.partitions().len());
        for partition in topic.partitions() {
            match consumer.fetch_watermarks(name, partition.id(), timeout) {
                Ok(pair) => watermarks.push(pair),
                Err(e) => {
                    warn!(
                        "⚠️ Watermark query failed for {} [{}]: {}",
                        name,
                        partition.id(),
                        e
                    );
                }
            }
        }

        let unread = unread_total(&watermarks);
        info!("📊 Topic: {}, Unread Messages: {}", name, unread);
        report.push(TopicLag {
            topic: name.to_string(),
            unread,
        });
    }

    Ok(report)
}
