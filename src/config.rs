use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Top-level application configuration, loaded from a YAML file. Every
/// section and every field falls back to a sensible default, so a partial
/// file (or none at all) still yields a runnable pipeline.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub broker: BrokerConfig,
    #[serde(default)]
    pub producer: ProducerConfig,
    #[serde(default)]
    pub consumer: ConsumerConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Kafka cluster coordinates shared by every handle in the pipeline.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerConfig {
    #[serde(default = "default_bootstrap_servers")]
    pub bootstrap_servers: String,
    #[serde(default = "default_topic")]
    pub topic: String,
}

/// Producer fleet shape and publish behavior.
#[derive(Debug, Deserialize, Clone)]
pub struct ProducerConfig {
    /// Number of producer tasks to spawn.
    #[serde(default = "default_producer_count")]
    pub count: u32,
    /// Pause between publishes on each producer task.
    #[serde(default = "default_producer_interval_secs")]
    pub interval_secs: u64,
    /// How long the client may try to deliver one message before failing it.
    #[serde(default = "default_message_timeout_ms")]
    pub message_timeout_ms: u64,
    /// Upper bound on the final queue flush during shutdown.
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,
    /// Broker acknowledgement level ("all" waits for the full ISR).
    #[serde(default = "default_acks")]
    pub acks: String,
}

/// Consumer fleet shape and poll behavior.
#[derive(Debug, Deserialize, Clone)]
pub struct ConsumerConfig {
    /// Number of consumer tasks to spawn, each under its own group.
    #[serde(default = "default_consumer_count")]
    pub count: u32,
    /// Group ids are formed as "<group_prefix>-<n>".
    #[serde(default = "default_group_prefix")]
    pub group_prefix: String,
    /// Poll window; an empty window is normal idling, not a failure.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    /// Where a fresh group starts reading from.
    #[serde(default = "default_auto_offset_reset")]
    pub auto_offset_reset: String,
}

/// Settings for the one-shot unread-message scan.
#[derive(Debug, Deserialize, Clone)]
pub struct MonitorConfig {
    /// Dedicated group id so the scan never disturbs the real consumers.
    #[serde(default = "default_monitor_group_id")]
    pub group_id: String,
    /// Timeout applied to each metadata and watermark query.
    #[serde(default = "default_monitor_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// "stdout" or "stderr".
    #[serde(default = "default_log_output")]
    pub output: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: default_bootstrap_servers(),
            topic: default_topic(),
        }
    }
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            count: default_producer_count(),
            interval_secs: default_producer_interval_secs(),
            message_timeout_ms: default_message_timeout_ms(),
            flush_timeout_ms: default_flush_timeout_ms(),
            acks: default_acks(),
        }
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            count: default_consumer_count(),
            group_prefix: default_group_prefix(),
            poll_timeout_secs: default_poll_timeout_secs(),
            auto_offset_reset: default_auto_offset_reset(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            group_id: default_monitor_group_id(),
            timeout_ms: default_monitor_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            output: default_log_output(),
        }
    }
}

fn default_bootstrap_servers() -> String {
    "localhost:9092".to_string()
}

fn default_topic() -> String {
    "events-topic".to_string()
}

fn default_producer_count() -> u32 {
    2
}

fn default_producer_interval_secs() -> u64 {
    2
}

fn default_message_timeout_ms() -> u64 {
    5000
}

fn default_flush_timeout_ms() -> u64 {
    5000
}

fn default_acks() -> String {
    "all".to_string()
}

fn default_consumer_count() -> u32 {
    2
}

fn default_group_prefix() -> String {
    "consumer-group".to_string()
}

fn default_poll_timeout_secs() -> u64 {
    1
}

fn default_auto_offset_reset() -> String {
    "earliest".to_string()
}

fn default_monitor_group_id() -> String {
    "offset-checker".to_string()
}

fn default_monitor_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_output() -> String {
    "stdout".to_string()
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        Ok(config)
    }

    /// Load configuration from a YAML file, falling back to the built-in
    /// defaults when the file does not exist. A file that exists but does
    /// not parse is still an error.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Task id for the n-th producer (zero-based index).
    pub fn producer_id(&self, index: u32) -> String {
        format!("producer{}", index + 1)
    }

    /// Task id for the n-th consumer (zero-based index).
    pub fn consumer_id(&self, index: u32) -> String {
        format!("consumer{}", index + 1)
    }

    /// Group id for the n-th consumer. Each consumer gets its own group,
    /// so every group receives the full event stream.
    pub fn consumer_group(&self, index: u32) -> String {
        format!("{}-{}", self.consumer.group_prefix, index + 1)
    }

    pub fn producer_interval(&self) -> Duration {
        Duration::from_secs(self.producer.interval_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.consumer.poll_timeout_secs)
    }

    pub fn flush_timeout(&self) -> Duration {
        Duration::from_millis(self.producer.flush_timeout_ms)
    }

    pub fn monitor_timeout(&self) -> Duration {
        Duration::from_millis(self.monitor.timeout_ms)
    }
}
