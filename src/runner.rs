use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::config::Config;
use crate::consumer::{self, EventSink, LogSink};
use crate::metrics::PipelineMetrics;
use crate::monitor;
use crate::producer;

/// Trait for pipeline implementations to enable testing with mocks
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait Pipeline: Send + Sync {
    /// Run the pipeline with the configured settings
    async fn run(self) -> Result<()>;

    /// Run the pipeline with an external shutdown signal
    async fn run_with_shutdown_signal(self, shutdown_tx: broadcast::Sender<()>) -> Result<()>;
}

/// Builder for configuring and running the event pipeline.
pub struct PipelineRunner {
    config: Option<Config>,
    sink: Arc<dyn EventSink>,
    metrics: Arc<PipelineMetrics>,
}

impl Default for PipelineRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineRunner {
    /// Create a new pipeline runner instance
    pub fn new() -> Self {
        Self {
            config: None,
            sink: Arc::new(LogSink),
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }

    /// Set configuration directly
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the default logging sink with a custom destination for
    /// decoded events.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Counters shared with every task of this runner. Grab a clone before
    /// calling `run` to observe the pipeline from outside.
    pub fn metrics(&self) -> Arc<PipelineMetrics> {
        self.metrics.clone()
    }

    /// Run the pipeline until an operating-system shutdown signal arrives.
    pub async fn run(mut self) -> Result<()> {
        let config = self.take_config()?;
        let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
        self.run_pipeline(config, shutdown_tx).await
    }

    /// Run the pipeline with an externally controlled shutdown signal.
    /// Sending on `shutdown_tx` (or an OS signal) stops the fleet.
    pub async fn run_with_shutdown_signal(
        mut self,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Result<()> {
        let config = self.take_config()?;
        self.run_pipeline(config, shutdown_tx).await
    }

    fn take_config(&mut self) -> Result<Config> {
        self.config.take().ok_or_else(|| {
            anyhow::anyhow!(
                "No configuration provided. Use .with_config(config) to set configuration before calling .run()"
            )
        })
    }

    async fn run_pipeline(self, config: Config, shutdown_tx: broadcast::Sender<()>) -> Result<()> {
        // Listen for signals from the very start so a Ctrl+C during
        // startup is not lost.
        let shutdown_handle = self.setup_external_shutdown_handler(shutdown_tx.clone());

        let mut pipeline_tasks: JoinSet<Result<()>> = JoinSet::new();

        self.spawn_producers(&config, &shutdown_tx, &mut pipeline_tasks);

        // Subscribe the consumers' receivers now: a broadcast receiver only
        // sees signals sent after it subscribes, and shutdown may arrive
        // while the scan below is still in flight.
        let consumer_shutdown_rxs: Vec<broadcast::Receiver<()>> = (0..config.consumer.count)
            .map(|_| shutdown_tx.subscribe())
            .collect();

        // Snapshot the unread counts before any consumer starts reading.
        self.run_lag_scan(&config).await;

        self.spawn_consumers(&config, consumer_shutdown_rxs, &mut pipeline_tasks);

        info!(
            "🚀 Pipeline running: {} producers, {} consumers on topic '{}'",
            config.producer.count, config.consumer.count, config.broker.topic
        );

        let _ = shutdown_handle.await;

        info!(
            "🛑 Shutting down, draining {} pipeline tasks...",
            pipeline_tasks.len()
        );
        self.drain_pipeline_tasks(pipeline_tasks).await;

        let snapshot = self.metrics.snapshot();
        info!(
            "📊 Final counts - published: {}, delivered: {}, failed: {}, consumed: {}, decode failures: {}",
            snapshot.published,
            snapshot.delivered,
            snapshot.delivery_failures,
            snapshot.consumed,
            snapshot.decode_failures
        );
        info!("✅ App closed");
        Ok(())
    }

    fn spawn_producers(
        &self,
        config: &Config,
        shutdown_tx: &broadcast::Sender<()>,
        tasks: &mut JoinSet<Result<()>>,
    ) {
        for index in 0..config.producer.count {
            let task_id = config.producer_id(index);
            let task_config = config.clone();
            let shutdown_rx = shutdown_tx.subscribe();
            let metrics = self.metrics.clone();

            tasks.spawn(async move {
                producer::run_producer(task_id, task_config, shutdown_rx, metrics).await
            });
        }
    }

    fn spawn_consumers(
        &self,
        config: &Config,
        shutdown_rxs: Vec<broadcast::Receiver<()>>,
        tasks: &mut JoinSet<Result<()>>,
    ) {
        for (index, shutdown_rx) in shutdown_rxs.into_iter().enumerate() {
            let task_id = config.consumer_id(index as u32);
            let group_id = config.consumer_group(index as u32);
            let task_config = config.clone();
            let sink = self.sink.clone();
            let metrics = self.metrics.clone();

            tasks.spawn(async move {
                consumer::run_consumer(task_id, group_id, task_config, shutdown_rx, sink, metrics)
                    .await
            });
        }
    }

    /// One-shot unread-message scan. A failure is reported and swallowed;
    /// the pipeline starts regardless.
    async fn run_lag_scan(&self, config: &Config) {
        let monitor_config = config.clone();
        match tokio::task::spawn_blocking(move || monitor::scan_unread(&monitor_config)).await {
            Ok(Ok(report)) => {
                info!("🔍 Unread-message scan covered {} topic(s)", report.len());
            }
            Ok(Err(e)) => {
                warn!("⚠️ Unread-message scan failed: {}", e);
            }
            Err(e) => {
                warn!("⚠️ Unread-message scan task failed: {}", e);
            }
        }
    }

    /// Bridge OS signals into the shared shutdown channel. The returned
    /// handle resolves once shutdown has been requested from either side.
    fn setup_external_shutdown_handler(
        &self,
        shutdown_tx: broadcast::Sender<()>,
    ) -> tokio::task::JoinHandle<()> {
        let mut shutdown_rx = shutdown_tx.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("📡 Received external shutdown signal");
                }
                _ = crate::utils::setup_signal_handlers() => {
                    info!("📡 Received system shutdown signal");
                    let _ = shutdown_tx.send(());
                }
            }
        })
    }

    /// Wait for every pipeline task to finish. There is no abort path;
    /// each task is trusted to observe the shutdown signal on its own.
    async fn drain_pipeline_tasks(&self, mut tasks: JoinSet<Result<()>>) {
        let total = tasks.len();
        let mut stopped = 0;

        while let Some(result) = tasks.join_next().await {
            stopped += 1;
            match result {
                Ok(Ok(())) => {
                    info!("✅ Task {}/{} shut down gracefully", stopped, total);
                }
                Ok(Err(e)) => {
                    warn!("⚠️ Task {}/{} shut down with error: {}", stopped, total, e);
                }
                Err(e) => {
                    warn!("⚠️ Task {}/{} failed to join: {}", stopped, total, e);
                }
            }
        }

        info!("✅ All {} pipeline tasks stopped", total);
    }
}

#[async_trait::async_trait]
impl Pipeline for PipelineRunner {
    async fn run(self) -> Result<()> {
        self.run().await
    }

    async fn run_with_shutdown_signal(self, shutdown_tx: broadcast::Sender<()>) -> Result<()> {
        self.run_with_shutdown_signal(shutdown_tx).await
    }
}
