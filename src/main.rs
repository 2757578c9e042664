use anyhow::Result;
use kafka_event_pipeline::config::Config;
use kafka_event_pipeline::runner::PipelineRunner;
use kafka_event_pipeline::utils;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Optional config file path; built-in defaults cover the local
    // single-broker setup when the file is absent.
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());
    let config = Config::load_or_default(&config_path)?;

    utils::initialize_logging(&config.logging);

    info!(
        "🔧 Using broker {} with topic '{}'",
        config.broker.bootstrap_servers, config.broker.topic
    );

    PipelineRunner::new().with_config(config).run().await
}
