use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level when set. Calling this more than once is harmless;
/// later calls leave the existing subscriber in place.
pub fn initialize_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.output == "stderr" {
        let _ = builder.with_writer(std::io::stderr).try_init();
    } else {
        let _ = builder.try_init();
    }
}

/// Wait for an operating-system shutdown request. Resolves once any of
/// SIGTERM, SIGINT, SIGHUP or SIGQUIT arrives.
pub async fn setup_signal_handlers() {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to register SIGTERM handler");
        let mut sigint =
            signal(SignalKind::interrupt()).expect("Failed to register SIGINT handler");
        let mut sighup =
            signal(SignalKind::hangup()).expect("Failed to register SIGHUP handler");
        let mut sigquit =
            signal(SignalKind::quit()).expect("Failed to register SIGQUIT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                info!("📡 Received SIGTERM - initiating graceful shutdown");
            }
            _ = sigint.recv() => {
                info!("📡 Received SIGINT (Ctrl+C) - initiating graceful shutdown");
            }
            _ = sighup.recv() => {
                info!("📡 Received SIGHUP - initiating graceful shutdown");
            }
            _ = sigquit.recv() => {
                info!("📡 Received SIGQUIT - initiating graceful shutdown");
            }
        }
    }

    #[cfg(not(unix))]
    {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("📡 Received Ctrl+C - initiating graceful shutdown");
            }
            Err(err) => {
                tracing::error!("Unable to listen for shutdown signal: {}", err);
            }
        }
    }
}
