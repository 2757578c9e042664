// Public API
pub mod config;
pub mod consumer;
pub mod event;
pub mod metrics;
pub mod runner;
pub mod utils;

// Internal modules
mod delivery;
mod monitor;
mod producer;

#[cfg(test)]
#[ctor::ctor]
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
