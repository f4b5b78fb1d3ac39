//! Log subscriber setup.
//!
//! Installs a global `tracing` subscriber: an env filter plus either a
//! pretty or a JSON formatting layer.

use crate::config::PegConfig;
use crate::domain::PegError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging from configuration.
///
/// `RUST_LOG` wins over `config.log_level`. Fails if a global subscriber is
/// already installed.
pub fn init_tracing(config: &PegConfig) -> Result<(), PegError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| PegError::TracingInit(e.to_string()))?;

    if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| PegError::TracingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| PegError::TracingInit(e.to_string()))?;
    }

    tracing::info!(
        protocol = %config.protocol,
        log_level = %config.log_level,
        json = config.json_logs,
        "[peg] tracing initialized"
    );
    Ok(())
}
