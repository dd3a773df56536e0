//! Jackpot daemon.
//!
//! Draws a random value every tick until (and after) the target value
//! comes up, keeps the running history in a snapshot file, and streams
//! each value to registered listeners.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `jackpot-config.yaml` (or `JACKPOT_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Validate configuration
//! 4. Open the snapshot store (load or create)
//! 5. Build the engine and attach the log listener
//! 6. Start the tick and snapshot schedules
//! 7. Wait for Ctrl-C, then stop and flush a final snapshot

mod error;
mod listener;

use std::path::{Path, PathBuf};

use jackpot_core::config::{EngineConfig, LoggingConfig};
use jackpot_core::{Engine, GenerationStore};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::DaemonError;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "jackpot-config.yaml";

#[tokio::main]
async fn main() -> Result<(), DaemonError> {
    // 1. Load configuration.
    let explicit = std::env::var_os("JACKPOT_CONFIG").map(PathBuf::from);
    let (config, config_source) = load_config(explicit.as_deref())?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!(
        source = %config_source,
        tick_interval_ms = config.generator.tick_interval_ms,
        snapshot_interval_ms = config.persistence.snapshot_interval_ms,
        snapshot_path = %config.persistence.snapshot_path.display(),
        "Configuration loaded"
    );

    // 3. Validate before touching the snapshot.
    config.validate()?;

    // 4. Open the store.
    let store = GenerationStore::open(config.persistence.snapshot_path.clone()).await?;
    info!(
        generations = store.len(),
        completed = store.is_completed(),
        current = store.current().value,
        "Generation store ready"
    );

    // 5. Build the engine and attach the log listener.
    let engine = Engine::new(config, store)?;
    let feed = engine.feed();
    let (listener_id, listener_task) = listener::spawn_log_listener(&feed);

    // 6. Start ticking.
    let handle = engine.start();

    // 7. Run until interrupted.
    tokio::signal::ctrl_c()
        .await
        .map_err(|source| DaemonError::Signal { source })?;
    info!("Shutdown signal received");

    feed.unsubscribe(listener_id);
    handle.shutdown().await?;
    if let Err(e) = listener_task.await {
        warn!(error = %e, "Log listener ended abnormally");
    }

    info!(
        generations = feed.generation_count(),
        completed = feed.is_completed(),
        "jackpot-daemon shutdown complete"
    );
    Ok(())
}

/// Load configuration from an explicitly named file or the default path.
///
/// An explicit path (from `JACKPOT_CONFIG`) must exist. A missing default
/// file means defaults plus environment overrides. Returns the config and
/// a description of where it came from.
fn load_config(explicit: Option<&Path>) -> Result<(EngineConfig, String), DaemonError> {
    if let Some(path) = explicit {
        let config = EngineConfig::from_file(path)?;
        return Ok((config, path.display().to_string()));
    }

    let path = PathBuf::from(DEFAULT_CONFIG_PATH);
    if path.exists() {
        let config = EngineConfig::from_file(&path)?;
        Ok((config, path.display().to_string()))
    } else {
        let mut config = EngineConfig::default();
        config.apply_env_overrides()?;
        Ok((config, "defaults".to_owned()))
    }
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level.
fn init_logging(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    if logging.is_json() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use jackpot_core::config::ConfigError;

    use super::*;

    #[test]
    fn missing_explicit_config_is_an_error() {
        let result = load_config(Some(Path::new("/nonexistent/jackpot-config.yaml")));
        assert!(matches!(
            result,
            Err(DaemonError::Config {
                source: ConfigError::Io { .. }
            })
        ));
    }
}
