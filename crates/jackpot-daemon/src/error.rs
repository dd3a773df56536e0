//! Error types for the daemon binary.
//!
//! [`DaemonError`] wraps every failure that can stop the process. All of
//! them are startup or shutdown failures; once the engine is running,
//! errors are logged and contained by the engine itself.

/// Top-level error for the daemon binary.
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: jackpot_core::config::ConfigError,
    },

    /// The snapshot could not be loaded or created.
    #[error("store error: {source}")]
    Store {
        /// The underlying store error.
        #[from]
        source: jackpot_core::StoreError,
    },

    /// The engine failed to start or stop cleanly.
    #[error("engine error: {source}")]
    Engine {
        /// The underlying engine error.
        #[from]
        source: jackpot_core::EngineError,
    },

    /// Waiting for the shutdown signal failed.
    #[error("signal error: {source}")]
    Signal {
        /// The underlying I/O error.
        source: std::io::Error,
    },
}
