//! Configuration loading and typed config structures for the Jackpot engine.
//!
//! The canonical configuration lives in `jackpot-config.yaml` next to the
//! process. Every field has a default, so a missing file or a missing key
//! falls back to the values below. Selected fields can be overridden
//! through `JACKPOT_*` environment variables.
//!
//! Configuration is validated once at startup by [`EngineConfig::validate`];
//! an invalid configuration is fatal before any tick is scheduled.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but describes an unusable engine.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level engine configuration.
///
/// Mirrors the structure of `jackpot-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Generator cadence, value range, and completion rule.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Snapshot location and cadence.
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Live subscriber behavior.
    #[serde(default)]
    pub subscribers: SubscriberConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl EngineConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment overrides are applied after parsing; see
    /// [`apply_overrides_from`](Self::apply_overrides_from).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if an override cannot be parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string. No overrides are applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        Ok(config)
    }

    /// Override values with `JACKPOT_*` environment variables when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set but unparsable.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Override values using an arbitrary key lookup.
    ///
    /// Recognized keys:
    /// - `JACKPOT_TICK_INTERVAL_MS`
    /// - `JACKPOT_TARGET_VALUE`
    /// - `JACKPOT_VALUE_MIN`
    /// - `JACKPOT_VALUE_MAX`
    /// - `JACKPOT_HALT_ON_COMPLETION` (`true` or `false`)
    /// - `JACKPOT_SEED`
    /// - `JACKPOT_SNAPSHOT_PATH`
    /// - `JACKPOT_SNAPSHOT_INTERVAL_MS`
    /// - `JACKPOT_BACKLOG_SIZE`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a numeric value cannot be parsed.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("JACKPOT_TICK_INTERVAL_MS") {
            self.generator.tick_interval_ms = parse_override("JACKPOT_TICK_INTERVAL_MS", &val)?;
        }
        if let Some(val) = lookup("JACKPOT_TARGET_VALUE") {
            self.generator.target_value = parse_override("JACKPOT_TARGET_VALUE", &val)?;
        }
        if let Some(val) = lookup("JACKPOT_VALUE_MIN") {
            self.generator.value_min = parse_override("JACKPOT_VALUE_MIN", &val)?;
        }
        if let Some(val) = lookup("JACKPOT_VALUE_MAX") {
            self.generator.value_max = parse_override("JACKPOT_VALUE_MAX", &val)?;
        }
        if let Some(val) = lookup("JACKPOT_HALT_ON_COMPLETION") {
            self.generator.halt_on_completion =
                parse_override("JACKPOT_HALT_ON_COMPLETION", &val)?;
        }
        if let Some(val) = lookup("JACKPOT_SEED") {
            self.generator.seed = Some(parse_override("JACKPOT_SEED", &val)?);
        }
        if let Some(val) = lookup("JACKPOT_SNAPSHOT_PATH") {
            self.persistence.snapshot_path = PathBuf::from(val);
        }
        if let Some(val) = lookup("JACKPOT_SNAPSHOT_INTERVAL_MS") {
            self.persistence.snapshot_interval_ms =
                parse_override("JACKPOT_SNAPSHOT_INTERVAL_MS", &val)?;
        }
        if let Some(val) = lookup("JACKPOT_BACKLOG_SIZE") {
            self.subscribers.backlog_size = parse_override("JACKPOT_BACKLOG_SIZE", &val)?;
        }
        Ok(())
    }

    /// Reject configurations the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a zero tick or snapshot period,
    /// an empty value range, or a target outside the range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let generator = &self.generator;
        if generator.tick_interval_ms == 0 {
            return Err(invalid("generator.tick_interval_ms must be at least 1"));
        }
        if self.persistence.snapshot_interval_ms == 0 {
            return Err(invalid("persistence.snapshot_interval_ms must be at least 1"));
        }
        if generator.value_min >= generator.value_max {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "value range [{}, {}) is empty",
                    generator.value_min, generator.value_max
                ),
            });
        }
        if !generator.range().contains(generator.target_value) {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "target value {} lies outside [{}, {})",
                    generator.target_value, generator.value_min, generator.value_max
                ),
            });
        }
        if self.persistence.snapshot_path.as_os_str().is_empty() {
            return Err(invalid("persistence.snapshot_path must not be empty"));
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.to_owned(),
    }
}

fn parse_override<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_err| ConfigError::Invalid {
        reason: format!("{key} has unparsable value {raw:?}"),
    })
}

/// Half-open range `[min, max)` that generated values are drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueRange {
    /// Inclusive lower bound.
    pub min: u32,
    /// Exclusive upper bound.
    pub max: u32,
}

impl ValueRange {
    /// Whether `value` falls inside the range.
    pub const fn contains(&self, value: u32) -> bool {
        value >= self.min && value < self.max
    }
}

/// Generator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GeneratorConfig {
    /// Real-time milliseconds between ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// The value whose first appearance raises the completion flag.
    #[serde(default = "default_target_value")]
    pub target_value: u32,

    /// Inclusive lower bound of drawn values.
    #[serde(default = "default_value_min")]
    pub value_min: u32,

    /// Exclusive upper bound of drawn values.
    #[serde(default = "default_value_max")]
    pub value_max: u32,

    /// Stop ticking for good once the target has been produced.
    #[serde(default)]
    pub halt_on_completion: bool,

    /// Seed for a reproducible value stream. `None` draws from the
    /// thread-local generator.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl GeneratorConfig {
    /// The configured value range.
    pub const fn range(&self) -> ValueRange {
        ValueRange {
            min: self.value_min,
            max: self.value_max,
        }
    }

    /// The tick period.
    pub const fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            target_value: default_target_value(),
            value_min: default_value_min(),
            value_max: default_value_max(),
            halt_on_completion: false,
            seed: None,
        }
    }
}

/// Snapshot persistence configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PersistenceConfig {
    /// Path of the snapshot file.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Real-time milliseconds between snapshot writes.
    #[serde(default = "default_snapshot_interval_ms")]
    pub snapshot_interval_ms: u64,
}

impl PersistenceConfig {
    /// The snapshot period.
    pub const fn snapshot_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_interval_ms)
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            snapshot_interval_ms: default_snapshot_interval_ms(),
        }
    }
}

/// Live subscriber configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscriberConfig {
    /// Number of recent records sent to a subscriber when it registers.
    #[serde(default = "default_backlog_size")]
    pub backlog_size: usize,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            backlog_size: default_backlog_size(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: `pretty` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl LoggingConfig {
    /// Whether JSON output was requested.
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_tick_interval_ms() -> u64 {
    1_000
}

const fn default_target_value() -> u32 {
    69_696_969
}

const fn default_value_min() -> u32 {
    1
}

const fn default_value_max() -> u32 {
    100_000_000
}

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("db.json")
}

const fn default_snapshot_interval_ms() -> u64 {
    60_000
}

const fn default_backlog_size() -> usize {
    60
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_log_format() -> String {
    "pretty".to_owned()
}
