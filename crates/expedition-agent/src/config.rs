//! Configuration types for the field agent.
//!
//! The canonical configuration lives in `expedition-config.yaml` at the
//! project root. This module defines strongly-typed structs that mirror
//! the YAML structure and provides a loader that reads the file. Every
//! section has defaults, so an empty file (or no file at all) yields a
//! working simulated-source, in-memory-channel setup.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use uuid::Uuid;

use expedition_tracker::{RetryPolicy, WatchOptions};
use expedition_types::{ExpeditionId, LocationFix, ParticipantId};

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

    /// A field value is syntactically valid YAML but semantically wrong.
    #[error("invalid config value: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level agent configuration.
///
/// Mirrors the structure of `expedition-config.yaml`. All sections
/// default individually.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AgentConfig {
    /// Which expedition and participant this agent reports for.
    #[serde(default)]
    pub expedition: ExpeditionConfig,

    /// Event channel connection settings.
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Local storage settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Location watch settings.
    #[serde(default)]
    pub tracking: TrackingConfig,

    /// Channel reconnect settings.
    #[serde(default)]
    pub retry: RetryConfig,

    /// Location source selection.
    #[serde(default)]
    pub source: SourceConfig,

    /// Offline sync loop settings.
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AgentConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if it is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.channel.apply_env_overrides();
        Ok(config)
    }
}

// ---------------------------------------------------------------------------
// Expedition identity
// ---------------------------------------------------------------------------

/// Which expedition and participant the agent reports for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExpeditionConfig {
    /// Expedition UUID. Generated fresh when absent (useful for demos).
    #[serde(default)]
    pub id: Option<String>,

    /// Participant UUID. Generated fresh when absent.
    #[serde(default)]
    pub participant_id: Option<String>,
}

impl ExpeditionConfig {
    /// Resolve the expedition id, generating one when unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the configured value is not
    /// a UUID.
    pub fn expedition_id(&self) -> Result<ExpeditionId, ConfigError> {
        self.id.as_deref().map_or_else(
            || Ok(ExpeditionId::new()),
            |raw| {
                Uuid::parse_str(raw)
                    .map(ExpeditionId::from)
                    .map_err(|e| ConfigError::Invalid(format!("expedition.id: {e}")))
            },
        )
    }

    /// Resolve the participant id, generating one when unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] when the configured value is not
    /// a UUID.
    pub fn participant_id(&self) -> Result<ParticipantId, ConfigError> {
        self.participant_id.as_deref().map_or_else(
            || Ok(ParticipantId::new()),
            |raw| {
                Uuid::parse_str(raw)
                    .map(ParticipantId::from)
                    .map_err(|e| ConfigError::Invalid(format!("expedition.participant_id: {e}")))
            },
        )
    }
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// How the agent reaches the real-time event channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelMode {
    /// Connect to a NATS server.
    Nats,
    /// In-process channel; telemetry stays on the device (demo mode).
    Memory,
}

/// Event channel connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelConfig {
    /// Transport selection.
    #[serde(default = "default_channel_mode")]
    pub mode: ChannelMode,

    /// NATS server URL.
    #[serde(default = "default_channel_url")]
    pub url: String,
}

impl ChannelConfig {
    /// Let `EXPEDITION_NATS_URL` override the configured URL.
    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("EXPEDITION_NATS_URL") {
            self.url = url;
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            mode: default_channel_mode(),
            url: default_channel_url(),
        }
    }
}

const fn default_channel_mode() -> ChannelMode {
    ChannelMode::Memory
}

fn default_channel_url() -> String {
    "nats://localhost:4222".to_owned()
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Local storage settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StorageConfig {
    /// Path of the `SQLite` database file.
    #[serde(default = "default_storage_path")]
    pub path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: default_storage_path(),
        }
    }
}

fn default_storage_path() -> String {
    "expedition.db".to_owned()
}

// ---------------------------------------------------------------------------
// Tracking
// ---------------------------------------------------------------------------

/// Location watch settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TrackingConfig {
    /// Request the most accurate positioning available.
    #[serde(default = "default_true")]
    pub high_accuracy: bool,

    /// First-fix timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum cached-fix age in milliseconds.
    #[serde(default = "default_maximum_age_ms")]
    pub maximum_age_ms: u64,

    /// Interval between samples in milliseconds.
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,
}

impl TrackingConfig {
    /// Convert into the tracker's watch options.
    pub const fn options(&self) -> WatchOptions {
        WatchOptions::new()
            .with_high_accuracy(self.high_accuracy)
            .with_timeout(Duration::from_millis(self.timeout_ms))
            .with_maximum_age(Duration::from_millis(self.maximum_age_ms))
            .with_sample_interval(Duration::from_millis(self.sample_interval_ms))
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout_ms: default_timeout_ms(),
            maximum_age_ms: default_maximum_age_ms(),
            sample_interval_ms: default_sample_interval_ms(),
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_timeout_ms() -> u64 {
    10_000
}

const fn default_maximum_age_ms() -> u64 {
    1_000
}

const fn default_sample_interval_ms() -> u64 {
    5_000
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

/// Channel reconnect settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryConfig {
    /// Delay after the first failure, in milliseconds.
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Delay ceiling in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Consecutive failures tolerated before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl RetryConfig {
    /// Convert into the tracker's retry policy.
    pub const fn policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_initial_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_max_attempts(self.max_attempts)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_attempts: default_max_attempts(),
        }
    }
}

const fn default_initial_delay_ms() -> u64 {
    1_000
}

const fn default_max_delay_ms() -> u64 {
    30_000
}

const fn default_max_attempts() -> u32 {
    5
}

// ---------------------------------------------------------------------------
// Location source
// ---------------------------------------------------------------------------

/// Which location source the agent samples from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// Random walk around a base coordinate.
    Simulated,
    /// Replay of a recorded fix file.
    Replay,
}

/// Location source selection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceConfig {
    /// Source selection.
    #[serde(default = "default_source_mode")]
    pub mode: SourceMode,

    /// Base coordinate for the simulated walk.
    #[serde(default = "default_base")]
    pub base: BaseFix,

    /// Seed making the simulated walk reproducible.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Path of a JSON file holding an array of fixes to replay.
    #[serde(default)]
    pub replay_path: Option<String>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            mode: default_source_mode(),
            base: default_base(),
            seed: None,
            replay_path: None,
        }
    }
}

const fn default_source_mode() -> SourceMode {
    SourceMode::Simulated
}

/// Base coordinate for the simulated walk.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct BaseFix {
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// Altitude above mean sea level, in meters.
    #[serde(default)]
    pub altitude_m: f64,
    /// Reported accuracy radius, in meters.
    #[serde(default = "default_accuracy_m")]
    pub accuracy_m: f64,
}

impl BaseFix {
    /// Convert into a raw location fix.
    pub const fn fix(&self) -> LocationFix {
        LocationFix::new(self.lat, self.lon, self.altitude_m, self.accuracy_m)
    }
}

const fn default_base() -> BaseFix {
    // Camp Muir, Mount Rainier.
    BaseFix {
        lat: 46.836,
        lon: -121.732,
        altitude_m: 3075.0,
        accuracy_m: 10.0,
    }
}

const fn default_accuracy_m() -> f64 {
    10.0
}

// ---------------------------------------------------------------------------
// Sync loop
// ---------------------------------------------------------------------------

/// Offline sync loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct SyncConfig {
    /// Interval between sync passes, in milliseconds.
    #[serde(default = "default_sync_interval_ms")]
    pub interval_ms: u64,

    /// Delete confirmed-delivered queue rows after each pass.
    #[serde(default = "default_true")]
    pub purge_synced: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_sync_interval_ms(),
            purge_synced: true,
        }
    }
}

const fn default_sync_interval_ms() -> u64 {
    30_000
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_full_defaults() {
        let config = AgentConfig::parse("{}").unwrap();
        assert_eq!(config.channel.mode, ChannelMode::Memory);
        assert_eq!(config.tracking.sample_interval_ms, 5_000);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.source.mode, SourceMode::Simulated);
        assert!(config.sync.purge_synced);
    }

    #[test]
    fn sections_parse_independently() {
        let yaml = r"
channel:
  mode: nats
  url: nats://basecamp:4222
tracking:
  sample_interval_ms: 1000
retry:
  max_attempts: 3
";
        let config = AgentConfig::parse(yaml).unwrap();
        assert_eq!(config.channel.mode, ChannelMode::Nats);
        assert_eq!(config.channel.url, "nats://basecamp:4222");
        assert_eq!(config.tracking.sample_interval_ms, 1_000);
        assert_eq!(config.retry.policy().max_attempts, 3);
        // Untouched sections keep their defaults.
        assert_eq!(config.storage.path, "expedition.db");
    }

    #[test]
    fn configured_expedition_id_must_be_a_uuid() {
        let yaml = r"
expedition:
  id: not-a-uuid
";
        let config = AgentConfig::parse(yaml).unwrap();
        assert!(config.expedition.expedition_id().is_err());
    }

    #[test]
    fn missing_expedition_id_is_generated() {
        let config = AgentConfig::parse("{}").unwrap();
        let a = config.expedition.expedition_id().unwrap();
        let b = config.expedition.expedition_id().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn watch_options_reflect_tracking_section() {
        let yaml = r"
tracking:
  high_accuracy: false
  timeout_ms: 2000
";
        let config = AgentConfig::parse(yaml).unwrap();
        let options = config.tracking.options();
        assert!(!options.high_accuracy);
        assert_eq!(options.timeout, Duration::from_millis(2_000));
        assert_eq!(options.maximum_age, Duration::from_millis(1_000));
    }

    #[test]
    fn base_fix_converts_to_location_fix() {
        let config = AgentConfig::parse("{}").unwrap();
        let fix = config.source.base.fix();
        assert_eq!(fix.lat, 46.836);
        assert_eq!(fix.accuracy_m, 10.0);
    }
}
