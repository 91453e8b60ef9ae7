//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, TelemetryLoggerError};
use crate::link::ConnectionUrl;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,

    #[serde(default)]
    pub snapshot: SnapshotConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// MAVLink link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_url")]
    pub url: String,

    #[serde(default = "default_system_id")]
    pub system_id: u8,

    #[serde(default = "default_component_id")]
    pub component_id: u8,

    /// 0 disables our heartbeat
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    #[serde(default = "default_discovery_attempts")]
    pub discovery_attempts: u32,

    #[serde(default = "default_discovery_interval_ms")]
    pub discovery_interval_ms: u64,
}

/// Snapshot cadence
#[derive(Debug, Deserialize, Clone)]
pub struct SnapshotConfig {
    #[serde(default = "default_snapshot_interval_ms")]
    pub interval_ms: u64,
}

/// Output file location
#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
}

// Default value functions
fn default_url() -> String { "udp://192.168.144.12:19856".to_string() }
fn default_system_id() -> u8 { 1 }
fn default_component_id() -> u8 { 191 }
fn default_heartbeat_interval_ms() -> u64 { 1000 }
fn default_discovery_attempts() -> u32 { 30 }
fn default_discovery_interval_ms() -> u64 { 1000 }

fn default_snapshot_interval_ms() -> u64 { 500 }

fn default_output_dir() -> String { ".".to_string() }

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            system_id: default_system_id(),
            component_id: default_component_id(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            discovery_attempts: default_discovery_attempts(),
            discovery_interval_ms: default_discovery_interval_ms(),
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_snapshot_interval_ms(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

impl LinkConfig {
    /// Parse the configured connection URL
    pub fn connection_url(&self) -> Result<ConnectionUrl> {
        self.url.parse()
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_millis(self.discovery_interval_ms)
    }
}

impl SnapshotConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl OutputConfig {
    pub fn path(&self) -> &Path {
        Path::new(&self.dir)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing sections and keys fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use mav_telemetry_logger::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    fn validate(&self) -> Result<()> {
        // Validate link configuration
        if let Err(e) = self.link.connection_url() {
            return Err(TelemetryLoggerError::Config(
                toml::de::Error::custom(format!("link url is invalid: {}", e))
            ));
        }

        if self.link.system_id == 0 {
            return Err(TelemetryLoggerError::Config(
                toml::de::Error::custom("system_id must be between 1 and 255")
            ));
        }

        if self.link.component_id == 0 {
            return Err(TelemetryLoggerError::Config(
                toml::de::Error::custom("component_id must be between 1 and 255")
            ));
        }

        if self.link.heartbeat_interval_ms > 60000 {
            return Err(TelemetryLoggerError::Config(
                toml::de::Error::custom("heartbeat_interval_ms must be between 0 and 60000")
            ));
        }

        if self.link.discovery_attempts == 0 {
            return Err(TelemetryLoggerError::Config(
                toml::de::Error::custom("discovery_attempts must be greater than 0")
            ));
        }

        if self.link.discovery_interval_ms == 0 || self.link.discovery_interval_ms > 60000 {
            return Err(TelemetryLoggerError::Config(
                toml::de::Error::custom("discovery_interval_ms must be between 1 and 60000")
            ));
        }

        // Validate snapshot cadence
        if self.snapshot.interval_ms == 0 || self.snapshot.interval_ms > 60000 {
            return Err(TelemetryLoggerError::Config(
                toml::de::Error::custom("snapshot interval_ms must be between 1 and 60000")
            ));
        }

        // Validate output location
        if self.output.dir.is_empty() {
            return Err(TelemetryLoggerError::Config(
                toml::de::Error::custom("output dir cannot be empty")
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_valid_config() -> Config {
        Config {
            link: LinkConfig {
                url: default_url(),
                system_id: default_system_id(),
                component_id: default_component_id(),
                heartbeat_interval_ms: default_heartbeat_interval_ms(),
                discovery_attempts: default_discovery_attempts(),
                discovery_interval_ms: default_discovery_interval_ms(),
            },
            snapshot: SnapshotConfig {
                interval_ms: default_snapshot_interval_ms(),
            },
            output: OutputConfig {
                dir: default_output_dir(),
            },
        }
    }

    fn load_str(toml_content: &str) -> Result<Config> {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();
        Config::load(temp_file.path())
    }

    #[test]
    fn test_default_config() {
        assert!(create_valid_config().validate().is_ok());
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        let config = load_str(
            r#"
[link]
url = "udp://:14550"
discovery_attempts = 5

[snapshot]
interval_ms = 250

[output]
dir = "/var/log/mav"
"#,
        )
        .unwrap();

        assert_eq!(config.link.url, "udp://:14550");
        assert_eq!(config.link.discovery_attempts, 5);
        assert_eq!(config.link.system_id, 1);
        assert_eq!(config.snapshot.interval(), Duration::from_millis(250));
        assert_eq!(config.output.path(), Path::new("/var/log/mav"));
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        let config = load_str("").unwrap();
        assert_eq!(config.link.url, "udp://192.168.144.12:19856");
        assert_eq!(config.snapshot.interval_ms, 500);
        assert_eq!(config.output.dir, ".");
    }

    #[test]
    fn test_load_rejects_malformed_toml() {
        let result = load_str("[link\nurl = ");
        assert!(matches!(result, Err(TelemetryLoggerError::Config(_))));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let result = load_str("[snapshot]\ninterval_ms = 0\n");
        assert!(matches!(result, Err(TelemetryLoggerError::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load("/nonexistent/mav-telemetry-logger.toml");
        assert!(matches!(result, Err(TelemetryLoggerError::Io(_))));
    }

    #[test]
    fn test_shipped_default_config_is_valid() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config.link.url, default_url());
    }

    #[test]
    fn test_invalid_url() {
        let mut config = create_valid_config();
        config.link.url = "192.168.144.12:19856".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unsupported_url_scheme() {
        let mut config = create_valid_config();
        config.link.url = "http://localhost:80".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_system_id_zero() {
        let mut config = create_valid_config();
        config.link.system_id = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_component_id_zero() {
        let mut config = create_valid_config();
        config.link.component_id = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_heartbeat_disabled() {
        let mut config = create_valid_config();
        config.link.heartbeat_interval_ms = 0;
        assert!(config.validate().is_ok());
        assert!(config.link.heartbeat_interval().is_zero());
    }

    #[test]
    fn test_heartbeat_interval_too_high() {
        let mut config = create_valid_config();
        config.link.heartbeat_interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_discovery_attempts_zero() {
        let mut config = create_valid_config();
        config.link.discovery_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_discovery_interval_zero() {
        let mut config = create_valid_config();
        config.link.discovery_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_discovery_interval_too_high() {
        let mut config = create_valid_config();
        config.link.discovery_interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_snapshot_interval_zero() {
        let mut config = create_valid_config();
        config.snapshot.interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_snapshot_interval_too_high() {
        let mut config = create_valid_config();
        config.snapshot.interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_output_dir() {
        let mut config = create_valid_config();
        config.output.dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_helpers() {
        let config = create_valid_config();
        assert_eq!(config.link.heartbeat_interval(), Duration::from_secs(1));
        assert_eq!(config.link.discovery_interval(), Duration::from_secs(1));
        assert_eq!(config.snapshot.interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_url(), "udp://192.168.144.12:19856");
        assert_eq!(default_system_id(), 1);
        assert_eq!(default_component_id(), 191);
        assert_eq!(default_heartbeat_interval_ms(), 1000);
        assert_eq!(default_discovery_attempts(), 30);
        assert_eq!(default_discovery_interval_ms(), 1000);
        assert_eq!(default_snapshot_interval_ms(), 500);
        assert_eq!(default_output_dir(), ".");
    }
}
