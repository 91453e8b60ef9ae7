//! # Error Types
//!
//! Custom error types for the MAV telemetry logger using `thiserror`.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the MAV telemetry logger
#[derive(Debug, Error)]
pub enum TelemetryLoggerError {
    /// Link could not be opened, or failed while running
    #[error("Transport error: {0}")]
    Transport(String),

    /// Connection URL could not be understood
    #[error("Invalid connection URL: {0}")]
    InvalidUrl(String),

    /// No peer sent a heartbeat within the discovery window
    #[error("Timed out waiting for a system to connect ({attempts} attempts, {interval_ms}ms each)")]
    DiscoveryTimeout { attempts: u32, interval_ms: u64 },

    /// MAVLink decoding errors
    #[error("MAVLink decode error: {0}")]
    Decode(#[from] DecodeError),

    /// An output file could not be opened
    #[error("Failed to open output file {}: {source}", path.display())]
    SinkOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An output file could not be written
    #[error("Failed to write output record: {0}")]
    SinkWrite(#[source] std::io::Error),

    /// A combined record could not be parsed back
    #[error("Malformed combined record: {0}")]
    Record(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons a MAVLink message could not be turned into telemetry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected {expected}, got {actual}")]
    UnexpectedMessage {
        expected: &'static str,
        actual: &'static str,
    },
}

/// Result type alias for the MAV telemetry logger
pub type Result<T> = std::result::Result<T, TelemetryLoggerError>;
