//! # Telemetry Module
//!
//! Aggregates decoded telemetry and persists periodic snapshots.
//!
//! This module handles:
//! - The shared latest-value state (attitude, battery cells, position)
//! - Per-kind message handlers that merge decoded messages into the state
//! - The snapshotter that copies the state on a fixed cadence
//! - Output files (combined record and per-field logs), truncated at startup

pub mod handlers;
pub mod sink;
pub mod snapshot;
pub mod state;

pub use handlers::{apply_message, register_handlers};
pub use sink::{read_last_record, CombinedRecord, Sinks};
pub use snapshot::{Snapshotter, DEFAULT_SNAPSHOT_INTERVAL};
pub use state::{SharedTelemetry, TelemetryState};
