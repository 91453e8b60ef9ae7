//! # MAV Telemetry Logger Library
//!
//! Record live vehicle telemetry received over MAVLink.
//!
//! This library connects to a vehicle, keeps the latest attitude, battery cell
//! voltages and global position in a shared state, and periodically writes a
//! consistent snapshot of that state to plain-text log files.

pub mod app;
pub mod codec;
pub mod config;
pub mod error;
pub mod link;
pub mod telemetry;
