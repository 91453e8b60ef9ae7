//! # MAVLink Codec Module
//!
//! The subset of MAVLink needed to log vehicle telemetry, built on the
//! `mavlink` crate's common dialect.
//!
//! This module handles:
//! - Stream framing with resynchronisation after corrupt bytes (v1 and v2)
//! - Conversion of ATTITUDE, BATTERY_STATUS and GLOBAL_POSITION_INT into typed values
//! - Serializing our own HEARTBEAT

pub mod decoder;
pub mod parser;
pub mod protocol;
pub mod writer;
