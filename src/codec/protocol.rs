//! # MAVLink Message Kinds and Telemetry Values
//!
//! The subset of the common dialect this logger consumes: HEARTBEAT for
//! discovery, and ATTITUDE, BATTERY_STATUS and GLOBAL_POSITION_INT for
//! telemetry. Framing and checksums are handled by the `mavlink` crate.

use std::fmt;

use mavlink::common::MavMessage;
use mavlink::{MavHeader, MavlinkVersion};

/// Number of cell voltages carried by BATTERY_STATUS
pub const BATTERY_CELL_COUNT: usize = 10;

/// Cell voltage value meaning "not reported"
pub const BATTERY_CELL_INVALID_MV: u16 = u16::MAX;

/// MAV_COMP_ID_ONBOARD_COMPUTER
pub const MAV_COMP_ID_ONBOARD_COMPUTER: u8 = 191;

/// Protocol version advertised in our heartbeat
pub const MAVLINK_VERSION: u8 = 3;

/// Telemetry message kinds a handler can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Attitude,
    BatteryStatus,
    GlobalPositionInt,
}

impl MessageKind {
    pub const ALL: [MessageKind; 3] = [
        MessageKind::Attitude,
        MessageKind::BatteryStatus,
        MessageKind::GlobalPositionInt,
    ];

    /// Kind of a decoded message, if it is one we subscribe to
    pub fn of(message: &MavMessage) -> Option<Self> {
        match message {
            MavMessage::ATTITUDE(_) => Some(MessageKind::Attitude),
            MavMessage::BATTERY_STATUS(_) => Some(MessageKind::BatteryStatus),
            MavMessage::GLOBAL_POSITION_INT(_) => Some(MessageKind::GlobalPositionInt),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MessageKind::Attitude => "ATTITUDE",
            MessageKind::BatteryStatus => "BATTERY_STATUS",
            MessageKind::GlobalPositionInt => "GLOBAL_POSITION_INT",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Vehicle attitude in degrees
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Attitude {
    pub roll_deg: f64,
    pub pitch_deg: f64,
    pub yaw_deg: f64,
}

/// Per-cell battery readings from one BATTERY_STATUS message
///
/// `None` means the sender did not report that cell; it must not replace a
/// previously known value.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BatteryStatus {
    pub cells: [Option<f64>; BATTERY_CELL_COUNT],
}

/// Global position with altitude above MSL
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GlobalPosition {
    pub latitude_deg: f64,
    pub longitude_deg: f64,
    pub altitude_m: f64,
}

/// A checksum-verified frame taken off the link
#[derive(Debug, Clone, PartialEq)]
pub struct MavFrame {
    pub version: MavlinkVersion,
    pub header: MavHeader,
    pub message: MavMessage,
}

impl MavFrame {
    /// Telemetry kind of this frame, if it is one we subscribe to
    pub fn kind(&self) -> Option<MessageKind> {
        MessageKind::of(&self.message)
    }
}
