//! # MAVLink Decoder
//!
//! Turns the telemetry messages (attitude, battery status, global position)
//! into typed values with unit conversion applied.
//!
//! Decoders are pure: they either return a complete value or an error,
//! never a partially filled one.

use std::f64::consts::PI;

use mavlink::common::MavMessage;
use mavlink::Message;

use super::protocol::*;
use crate::error::DecodeError;

fn radians_to_degrees(rad: f32) -> f64 {
    f64::from(rad) * 180.0 / PI
}

fn unexpected(kind: MessageKind, message: &MavMessage) -> DecodeError {
    DecodeError::UnexpectedMessage {
        expected: kind.name(),
        actual: message.message_name(),
    }
}

/// Decode an ATTITUDE message
///
/// # Returns
///
/// * `Result<Attitude, DecodeError>` - Roll, pitch and yaw in degrees
pub fn decode_attitude(message: &MavMessage) -> Result<Attitude, DecodeError> {
    let MavMessage::ATTITUDE(data) = message else {
        return Err(unexpected(MessageKind::Attitude, message));
    };

    Ok(Attitude {
        roll_deg: radians_to_degrees(data.roll),
        pitch_deg: radians_to_degrees(data.pitch),
        yaw_deg: radians_to_degrees(data.yaw),
    })
}

/// Decode a BATTERY_STATUS message
///
/// Cells reported as 65535 mV are left as `None`.
pub fn decode_battery_status(message: &MavMessage) -> Result<BatteryStatus, DecodeError> {
    let MavMessage::BATTERY_STATUS(data) = message else {
        return Err(unexpected(MessageKind::BatteryStatus, message));
    };

    let mut cells = [None; BATTERY_CELL_COUNT];
    for (cell, &mv) in cells.iter_mut().zip(data.voltages.iter()) {
        if mv != BATTERY_CELL_INVALID_MV {
            *cell = Some(f64::from(mv) / 1000.0);
        }
    }

    Ok(BatteryStatus { cells })
}

/// Decode a GLOBAL_POSITION_INT message
///
/// # Returns
///
/// * `Result<GlobalPosition, DecodeError>` - Latitude/longitude in degrees, altitude in metres
pub fn decode_global_position_int(message: &MavMessage) -> Result<GlobalPosition, DecodeError> {
    let MavMessage::GLOBAL_POSITION_INT(data) = message else {
        return Err(unexpected(MessageKind::GlobalPositionInt, message));
    };

    // Latitude/longitude: degrees × 10^7, altitude (MSL): millimetres
    Ok(GlobalPosition {
        latitude_deg: f64::from(data.lat) / 1e7,
        longitude_deg: f64::from(data.lon) / 1e7,
        altitude_m: f64::from(data.alt) / 1000.0,
    })
}
