//! # Message Handlers
//!
//! One handler per telemetry kind. Each converts outside the lock and merges the
//! result into the shared state in a single critical section. Messages that do
//! not decode are dropped; they never reach the state and never stop delivery.

use mavlink::common::MavMessage;
use tracing::debug;

use super::state::SharedTelemetry;
use crate::error::DecodeError;
use crate::link::TelemetrySource;
use crate::codec::decoder::{decode_attitude, decode_battery_status, decode_global_position_int};
use crate::codec::protocol::MessageKind;

/// Decode `message` as `kind` and merge it into `state`
///
/// # Errors
///
/// Returns the decode error and leaves `state` untouched if `message` is not of `kind`
pub fn apply_message(state: &SharedTelemetry, kind: MessageKind, message: &MavMessage) -> Result<(), DecodeError> {
    match kind {
        MessageKind::Attitude => state.set_attitude(decode_attitude(message)?),
        MessageKind::BatteryStatus => state.merge_battery(&decode_battery_status(message)?),
        MessageKind::GlobalPositionInt => state.set_position(decode_global_position_int(message)?),
    }
    Ok(())
}

/// Build the handler for one message kind
pub fn handler_for(kind: MessageKind, state: SharedTelemetry) -> impl Fn(&MavMessage) + Send + Sync + 'static {
    move |message| {
        if let Err(e) = apply_message(&state, kind, message) {
            debug!("Dropping {} message: {}", kind, e);
        }
    }
}

/// Subscribe handlers for attitude, battery status and global position
pub fn register_handlers(source: &mut TelemetrySource, state: &SharedTelemetry) {
    for kind in MessageKind::ALL {
        source.subscribe(kind, handler_for(kind, state.clone()));
    }
}
