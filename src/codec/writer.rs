//! # MAVLink Message Writer
//!
//! Serializes outgoing MAVLink 2 messages with our identity and a running
//! sequence number.

use std::io;

use mavlink::common::{MavAutopilot, MavMessage, MavModeFlag, MavState, MavType, HEARTBEAT_DATA};
use mavlink::{MavHeader, MavlinkVersion};

use super::protocol::MAVLINK_VERSION;

/// Writer for frames sent by this component
#[derive(Debug, Clone)]
pub struct MavlinkWriter {
    system_id: u8,
    component_id: u8,
    sequence: u8,
}

impl MavlinkWriter {
    pub fn new(system_id: u8, component_id: u8) -> Self {
        Self::with_sequence(system_id, component_id, 0)
    }

    /// Writer whose next frame carries `sequence`
    pub fn with_sequence(system_id: u8, component_id: u8, sequence: u8) -> Self {
        Self {
            system_id,
            component_id,
            sequence,
        }
    }

    /// Sequence number the next frame will carry
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Serialize `message` into one MAVLink 2 frame
    ///
    /// # Errors
    ///
    /// Returns error if the crate cannot serialize the message
    pub fn encode(&mut self, message: &MavMessage) -> io::Result<Vec<u8>> {
        let header = MavHeader {
            system_id: self.system_id,
            component_id: self.component_id,
            sequence: self.sequence,
        };
        self.sequence = self.sequence.wrapping_add(1);

        let mut buf = Vec::with_capacity(64);
        mavlink::write_versioned_msg(&mut buf, MavlinkVersion::V2, header, message)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("{:?}", e)))?;
        Ok(buf)
    }
}

/// Heartbeat announcing this logger as an onboard controller
pub fn heartbeat() -> MavMessage {
    MavMessage::HEARTBEAT(HEARTBEAT_DATA {
        custom_mode: 0,
        mavtype: MavType::MAV_TYPE_ONBOARD_CONTROLLER,
        autopilot: MavAutopilot::MAV_AUTOPILOT_INVALID,
        base_mode: MavModeFlag::empty(),
        system_status: MavState::MAV_STATE_ACTIVE,
        mavlink_version: MAVLINK_VERSION,
    })
}
