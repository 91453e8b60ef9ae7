//! # MAVLink Stream Parser
//!
//! Reassembles frames from an arbitrary chunked byte stream (UDP datagrams,
//! TCP segments, serial reads). Frame validation and payload parsing are done
//! by `mavlink::read_versioned_msg`; this layer owns the buffer.
//!
//! - Bytes before a start marker are discarded
//! - Frames failing their checksum are skipped and the stream resynchronises
//! - A start marker that never completes a frame is dropped once a full
//!   frame's worth of bytes has arrived behind it

use std::io;

use bytes::{Buf, BytesMut};
use mavlink::common::MavMessage;
use mavlink::error::MessageReadError;
use mavlink::peek_reader::PeekReader;
use mavlink::{MavlinkVersion, MAV_STX, MAV_STX_V2};
use tracing::debug;

use super::protocol::MavFrame;

/// Initial receive buffer capacity; larger than any single MAVLink frame
pub const RX_BUFFER_SIZE: usize = 1024;

/// Longest possible frame: signed MAVLink 2 with a 255-byte payload
pub const MAX_FRAME_LEN: usize = 280;

/// Parser statistics for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    /// Frames decoded and verified
    pub frames_decoded: u64,
    /// Checksum-valid frames whose payload could not be parsed
    pub parse_errors: u64,
    /// Bytes dropped while searching for a start marker
    pub bytes_discarded: u64,
}

/// Result of one read attempt at a start marker
enum Attempt {
    Frame(MavFrame),
    Incomplete,
    Invalid(String),
}

fn marker_version(byte: u8) -> Option<MavlinkVersion> {
    match byte {
        MAV_STX => Some(MavlinkVersion::V1),
        MAV_STX_V2 => Some(MavlinkVersion::V2),
        _ => None,
    }
}

/// Read one frame from the start of `bytes`, returning how many bytes the read used
fn read_frame(bytes: &[u8], version: MavlinkVersion) -> (Attempt, usize) {
    let mut remaining = bytes;
    let result = {
        let mut reader = PeekReader::new(&mut remaining);
        mavlink::read_versioned_msg::<MavMessage, _>(&mut reader, version)
    };
    let consumed = bytes.len() - remaining.len();

    let attempt = match result {
        Ok((header, message)) => Attempt::Frame(MavFrame { version, header, message }),
        Err(MessageReadError::Io(e)) if e.kind() == io::ErrorKind::UnexpectedEof => Attempt::Incomplete,
        Err(MessageReadError::Io(e)) => Attempt::Invalid(e.to_string()),
        Err(MessageReadError::Parse(e)) => Attempt::Invalid(format!("{:?}", e)),
    };
    (attempt, consumed)
}

/// Incremental MAVLink frame parser
#[derive(Debug)]
pub struct FrameParser {
    buffer: BytesMut,
    stats: ParserStats,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(RX_BUFFER_SIZE),
            stats: ParserStats::default(),
        }
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Append received bytes
    pub fn push(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    fn discard(&mut self, count: usize) {
        self.stats.bytes_discarded += count as u64;
        self.buffer.advance(count);
    }

    /// Pop the next complete frame, if one is buffered
    pub fn next_frame(&mut self) -> Option<MavFrame> {
        'resync: loop {
            let Some(first) = self.buffer.iter().position(|&byte| marker_version(byte).is_some()) else {
                let len = self.buffer.len();
                self.discard(len);
                return None;
            };
            self.discard(first);

            // A marker whose frame is still arriving must not hide complete
            // frames behind it, so every marker in the buffer gets a try
            for pos in 0..self.buffer.len() {
                let Some(version) = marker_version(self.buffer[pos]) else {
                    continue;
                };

                let (attempt, consumed) = read_frame(&self.buffer[pos..], version);
                match attempt {
                    Attempt::Frame(frame) => {
                        self.discard(pos);
                        self.buffer.advance(consumed);
                        self.stats.frames_decoded += 1;
                        return Some(frame);
                    }
                    Attempt::Invalid(e) => {
                        debug!("Dropping unparseable frame: {}", e);
                        self.discard(pos);
                        self.buffer.advance(consumed.max(1));
                        self.stats.parse_errors += 1;
                        continue 'resync;
                    }
                    Attempt::Incomplete => {}
                }
            }

            if self.buffer.len() >= MAX_FRAME_LEN {
                // The leading marker cannot belong to a frame this long
                self.discard(1);
                continue;
            }
            return None;
        }
    }
}
