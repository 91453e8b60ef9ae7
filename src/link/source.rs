//! # Telemetry Source
//!
//! Reads MAVLink frames from a link and delivers telemetry messages to
//! subscribed handlers.
//!
//! Each subscription gets its own tokio task and bounded queue, so handlers for
//! different message kinds run independently of each other and of the reader.
//! Nothing orders deliveries across kinds.

use std::collections::HashMap;
use std::time::Duration;

use mavlink::common::{MavMessage, HEARTBEAT_DATA};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{interval, timeout, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::port_trait::LinkIO;
use crate::config::LinkConfig;
use crate::error::{Result, TelemetryLoggerError};
use crate::codec::parser::{FrameParser, ParserStats};
use crate::codec::protocol::{MavFrame, MessageKind};
use crate::codec::writer::{heartbeat, MavlinkWriter};

/// Messages queued per handler before new ones are dropped
pub const HANDLER_QUEUE_DEPTH: usize = 64;

/// Receive buffer size; fits a full UDP datagram of MAVLink frames
const RECV_BUFFER_SIZE: usize = 4096;

/// Number of frames between status log messages
const LOG_INTERVAL_FRAMES: u64 = 1000;

/// How we identify ourselves on the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceIdentity {
    pub system_id: u8,
    pub component_id: u8,
    /// Zero disables our heartbeat
    pub heartbeat_interval: Duration,
}

impl From<&LinkConfig> for SourceIdentity {
    fn from(config: &LinkConfig) -> Self {
        Self {
            system_id: config.system_id,
            component_id: config.component_id,
            heartbeat_interval: config.heartbeat_interval(),
        }
    }
}

/// The vehicle found during discovery
#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveredSystem {
    pub system_id: u8,
    pub component_id: u8,
    pub heartbeat: HEARTBEAT_DATA,
}

/// MAVLink telemetry source with subscribe-by-kind delivery
pub struct TelemetrySource {
    link: Box<dyn LinkIO>,
    parser: FrameParser,
    identity: SourceIdentity,
    subscribers: HashMap<MessageKind, mpsc::Sender<MavMessage>>,
    handler_tasks: Vec<JoinHandle<()>>,
    rx_buf: Vec<u8>,
    writer: MavlinkWriter,
}

impl std::fmt::Debug for TelemetrySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetrySource")
            .field("link", &self.link.describe())
            .field("identity", &self.identity)
            .field("subscribed", &self.subscribers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl TelemetrySource {
    pub fn new(link: Box<dyn LinkIO>, identity: SourceIdentity) -> Self {
        Self {
            link,
            parser: FrameParser::new(),
            identity,
            subscribers: HashMap::new(),
            handler_tasks: Vec::new(),
            rx_buf: vec![0u8; RECV_BUFFER_SIZE],
            writer: MavlinkWriter::new(identity.system_id, identity.component_id),
        }
    }

    /// Register `handler` for every message of `kind`
    ///
    /// The handler runs on its own task and receives the decoded message. A second
    /// subscription for the same kind replaces the first.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn subscribe<F>(&mut self, kind: MessageKind, handler: F)
    where
        F: Fn(&MavMessage) + Send + Sync + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<MavMessage>(HANDLER_QUEUE_DEPTH);

        let task = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                handler(&message);
            }
            debug!("{} handler stopped", kind);
        });

        if self.subscribers.insert(kind, tx).is_some() {
            warn!("Replacing existing {} handler", kind);
        }
        self.handler_tasks.push(task);
        debug!("Subscribed to {}", kind);
    }

    pub fn parser_stats(&self) -> ParserStats {
        self.parser.stats()
    }

    /// Wait for the first HEARTBEAT from another system
    ///
    /// Checks `attempts` times, each for up to `attempt_interval`, logging
    /// every empty attempt. Telemetry arriving meanwhile reaches only handlers
    /// that are already subscribed; with none subscribed it is dropped.
    ///
    /// # Errors
    ///
    /// - `DiscoveryTimeout`: no heartbeat within the window
    /// - `Transport`: the link failed or closed
    pub async fn wait_for_system(&mut self, attempts: u32, attempt_interval: Duration) -> Result<DiscoveredSystem> {
        for attempt in 1..=attempts {
            if !self.identity.heartbeat_interval.is_zero() {
                self.send_heartbeat().await;
            }

            match timeout(attempt_interval, self.next_heartbeat()).await {
                Ok(result) => return result,
                Err(_) => info!("Attempt {}: no system detected yet", attempt),
            }
        }

        Err(TelemetryLoggerError::DiscoveryTimeout {
            attempts,
            interval_ms: attempt_interval.as_millis() as u64,
        })
    }

    /// Read and dispatch frames until the link fails
    ///
    /// Also emits our heartbeat at the configured interval.
    ///
    /// # Errors
    ///
    /// Returns `Transport` when the link closes or a receive fails; there is
    /// no reconnection.
    pub async fn run(mut self) -> Result<()> {
        let mut heartbeat = heartbeat_timer(self.identity.heartbeat_interval);
        let mut last_log_count: u64 = 0;

        loop {
            tokio::select! {
                frame = self.next_frame() => {
                    self.dispatch(frame?);

                    let stats = self.parser.stats();
                    if stats.frames_decoded - last_log_count >= LOG_INTERVAL_FRAMES {
                        info!(
                            "Received {} frames ({} unparseable, {} bytes discarded)",
                            stats.frames_decoded, stats.parse_errors, stats.bytes_discarded
                        );
                        last_log_count = stats.frames_decoded;
                    }
                }

                _ = tick(&mut heartbeat) => {
                    self.send_heartbeat().await;
                }
            }
        }
    }

    async fn next_heartbeat(&mut self) -> Result<DiscoveredSystem> {
        loop {
            let frame = self.next_frame().await?;

            let heartbeat = match frame.message {
                MavMessage::HEARTBEAT(heartbeat) => heartbeat,
                _ => {
                    self.dispatch(frame);
                    continue;
                }
            };

            let header = frame.header;
            if header.system_id == self.identity.system_id && header.component_id == self.identity.component_id {
                trace!("Ignoring our own heartbeat");
                continue;
            }

            return Ok(DiscoveredSystem {
                system_id: header.system_id,
                component_id: header.component_id,
                heartbeat,
            });
        }
    }

    async fn next_frame(&mut self) -> Result<MavFrame> {
        loop {
            if let Some(frame) = self.parser.next_frame() {
                return Ok(frame);
            }

            let len = self
                .link
                .recv(&mut self.rx_buf)
                .await
                .map_err(|e| TelemetryLoggerError::Transport(format!("Receive failed on {}: {}", self.link.describe(), e)))?;

            if len == 0 {
                return Err(TelemetryLoggerError::Transport(format!(
                    "Link {} closed by peer",
                    self.link.describe()
                )));
            }

            self.parser.push(&self.rx_buf[..len]);
        }
    }

    fn dispatch(&self, frame: MavFrame) {
        let Some(kind) = frame.kind() else {
            return;
        };
        let Some(tx) = self.subscribers.get(&kind) else {
            return;
        };

        match tx.try_send(frame.message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("{} handler busy, dropping message", kind),
            Err(TrySendError::Closed(_)) => warn!("{} handler has stopped", kind),
        }
    }

    async fn send_heartbeat(&mut self) {
        let bytes = match self.writer.encode(&heartbeat()) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to encode heartbeat: {}", e);
                return;
            }
        };

        if let Err(e) = self.link.send(&bytes).await {
            debug!("Failed to send heartbeat: {}", e);
        }
    }
}

impl Drop for TelemetrySource {
    fn drop(&mut self) {
        for task in &self.handler_tasks {
            task.abort();
        }
    }
}

fn heartbeat_timer(period: Duration) -> Option<Interval> {
    if period.is_zero() {
        return None;
    }
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    Some(timer)
}

async fn tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
