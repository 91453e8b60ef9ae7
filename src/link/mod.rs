//! # Link Module
//!
//! Opens the MAVLink connection to the vehicle.
//!
//! This module handles:
//! - Parsing connection URLs (`udp://`, `udpin://`, `udpout://`, `tcp://`, `serial://`)
//! - Opening the matching transport behind the [`LinkIO`] trait
//! - The telemetry source that discovers the vehicle and feeds handlers

pub mod port_trait;
pub mod source;

pub use port_trait::{LinkIO, StreamLink, UdpLink};
pub use source::{DiscoveredSystem, SourceIdentity, TelemetrySource};

use std::fmt;
use std::str::FromStr;

use tokio::net::{lookup_host, TcpStream, UdpSocket};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info};

use crate::error::{Result, TelemetryLoggerError};

/// Default UDP port when a `udp://` URL omits it
pub const DEFAULT_UDP_PORT: u16 = 14540;

/// Default TCP port when a `tcp://` URL omits it
pub const DEFAULT_TCP_PORT: u16 = 5760;

/// Default serial baud rate for telemetry radios
pub const DEFAULT_SERIAL_BAUD_RATE: u32 = 57_600;

/// Where and how to reach the vehicle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionUrl {
    /// Bind locally and listen; the peer is learned from traffic
    UdpIn { host: String, port: u16 },
    /// Send to a fixed remote endpoint
    UdpOut { host: String, port: u16 },
    /// Connect to a TCP server
    Tcp { host: String, port: u16 },
    /// Open a serial device
    Serial { path: String, baud_rate: u32 },
}

fn split_host_port(rest: &str, default_port: u16, url: &str) -> Result<(String, u16)> {
    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| TelemetryLoggerError::InvalidUrl(format!("{} (bad port '{}')", url, port)))?;
            (host, port)
        }
        None => (rest, default_port),
    };
    Ok((host.to_string(), port))
}

impl FromStr for ConnectionUrl {
    type Err = TelemetryLoggerError;

    fn from_str(url: &str) -> Result<Self> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| TelemetryLoggerError::InvalidUrl(format!("{} (missing scheme)", url)))?;

        match scheme.to_ascii_lowercase().as_str() {
            "udp" | "udpin" => {
                let (host, port) = split_host_port(rest, DEFAULT_UDP_PORT, url)?;
                let host = if host.is_empty() { "0.0.0.0".to_string() } else { host };
                Ok(ConnectionUrl::UdpIn { host, port })
            }
            "udpout" => {
                let (host, port) = split_host_port(rest, DEFAULT_UDP_PORT, url)?;
                if host.is_empty() {
                    return Err(TelemetryLoggerError::InvalidUrl(format!("{} (missing remote host)", url)));
                }
                Ok(ConnectionUrl::UdpOut { host, port })
            }
            "tcp" => {
                let (host, port) = split_host_port(rest, DEFAULT_TCP_PORT, url)?;
                if host.is_empty() {
                    return Err(TelemetryLoggerError::InvalidUrl(format!("{} (missing server host)", url)));
                }
                Ok(ConnectionUrl::Tcp { host, port })
            }
            "serial" => {
                let (path, baud_rate) = match rest.rsplit_once(':') {
                    Some((path, baud)) if !baud.is_empty() && baud.bytes().all(|b| b.is_ascii_digit()) => {
                        let baud_rate = baud
                            .parse::<u32>()
                            .map_err(|_| TelemetryLoggerError::InvalidUrl(format!("{} (bad baud rate)", url)))?;
                        (path, baud_rate)
                    }
                    _ => (rest, DEFAULT_SERIAL_BAUD_RATE),
                };
                if path.is_empty() {
                    return Err(TelemetryLoggerError::InvalidUrl(format!("{} (missing device path)", url)));
                }
                Ok(ConnectionUrl::Serial {
                    path: path.to_string(),
                    baud_rate,
                })
            }
            other => Err(TelemetryLoggerError::InvalidUrl(format!(
                "{} (unsupported scheme '{}', expected udp, udpin, udpout, tcp or serial)",
                url, other
            ))),
        }
    }
}

impl fmt::Display for ConnectionUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionUrl::UdpIn { host, port } => write!(f, "udpin://{}:{}", host, port),
            ConnectionUrl::UdpOut { host, port } => write!(f, "udpout://{}:{}", host, port),
            ConnectionUrl::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
            ConnectionUrl::Serial { path, baud_rate } => write!(f, "serial://{}:{}", path, baud_rate),
        }
    }
}

/// Open the transport described by `url`
///
/// # Errors
///
/// Returns [`TelemetryLoggerError::Transport`] if the socket cannot be bound,
/// the server cannot be reached, or the serial device cannot be opened.
///
/// # Examples
///
/// ```no_run
/// use mav_telemetry_logger::link::{open_link, ConnectionUrl};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let url: ConnectionUrl = "udp://:14540".parse()?;
///     let link = open_link(&url).await?;
///     println!("Listening on {}", link.describe());
///     Ok(())
/// }
/// ```
pub async fn open_link(url: &ConnectionUrl) -> Result<Box<dyn LinkIO>> {
    debug!("Opening link {}", url);

    let link: Box<dyn LinkIO> = match url {
        ConnectionUrl::UdpIn { host, port } => {
            let socket = UdpSocket::bind((host.as_str(), *port))
                .await
                .map_err(|e| TelemetryLoggerError::Transport(format!("Failed to bind {}: {}", url, e)))?;
            Box::new(UdpLink::listening(socket))
        }
        ConnectionUrl::UdpOut { host, port } => {
            let remote = lookup_host((host.as_str(), *port))
                .await
                .map_err(|e| TelemetryLoggerError::Transport(format!("Failed to resolve {}: {}", url, e)))?
                .next()
                .ok_or_else(|| TelemetryLoggerError::Transport(format!("No address for {}", url)))?;
            let bind_addr = if remote.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
            let socket = UdpSocket::bind(bind_addr)
                .await
                .map_err(|e| TelemetryLoggerError::Transport(format!("Failed to bind local UDP socket: {}", e)))?;
            Box::new(UdpLink::outbound(socket, remote))
        }
        ConnectionUrl::Tcp { host, port } => {
            let stream = TcpStream::connect((host.as_str(), *port))
                .await
                .map_err(|e| TelemetryLoggerError::Transport(format!("Failed to connect to {}: {}", url, e)))?;
            stream.set_nodelay(true)?;
            Box::new(StreamLink::new(stream, url.to_string()))
        }
        ConnectionUrl::Serial { path, baud_rate } => {
            let port = tokio_serial::new(path.as_str(), *baud_rate)
                .data_bits(tokio_serial::DataBits::Eight)
                .parity(tokio_serial::Parity::None)
                .stop_bits(tokio_serial::StopBits::One)
                .flow_control(tokio_serial::FlowControl::None)
                .open_native_async()
                .map_err(|e| TelemetryLoggerError::Transport(format!("Failed to open {}: {}", path, e)))?;
            Box::new(StreamLink::new(port, url.to_string()))
        }
    };

    info!("Opened link {}", link.describe());
    Ok(link)
}
