//! Trait abstraction for link I/O so the telemetry source can run over UDP,
//! TCP, serial, or a test double

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UdpSocket;
use tracing::{info, trace};

/// Trait for bidirectional link operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LinkIO: Send {
    /// Receive the next chunk of bytes; `Ok(0)` means the link was closed
    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Send one complete frame
    async fn send(&mut self, data: &[u8]) -> io::Result<()>;

    /// Human readable endpoint description for logs
    fn describe(&self) -> String;
}

/// UDP link
///
/// In listen mode the peer is whoever sent the most recent datagram; in
/// outbound mode it is fixed.
pub struct UdpLink {
    socket: UdpSocket,
    peer: Option<SocketAddr>,
    fixed_peer: bool,
}

impl UdpLink {
    /// Listen on a bound socket and learn the peer from incoming traffic
    pub fn listening(socket: UdpSocket) -> Self {
        Self {
            socket,
            peer: None,
            fixed_peer: false,
        }
    }

    /// Send to a fixed remote endpoint
    pub fn outbound(socket: UdpSocket, remote: SocketAddr) -> Self {
        Self {
            socket,
            peer: Some(remote),
            fixed_peer: true,
        }
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }
}

impl std::fmt::Debug for UdpLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpLink")
            .field("local", &self.socket.local_addr().ok())
            .field("peer", &self.peer)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LinkIO for UdpLink {
    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.socket.recv_from(buf).await {
                Ok((len, from)) => {
                    if !self.fixed_peer && self.peer != Some(from) {
                        info!("UDP peer is now {}", from);
                        self.peer = Some(from);
                    }
                    return Ok(len);
                }
                // Some platforms surface ICMP errors from earlier sends here
                Err(e) if matches!(e.kind(), io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused) => {
                    trace!("Ignoring UDP error: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send(&mut self, data: &[u8]) -> io::Result<()> {
        match self.peer {
            Some(peer) => {
                self.socket.send_to(data, peer).await?;
            }
            None => trace!("No UDP peer known yet, dropping {} bytes", data.len()),
        }
        Ok(())
    }

    fn describe(&self) -> String {
        match self.socket.local_addr() {
            Ok(local) => format!("udp {}", local),
            Err(_) => "udp".to_string(),
        }
    }
}

/// Byte stream link (TCP socket or serial port)
pub struct StreamLink<S> {
    stream: S,
    name: String,
}

impl<S> StreamLink<S> {
    pub fn new(stream: S, name: impl Into<String>) -> Self {
        Self {
            stream,
            name: name.into(),
        }
    }
}

impl<S> std::fmt::Debug for StreamLink<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamLink")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<S> LinkIO for StreamLink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf).await
    }

    async fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data).await?;
        self.stream.flush().await
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stream_link_reads_scripted_bytes() {
        let mock = tokio_test::io::Builder::new()
            .read(&[0xFD, 0x01])
            .write(&[0xAA, 0xBB])
            .build();
        let mut link = StreamLink::new(mock, "scripted");

        let mut buf = [0u8; 16];
        let len = link.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &[0xFD, 0x01]);

        link.send(&[0xAA, 0xBB]).await.unwrap();
        assert_eq!(link.describe(), "scripted");
    }

    #[tokio::test]
    async fn test_stream_link_eof_reads_zero() {
        let mock = tokio_test::io::Builder::new().build();
        let mut link = StreamLink::new(mock, "empty");

        let mut buf = [0u8; 16];
        assert_eq!(link.recv(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_udp_link_learns_peer() {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let local = socket.local_addr().unwrap();
        let mut link = UdpLink::listening(socket);
        assert!(link.peer().is_none());

        // Sending without a peer is a silent no-op
        link.send(&[1, 2, 3]).await.unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(&[0xFE, 0x00], local).await.unwrap();

        let mut buf = [0u8; 16];
        let len = link.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &[0xFE, 0x00]);
        assert_eq!(link.peer(), Some(sender.local_addr().unwrap()));

        // Replies go back to the learned peer
        link.send(&[0x42]).await.unwrap();
        let mut reply = [0u8; 4];
        let (len, _) = sender.recv_from(&mut reply).await.unwrap();
        assert_eq!(&reply[..len], &[0x42]);
    }

    #[tokio::test]
    async fn test_udp_outbound_keeps_fixed_peer() {
        let remote = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut link = UdpLink::outbound(socket, remote.local_addr().unwrap());

        link.send(&[7]).await.unwrap();
        let mut buf = [0u8; 4];
        let (len, from) = remote.recv_from(&mut buf).await.unwrap();
        assert_eq!(&buf[..len], &[7]);

        let other = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        other.send_to(&[9], from).await.unwrap();
        let mut buf = [0u8; 4];
        link.recv(&mut buf).await.unwrap();
        assert_eq!(link.peer(), Some(remote.local_addr().unwrap()));
    }
}
