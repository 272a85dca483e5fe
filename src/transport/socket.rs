//! Trait abstraction for datagram socket operations to enable testing

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

/// Trait for datagram socket I/O operations
#[async_trait]
pub trait DatagramSocket: Send {
    /// Send one datagram to `target`
    async fn send_to(&mut self, data: &[u8], target: SocketAddr) -> io::Result<usize>;

    /// Receive one datagram, returning its length and sender
    async fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)>;

    /// Allow sending to broadcast addresses
    fn set_broadcast(&mut self, enabled: bool) -> io::Result<()>;
}

/// Wrapper around tokio::net::UdpSocket that implements DatagramSocket
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Bind a UDP socket on `addr` (use port 0 for an ephemeral port)
    pub async fn bind(addr: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

#[async_trait]
impl DatagramSocket for UdpTransport {
    async fn send_to(&mut self, data: &[u8], target: SocketAddr) -> io::Result<usize> {
        self.socket.send_to(data, target).await
    }

    async fn recv_from(&mut self, buf: &mut [u8]) -> io::Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).await
    }

    fn set_broadcast(&mut self, enabled: bool) -> io::Result<()> {
        self.socket.set_broadcast(enabled)
    }
}
