//! UDP transport: the one socket the whole server shares (spec.md §5).

use std::net::SocketAddr;

use tokio::net::UdpSocket;

/// Datagrams larger than this are rejected by the OS read before we ever
/// see them; this is just the buffer we hand the kernel.
const RECV_BUF_SIZE: usize = 4096;

pub struct Transport {
    socket: UdpSocket,
}

impl Transport {
    pub async fn bind(addr: SocketAddr) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Ok(Self { socket })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receive one datagram. Per spec.md §4.7, `recvfrom` failures cause
    /// the current iteration to continue — callers log the error and loop,
    /// they never treat it as fatal.
    pub async fn recv(&self) -> std::io::Result<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; RECV_BUF_SIZE];
        let (n, from) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(n);
        Ok((buf, from))
    }

    pub async fn send(&self, addr: SocketAddr, bytes: &[u8]) -> std::io::Result<()> {
        self.socket.send_to(bytes, addr).await?;
        Ok(())
    }
}
