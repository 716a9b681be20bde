use std::{future::Future, io, net::SocketAddr};
use tokio::net::UdpSocket;

/// Datagram socket associated with exactly one remote peer
///
/// Reads and writes go to and come from the connected peer only. Dropping the socket closes it.
pub trait DatagramSocket: Send + Sync + 'static {
    /// Receive a single datagram into `buf`, returning its length
    fn recv(&self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send;

    /// Send `buf` as a single datagram
    fn send(&self, buf: &[u8]) -> impl Future<Output = io::Result<usize>> + Send;

    fn local_addr(&self) -> io::Result<SocketAddr>;

    fn peer_addr(&self) -> io::Result<SocketAddr>;
}

impl DatagramSocket for UdpSocket {
    async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        UdpSocket::recv(self, buf).await
    }

    async fn send(&self, buf: &[u8]) -> io::Result<usize> {
        UdpSocket::send(self, buf).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> {
        UdpSocket::local_addr(self)
    }

    fn peer_addr(&self) -> io::Result<SocketAddr> {
        UdpSocket::peer_addr(self)
    }
}
