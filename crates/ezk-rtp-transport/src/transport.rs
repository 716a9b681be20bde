use crate::channel::{delivery_channel, PacketReceiver};
use crate::task::ReceiveTask;
use crate::{DatagramSocket, Error, Transport, TransportOptions, MIN_RECV_BUFFER_SIZE};
use ezk_rtp::{RtcpPacket, RtpPacket};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::watch;

/// Lifecycle of a [`RtpTransport`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Writes are accepted and the socket is being read
    Open,
    /// Close was requested or reading failed, writes are rejected
    Closing,
    /// Receive task exited, the socket is released and both channels are closed
    Closed,
}

/// Snapshot of the transport's packet counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransportStats {
    pub rtp_received: u64,
    pub rtcp_received: u64,
    /// Packets discarded because the RTP channel was full
    pub rtp_dropped: u64,
    /// Packets discarded because the RTCP channel was full
    pub rtcp_dropped: u64,
    /// Datagrams that could not be decoded
    pub decode_errors: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Stats {
    pub(crate) rtp_received: AtomicU64,
    pub(crate) rtcp_received: AtomicU64,
    pub(crate) rtp_dropped: AtomicU64,
    pub(crate) rtcp_dropped: AtomicU64,
    pub(crate) decode_errors: AtomicU64,
}

impl Stats {
    fn snapshot(&self) -> TransportStats {
        TransportStats {
            rtp_received: self.rtp_received.load(Ordering::Relaxed),
            rtcp_received: self.rtcp_received.load(Ordering::Relaxed),
            rtp_dropped: self.rtp_dropped.load(Ordering::Relaxed),
            rtcp_dropped: self.rtcp_dropped.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
        }
    }
}

/// State shared between the transport handle and its receive task
pub(crate) struct Shared<S> {
    /// Serializes writes, `None` once the socket was released
    pub(crate) writer: tokio::sync::Mutex<Option<Arc<S>>>,
    pub(crate) state: parking_lot::Mutex<TransportState>,
    pub(crate) stats: Stats,
    pub(crate) log_target: String,
}

impl<S> Shared<S> {
    /// Transition `Open -> Closing`, returns `false` if closing has already begun
    pub(crate) fn begin_close(&self) -> bool {
        let mut state = self.state.lock();

        if *state == TransportState::Open {
            *state = TransportState::Closing;
            true
        } else {
            false
        }
    }

    fn is_open(&self) -> bool {
        *self.state.lock() == TransportState::Open
    }
}

/// RTP and RTCP multiplexed over a single connected datagram socket
///
/// A background task reads the socket and delivers decoded packets to the channels returned by
/// [`RtpTransport::rtp_channel`] and [`RtpTransport::rtcp_channel`]. Writes may be issued
/// concurrently from any number of tasks.
///
/// Dropping the transport shuts down the receive task as if [`RtpTransport::close`] was called.
pub struct RtpTransport<S = UdpSocket> {
    shared: Arc<Shared<S>>,

    local_addr: Option<SocketAddr>,
    peer_addr: Option<SocketAddr>,

    shutdown: watch::Sender<bool>,
    done: watch::Receiver<bool>,

    rtp_rx: PacketReceiver<RtpPacket>,
    rtcp_rx: PacketReceiver<RtcpPacket>,
}

impl<S: DatagramSocket> RtpTransport<S> {
    /// Take ownership of `socket` and start reading from it
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(socket: S) -> Self {
        Self::with_options(socket, TransportOptions::default())
    }

    pub fn with_options(socket: S, options: TransportOptions) -> Self {
        let TransportOptions {
            recv_buffer_size,
            channel_capacity,
            delivery,
            log_target,
        } = options;

        let local_addr = socket.local_addr().ok();
        let peer_addr = socket.peer_addr().ok();

        let socket = Arc::new(socket);

        let shared = Arc::new(Shared {
            writer: tokio::sync::Mutex::new(Some(socket.clone())),
            state: parking_lot::Mutex::new(TransportState::Open),
            stats: Stats::default(),
            log_target,
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(false);

        let (rtp, rtp_rx) = delivery_channel(channel_capacity, delivery);
        let (rtcp, rtcp_rx) = delivery_channel(channel_capacity, delivery);

        tokio::spawn(
            ReceiveTask {
                socket,
                shared: shared.clone(),
                recv_buffer_size: recv_buffer_size.max(MIN_RECV_BUFFER_SIZE),
                shutdown: shutdown_rx,
                done: done_tx,
                rtp,
                rtcp,
            }
            .run(),
        );

        Self {
            shared,
            local_addr,
            peer_addr,
            shutdown: shutdown_tx,
            done: done_rx,
            rtp_rx,
            rtcp_rx,
        }
    }

    /// Write a single RTP packet as one datagram, returns the number of bytes written
    pub async fn write_rtp(&self, packet: &RtpPacket) -> Result<usize, Error> {
        self.write(packet.as_bytes()).await
    }

    /// Write `packets` as one compound RTCP datagram
    pub async fn write_rtcp(&self, packets: &[RtcpPacket]) -> Result<(), Error> {
        if !self.shared.is_open() {
            return Err(Error::Closed);
        }

        if packets.is_empty() {
            return Err(Error::EmptyCompound);
        }

        let mut buf = Vec::new();
        RtcpPacket::write_compound(packets, &mut buf);

        self.write(&buf).await?;

        Ok(())
    }

    async fn write(&self, buf: &[u8]) -> Result<usize, Error> {
        if !self.shared.is_open() {
            return Err(Error::Closed);
        }

        let writer = self.shared.writer.lock().await;

        // close may have begun while waiting for the guard
        if !self.shared.is_open() {
            return Err(Error::Closed);
        }

        let socket = writer.as_ref().ok_or(Error::Closed)?;

        Ok(socket.send(buf).await?)
    }

    /// Channel yielding every received RTP packet in arrival order
    pub fn rtp_channel(&self) -> PacketReceiver<RtpPacket> {
        self.rtp_rx.clone()
    }

    /// Channel yielding every packet of every received RTCP compound packet in arrival order
    pub fn rtcp_channel(&self) -> PacketReceiver<RtcpPacket> {
        self.rtcp_rx.clone()
    }

    /// Close the transport and wait until the receive task has released all resources
    ///
    /// Calling this more than once or from multiple tasks at once is fine, every call returns
    /// after the transport reached [`TransportState::Closed`].
    pub async fn close(&self) -> Result<(), Error> {
        if self.shared.begin_close() {
            log::debug!(target: &*self.shared.log_target, "closing transport");
        }

        self.shutdown.send_replace(true);

        // An error means the receive task is gone, which it only is after teardown
        let mut done = self.done.clone();
        let _ = done.wait_for(|done| *done).await;

        Ok(())
    }

    pub fn state(&self) -> TransportState {
        *self.shared.state.lock()
    }

    pub fn stats(&self) -> TransportStats {
        self.shared.stats.snapshot()
    }

    /// Local address of the socket, captured when the transport was created
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Address of the connected peer, captured when the transport was created
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }
}

impl<S: DatagramSocket> Transport for RtpTransport<S> {
    async fn write_rtp(&self, packet: &RtpPacket) -> Result<usize, Error> {
        RtpTransport::write_rtp(self, packet).await
    }

    async fn write_rtcp(&self, packets: &[RtcpPacket]) -> Result<(), Error> {
        RtpTransport::write_rtcp(self, packets).await
    }

    fn rtp_channel(&self) -> PacketReceiver<RtpPacket> {
        RtpTransport::rtp_channel(self)
    }

    fn rtcp_channel(&self) -> PacketReceiver<RtcpPacket> {
        RtpTransport::rtcp_channel(self)
    }

    async fn close(&self) -> Result<(), Error> {
        RtpTransport::close(self).await
    }
}
