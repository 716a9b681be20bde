//! RTP & RTCP multiplexed on a single connected UDP socket (RFC 5761)
//!
//! [`RtpTransport`] owns the socket. A background task reads every incoming datagram, decides
//! whether it is RTP or RTCP and delivers the decoded packets to two independent channels.
//! Outgoing packets are written through [`RtpTransport::write_rtp`] and
//! [`RtpTransport::write_rtcp`].

use ezk_rtp::{RtcpPacket, RtpPacket};
use std::{future::Future, io};

mod channel;
mod options;
mod socket;
mod task;
mod transport;

pub use channel::{PacketReceiver, TryRecvError};
pub use options::{
    DeliveryPolicy, TransportOptions, DEFAULT_CHANNEL_CAPACITY, DEFAULT_RECV_BUFFER_SIZE,
    MIN_RECV_BUFFER_SIZE,
};
pub use socket::DatagramSocket;
pub use transport::{RtpTransport, TransportState, TransportStats};

pub use ezk_rtp;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport is closed")]
    Closed,
    #[error("refusing to send an RTCP compound packet without any packets")]
    EmptyCompound,
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Sink & source of RTP and RTCP packets exchanged with a single peer
pub trait Transport: Send + Sync {
    fn write_rtp(&self, packet: &RtpPacket) -> impl Future<Output = Result<usize, Error>> + Send;

    fn write_rtcp(&self, packets: &[RtcpPacket]) -> impl Future<Output = Result<(), Error>> + Send;

    fn rtp_channel(&self) -> PacketReceiver<RtpPacket>;

    fn rtcp_channel(&self) -> PacketReceiver<RtcpPacket>;

    fn close(&self) -> impl Future<Output = Result<(), Error>> + Send;
}
