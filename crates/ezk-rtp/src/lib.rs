use bytes::Bytes;

mod packet_kind;
mod packetizer;
mod rtcp_packet;
mod rtp_packet;

pub use packet_kind::{classify, PacketKind};
pub use packetizer::{Packetizer, Vp8Payloader};
pub use rtcp_packet::{RtcpDecodeError, RtcpEncodeError, RtcpPacket, RtcpPacketKind};
pub use rtp_packet::RtpPacket;

pub use rtcp_types;
pub use rtp_types;

/// Create RTP payloads from an encoded media frame
pub trait Payloader: Send + 'static {
    /// Split `frame` into payloads no larger than `max_size` bytes each
    fn payload(&mut self, frame: &[u8], max_size: usize) -> Vec<Bytes>;
}
