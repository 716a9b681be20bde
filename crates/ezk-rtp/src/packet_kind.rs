/// Protocol a datagram received on an rtcp-muxed port belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Rtp,
    Rtcp,
    /// Too short to carry the fixed header prefix
    Malformed,
}

/// RTCP packet types reserved by RFC 5761 section 4 to be distinguishable from RTP payload types
const RTCP_PACKET_TYPES: std::ops::RangeInclusive<u8> = 192..=223;

impl PacketKind {
    /// Identify a datagram by its second byte, which is either the RTP marker + payload type or
    /// the RTCP packet type
    pub fn identify(bytes: &[u8]) -> Self {
        let Some(&second) = bytes.get(1) else {
            return PacketKind::Malformed;
        };

        if RTCP_PACKET_TYPES.contains(&second) {
            PacketKind::Rtcp
        } else {
            PacketKind::Rtp
        }
    }
}

/// Shorthand for [`PacketKind::identify`]
pub fn classify(header: &[u8]) -> PacketKind {
    PacketKind::identify(header)
}
