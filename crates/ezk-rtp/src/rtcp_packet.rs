use core::fmt;
use rtcp_types::prelude::RtcpPacketWriter;
use rtcp_types::{Compound, RtcpParseError, RtcpWriteError};

const HEADER_LEN: usize = 4;

/// Kind of a single RTCP packet, taken from its packet type field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RtcpPacketKind {
    SenderReport,
    ReceiverReport,
    SourceDescription,
    Bye,
    App,
    TransportFeedback,
    PayloadFeedback,
    ExtendedReport,
    Unknown(u8),
}

impl RtcpPacketKind {
    pub fn from_packet_type(pt: u8) -> Self {
        match pt {
            200 => Self::SenderReport,
            201 => Self::ReceiverReport,
            202 => Self::SourceDescription,
            203 => Self::Bye,
            204 => Self::App,
            205 => Self::TransportFeedback,
            206 => Self::PayloadFeedback,
            207 => Self::ExtendedReport,
            other => Self::Unknown(other),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RtcpDecodeError {
    #[error("empty RTCP datagram")]
    Empty,
    #[error("RTCP packet truncated, expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },
    #[error("unsupported RTCP version {0}")]
    UnsupportedVersion(u8),
    #[error("{0} trailing bytes after RTCP packet")]
    TrailingBytes(usize),
    #[error("invalid RTCP packet, {0}")]
    Invalid(RtcpParseError),
}

#[derive(Debug, thiserror::Error)]
#[error("failed to serialize RTCP packet, {0:?}")]
pub struct RtcpEncodeError(RtcpWriteError);

/// Owned, validated wire bytes of exactly one RTCP packet
///
/// A compound datagram is split into one `RtcpPacket` per constituent packet, see
/// [`RtcpPacket::parse_compound`].
#[derive(Clone, PartialEq, Eq)]
pub struct RtcpPacket(Vec<u8>);

impl fmt::Debug for RtcpPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RtcpPacket")
            .field("kind", &self.kind())
            .field("ssrc", &self.ssrc())
            .field("len", &self.0.len())
            .finish()
    }
}

impl RtcpPacket {
    /// Serialize a packet from any of the `rtcp_types` builders
    pub fn new<B: RtcpPacketWriter>(builder: &B) -> Result<Self, RtcpEncodeError> {
        let size = builder.calculate_size().map_err(RtcpEncodeError)?;

        let mut buf = vec![0u8; size];
        let written = builder.write_into_unchecked(&mut buf);
        buf.truncate(written);

        Ok(Self(buf))
    }

    /// Parse exactly one RTCP packet, `i` must not contain anything after it
    pub fn parse(i: &[u8]) -> Result<Self, RtcpDecodeError> {
        let len = packet_len(i)?;

        if len != i.len() {
            return Err(RtcpDecodeError::TrailingBytes(i.len() - len));
        }

        let mut compound = Compound::parse(i).map_err(RtcpDecodeError::Invalid)?;

        match compound.next() {
            Some(Ok(_packet)) => Ok(Self(i.to_vec())),
            Some(Err(e)) => Err(RtcpDecodeError::Invalid(e)),
            None => Err(RtcpDecodeError::Empty),
        }
    }

    /// Walk a compound RTCP datagram and return every packet inside it in order
    pub fn parse_compound(i: &[u8]) -> Result<Vec<Self>, RtcpDecodeError> {
        if i.is_empty() {
            return Err(RtcpDecodeError::Empty);
        }

        let mut packets = Vec::new();
        let mut rest = i;

        while !rest.is_empty() {
            let len = packet_len(rest)?;
            let (packet, tail) = rest.split_at(len);

            packets.push(Self::parse(packet)?);
            rest = tail;
        }

        Ok(packets)
    }

    /// Concatenate `packets` into a single compound payload
    pub fn write_compound(packets: &[Self], buf: &mut Vec<u8>) {
        buf.reserve(packets.iter().map(|p| p.0.len()).sum());

        for packet in packets {
            buf.extend_from_slice(&packet.0);
        }
    }

    pub fn get(&self) -> rtcp_types::Packet<'_> {
        Compound::parse(&self.0)
            .ok()
            .and_then(|mut compound| compound.next())
            .and_then(Result::ok)
            .expect("internal buffer must contain a valid rtcp packet")
    }

    pub fn kind(&self) -> RtcpPacketKind {
        RtcpPacketKind::from_packet_type(self.0[1])
    }

    /// SSRC of the packet sender, or the first source of an SDES/BYE packet
    pub fn ssrc(&self) -> Option<u32> {
        let count = self.0[0] & 0x1F;

        if matches!(
            self.kind(),
            RtcpPacketKind::SourceDescription | RtcpPacketKind::Bye
        ) && count == 0
        {
            return None;
        }

        let ssrc = self.0.get(4..8)?;

        Some(u32::from_be_bytes([ssrc[0], ssrc[1], ssrc[2], ssrc[3]]))
    }

    /// Wire representation of the packet
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.0
    }
}

/// Length in bytes of the RTCP packet starting at `i[0]`, validated against `i.len()`
fn packet_len(i: &[u8]) -> Result<usize, RtcpDecodeError> {
    if i.len() < HEADER_LEN {
        return Err(RtcpDecodeError::Truncated {
            expected: HEADER_LEN,
            actual: i.len(),
        });
    }

    let version = i[0] >> 6;
    if version != 2 {
        return Err(RtcpDecodeError::UnsupportedVersion(version));
    }

    // length field counts 32-bit words minus one
    let len = (usize::from(u16::from_be_bytes([i[2], i[3]])) + 1) * 4;

    if len > i.len() {
        return Err(RtcpDecodeError::Truncated {
            expected: len,
            actual: i.len(),
        });
    }

    Ok(len)
}
