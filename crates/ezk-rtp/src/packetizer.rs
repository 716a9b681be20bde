use crate::{Payloader, RtpPacket};
use bytes::{BufMut, Bytes, BytesMut};

/// Size of the fixed RTP header without CSRCs or extensions
const RTP_HEADER_LEN: usize = 12;

/// Turns encoded media frames into RTP packets of a single stream
pub struct Packetizer<P> {
    mtu: usize,
    payload_type: u8,
    ssrc: u32,
    clock_rate: u32,

    sequence_number: u16,
    timestamp: u32,

    payloader: P,
}

impl<P: Payloader> Packetizer<P> {
    /// Create a packetizer starting at a random sequence number and timestamp
    ///
    /// `mtu` limits the size of each produced packet including the RTP header.
    pub fn new(mtu: usize, payload_type: u8, ssrc: u32, payloader: P, clock_rate: u32) -> Self {
        Self {
            mtu,
            payload_type,
            ssrc,
            clock_rate,
            sequence_number: rand::random(),
            timestamp: rand::random(),
            payloader,
        }
    }

    pub fn ssrc(&self) -> u32 {
        self.ssrc
    }

    pub fn clock_rate(&self) -> u32 {
        self.clock_rate
    }

    /// Sequence number the next packet will carry
    pub fn next_sequence_number(&self) -> u16 {
        self.sequence_number
    }

    /// Advance the timestamp without producing packets, e.g. for silence
    pub fn skip_samples(&mut self, samples: u32) {
        self.timestamp = self.timestamp.wrapping_add(samples);
    }

    /// Packetize one frame spanning `samples` clock ticks
    ///
    /// The marker bit is set on the last packet of the frame.
    pub fn packetize(&mut self, frame: &[u8], samples: u32) -> Vec<RtpPacket> {
        let max_size = self.mtu.saturating_sub(RTP_HEADER_LEN);

        let payloads = self.payloader.payload(frame, max_size);
        let count = payloads.len();

        let packets = payloads
            .iter()
            .enumerate()
            .map(|(i, payload)| {
                let packet = RtpPacket::new(
                    &rtp_types::RtpPacketBuilder::new()
                        .payload_type(self.payload_type)
                        .sequence_number(self.sequence_number)
                        .timestamp(self.timestamp)
                        .ssrc(self.ssrc)
                        .marker_bit(i + 1 == count)
                        .payload(&payload[..]),
                );

                self.sequence_number = self.sequence_number.wrapping_add(1);

                packet
            })
            .collect();

        self.timestamp = self.timestamp.wrapping_add(samples);

        packets
    }
}

/// VP8 payloader (RFC 7741) which only writes the mandatory 1 byte payload descriptor
#[derive(Debug, Default)]
pub struct Vp8Payloader;

const VP8_DESCRIPTOR_LEN: usize = 1;
/// Start of VP8 partition
const VP8_S_BIT: u8 = 0x10;

impl Payloader for Vp8Payloader {
    fn payload(&mut self, frame: &[u8], max_size: usize) -> Vec<Bytes> {
        if max_size <= VP8_DESCRIPTOR_LEN {
            return vec![];
        }

        frame
            .chunks(max_size - VP8_DESCRIPTOR_LEN)
            .enumerate()
            .map(|(i, chunk)| {
                let mut payload = BytesMut::with_capacity(VP8_DESCRIPTOR_LEN + chunk.len());
                payload.put_u8(if i == 0 { VP8_S_BIT } else { 0 });
                payload.put_slice(chunk);
                payload.freeze()
            })
            .collect()
    }
}
