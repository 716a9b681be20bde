use ezk_rtp::rtcp_types::{Bye, ReceiverReport, SenderReport};
use ezk_rtp::{Packetizer, RtcpPacket, RtcpPacketKind, Vp8Payloader};
use ezk_rtp_transport::{
    Error, PacketReceiver, RtpTransport, Transport, TransportOptions, TransportState,
};
use std::collections::HashMap;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

const MTU: usize = 1200;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Two UDP sockets on localhost connected to each other
async fn udp_pair() -> (UdpSocket, UdpSocket) {
    let a = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let b = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    a.connect(b.local_addr().unwrap()).await.unwrap();
    b.connect(a.local_addr().unwrap()).await.unwrap();

    (a, b)
}

async fn transport_pair() -> (RtpTransport, RtpTransport) {
    let (a, b) = udp_pair().await;

    (RtpTransport::new(a), RtpTransport::new(b))
}

async fn recv<T>(rx: &PacketReceiver<T>) -> T {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for packet")
        .expect("channel closed unexpectedly")
}

/// Only uses the `Transport` trait, like a media pipeline would
async fn write_sample<T: Transport>(
    transport: &T,
    packetizer: &mut Packetizer<Vp8Payloader>,
    data: &[u8],
    samples: u32,
) -> Vec<ezk_rtp::RtpPacket> {
    let packets = packetizer.packetize(data, samples);

    for packet in &packets {
        let written = transport.write_rtp(packet).await.unwrap();
        assert_eq!(written, packet.as_bytes().len());
    }

    packets
}

#[tokio::test]
async fn rtp() {
    init_logger();
    let (t1, t2) = transport_pair().await;

    let mut packetizer = Packetizer::new(MTU, 96, 123, Vp8Payloader, 96000);

    let sent = write_sample(&t1, &mut packetizer, &[0x01], 1).await;
    assert_eq!(sent.len(), 1);

    let expected: HashMap<u16, Vec<u8>> = sent
        .iter()
        .map(|p| (p.sequence_number(), p.as_bytes().to_vec()))
        .collect();

    let rtp = t2.rtp_channel();
    let mut actual = HashMap::new();
    for _ in 0..sent.len() {
        let packet = recv(&rtp).await;
        actual.insert(packet.sequence_number(), packet.into_vec());
    }

    assert_eq!(expected, actual);

    t1.close().await.unwrap();
    t2.close().await.unwrap();
}

#[tokio::test]
async fn rtcp() {
    init_logger();
    let (t1, t2) = transport_pair().await;

    let sender_report = RtcpPacket::new(&SenderReport::builder(123)).unwrap();

    t1.write_rtcp(&[sender_report.clone()]).await.unwrap();

    let received = recv(&t2.rtcp_channel()).await;

    assert_eq!(received.kind(), RtcpPacketKind::SenderReport);
    assert_eq!(received.ssrc(), Some(123));
    assert_eq!(received.as_bytes(), sender_report.as_bytes());

    t1.close().await.unwrap();
    t2.close().await.unwrap();
}

#[tokio::test]
async fn compound_rtcp_keeps_order() {
    init_logger();
    let (t1, t2) = transport_pair().await;

    let packets = vec![
        RtcpPacket::new(&SenderReport::builder(1)).unwrap(),
        RtcpPacket::new(&ReceiverReport::builder(2)).unwrap(),
        RtcpPacket::new(&SenderReport::builder(3)).unwrap(),
        RtcpPacket::new(&Bye::builder().add_source(4)).unwrap(),
    ];

    t1.write_rtcp(&packets).await.unwrap();

    let rtcp = t2.rtcp_channel();
    for expected in &packets {
        assert_eq!(&recv(&rtcp).await, expected);
    }

    assert_eq!(rtcp.try_recv().ok(), None);
    assert_eq!(t2.stats().rtcp_received, packets.len() as u64);
}

#[tokio::test]
async fn both_directions() {
    init_logger();
    let (t1, t2) = transport_pair().await;

    let mut p1 = Packetizer::new(MTU, 96, 1, Vp8Payloader, 90000);
    let mut p2 = Packetizer::new(MTU, 96, 2, Vp8Payloader, 90000);

    let sent1 = write_sample(&t1, &mut p1, b"from t1", 3000).await;
    let sent2 = write_sample(&t2, &mut p2, b"from t2", 3000).await;

    assert_eq!(recv(&t2.rtp_channel()).await, sent1[0]);
    assert_eq!(recv(&t1.rtp_channel()).await, sent2[0]);
}

#[tokio::test]
async fn unread_channel_does_not_stall_receiving() {
    init_logger();
    let (a, b) = udp_pair().await;

    let t1 = RtpTransport::new(a);
    let t2 = RtpTransport::with_options(
        b,
        TransportOptions {
            channel_capacity: 4,
            ..TransportOptions::default()
        },
    );

    let mut packetizer = Packetizer::new(MTU, 96, 123, Vp8Payloader, 96000);
    let mut sent = Vec::new();
    for _ in 0..20 {
        sent.extend(write_sample(&t1, &mut packetizer, &[0x01], 1).await);
    }

    // RTCP still arrives while nobody reads the full RTP channel
    let sr = RtcpPacket::new(&SenderReport::builder(123)).unwrap();
    t1.write_rtcp(&[sr.clone()]).await.unwrap();
    assert_eq!(recv(&t2.rtcp_channel()).await, sr);

    let stats = t2.stats();
    assert_eq!(stats.rtp_received, 20);
    assert_eq!(stats.rtp_dropped, 16);

    // the oldest packets were kept
    let rtp = t2.rtp_channel();
    for expected in &sent[..4] {
        assert_eq!(&recv(&rtp).await, expected);
    }
}

#[tokio::test]
async fn writes_fail_after_close() {
    init_logger();
    let (t1, t2) = transport_pair().await;

    t1.close().await.unwrap();
    assert_eq!(t1.state(), TransportState::Closed);

    let mut packetizer = Packetizer::new(MTU, 96, 123, Vp8Payloader, 96000);
    let packet = packetizer.packetize(&[0x01], 1).remove(0);

    assert!(matches!(t1.write_rtp(&packet).await, Err(Error::Closed)));
    assert!(matches!(
        t1.write_rtcp(&[RtcpPacket::new(&SenderReport::builder(1)).unwrap()])
            .await,
        Err(Error::Closed)
    ));

    assert!(t1.rtp_channel().recv().await.is_none());
    assert!(t1.rtcp_channel().recv().await.is_none());

    // the peer is unaffected
    assert_eq!(t2.state(), TransportState::Open);
}

#[tokio::test]
async fn concurrent_close() {
    init_logger();
    let (t1, _t2) = transport_pair().await;
    let t1 = std::sync::Arc::new(t1);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let t1 = t1.clone();
            tokio::spawn(async move { t1.close().await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(t1.state(), TransportState::Closed);
    Transport::close(&*t1).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers() {
    init_logger();
    let (t1, t2) = transport_pair().await;
    let t1 = std::sync::Arc::new(t1);

    let writers: Vec<_> = (0..4u32)
        .map(|ssrc| {
            let t1 = t1.clone();
            tokio::spawn(async move {
                let mut packetizer = Packetizer::new(MTU, 96, ssrc, Vp8Payloader, 90000);
                for _ in 0..5 {
                    for packet in packetizer.packetize(&[0xAA; 100], 3000) {
                        t1.write_rtp(&packet).await.unwrap();
                    }
                }
            })
        })
        .collect();

    for writer in writers {
        writer.await.unwrap();
    }

    let rtp = t2.rtp_channel();
    let mut per_ssrc = HashMap::<u32, usize>::new();
    for _ in 0..20 {
        let packet = recv(&rtp).await;
        assert_eq!(packet.get().payload().len(), 101);
        *per_ssrc.entry(packet.ssrc()).or_default() += 1;
    }

    assert_eq!(per_ssrc.len(), 4);
    assert!(per_ssrc.values().all(|count| *count == 5));
}
