use crate::channel::{Delivered, Delivery};
use crate::transport::{Shared, TransportState};
use crate::DatagramSocket;
use ezk_rtp::{classify, PacketKind, RtcpPacket, RtpPacket};
use std::io;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::select;
use tokio::sync::watch;

/// Why the receive task stopped
enum Exit {
    Shutdown,
    ReadError,
}

/// Sole reader of the transport's socket
///
/// Classifies every datagram, decodes it and hands the packets to the delivery channels. When it
/// exits it tears the transport down: the socket is released, both channels are closed and the
/// transport is marked as closed.
pub(crate) struct ReceiveTask<S> {
    pub(crate) socket: Arc<S>,
    pub(crate) shared: Arc<Shared<S>>,
    pub(crate) recv_buffer_size: usize,

    /// Set to `true` (or dropped) to request the task to exit
    pub(crate) shutdown: watch::Receiver<bool>,
    /// Set to `true` after teardown completed
    pub(crate) done: watch::Sender<bool>,

    pub(crate) rtp: Delivery<RtpPacket>,
    pub(crate) rtcp: Delivery<RtcpPacket>,
}

impl<S: DatagramSocket> ReceiveTask<S> {
    pub(crate) async fn run(mut self) {
        let mut recv_buf = vec![0u8; self.recv_buffer_size];

        let exit = loop {
            select! {
                biased;

                _ = shutdown_requested(&mut self.shutdown) => break Exit::Shutdown,

                result = self.socket.recv(&mut recv_buf) => {
                    if let ControlFlow::Break(exit) = self.handle_recv(&recv_buf, result).await {
                        break exit;
                    }
                }
            }
        };

        let target = &*self.shared.log_target;
        match exit {
            Exit::Shutdown => log::debug!(target: target, "exited receive task gracefully"),
            Exit::ReadError => log::warn!(target: target, "exited receive task, due to error"),
        }

        self.teardown().await;
    }

    async fn teardown(self) {
        let Self {
            socket,
            shared,
            done,
            rtp,
            rtcp,
            ..
        } = self;

        shared.begin_close();

        // Wait for in-flight writes, then release the socket
        shared.writer.lock().await.take();
        drop(socket);

        drop(rtp);
        drop(rtcp);

        *shared.state.lock() = TransportState::Closed;
        done.send_replace(true);
    }

    async fn handle_recv(&mut self, buf: &[u8], result: io::Result<usize>) -> ControlFlow<Exit> {
        let len = match result {
            Ok(len) => len,
            Err(e) if is_transient(&e) => {
                log::debug!(target: &*self.shared.log_target, "ignoring transient socket error, {e}");
                return ControlFlow::Continue(());
            }
            Err(e) => {
                log::warn!(target: &*self.shared.log_target, "Failed to read from socket, {e}");
                return ControlFlow::Break(Exit::ReadError);
            }
        };

        let buf = &buf[..len];

        match classify(buf) {
            PacketKind::Rtp => {
                let packet = match RtpPacket::parse(buf) {
                    Ok(packet) => packet,
                    Err(e) => {
                        log::debug!(target: &*self.shared.log_target, "Failed to parse RTP packet, {e:?}");
                        increment(&self.shared.stats.decode_errors);
                        return ControlFlow::Continue(());
                    }
                };

                increment(&self.shared.stats.rtp_received);

                let delivered = self.rtp.deliver(packet, &mut self.shutdown).await;
                self.handle_delivered(delivered, &self.shared.stats.rtp_dropped, "RTP")
            }
            PacketKind::Rtcp => {
                let packets = match RtcpPacket::parse_compound(buf) {
                    Ok(packets) => packets,
                    Err(e) => {
                        log::debug!(target: &*self.shared.log_target, "Failed to parse incoming RTCP packet, {e}");
                        increment(&self.shared.stats.decode_errors);
                        return ControlFlow::Continue(());
                    }
                };

                for packet in packets {
                    increment(&self.shared.stats.rtcp_received);

                    let delivered = self.rtcp.deliver(packet, &mut self.shutdown).await;

                    if let ControlFlow::Break(exit) =
                        self.handle_delivered(delivered, &self.shared.stats.rtcp_dropped, "RTCP")
                    {
                        return ControlFlow::Break(exit);
                    }
                }

                ControlFlow::Continue(())
            }
            PacketKind::Malformed => {
                log::debug!(target: &*self.shared.log_target, "Discarding datagram of length={len}");
                increment(&self.shared.stats.decode_errors);
                ControlFlow::Continue(())
            }
        }
    }

    fn handle_delivered(
        &self,
        delivered: Delivered,
        dropped: &AtomicU64,
        what: &str,
    ) -> ControlFlow<Exit> {
        match delivered {
            Delivered::Ok => ControlFlow::Continue(()),
            Delivered::Dropped => {
                let total = increment(dropped);
                if should_warn_about_drop(total) {
                    log::warn!(
                        target: &*self.shared.log_target,
                        "{what} channel is full, dropped incoming packet (total dropped={total})"
                    );
                } else {
                    log::trace!(
                        target: &*self.shared.log_target,
                        "{what} channel is full, dropped incoming packet"
                    );
                }
                ControlFlow::Continue(())
            }
            Delivered::Disconnected => {
                log::trace!(target: &*self.shared.log_target, "{what} channel has no receivers");
                increment(dropped);
                ControlFlow::Continue(())
            }
            Delivered::Shutdown => ControlFlow::Break(Exit::Shutdown),
        }
    }
}

/// Resolves once shutdown was requested or the transport handle is gone
///
/// Yields `()` so no borrow of the receiver outlives the `select!` branch.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|closing| *closing).await;
}

/// Only every n-th dropped packet of a channel is logged as warning
const DROP_WARN_INTERVAL: u64 = 100;

/// Warn on the first drop and then once every [`DROP_WARN_INTERVAL`] drops
fn should_warn_about_drop(total: u64) -> bool {
    total == 1 || total % DROP_WARN_INTERVAL == 0
}

/// Returns the incremented value
fn increment(counter: &AtomicU64) -> u64 {
    counter.fetch_add(1, Ordering::Relaxed) + 1
}

/// Connected UDP sockets report ICMP errors caused by earlier sends on the next read
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionReset
    )
}
