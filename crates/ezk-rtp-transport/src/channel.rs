use crate::DeliveryPolicy;
use std::sync::Arc;
use tokio::select;
use tokio::sync::{mpsc, watch, Mutex};

pub use tokio::sync::mpsc::error::TryRecvError;

/// Receiving end of a delivery channel
///
/// Clones share the same queue, every packet is handed to exactly one of them. Once the transport
/// is closed the remaining packets can still be received, after that `recv` returns `None`.
pub struct PacketReceiver<T> {
    rx: Arc<Mutex<mpsc::Receiver<T>>>,
}

impl<T> Clone for PacketReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            rx: self.rx.clone(),
        }
    }
}

impl<T> PacketReceiver<T> {
    /// Wait for the next packet, returns `None` once the channel is closed and drained
    ///
    /// Cancel safe.
    pub async fn recv(&self) -> Option<T> {
        self.rx.lock().await.recv().await
    }

    /// Take the next packet if one is available right now
    ///
    /// Reports [`TryRecvError::Empty`] while another clone is waiting in [`PacketReceiver::recv`].
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        match self.rx.try_lock() {
            Ok(mut rx) => rx.try_recv(),
            Err(_) => Err(TryRecvError::Empty),
        }
    }
}

/// Result of handing a packet to a delivery channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivered {
    Ok,
    /// Channel was full and the packet discarded
    Dropped,
    /// All receivers are gone
    Disconnected,
    /// Shutdown was requested while waiting for room in the channel
    Shutdown,
}

/// Sending end of a delivery channel, owned by the receive task
pub(crate) struct Delivery<T> {
    tx: mpsc::Sender<T>,
    policy: DeliveryPolicy,
}

pub(crate) fn delivery_channel<T>(
    capacity: usize,
    policy: DeliveryPolicy,
) -> (Delivery<T>, PacketReceiver<T>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    (
        Delivery { tx, policy },
        PacketReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

impl<T> Delivery<T> {
    pub(crate) async fn deliver(&self, item: T, shutdown: &mut watch::Receiver<bool>) -> Delivered {
        match self.policy {
            DeliveryPolicy::DropNewest => match self.tx.try_send(item) {
                Ok(()) => Delivered::Ok,
                Err(mpsc::error::TrySendError::Full(_)) => Delivered::Dropped,
                Err(mpsc::error::TrySendError::Closed(_)) => Delivered::Disconnected,
            },
            DeliveryPolicy::Block => {
                select! {
                    result = self.tx.send(item) => match result {
                        Ok(()) => Delivered::Ok,
                        Err(_) => Delivered::Disconnected,
                    },
                    _ = shutdown.wait_for(|closing| *closing) => Delivered::Shutdown,
                }
            }
        }
    }
}
