/// Largest datagram read from the socket, anything above is truncated by the OS
pub const DEFAULT_RECV_BUFFER_SIZE: usize = 1500;

/// Smaller receive buffers are raised to this, the size of a fixed RTP header
pub const MIN_RECV_BUFFER_SIZE: usize = 12;

/// Number of packets buffered per delivery channel before the delivery policy kicks in
pub const DEFAULT_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// At least [`MIN_RECV_BUFFER_SIZE`]
    pub recv_buffer_size: usize,
    /// At least 1
    pub channel_capacity: usize,
    pub delivery: DeliveryPolicy,

    /// Target of every log record emitted by the transport
    pub log_target: String,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            recv_buffer_size: DEFAULT_RECV_BUFFER_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            delivery: DeliveryPolicy::default(),
            log_target: String::from("ezk_rtp_transport"),
        }
    }
}

/// What the receive task does when a delivery channel is full
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPolicy {
    /// Drop the packet that does not fit and keep reading the socket
    #[default]
    DropNewest,
    /// Wait for the consumer, stalling the socket reads until there is room
    Block,
}
