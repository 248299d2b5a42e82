//! Tokio UDP adapters for the send and receive paths.

mod udp;

pub use udp::{
    DEFAULT_HIGH_WATER_MARK,
    DEFAULT_PORT,
    UdpReceiver,
    UdpSender,
    UdpTransport,
};
