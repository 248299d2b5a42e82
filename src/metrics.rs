//! Metric helpers for `udpfrag`.
//!
//! This module defines metric names and simple helper functions wrapping the
//! [`metrics`](https://docs.rs/metrics) crate. Without the `metrics` feature
//! the helpers compile to no-ops.

#[cfg(feature = "metrics")]
use metrics::counter;

/// Name of the counter tracking fragment datagrams.
pub const FRAGMENTS_TOTAL: &str = "udpfrag_fragments_total";
/// Name of the counter tracking fully reassembled messages.
pub const MESSAGES_REASSEMBLED: &str = "udpfrag_messages_reassembled_total";
/// Name of the counter tracking messages evicted before completion.
pub const MESSAGES_EVICTED: &str = "udpfrag_messages_evicted_total";
/// Name of the counter tracking dropped datagrams.
pub const DATAGRAMS_DROPPED: &str = "udpfrag_datagrams_dropped_total";

/// Direction of datagram processing.
#[derive(Clone, Copy)]
pub enum Direction {
    /// Datagrams received from the transport.
    Inbound,
    /// Datagrams handed to the transport.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Reason a datagram was dropped on the receive path.
#[derive(Clone, Copy)]
pub enum DropReason {
    /// Decryption rejected the datagram.
    Decryption,
    /// The identifier could not be parsed.
    Malformed,
    /// The fragment disagreed with its message metadata.
    InvalidFragment,
    /// The receiver was stopped.
    Stopped,
}

impl DropReason {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            DropReason::Decryption => "decryption",
            DropReason::Malformed => "malformed",
            DropReason::InvalidFragment => "invalid_fragment",
            DropReason::Stopped => "stopped",
        }
    }
}

/// Record a fragment datagram for the given direction.
pub fn inc_fragments(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(FRAGMENTS_TOTAL, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record a reassembled message.
pub fn inc_reassembled() {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_REASSEMBLED).increment(1);
}

/// Record `count` evicted messages.
pub fn inc_evicted(count: u64) {
    #[cfg(feature = "metrics")]
    counter!(MESSAGES_EVICTED).increment(count);
    #[cfg(not(feature = "metrics"))]
    let _ = count;
}

/// Record a dropped datagram.
pub fn inc_dropped(reason: DropReason) {
    #[cfg(feature = "metrics")]
    counter!(DATAGRAMS_DROPPED, "reason" => reason.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = reason;
}
