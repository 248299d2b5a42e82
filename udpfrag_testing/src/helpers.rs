//! Helpers for driving the send and receive paths in tests.

use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use bytes::Bytes;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use rstest::fixture;
use tokio::net::UdpSocket;
use udpfrag::{
    DatagramHead,
    Defragmenter,
    ReceivedMessage,
    ReceiverConfig,
    SenderConfig,
    UdpReceiver,
    UdpSender,
};

/// Sweep period used by [`fast_gc`].
pub const FAST_GC_INTERVAL: Duration = Duration::from_millis(50);
/// Expiration window used by [`fast_gc`].
pub const FAST_GC_EXPIRATION: Duration = Duration::from_millis(100);

/// Receiver configuration with a short eviction window.
#[fixture]
#[allow(
    unused_braces,
    reason = "rustc false positive for single line rstest fixtures"
)]
pub fn fast_gc() -> ReceiverConfig {
    ReceiverConfig::default().with_gc(FAST_GC_INTERVAL, FAST_GC_EXPIRATION)
}

/// Defragmenter with the default configuration.
///
/// # Panics
///
/// Panics if the default configuration is rejected.
#[fixture]
pub fn defragmenter() -> Defragmenter {
    Defragmenter::new(ReceiverConfig::default()).expect("default config is valid")
}

/// Feed `datagrams` into `defragmenter`, collecting every completed message.
pub fn feed<I>(defragmenter: &Defragmenter, datagrams: I) -> Vec<ReceivedMessage>
where
    I: IntoIterator<Item = Bytes>,
{
    datagrams
        .into_iter()
        .filter_map(|datagram| defragmenter.handle_datagram(datagram, DatagramHead::default()))
        .collect()
}

/// Bind a receiver on loopback and a sender pointed at it.
///
/// # Panics
///
/// Panics if either socket cannot be bound or a configuration is rejected.
pub async fn loopback_pair(
    sender_config: SenderConfig,
    receiver_config: ReceiverConfig,
) -> (UdpSender, UdpReceiver) {
    let loopback = SocketAddr::from((Ipv4Addr::LOCALHOST, 0));
    let socket = UdpSocket::bind(loopback).await.expect("bind receiver");
    let receiver = UdpReceiver::from_socket(socket, receiver_config).expect("receiver config");
    let peer = receiver.local_addr().expect("receiver address");

    let socket = UdpSocket::bind(loopback).await.expect("bind sender");
    let sender = UdpSender::from_socket(socket, peer, sender_config).expect("sender config");
    (sender, receiver)
}

/// Creates a debugging recorder and snapshotter for metrics testing.
#[must_use]
pub fn debugging_recorder_setup() -> (Snapshotter, DebuggingRecorder) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (snapshotter, recorder)
}

/// Counter readings taken from one recorder snapshot.
///
/// Taking a snapshot resets the recorder's counters, so read every counter a
/// test needs from the same [`Counters`].
#[derive(Debug, Default)]
pub struct Counters(Vec<(String, Vec<(String, String)>, u64)>);

impl Counters {
    /// Snapshot every counter recorded so far.
    #[must_use]
    pub fn take(snapshotter: &Snapshotter) -> Self {
        let counters = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .filter_map(|(key, _, _, value)| match value {
                DebugValue::Counter(count) => {
                    let key = key.key();
                    let labels = key
                        .labels()
                        .map(|l| (l.key().to_owned(), l.value().to_owned()))
                        .collect();
                    Some((key.name().to_owned(), labels, count))
                }
                _ => None,
            })
            .collect();
        Self(counters)
    }

    /// Sum of the counter `name`, optionally filtered by one label.
    #[must_use]
    pub fn value(&self, name: &str, label: Option<(&str, &str)>) -> u64 {
        self.0
            .iter()
            .filter(|(counter, _, _)| counter == name)
            .filter(|(_, labels, _)| {
                label.is_none_or(|(k, v)| labels.iter().any(|(lk, lv)| lk == k && lv == v))
            })
            .map(|(_, _, count)| count)
            .sum()
    }
}
