//! Utilities for exercising `udpfrag` senders and receivers in tests.
//!
//! ```rust
//! use udpfrag::{Defragmenter, ReceiverConfig};
//! use udpfrag_testing::{feed, fragment};
//!
//! let receiver = Defragmenter::new(ReceiverConfig::default()).expect("config");
//! let batch = fragment(b"hello", 2, 1);
//! let datagrams = batch.into_iter().map(|f| f.into_datagram());
//! let messages = feed(&receiver, datagrams);
//! assert_eq!(messages[0].payload, &b"hello"[..]);
//! ```

pub mod helpers;
pub mod logging;

pub use helpers::{
    FAST_GC_EXPIRATION,
    FAST_GC_INTERVAL,
    Counters,
    debugging_recorder_setup,
    defragmenter,
    fast_gc,
    feed,
    loopback_pair,
};
pub use logging::{LoggerHandle, logger};
pub use udpfrag::test_helpers::{ScriptedTransport, TEST_CLOCK_MS, fragment, seeded_generator};
