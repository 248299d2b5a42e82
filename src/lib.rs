#![doc(html_root_url = "https://docs.rs/udpfrag/latest")]
//! Public API for the `udpfrag` library.
//!
//! This crate splits application payloads into identifier-tagged UDP
//! datagrams and reassembles them on the far side. Fragments of one message
//! share an 18-byte seed; each carries its own index and the message's highest
//! index, so the receiver can rebuild the payload whatever order the
//! datagrams arrive in. Incomplete messages are evicted after a configurable
//! window.
//!
//! ```
//! use bytes::Bytes;
//! use udpfrag::{
//!     DatagramHead,
//!     Defragmenter,
//!     OutboundDatagram,
//!     ReceiverConfig,
//!     Sender,
//!     SenderConfig,
//!     Transport,
//! };
//!
//! #[derive(Default)]
//! struct Loopback(Vec<Bytes>);
//!
//! impl Transport for Loopback {
//!     fn send(&mut self, datagram: OutboundDatagram) -> bool {
//!         self.0.push(datagram.bytes().clone());
//!         datagram.complete(Ok(()));
//!         true
//!     }
//! }
//!
//! let config = SenderConfig::default().with_packet_size(32);
//! let mut sender = Sender::new(Loopback::default(), config).expect("config");
//! let _ = sender.write(b"hello, fragmented world").expect("write");
//!
//! let receiver = Defragmenter::new(ReceiverConfig::default()).expect("config");
//! let mut delivered = None;
//! for datagram in sender.transport().0.iter().rev() {
//!     delivered = receiver.handle_datagram(datagram.clone(), DatagramHead::default());
//! }
//! assert_eq!(delivered.expect("complete").payload, &b"hello, fragmented world"[..]);
//! ```

pub mod byte_order;
pub mod cipher;
pub mod collector;
pub mod config;
pub mod defragmenter;
pub mod error;
pub mod fragment;
pub mod identifier;
pub mod metrics;
pub mod net;
pub mod sender;
pub mod test_helpers;
pub mod warning;

pub use cipher::{Cipher, CipherError, Encryption, FnCipher, SharedSecretCipher};
pub use collector::{Collector, CollectorEntry, MissingMessage};
pub use config::{ConfigError, ReceiverConfig, SenderConfig};
pub use defragmenter::{DatagramHead, Defragmenter, MessageHead, ReceivedMessage};
pub use error::{Error, Result};
pub use fragment::{
    FragmentAccumulator,
    FragmentBatch,
    FragmentError,
    FragmentFrame,
    FragmentationError,
    Fragmenter,
};
pub use identifier::{
    ID_SIZE,
    IdentifierGenerator,
    MessageIdentifier,
    MessageKey,
    ParsedIdentifier,
};
pub use net::{UdpReceiver, UdpSender, UdpTransport};
pub use sender::{
    Completion,
    OutboundDatagram,
    Readiness,
    SendError,
    Sender,
    Transport,
    WriteOutcome,
};
pub use warning::{WARNING_BACKLOG, Warning, WarningSink};
