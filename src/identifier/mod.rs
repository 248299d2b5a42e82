//! Binary message identifiers that correlate the fragments of one message.
//!
//! Every fragment starts with a fixed-width [`MessageIdentifier`]. Its leading
//! seed (timestamp, sequence counter, random nonce) is byte-identical across
//! all fragments of a logical message and doubles as the reassembly key; the
//! trailing fragment metadata carries the highest valid index and this
//! fragment's position.

pub mod generator;
pub mod id;
pub mod layout;

pub use generator::{Clock, IdentifierGenerator, SystemClock};
pub use id::{IdentifierError, MessageIdentifier, MessageKey, ParsedIdentifier, parse};
pub use layout::{ID_SIZE, MAX_FRAGMENT_META, SEED_SIZE};
