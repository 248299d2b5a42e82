//! Field widths and offsets of the identifier wire format.
//!
//! ```text
//! [ timestamp(6) | sequence(6) | nonce(6) | total(3) | index(3) ]
//! ```
//!
//! The layout carries no version byte. Peers must agree on these constants.

use crate::byte_order::max_for_width;

/// Milliseconds since the Unix epoch.
pub const TIMESTAMP_SIZE: usize = 6;
/// Per-generator monotonic counter.
pub const SEQUENCE_SIZE: usize = 6;
/// Random bytes drawn from the nonce pool.
pub const NONCE_SIZE: usize = 6;
/// Highest valid fragment index of the message.
pub const TOTAL_SIZE: usize = 3;
/// Zero-based position of this fragment.
pub const INDEX_SIZE: usize = 3;

pub const TIMESTAMP_OFFSET: usize = 0;
pub const SEQUENCE_OFFSET: usize = TIMESTAMP_OFFSET + TIMESTAMP_SIZE;
pub const NONCE_OFFSET: usize = SEQUENCE_OFFSET + SEQUENCE_SIZE;
pub const TOTAL_OFFSET: usize = NONCE_OFFSET + NONCE_SIZE;
pub const INDEX_OFFSET: usize = TOTAL_OFFSET + TOTAL_SIZE;

/// Bytes shared by every fragment of one message.
pub const SEED_SIZE: usize = TOTAL_OFFSET;
/// Full identifier width prepended to every fragment.
pub const ID_SIZE: usize = INDEX_OFFSET + INDEX_SIZE;

/// Largest value the `total` and `index` fields can hold.
pub const MAX_FRAGMENT_META: u64 = max_for_width(TOTAL_SIZE);
/// Largest sequence value before the counter wraps.
pub const MAX_SEQUENCE: u64 = max_for_width(SEQUENCE_SIZE);
/// Largest encodable timestamp.
pub const MAX_TIMESTAMP: u64 = max_for_width(TIMESTAMP_SIZE);

const _: () = assert!(ID_SIZE == 24);
const _: () = assert!(TOTAL_SIZE == INDEX_SIZE);
