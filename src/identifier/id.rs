use std::{
    fmt,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use derive_more::From;
use thiserror::Error;

use super::layout::{
    ID_SIZE,
    INDEX_OFFSET,
    INDEX_SIZE,
    MAX_FRAGMENT_META,
    SEED_SIZE,
    TIMESTAMP_OFFSET,
    TIMESTAMP_SIZE,
    TOTAL_OFFSET,
    TOTAL_SIZE,
};
use crate::byte_order::{read_network_uint, write_network_uint};

/// Errors raised while stamping or parsing identifiers.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum IdentifierError {
    /// The input does not have the fixed identifier width.
    #[error("identifier must be {ID_SIZE} bytes, got {len}")]
    Malformed { len: usize },
    /// `total` or `index` does not fit the fragment metadata fields.
    #[error("fragment metadata total={total} index={index} exceeds {MAX_FRAGMENT_META}")]
    MetaOverflow { total: u64, index: u64 },
    /// `index` points past the declared highest index.
    #[error("fragment index {index} is beyond total {total}")]
    IndexBeyondTotal { total: u64, index: u64 },
}

/// Seed bytes identifying one logical message.
///
/// Used as the reassembly key; rendered as lowercase hex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, From)]
pub struct MessageKey([u8; SEED_SIZE]);

impl MessageKey {
    /// Wrap raw seed bytes.
    #[must_use]
    pub const fn new(seed: [u8; SEED_SIZE]) -> Self { Self(seed) }

    /// Borrow the raw seed bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SEED_SIZE] { &self.0 }

    /// Milliseconds since the epoch embedded in the seed.
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        read_network_uint(&self.0[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + TIMESTAMP_SIZE])
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&hex::encode(self.0)) }
}

/// Fixed-width identifier prepended to every fragment.
///
/// # Examples
///
/// ```
/// use udpfrag::identifier::{ID_SIZE, MessageIdentifier, parse};
///
/// let mut id = MessageIdentifier::from_bytes([7; ID_SIZE]);
/// id.set_fragment_meta(2, 1).expect("meta fits");
/// let parsed = parse(id.as_bytes()).expect("valid identifier");
/// assert_eq!((parsed.total, parsed.index), (2, 1));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageIdentifier([u8; ID_SIZE]);

impl MessageIdentifier {
    /// Wrap raw identifier bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; ID_SIZE]) -> Self { Self(bytes) }

    /// Borrow the encoded identifier.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ID_SIZE] { &self.0 }

    /// Return the message key shared by all fragments.
    #[must_use]
    pub fn key(&self) -> MessageKey {
        let mut seed = [0_u8; SEED_SIZE];
        seed.copy_from_slice(&self.0[..SEED_SIZE]);
        MessageKey(seed)
    }

    /// Write `total` and `index` into the fragment metadata region.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError::MetaOverflow`] when either value exceeds
    /// [`MAX_FRAGMENT_META`], or [`IdentifierError::IndexBeyondTotal`] when
    /// `index > total`.
    pub fn set_fragment_meta(&mut self, total: u64, index: u64) -> Result<(), IdentifierError> {
        if total > MAX_FRAGMENT_META || index > MAX_FRAGMENT_META {
            return Err(IdentifierError::MetaOverflow { total, index });
        }
        if index > total {
            return Err(IdentifierError::IndexBeyondTotal { total, index });
        }
        write_network_uint(&mut self.0[TOTAL_OFFSET..TOTAL_OFFSET + TOTAL_SIZE], total);
        write_network_uint(&mut self.0[INDEX_OFFSET..INDEX_OFFSET + INDEX_SIZE], index);
        Ok(())
    }
}

/// Decoded view of an identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParsedIdentifier {
    /// Sender clock in milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Seed shared by every fragment of the message.
    pub key: MessageKey,
    /// Highest valid fragment index.
    pub total: u32,
    /// Position of this fragment.
    pub index: u32,
}

impl ParsedIdentifier {
    /// Number of fragments the message consists of.
    #[must_use]
    pub fn fragment_count(&self) -> usize { self.total as usize + 1 }

    /// Sender timestamp as wall-clock time.
    #[must_use]
    pub fn sent_at(&self) -> SystemTime { UNIX_EPOCH + Duration::from_millis(self.timestamp) }
}

/// Parse an identifier from exactly [`ID_SIZE`] bytes.
///
/// # Errors
///
/// Returns [`IdentifierError::Malformed`] when `bytes` has any other length.
pub fn parse(bytes: &[u8]) -> Result<ParsedIdentifier, IdentifierError> {
    if bytes.len() != ID_SIZE {
        return Err(IdentifierError::Malformed { len: bytes.len() });
    }
    let mut seed = [0_u8; SEED_SIZE];
    seed.copy_from_slice(&bytes[..SEED_SIZE]);
    let key = MessageKey(seed);

    #[expect(
        clippy::cast_possible_truncation,
        reason = "fragment metadata fields are three bytes wide"
    )]
    let (total, index) = (
        read_network_uint(&bytes[TOTAL_OFFSET..TOTAL_OFFSET + TOTAL_SIZE]) as u32,
        read_network_uint(&bytes[INDEX_OFFSET..INDEX_OFFSET + INDEX_SIZE]) as u32,
    );

    Ok(ParsedIdentifier {
        timestamp: key.timestamp(),
        key,
        total,
        index,
    })
}
