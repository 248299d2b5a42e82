//! Outbound helper that splits payloads into identifier-tagged fragments.
//!
//! [`Fragmenter`] generates one fresh [`MessageIdentifier`] per payload,
//! slices the payload into chunks of at most `chunk_size` bytes, and prefixes
//! each chunk with the identifier stamped with `total` and the chunk's index.
//! Encryption and transport hand-off happen in [`crate::sender`].

use std::num::NonZeroUsize;

use bytes::{BufMut, Bytes, BytesMut};
use rand::{RngCore, rngs::OsRng};

use super::FragmentationError;
use crate::identifier::{
    Clock,
    ID_SIZE,
    IdentifierGenerator,
    MAX_FRAGMENT_META,
    MessageIdentifier,
    MessageKey,
    SystemClock,
};

/// Splits payloads into fragment datagrams.
#[derive(Debug)]
pub struct Fragmenter<R = OsRng, C = SystemClock> {
    chunk_size: NonZeroUsize,
    generator: IdentifierGenerator<R, C>,
}

impl Fragmenter {
    /// Create a fragmenter that caps fragment payloads at `chunk_size` bytes.
    #[must_use]
    pub fn new(chunk_size: NonZeroUsize) -> Self {
        Self::with_generator(chunk_size, IdentifierGenerator::new())
    }
}

impl<R: RngCore, C: Clock> Fragmenter<R, C> {
    /// Create a fragmenter drawing identifiers from `generator`.
    pub fn with_generator(chunk_size: NonZeroUsize, generator: IdentifierGenerator<R, C>) -> Self {
        Self {
            chunk_size,
            generator,
        }
    }

    /// Maximum payload bytes carried by one fragment.
    #[must_use]
    pub const fn chunk_size(&self) -> NonZeroUsize { self.chunk_size }

    /// Split `payload` into fragments under a freshly generated identifier.
    ///
    /// # Errors
    ///
    /// Returns [`FragmentationError::TooManyFragments`] when the payload needs
    /// more fragments than the identifier can index.
    pub fn fragment_bytes(
        &mut self,
        payload: impl AsRef<[u8]>,
    ) -> Result<FragmentBatch, FragmentationError> {
        let id = self.generator.generate();
        self.fragment_with_id(id, payload.as_ref())
    }

    /// Split `payload` into fragments tagged with `id`.
    ///
    /// An empty payload yields one fragment with an empty chunk.
    ///
    /// # Errors
    ///
    /// Returns [`FragmentationError::TooManyFragments`] when the payload needs
    /// more fragments than the identifier can index.
    pub fn fragment_with_id(
        &self,
        id: MessageIdentifier,
        payload: &[u8],
    ) -> Result<FragmentBatch, FragmentationError> {
        let max = self.chunk_size.get();
        let count = payload.len().div_ceil(max).max(1);
        let total = u64::try_from(count - 1).unwrap_or(u64::MAX);
        if total > MAX_FRAGMENT_META {
            return Err(FragmentationError::TooManyFragments {
                len: payload.len(),
                fragments: count,
            });
        }

        let mut fragments = Vec::with_capacity(count);
        let chunks = payload.chunks(max).chain(payload.is_empty().then_some(&[][..]));
        for (index, chunk) in (0_u64..).zip(chunks) {
            let mut stamped = id;
            stamped.set_fragment_meta(total, index)?;
            fragments.push(FragmentFrame::new(index, mark_fragment(&stamped, chunk)));
        }

        Ok(FragmentBatch {
            key: id.key(),
            total,
            fragments,
        })
    }
}

fn mark_fragment(id: &MessageIdentifier, chunk: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(ID_SIZE + chunk.len());
    buf.put_slice(id.as_bytes());
    buf.put_slice(chunk);
    buf.freeze()
}

/// One outbound fragment: identifier followed by its chunk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentFrame {
    index: u64,
    datagram: Bytes,
}

impl FragmentFrame {
    fn new(index: u64, datagram: Bytes) -> Self { Self { index, datagram } }

    /// Zero-based position of the fragment.
    #[must_use]
    pub fn index(&self) -> u64 { self.index }

    /// Encoded fragment bytes.
    #[must_use]
    pub fn datagram(&self) -> &Bytes { &self.datagram }

    /// Payload chunk without the identifier.
    #[must_use]
    pub fn chunk(&self) -> &[u8] { &self.datagram[ID_SIZE..] }

    /// Consume the frame, returning the encoded bytes.
    #[must_use]
    pub fn into_datagram(self) -> Bytes { self.datagram }
}

/// Fragments produced for a single payload, in ascending index order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FragmentBatch {
    key: MessageKey,
    total: u64,
    fragments: Vec<FragmentFrame>,
}

impl FragmentBatch {
    /// Key shared by all fragments.
    #[must_use]
    pub const fn key(&self) -> MessageKey { self.key }

    /// Highest fragment index.
    #[must_use]
    pub const fn total(&self) -> u64 { self.total }

    /// Borrow the fragments.
    #[must_use]
    pub fn fragments(&self) -> &[FragmentFrame] { self.fragments.as_slice() }

    /// Number of fragments in the batch.
    #[expect(
        clippy::len_without_is_empty,
        reason = "batches are guaranteed non-empty"
    )]
    #[must_use]
    pub fn len(&self) -> usize { self.fragments.len() }

    /// Whether the payload required more than one fragment.
    #[must_use]
    pub fn is_fragmented(&self) -> bool { self.len() > 1 }
}

impl IntoIterator for FragmentBatch {
    type Item = FragmentFrame;
    type IntoIter = std::vec::IntoIter<FragmentFrame>;

    fn into_iter(self) -> Self::IntoIter { self.fragments.into_iter() }
}
