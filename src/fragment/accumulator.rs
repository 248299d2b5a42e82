//! Per-message fragment storage.
//!
//! [`FragmentAccumulator`] holds one optional buffer per fragment index. The
//! first write to a slot wins, so retransmitted or duplicated datagrams never
//! change the received count or the reassembled bytes.

use bytes::{Bytes, BytesMut};

use super::FragmentError;

/// Indexed, fixed-capacity collection of fragment payloads.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use udpfrag::fragment::FragmentAccumulator;
///
/// let mut acc = FragmentAccumulator::new(2);
/// acc.set(1, Some(Bytes::from_static(b"world"))).expect("in range");
/// acc.set(0, Some(Bytes::from_static(b"hello "))).expect("in range");
/// assert!(acc.is_complete());
/// assert_eq!(acc.compile().expect("complete"), &b"hello world"[..]);
/// ```
#[derive(Clone, Debug)]
pub struct FragmentAccumulator {
    slots: Vec<Option<Bytes>>,
    received_count: usize,
    received_bytes: usize,
}

impl FragmentAccumulator {
    /// Allocate storage for `capacity` fragments.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            received_count: 0,
            received_bytes: 0,
        }
    }

    /// Number of fragments the message consists of.
    #[must_use]
    pub fn capacity(&self) -> usize { self.slots.len() }

    /// Unique fragments stored so far.
    #[must_use]
    pub fn received_count(&self) -> usize { self.received_count }

    /// Payload bytes stored so far.
    #[must_use]
    pub fn received_bytes(&self) -> usize { self.received_bytes }

    /// Whether every slot is filled.
    #[must_use]
    pub fn is_complete(&self) -> bool { self.received_count == self.slots.len() }

    /// Store `bytes` at `index` unless the slot is already occupied.
    ///
    /// Absent bytes and repeated indices are ignored. Returns the received
    /// count after the call.
    ///
    /// # Errors
    ///
    /// Returns [`FragmentError::IndexOutOfRange`] when `index >= capacity`.
    pub fn set(&mut self, index: usize, bytes: Option<Bytes>) -> Result<usize, FragmentError> {
        let capacity = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(FragmentError::IndexOutOfRange { index, capacity })?;
        let Some(bytes) = bytes else {
            return Ok(self.received_count);
        };
        if slot.is_none() {
            self.received_bytes += bytes.len();
            self.received_count += 1;
            *slot = Some(bytes);
        }
        Ok(self.received_count)
    }

    /// Concatenate all fragments in index order.
    ///
    /// A single-fragment message returns its buffer without copying.
    ///
    /// # Errors
    ///
    /// Returns [`FragmentError::Incomplete`] if any slot is still empty.
    pub fn compile(self) -> Result<Bytes, FragmentError> {
        if !self.is_complete() {
            return Err(FragmentError::Incomplete {
                received: self.received_count,
                capacity: self.slots.len(),
            });
        }
        let mut slots = self.slots.into_iter().flatten();
        if self.received_count == 1 {
            return Ok(slots.next().unwrap_or_default());
        }
        let mut buf = BytesMut::with_capacity(self.received_bytes);
        for fragment in slots {
            buf.extend_from_slice(&fragment);
        }
        Ok(buf.freeze())
    }
}
