#![cfg(any(test, feature = "test-helpers"))]
//! Test-only helpers shared by unit and integration tests.

use std::{io, num::NonZeroUsize};

use bytes::Bytes;
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    fragment::{FragmentBatch, Fragmenter},
    identifier::IdentifierGenerator,
    sender::{OutboundDatagram, Transport},
};

/// Fixed sender clock used by [`seeded_generator`], in epoch milliseconds.
pub const TEST_CLOCK_MS: u64 = 1_700_000_000_000;

/// Deterministic identifier generator for reproducible fragments.
#[must_use]
pub fn seeded_generator(seed: u64) -> IdentifierGenerator<StdRng, fn() -> u64> {
    IdentifierGenerator::with_parts(StdRng::seed_from_u64(seed), (|| TEST_CLOCK_MS) as fn() -> u64)
}

/// Split `payload` into fragments of at most `chunk` bytes.
///
/// # Panics
///
/// Panics if `chunk` is zero or the payload needs too many fragments.
#[must_use]
pub fn fragment(payload: &[u8], chunk: usize, seed: u64) -> FragmentBatch {
    let chunk = NonZeroUsize::new(chunk).expect("chunk size must be non-zero");
    Fragmenter::with_generator(chunk, seeded_generator(seed))
        .fragment_bytes(payload)
        .expect("payload fits the fragment limit")
}

/// In-memory [`Transport`] with a scripted capacity.
///
/// Every datagram is recorded. The transport reports saturation once its
/// remaining capacity reaches zero; [`grant`](Self::grant) adds more. Acks
/// are sent immediately unless the transport was built with
/// [`manual`](Self::manual).
#[derive(Debug)]
pub struct ScriptedTransport {
    capacity: usize,
    auto_complete: bool,
    log: Vec<Bytes>,
    held: Vec<OutboundDatagram>,
}

impl Default for ScriptedTransport {
    fn default() -> Self { Self::unbounded() }
}

impl ScriptedTransport {
    /// Transport that never saturates.
    #[must_use]
    pub fn unbounded() -> Self { Self::with_capacity(usize::MAX) }

    /// Transport that saturates after `capacity` sends.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            auto_complete: true,
            log: Vec::new(),
            held: Vec::new(),
        }
    }

    /// Hold datagrams until the test completes them.
    #[must_use]
    pub fn manual(mut self) -> Self {
        self.auto_complete = false;
        self
    }

    /// Allow `sends` more datagrams before saturating again.
    pub fn grant(&mut self, sends: usize) { self.capacity = self.capacity.saturating_add(sends); }

    /// Every datagram sent so far, in order.
    #[must_use]
    pub fn sent(&self) -> &[Bytes] { &self.log }

    /// Take the datagrams awaiting manual completion.
    pub fn take_held(&mut self) -> Vec<OutboundDatagram> { std::mem::take(&mut self.held) }

    /// Complete every held datagram with `Ok`.
    pub fn complete_all(&mut self) {
        for datagram in self.take_held() {
            datagram.complete(Ok(()));
        }
    }

    /// Complete every held datagram with an error of `kind`.
    pub fn fail_all(&mut self, kind: io::ErrorKind) {
        for datagram in self.take_held() {
            datagram.complete(Err(io::Error::from(kind)));
        }
    }
}

impl Transport for ScriptedTransport {
    fn send(&mut self, datagram: OutboundDatagram) -> bool {
        self.capacity = self.capacity.saturating_sub(1);
        self.log.push(datagram.bytes().clone());
        if self.auto_complete {
            datagram.complete(Ok(()));
        } else {
            self.held.push(datagram);
        }
        self.capacity > 0
    }
}
