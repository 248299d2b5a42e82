//! Fresh identifier generation.
//!
//! [`IdentifierGenerator`] owns the sequence counter and a pool of random
//! nonce bytes. The pool is refilled in one bulk call to the random source
//! when exhausted, so most identifiers cost no random-source call at all.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::{RngCore, rngs::OsRng};

use super::{
    MessageIdentifier,
    layout::{
        ID_SIZE,
        MAX_SEQUENCE,
        MAX_TIMESTAMP,
        NONCE_OFFSET,
        NONCE_SIZE,
        SEQUENCE_OFFSET,
        SEQUENCE_SIZE,
        TIMESTAMP_OFFSET,
        TIMESTAMP_SIZE,
    },
};
use crate::byte_order::write_network_uint;

/// Number of nonces buffered per refill.
pub const NONCE_POOL_CAPACITY: usize = 2048;

const POOL_BYTES: usize = NONCE_POOL_CAPACITY * NONCE_SIZE;

/// Source of the millisecond timestamp stamped into each seed.
pub trait Clock: Send {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

/// Wall clock backed by [`SystemTime`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| {
                u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
            })
    }
}

impl<F> Clock for F
where
    F: Fn() -> u64 + Send,
{
    fn now_millis(&self) -> u64 { self() }
}

/// Produces unique [`MessageIdentifier`] seeds.
pub struct IdentifierGenerator<R = OsRng, C = SystemClock> {
    rng: R,
    clock: C,
    sequence: u64,
    pool: Box<[u8]>,
    offset: usize,
}

impl IdentifierGenerator {
    /// Create a generator using the operating system's random source.
    #[must_use]
    pub fn new() -> Self { Self::with_parts(OsRng, SystemClock) }
}

impl Default for IdentifierGenerator {
    fn default() -> Self { Self::new() }
}

impl<R: RngCore, C: Clock> IdentifierGenerator<R, C> {
    /// Create a generator from an explicit random source and clock.
    pub fn with_parts(rng: R, clock: C) -> Self {
        Self {
            rng,
            clock,
            sequence: 0,
            pool: vec![0_u8; POOL_BYTES].into_boxed_slice(),
            // Start exhausted so the first call fills the pool.
            offset: POOL_BYTES,
        }
    }

    /// Last sequence value handed out.
    #[must_use]
    pub fn sequence(&self) -> u64 { self.sequence }

    /// Generate a fresh identifier with zeroed fragment metadata.
    pub fn generate(&mut self) -> MessageIdentifier {
        let mut bytes = [0_u8; ID_SIZE];

        let timestamp = self.clock.now_millis() & MAX_TIMESTAMP;
        write_network_uint(
            &mut bytes[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + TIMESTAMP_SIZE],
            timestamp,
        );

        self.sequence = self.next_sequence();
        write_network_uint(
            &mut bytes[SEQUENCE_OFFSET..SEQUENCE_OFFSET + SEQUENCE_SIZE],
            self.sequence,
        );

        bytes[NONCE_OFFSET..NONCE_OFFSET + NONCE_SIZE].copy_from_slice(self.take_nonce());

        MessageIdentifier::from_bytes(bytes)
    }

    fn next_sequence(&self) -> u64 {
        if self.sequence >= MAX_SEQUENCE {
            0
        } else {
            self.sequence + 1
        }
    }

    fn take_nonce(&mut self) -> &[u8] {
        if self.offset + NONCE_SIZE > self.pool.len() {
            self.rng.fill_bytes(&mut self.pool);
            self.offset = 0;
        }
        let start = self.offset;
        self.offset += NONCE_SIZE;
        &self.pool[start..start + NONCE_SIZE]
    }

    #[cfg(test)]
    pub(crate) fn set_sequence(&mut self, sequence: u64) { self.sequence = sequence; }
}

impl<R, C> std::fmt::Debug for IdentifierGenerator<R, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentifierGenerator")
            .field("sequence", &self.sequence)
            .field("pool_remaining", &((self.pool.len() - self.offset) / NONCE_SIZE))
            .finish_non_exhaustive()
    }
}
