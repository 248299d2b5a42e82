//! Time-bounded store of in-flight message reassembly state.
//!
//! [`Collector`] keys a [`FragmentAccumulator`] per message seed. Fragment
//! insertion and the periodic sweep both mutate the store; `DashMap`'s
//! per-shard locks keep them mutually exclusive, and removal is idempotent so
//! a sweep racing a completion never double-reports a message.
//!
//! Sweeps are coarse: an incomplete message may linger for up to
//! `interval + expiration` before it is evicted.

use std::{
    ops::Deref,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use bytes::Bytes;
use dashmap::{DashMap, mapref::entry::Entry};
use log::debug;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use crate::{
    fragment::{FragmentAccumulator, FragmentError},
    identifier::{MessageKey, ParsedIdentifier},
    metrics,
    warning::{Warning, WarningSink},
};

/// Reassembly state for one in-flight message.
#[derive(Clone, Debug)]
pub struct CollectorEntry {
    accumulator: FragmentAccumulator,
    first_seen_at: Instant,
    sent_at_ms: u64,
    key: MessageKey,
    origin_bytes: usize,
}

impl CollectorEntry {
    /// Start tracking the message `parsed` belongs to.
    #[must_use]
    pub fn new(parsed: &ParsedIdentifier, first_seen_at: Instant) -> Self {
        Self {
            accumulator: FragmentAccumulator::new(parsed.fragment_count()),
            first_seen_at,
            sent_at_ms: parsed.timestamp,
            key: parsed.key,
            origin_bytes: 0,
        }
    }

    /// Fragments collected so far.
    #[must_use]
    pub fn accumulator(&self) -> &FragmentAccumulator { &self.accumulator }

    /// When the first fragment arrived.
    #[must_use]
    pub fn first_seen_at(&self) -> Instant { self.first_seen_at }

    /// Sender timestamp from the seed, in epoch milliseconds.
    #[must_use]
    pub fn sent_at_ms(&self) -> u64 { self.sent_at_ms }

    /// Message key.
    #[must_use]
    pub fn key(&self) -> MessageKey { self.key }

    /// Wire bytes received for this message.
    #[must_use]
    pub fn origin_bytes(&self) -> usize { self.origin_bytes }

    /// Consume the entry, returning the accumulator.
    #[must_use]
    pub fn into_accumulator(self) -> FragmentAccumulator { self.accumulator }

    fn insert(&mut self, index: usize, chunk: Bytes, wire_len: usize) -> Result<(), FragmentError> {
        let before = self.accumulator.received_count();
        if self.accumulator.set(index, Some(chunk))? > before {
            self.origin_bytes += wire_len;
        }
        Ok(())
    }

    fn is_expired(&self, now: Instant, expiration: Duration) -> bool {
        now.saturating_duration_since(self.first_seen_at) > expiration
    }
}

/// Report for a message evicted before completion.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MissingMessage {
    /// Key of the evicted message.
    pub key: MessageKey,
    /// Sender timestamp from the seed, in epoch milliseconds.
    pub sent_at_ms: u64,
}

impl From<MissingMessage> for Warning {
    fn from(missing: MissingMessage) -> Self {
        Warning::MissingMessage {
            key: missing.key,
            sent_at_ms: missing.sent_at_ms,
        }
    }
}

/// Concurrent store of [`CollectorEntry`] values keyed by [`MessageKey`].
#[derive(Debug, Default)]
pub struct Collector {
    entries: DashMap<MessageKey, CollectorEntry>,
    sweeper: Mutex<Option<CancellationToken>>,
}

impl Collector {
    /// Create an empty collector.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Borrow the entry for `key`.
    ///
    /// The returned guard holds a shard lock; drop it before mutating the
    /// collector.
    pub fn get(&self, key: &MessageKey) -> Option<impl Deref<Target = CollectorEntry> + '_> {
        self.entries.get(key)
    }

    /// Insert or replace the entry for `key`.
    pub fn put(&self, key: MessageKey, entry: CollectorEntry) { self.entries.insert(key, entry); }

    /// Remove the entry for `key`, reporting whether one existed.
    pub fn remove(&self, key: &MessageKey) -> bool { self.entries.remove(key).is_some() }

    /// Number of in-flight messages.
    #[must_use]
    pub fn len(&self) -> usize { self.entries.len() }

    /// Whether no message is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// Record one fragment and return the entry if it completed the message.
    ///
    /// Lookup, insertion, and removal of a completed entry happen under one
    /// shard lock. A fragment that cannot belong to its message is rejected
    /// without creating or altering state.
    ///
    /// # Errors
    ///
    /// Returns [`FragmentError::CapacityMismatch`] when `parsed.total`
    /// disagrees with the tracked message, or
    /// [`FragmentError::IndexOutOfRange`] when the index exceeds it.
    pub fn accept(
        &self,
        parsed: &ParsedIdentifier,
        chunk: Bytes,
        wire_len: usize,
        now: Instant,
    ) -> Result<Option<CollectorEntry>, FragmentError> {
        let index = parsed.index as usize;
        match self.entries.entry(parsed.key) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                let expected = entry.accumulator.capacity();
                if expected != parsed.fragment_count() {
                    return Err(FragmentError::CapacityMismatch {
                        expected,
                        found: parsed.fragment_count(),
                    });
                }
                entry.insert(index, chunk, wire_len)?;
                if entry.accumulator.is_complete() {
                    Ok(Some(occupied.remove()))
                } else {
                    Ok(None)
                }
            }
            Entry::Vacant(vacant) => {
                let mut entry = CollectorEntry::new(parsed, now);
                entry.insert(index, chunk, wire_len)?;
                if entry.accumulator.is_complete() {
                    Ok(Some(entry))
                } else {
                    vacant.insert(entry);
                    Ok(None)
                }
            }
        }
    }

    /// Evict every incomplete entry older than `expiration` at `now`.
    pub fn sweep_at(&self, now: Instant, expiration: Duration) -> Vec<MissingMessage> {
        let mut evicted = Vec::new();
        self.entries.retain(|key, entry| {
            let expired = !entry.accumulator.is_complete() && entry.is_expired(now, expiration);
            if expired {
                evicted.push(MissingMessage {
                    key: *key,
                    sent_at_ms: entry.sent_at_ms,
                });
            }
            !expired
        });
        if !evicted.is_empty() {
            debug!("collector evicted {} incomplete messages", evicted.len());
            metrics::inc_evicted(evicted.len() as u64);
        }
        evicted
    }

    /// Clear state and sweep every `interval`, evicting entries older than
    /// `expiration` and reporting each through `warnings`.
    ///
    /// Restarting replaces any running sweep. The sweep task holds only a
    /// weak reference and ends once the collector is dropped.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start_sweeping(
        self: &Arc<Self>,
        interval: Duration,
        expiration: Duration,
        warnings: WarningSink,
    ) {
        let token = CancellationToken::new();
        if let Some(previous) = self.sweeper_slot().replace(token.clone()) {
            previous.cancel();
        }
        self.entries.clear();

        let collector = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(collector) = collector.upgrade() else { break };
                        for missing in collector.sweep_at(Instant::now(), expiration) {
                            warnings.emit(missing.into());
                        }
                    }
                }
            }
        });
    }

    /// Cancel the sweep and discard all in-flight entries.
    pub fn stop_sweeping(&self) {
        if let Some(token) = self.sweeper_slot().take() {
            token.cancel();
        }
        self.entries.clear();
    }

    /// Whether a sweep task is running.
    #[must_use]
    pub fn is_sweeping(&self) -> bool { self.sweeper_slot().is_some() }

    fn sweeper_slot(&self) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
        self.sweeper.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        if let Some(token) = self.sweeper_slot().take() {
            token.cancel();
        }
    }
}
