//! Receive-path reassembly.
//!
//! [`Defragmenter`] turns raw datagrams into complete messages. Each datagram
//! is decrypted, parsed, and accumulated in a shared [`Collector`]; a message
//! becomes visible only once every fragment has arrived. Per-datagram failures
//! are reported through the [`WarningSink`] and never returned to the caller,
//! so one corrupt datagram cannot stall the stream.

use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::SystemTime,
};

use bytes::Bytes;
use log::debug;
use tokio::{sync::mpsc, time::Instant};

use crate::{
    cipher::Cipher,
    collector::{Collector, CollectorEntry},
    config::{ConfigError, ReceiverConfig},
    identifier::{ID_SIZE, MessageKey, parse},
    metrics::{self, Direction, DropReason},
    warning::{Warning, WarningSink},
};

/// Metadata supplied with an inbound datagram.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DatagramHead {
    /// Bytes received on the wire. Defaults to the body length.
    pub size: Option<usize>,
    /// Sender address, when known.
    pub from: Option<SocketAddr>,
}

impl DatagramHead {
    /// Head for a datagram received from `from`.
    #[must_use]
    pub fn from_peer(from: SocketAddr) -> Self {
        Self {
            size: None,
            from: Some(from),
        }
    }
}

/// Metadata attached to a reassembled message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageHead {
    /// Length of the reassembled payload.
    pub size: usize,
    /// Wire bytes of every fragment, measured before decryption.
    pub origin_size: usize,
    /// Message key; absent when fragmentation is disabled.
    pub id: Option<MessageKey>,
    /// Sender timestamp; absent when fragmentation is disabled.
    pub sent_at: Option<SystemTime>,
    /// Address of the datagram that completed the message.
    pub from: Option<SocketAddr>,
}

/// A complete inbound message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Reassembled payload.
    pub payload: Bytes,
    /// Reassembly metadata.
    pub head: MessageHead,
}

/// Reassembles fragment datagrams into messages.
pub struct Defragmenter {
    config: ReceiverConfig,
    cipher: Option<Arc<dyn Cipher>>,
    collector: Arc<Collector>,
    warnings: WarningSink,
    listener: Option<mpsc::Receiver<Warning>>,
    stopped: AtomicBool,
}

impl Defragmenter {
    /// Build a defragmenter from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroSweepInterval`] if the sweep period is zero.
    pub fn new(config: ReceiverConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let (warnings, listener) = WarningSink::channel();
        Ok(Self {
            cipher: config.decryption.cipher(),
            config,
            collector: Arc::new(Collector::new()),
            warnings,
            listener: Some(listener),
            stopped: AtomicBool::new(false),
        })
    }

    /// Take the receiving half of the warnings channel.
    ///
    /// Returns `None` after the first call.
    pub fn warnings(&mut self) -> Option<mpsc::Receiver<Warning>> { self.listener.take() }

    /// Shared reassembly store.
    #[must_use]
    pub fn collector(&self) -> &Arc<Collector> { &self.collector }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ReceiverConfig { &self.config }

    /// Begin evicting stale messages.
    ///
    /// Also resumes accepting fragments after [`stop`](Self::stop). Sweeping
    /// is a no-op when fragmentation is disabled, since nothing is ever
    /// stored.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start(&self) {
        self.stopped.store(false, Ordering::Release);
        if !self.config.fragmentation {
            return;
        }
        self.collector.start_sweeping(
            self.config.gc_interval,
            self.config.gc_expiration,
            self.warnings.clone(),
        );
    }

    /// Stop evicting and discard every in-flight message.
    ///
    /// Fragments arriving afterwards are dropped until the next
    /// [`start`](Self::start), so nothing accumulates without eviction.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.collector.stop_sweeping();
    }

    /// Whether [`stop`](Self::stop) was called since the last start.
    #[must_use]
    pub fn is_stopped(&self) -> bool { self.stopped.load(Ordering::Acquire) }

    /// Process one inbound datagram.
    ///
    /// Returns the reassembled message when `body` completes one. Returns
    /// `None` while fragments are outstanding and for any datagram that was
    /// dropped.
    pub fn handle_datagram(&self, body: Bytes, head: DatagramHead) -> Option<ReceivedMessage> {
        let wire_len = head.size.unwrap_or(body.len());
        metrics::inc_fragments(Direction::Inbound);

        let plain = match &self.cipher {
            Some(cipher) => match cipher.decrypt(&body) {
                Ok(plain) => Bytes::from(plain),
                Err(err) => {
                    metrics::inc_dropped(DropReason::Decryption);
                    self.warnings.emit(Warning::DecryptionFailed {
                        reason: err.to_string(),
                    });
                    return None;
                }
            },
            None => body,
        };

        if !self.config.fragmentation {
            metrics::inc_reassembled();
            return Some(ReceivedMessage {
                head: MessageHead {
                    size: plain.len(),
                    origin_size: wire_len,
                    id: None,
                    sent_at: None,
                    from: head.from,
                },
                payload: plain,
            });
        }

        self.reassemble(plain, wire_len, head.from)
    }

    fn reassemble(
        &self,
        plain: Bytes,
        wire_len: usize,
        from: Option<SocketAddr>,
    ) -> Option<ReceivedMessage> {
        if self.is_stopped() {
            debug!("receiver stopped; dropping {wire_len}-byte fragment");
            metrics::inc_dropped(DropReason::Stopped);
            return None;
        }
        let Some(Ok(parsed)) = plain.get(..ID_SIZE).map(parse) else {
            metrics::inc_dropped(DropReason::Malformed);
            self.warnings
                .emit(Warning::MalformedIdentifier { len: plain.len() });
            return None;
        };

        let chunk = plain.slice(ID_SIZE..);
        let entry = match self
            .collector
            .accept(&parsed, chunk, wire_len, Instant::now())
        {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(err) => {
                debug!("dropping fragment of {}: {err}", parsed.key);
                metrics::inc_dropped(DropReason::InvalidFragment);
                self.warnings.emit(Warning::InvalidFragment {
                    key: parsed.key,
                    index: parsed.index,
                    total: parsed.total,
                });
                return None;
            }
        };

        complete(entry, parsed.sent_at(), from)
    }
}

fn complete(
    entry: CollectorEntry,
    sent_at: SystemTime,
    from: Option<SocketAddr>,
) -> Option<ReceivedMessage> {
    let key = entry.key();
    let origin_size = entry.origin_bytes();
    let payload = match entry.into_accumulator().compile() {
        Ok(payload) => payload,
        Err(err) => {
            debug!("discarding message {key}: {err}");
            return None;
        }
    };
    metrics::inc_reassembled();
    Some(ReceivedMessage {
        head: MessageHead {
            size: payload.len(),
            origin_size,
            id: Some(key),
            sent_at: Some(sent_at),
            from,
        },
        payload,
    })
}

impl std::fmt::Debug for Defragmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Defragmenter")
            .field("config", &self.config)
            .field("in_flight", &self.collector.len())
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, UNIX_EPOCH};

    use bytes::Bytes;
    use rstest::{fixture, rstest};

    use super::{DatagramHead, Defragmenter};
    use crate::{
        cipher::{Cipher, Encryption, SharedSecretCipher},
        config::{ConfigError, ReceiverConfig},
        fragment::FragmentBatch,
        identifier::{ID_SIZE, MessageIdentifier},
        test_helpers::{TEST_CLOCK_MS, fragment},
        warning::{WARNING_BACKLOG, Warning},
    };

    fn split(payload: &[u8], chunk: usize) -> FragmentBatch { fragment(payload, chunk, 7) }

    #[fixture]
    fn defragmenter() -> Defragmenter {
        Defragmenter::new(ReceiverConfig::default()).expect("valid config")
    }

    #[rstest]
    fn reassembles_reverse_order(defragmenter: Defragmenter) {
        let batch = split(b"the quick brown fox", 4);
        let key = batch.key();
        let mut frames: Vec<_> = batch.into_iter().collect();
        let last = frames.remove(0);

        for frame in frames.into_iter().rev() {
            assert!(
                defragmenter
                    .handle_datagram(frame.into_datagram(), DatagramHead::default())
                    .is_none()
            );
        }
        let message = defragmenter
            .handle_datagram(last.into_datagram(), DatagramHead::default())
            .expect("message completes");

        assert_eq!(message.payload, &b"the quick brown fox"[..]);
        assert_eq!(message.head.size, 19);
        assert_eq!(message.head.origin_size, 19 + 5 * ID_SIZE);
        assert_eq!(message.head.id, Some(key));
        assert_eq!(
            message.head.sent_at,
            Some(UNIX_EPOCH + Duration::from_millis(TEST_CLOCK_MS))
        );
        assert!(defragmenter.collector().is_empty());
    }

    #[rstest]
    fn duplicate_fragments_do_not_change_output(defragmenter: Defragmenter) {
        let batch = split(b"abcdef", 3);
        let frames: Vec<_> = batch.into_iter().map(|f| f.into_datagram()).collect();

        assert!(defragmenter.handle_datagram(frames[0].clone(), DatagramHead::default()).is_none());
        assert!(defragmenter.handle_datagram(frames[0].clone(), DatagramHead::default()).is_none());
        let message = defragmenter
            .handle_datagram(frames[1].clone(), DatagramHead::default())
            .expect("message completes");

        assert_eq!(message.payload, &b"abcdef"[..]);
        assert_eq!(message.head.origin_size, 6 + 2 * ID_SIZE);
    }

    #[rstest]
    fn empty_payload_is_delivered(defragmenter: Defragmenter) {
        let frame = split(b"", 8).into_iter().next().expect("one fragment");
        let message = defragmenter
            .handle_datagram(frame.into_datagram(), DatagramHead::default())
            .expect("message completes");
        assert!(message.payload.is_empty());
        assert_eq!(message.head.size, 0);
    }

    #[rstest]
    fn short_datagram_is_reported_malformed(mut defragmenter: Defragmenter) {
        let mut warnings = defragmenter.warnings().expect("listener available");
        assert!(defragmenter.warnings().is_none());

        let out = defragmenter.handle_datagram(Bytes::from_static(&[1; 10]), DatagramHead::default());
        assert!(out.is_none());
        assert_eq!(
            warnings.try_recv().expect("warning emitted"),
            Warning::MalformedIdentifier { len: 10 }
        );
        assert!(defragmenter.collector().is_empty());
    }

    #[rstest]
    fn index_beyond_total_is_reported_invalid(mut defragmenter: Defragmenter) {
        let mut warnings = defragmenter.warnings().expect("listener available");
        let mut forged = *MessageIdentifier::from_bytes([9; ID_SIZE]).as_bytes();
        forged[18..].copy_from_slice(&[0, 0, 1, 0, 0, 4]);

        let out = defragmenter.handle_datagram(Bytes::copy_from_slice(&forged), DatagramHead::default());
        assert!(out.is_none());
        assert!(matches!(
            warnings.try_recv().expect("warning emitted"),
            Warning::InvalidFragment {
                index: 4,
                total: 1,
                ..
            }
        ));
    }

    #[rstest]
    fn junk_without_listener_keeps_bounded_backlog(mut defragmenter: Defragmenter) {
        for _ in 0..WARNING_BACKLOG * 20 {
            let out = defragmenter.handle_datagram(Bytes::from_static(&[0; 3]), DatagramHead::default());
            assert!(out.is_none());
        }

        let mut warnings = defragmenter.warnings().expect("listener available");
        let mut retained = 0;
        while warnings.try_recv().is_ok() {
            retained += 1;
        }
        assert_eq!(retained, WARNING_BACKLOG);
    }

    #[tokio::test]
    async fn stopped_receiver_drops_fragments_until_restarted() {
        let defragmenter = Defragmenter::new(ReceiverConfig::default()).expect("valid config");
        let frames: Vec<_> = split(b"after stop", 4).into_iter().map(|f| f.into_datagram()).collect();

        defragmenter.stop();
        assert!(defragmenter.is_stopped());
        for frame in &frames {
            assert!(defragmenter.handle_datagram(frame.clone(), DatagramHead::default()).is_none());
        }
        assert!(defragmenter.collector().is_empty());

        defragmenter.start();
        let delivered = frames
            .into_iter()
            .filter_map(|frame| defragmenter.handle_datagram(frame, DatagramHead::default()))
            .last()
            .expect("message completes after restart");
        assert_eq!(delivered.payload, &b"after stop"[..]);
        defragmenter.stop();
    }

    #[test]
    fn passthrough_when_fragmentation_disabled() {
        let defragmenter =
            Defragmenter::new(ReceiverConfig::default().with_fragmentation(false)).expect("config");
        let message = defragmenter
            .handle_datagram(Bytes::from_static(b"raw"), DatagramHead::default())
            .expect("delivered immediately");
        assert_eq!(message.payload, &b"raw"[..]);
        assert_eq!(message.head.id, None);
        assert_eq!(message.head.sent_at, None);
    }

    #[test]
    fn origin_size_counts_ciphertext_bytes() {
        let cipher = SharedSecretCipher::new([3; 32]);
        let encryption = Encryption::custom(cipher.clone());
        let defragmenter =
            Defragmenter::new(ReceiverConfig::default().with_decryption(encryption)).expect("config");

        let sealed: Vec<Bytes> = split(b"secret payload", 8)
            .into_iter()
            .map(|frame| Bytes::from(cipher.encrypt(frame.datagram()).expect("encrypt")))
            .collect();
        let wire: usize = sealed.iter().map(Bytes::len).sum();

        let mut delivered = None;
        for datagram in sealed {
            delivered = defragmenter.handle_datagram(datagram, DatagramHead::default());
        }
        let message = delivered.expect("message completes");
        assert_eq!(message.payload, &b"secret payload"[..]);
        assert_eq!(message.head.origin_size, wire);
    }

    #[test]
    fn zero_sweep_interval_fails_construction() {
        let config = ReceiverConfig::default().with_gc(Duration::ZERO, Duration::from_secs(1));
        assert!(matches!(
            Defragmenter::new(config),
            Err(ConfigError::ZeroSweepInterval)
        ));
    }
}
