//! Send path: fragmentation, encryption, and backpressure.
//!
//! [`Sender`] splits each payload with a [`Fragmenter`], encrypts every
//! fragment, and hands the results to a [`Transport`]. When the transport
//! reports saturation, remaining fragments wait in a FIFO and are flushed on
//! [`Sender::on_transport_ready`]. Later writes queue behind earlier ones, so
//! fragments leave in index order and messages leave in write order.
//!
//! All state changes go through `&mut self`, which rules out a second flush
//! running while one is in progress.

mod queue;
mod transport;


use std::{
    fmt,
    future::Future,
    io,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use bytes::Bytes;
use futures::{
    FutureExt,
    TryFutureExt,
    TryStreamExt,
    future::BoxFuture,
    stream::FuturesUnordered,
};
use log::debug;
use rand::{RngCore, rngs::OsRng};
use thiserror::Error;
use tokio::sync::oneshot;
pub use transport::{OutboundDatagram, Transport};

use self::queue::PendingQueue;
use crate::{
    cipher::{Cipher, CipherError},
    config::{ConfigError, SenderConfig},
    fragment::{FragmentationError, Fragmenter},
    identifier::{Clock, IdentifierGenerator, MessageKey, SystemClock},
    metrics::{self, Direction},
};

/// Errors returned synchronously by [`Sender::write`].
#[derive(Debug, Error)]
pub enum SendError {
    /// The sender was closed.
    #[error("sender is closed")]
    Closed,
    /// Encrypting a fragment failed.
    #[error(transparent)]
    Encrypt(#[from] CipherError),
    /// The payload could not be fragmented.
    #[error(transparent)]
    Fragmentation(#[from] FragmentationError),
}

/// Result of a successful [`Sender::write`].
#[derive(Debug)]
#[must_use = "the completion reports transport failures"]
pub struct WriteOutcome {
    /// Whether the caller may write again without waiting for a drain.
    pub ready: bool,
    /// Message key, when fragmentation is enabled.
    pub key: Option<MessageKey>,
    /// Number of datagrams produced by the write.
    pub datagrams: usize,
    /// Resolves once every datagram is sent, or at the first failure.
    pub completion: Completion,
}

/// Joined outcome of every datagram produced by one write.
#[must_use = "futures do nothing unless polled"]
pub struct Completion {
    inner: BoxFuture<'static, io::Result<()>>,
}

impl Completion {
    fn join(acks: Vec<oneshot::Receiver<io::Result<()>>>) -> Self {
        let acks: FuturesUnordered<_> = acks
            .into_iter()
            .map(|ack| ack.unwrap_or_else(|_| Err(io::Error::from(io::ErrorKind::BrokenPipe))))
            .collect();
        Self {
            inner: acks.try_collect::<()>().boxed(),
        }
    }
}

impl Future for Completion {
    type Output = io::Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.inner.poll_unpin(cx)
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion").finish_non_exhaustive()
    }
}

/// Readiness reported after the transport signals spare capacity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    /// The queue is empty; callers may resume writing.
    Drained,
    /// Fragments are still queued behind a saturated transport.
    Pending,
}

/// Fragmenting, encrypting writer over a [`Transport`].
pub struct Sender<T, R = OsRng, C = SystemClock> {
    transport: T,
    fragmenter: Option<Fragmenter<R, C>>,
    cipher: Option<Arc<dyn Cipher>>,
    queue: PendingQueue,
    transport_ready: bool,
    closed: bool,
    drain_on_close: bool,
}

impl<T: Transport> Sender<T> {
    /// Build a sender writing to `transport`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the packet size cannot carry the
    /// identifier, the cipher overhead, and one payload byte.
    pub fn new(transport: T, config: SenderConfig) -> Result<Self, ConfigError> {
        Self::with_generator(transport, config, IdentifierGenerator::new())
    }
}

impl<T: Transport, R: RngCore, C: Clock> Sender<T, R, C> {
    /// Build a sender drawing identifiers from `generator`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the packet size cannot carry the
    /// identifier, the cipher overhead, and one payload byte.
    pub fn with_generator(
        transport: T,
        config: SenderConfig,
        generator: IdentifierGenerator<R, C>,
    ) -> Result<Self, ConfigError> {
        let chunk_size = config.chunk_size()?;
        let fragmenter = config
            .fragmentation
            .then(|| Fragmenter::with_generator(chunk_size, generator));
        Ok(Self {
            transport,
            fragmenter,
            cipher: config.encryption.cipher(),
            queue: PendingQueue::default(),
            transport_ready: true,
            closed: false,
            drain_on_close: config.drain_on_close,
        })
    }

    /// Write one payload.
    ///
    /// Never waits: datagrams the transport cannot take yet are queued.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Closed`] after [`close`](Self::close), or an
    /// encryption or fragmentation error. Nothing is sent when an error is
    /// returned.
    pub fn write(&mut self, payload: impl AsRef<[u8]>) -> Result<WriteOutcome, SendError> {
        if self.closed {
            return Err(SendError::Closed);
        }
        let payload = payload.as_ref();
        let (key, encoded) = match self.fragmenter.as_mut() {
            Some(fragmenter) => {
                let batch = fragmenter.fragment_bytes(payload)?;
                let key = batch.key();
                let frames = batch.into_iter().map(|frame| frame.into_datagram());
                (Some(key), frames.collect::<Vec<_>>())
            }
            None => (None, vec![Bytes::copy_from_slice(payload)]),
        };
        let encoded = self.encrypt_all(encoded)?;

        let datagrams = encoded.len();
        let mut acks = Vec::with_capacity(datagrams);
        for bytes in encoded {
            let (datagram, ack) = OutboundDatagram::new(bytes);
            acks.push(ack);
            self.dispatch(datagram);
        }

        if !self.queue.is_empty() {
            debug!("transport saturated; {} datagrams queued", self.queue.len());
        }
        Ok(WriteOutcome {
            ready: self.is_ready(),
            key,
            datagrams,
            completion: Completion::join(acks),
        })
    }

    /// Flush queued datagrams after the transport frees capacity.
    ///
    /// Returns [`Readiness::Drained`] only once the queue is empty.
    pub fn on_transport_ready(&mut self) -> Readiness {
        self.transport_ready = true;
        if self.queue.is_empty() {
            return Readiness::Drained;
        }
        let (ready, flushed) = self.queue.flush_into(&mut self.transport);
        self.transport_ready = ready;
        for _ in 0..flushed {
            metrics::inc_fragments(Direction::Outbound);
        }
        debug!("flushed {flushed} queued datagrams; {} remain", self.queue.len());
        if self.queue.is_empty() {
            Readiness::Drained
        } else {
            Readiness::Pending
        }
    }

    /// Stop accepting writes.
    ///
    /// Queued datagrams are dropped, failing their writes with
    /// [`io::ErrorKind::BrokenPipe`], unless the sender was configured to
    /// drain on close. Returns the number of datagrams dropped.
    pub fn close(&mut self) -> usize {
        self.closed = true;
        if self.drain_on_close {
            return 0;
        }
        let dropped = self.queue.clear();
        if dropped > 0 {
            debug!("sender closed; dropped {dropped} queued datagrams");
        }
        dropped
    }

    /// Whether a new write would reach the transport without queueing.
    #[must_use]
    pub fn is_ready(&self) -> bool { !self.closed && self.transport_ready && self.queue.is_empty() }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool { self.closed }

    /// Datagrams waiting for transport capacity.
    #[must_use]
    pub fn pending(&self) -> usize { self.queue.len() }

    /// Borrow the transport.
    pub fn transport(&self) -> &T { &self.transport }

    /// Mutably borrow the transport.
    pub fn transport_mut(&mut self) -> &mut T { &mut self.transport }

    fn encrypt_all(&self, datagrams: Vec<Bytes>) -> Result<Vec<Bytes>, CipherError> {
        let Some(cipher) = &self.cipher else {
            return Ok(datagrams);
        };
        datagrams
            .iter()
            .map(|plain| cipher.encrypt(plain).map(Bytes::from))
            .collect()
    }

    fn dispatch(&mut self, datagram: OutboundDatagram) {
        if self.transport_ready && self.queue.is_empty() {
            metrics::inc_fragments(Direction::Outbound);
            self.transport_ready = self.transport.send(datagram);
        } else {
            self.queue.push_back(datagram);
        }
    }
}

impl<T, R, C> fmt::Debug for Sender<T, R, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("fragmentation", &self.fragmenter.is_some())
            .field("pending", &self.queue.len())
            .field("transport_ready", &self.transport_ready)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}
