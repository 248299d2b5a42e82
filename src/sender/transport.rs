//! Outbound transport seam.

use std::io;

use bytes::Bytes;
use tokio::sync::oneshot;

/// Destination for encoded datagrams.
///
/// `send` must accept every datagram it is given, queueing internally if
/// needed. The return value tells the caller whether more datagrams may be
/// handed over immediately; after returning `false` the transport owner
/// calls [`Sender::on_transport_ready`](super::Sender::on_transport_ready)
/// once capacity frees up.
pub trait Transport {
    /// Hand `datagram` to the transport, returning whether it can take more.
    fn send(&mut self, datagram: OutboundDatagram) -> bool;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, datagram: OutboundDatagram) -> bool { (**self).send(datagram) }
}

/// One encoded datagram and the acknowledgement owed for it.
///
/// Dropping an `OutboundDatagram` without calling
/// [`complete`](Self::complete) fails the owning write with
/// [`io::ErrorKind::BrokenPipe`].
#[derive(Debug)]
pub struct OutboundDatagram {
    bytes: Bytes,
    ack: oneshot::Sender<io::Result<()>>,
}

impl OutboundDatagram {
    pub(crate) fn new(bytes: Bytes) -> (Self, oneshot::Receiver<io::Result<()>>) {
        let (ack, rx) = oneshot::channel();
        (Self { bytes, ack }, rx)
    }

    /// Encoded datagram bytes.
    #[must_use]
    pub fn bytes(&self) -> &Bytes { &self.bytes }

    /// Length of the encoded datagram.
    #[must_use]
    pub fn len(&self) -> usize { self.bytes.len() }

    /// Whether the datagram carries no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.bytes.is_empty() }

    /// Report the outcome of sending this datagram.
    pub fn complete(self, result: io::Result<()>) {
        // The writer may have dropped its completion future.
        let _ = self.ack.send(result);
    }
}
