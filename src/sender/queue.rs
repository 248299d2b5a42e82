//! FIFO of datagrams held back while the transport is saturated.

use std::collections::VecDeque;

use super::{OutboundDatagram, Transport};

#[derive(Debug, Default)]
pub(crate) struct PendingQueue {
    items: VecDeque<OutboundDatagram>,
}

impl PendingQueue {
    pub(crate) fn push_back(&mut self, datagram: OutboundDatagram) {
        self.items.push_back(datagram);
    }

    pub(crate) fn len(&self) -> usize { self.items.len() }

    pub(crate) fn is_empty(&self) -> bool { self.items.is_empty() }

    /// Hand queued datagrams to `transport` from the front until it reports
    /// saturation or the queue empties. Returns the transport's last hint.
    pub(crate) fn flush_into<T: Transport + ?Sized>(&mut self, transport: &mut T) -> (bool, usize) {
        let mut flushed = 0;
        while let Some(datagram) = self.items.pop_front() {
            flushed += 1;
            if !transport.send(datagram) {
                return (false, flushed);
            }
        }
        (true, flushed)
    }

    /// Drop every queued datagram, failing their writes.
    pub(crate) fn clear(&mut self) -> usize {
        let dropped = self.items.len();
        self.items.clear();
        dropped
    }
}
