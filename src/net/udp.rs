//! [`Transport`] over a Tokio [`UdpSocket`] plus matching send and receive
//! endpoints.

use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use bytes::Bytes;
use tokio::{
    net::UdpSocket,
    sync::{Notify, mpsc},
};
use tracing::{debug, trace, warn};

use crate::{
    config::{MAX_DATAGRAM_SIZE, ReceiverConfig, SenderConfig},
    defragmenter::{DatagramHead, Defragmenter, ReceivedMessage},
    error::Result,
    sender::{OutboundDatagram, Readiness, Sender, Transport},
    warning::Warning,
};

/// Port used by the demo binary when none is given.
pub const DEFAULT_PORT: u16 = 44_302;
/// Datagrams handed to the socket task before [`UdpTransport`] reports
/// saturation.
pub const DEFAULT_HIGH_WATER_MARK: usize = 64;

#[derive(Debug)]
struct Pressure {
    in_flight: AtomicUsize,
    saturated: AtomicBool,
    high_water: usize,
    ready: Notify,
}

impl Pressure {
    fn release(&self) {
        let remaining = self.in_flight.fetch_sub(1, Ordering::AcqRel) - 1;
        if remaining < self.high_water && self.saturated.swap(false, Ordering::AcqRel) {
            self.ready.notify_one();
        }
    }
}

/// Sends datagrams to one peer from a background task.
///
/// [`Transport::send`] never waits; it forwards the datagram to the task and
/// reports saturation once `high_water` datagrams are in flight. The task
/// signals [`UdpTransport::ready`] when the backlog falls back under the mark.
#[derive(Debug)]
pub struct UdpTransport {
    tx: mpsc::UnboundedSender<OutboundDatagram>,
    pressure: Arc<Pressure>,
}

impl UdpTransport {
    /// Start sending to `peer` through `socket`.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    #[must_use]
    pub fn spawn(socket: Arc<UdpSocket>, peer: SocketAddr, high_water: usize) -> Self {
        let pressure = Arc::new(Pressure {
            in_flight: AtomicUsize::new(0),
            saturated: AtomicBool::new(false),
            high_water: high_water.max(1),
            ready: Notify::new(),
        });
        let (tx, mut rx) = mpsc::unbounded_channel::<OutboundDatagram>();

        let task_pressure = Arc::clone(&pressure);
        tokio::spawn(async move {
            while let Some(datagram) = rx.recv().await {
                let result = socket.send_to(datagram.bytes(), peer).await;
                match &result {
                    Ok(sent) => trace!(%peer, bytes = sent, "datagram sent"),
                    Err(error) => warn!(%peer, %error, "datagram send failed"),
                }
                datagram.complete(result.map(|_| ()));
                task_pressure.release();
            }
            debug!(%peer, "udp send task finished");
        });

        Self { tx, pressure }
    }

    /// Wait until the transport drops back under its high-water mark.
    pub async fn ready(&self) { self.pressure.ready.notified().await; }

    /// Datagrams handed over but not yet sent.
    #[must_use]
    pub fn in_flight(&self) -> usize { self.pressure.in_flight.load(Ordering::Acquire) }
}

impl Transport for UdpTransport {
    fn send(&mut self, datagram: OutboundDatagram) -> bool {
        let in_flight = self.pressure.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        // Mark saturation before the task can see this datagram, so its
        // release always observes the flag and wakes the sender.
        let saturated = in_flight >= self.pressure.high_water;
        if saturated {
            self.pressure.saturated.store(true, Ordering::Release);
        }
        if let Err(mpsc::error::SendError(datagram)) = self.tx.send(datagram) {
            self.pressure.in_flight.fetch_sub(1, Ordering::AcqRel);
            self.pressure.saturated.store(false, Ordering::Release);
            datagram.complete(Err(io::Error::from(io::ErrorKind::NotConnected)));
            return true;
        }
        !saturated
    }
}

/// Fragmenting UDP client bound to one peer.
#[derive(Debug)]
pub struct UdpSender {
    sender: Sender<UdpTransport>,
    local_addr: SocketAddr,
    peer: SocketAddr,
}

impl UdpSender {
    /// Bind an ephemeral local port and send to `peer`.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails or `config` is invalid.
    pub async fn connect(peer: SocketAddr, config: SenderConfig) -> Result<Self> {
        let local: SocketAddr = if peer.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        Self::from_socket(socket, peer, config)
    }

    /// Send to `peer` through an already bound socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the local address is unavailable or `config` is
    /// invalid.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn from_socket(socket: UdpSocket, peer: SocketAddr, config: SenderConfig) -> Result<Self> {
        let local_addr = socket.local_addr()?;
        let transport = UdpTransport::spawn(Arc::new(socket), peer, DEFAULT_HIGH_WATER_MARK);
        let sender = Sender::new(transport, config)?;
        debug!(%local_addr, %peer, "udp sender ready");
        Ok(Self {
            sender,
            local_addr,
            peer,
        })
    }

    /// Send one payload, waiting out backpressure and every fragment send.
    ///
    /// # Errors
    ///
    /// Returns an error if the sender is closed, encryption or fragmentation
    /// fails, or the socket rejects a datagram.
    pub async fn send(&mut self, payload: impl AsRef<[u8]>) -> Result<()> {
        let outcome = self.sender.write(payload)?;
        let mut ready = outcome.ready;
        while !ready {
            self.sender.transport().ready().await;
            ready = self.sender.on_transport_ready() == Readiness::Drained;
        }
        outcome.completion.await?;
        trace!(peer = %self.peer, datagrams = outcome.datagrams, "message sent");
        Ok(())
    }

    /// Stop accepting payloads.
    pub fn close(&mut self) -> usize { self.sender.close() }

    /// Local socket address.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr { self.local_addr }

    /// Destination address.
    #[must_use]
    pub fn peer(&self) -> SocketAddr { self.peer }
}

/// Reassembling UDP listener.
pub struct UdpReceiver {
    socket: UdpSocket,
    defragmenter: Defragmenter,
    buf: Box<[u8]>,
}

impl UdpReceiver {
    /// Bind `addr` and start reassembling.
    ///
    /// # Errors
    ///
    /// Returns an error if binding fails or `config` is invalid.
    pub async fn bind(addr: SocketAddr, config: ReceiverConfig) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        Self::from_socket(socket, config)
    }

    /// Reassemble datagrams arriving on an already bound socket.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` is invalid.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn from_socket(socket: UdpSocket, config: ReceiverConfig) -> Result<Self> {
        let defragmenter = Defragmenter::new(config)?;
        defragmenter.start();
        Ok(Self {
            socket,
            defragmenter,
            buf: vec![0; MAX_DATAGRAM_SIZE].into_boxed_slice(),
        })
    }

    /// Take the receiving half of the warnings channel.
    pub fn warnings(&mut self) -> Option<mpsc::Receiver<Warning>> {
        self.defragmenter.warnings()
    }

    /// Local socket address.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket has no local address.
    pub fn local_addr(&self) -> io::Result<SocketAddr> { self.socket.local_addr() }

    /// Receive datagrams until one completes a message.
    ///
    /// # Errors
    ///
    /// Returns an error only when the socket fails; malformed datagrams are
    /// reported as warnings.
    pub async fn recv(&mut self) -> Result<ReceivedMessage> {
        loop {
            let (len, from) = self.socket.recv_from(&mut self.buf).await?;
            trace!(%from, bytes = len, "datagram received");
            let body = Bytes::copy_from_slice(&self.buf[..len]);
            let head = DatagramHead {
                size: Some(len),
                from: Some(from),
            };
            if let Some(message) = self.defragmenter.handle_datagram(body, head) {
                debug!(%from, size = message.head.size, "message reassembled");
                return Ok(message);
            }
        }
    }
}

impl std::fmt::Debug for UdpReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpReceiver")
            .field("socket", &self.socket)
            .field("defragmenter", &self.defragmenter)
            .finish_non_exhaustive()
    }
}

impl Drop for UdpReceiver {
    fn drop(&mut self) { self.defragmenter.stop(); }
}
