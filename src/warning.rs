//! Non-fatal diagnostics raised on the receive path.
//!
//! A corrupt, truncated, or never-completed message must not stop the
//! receiver, so per-datagram failures are absorbed and reported here instead
//! of being returned as errors. Every warning is logged and, when a listener
//! is attached, forwarded over a bounded channel. Warnings that find the
//! channel full are only logged.

use derive_more::Display;
use log::{debug, warn};
use tokio::sync::mpsc;

use crate::identifier::MessageKey;

/// Warnings buffered for a listener before further ones are dropped.
pub const WARNING_BACKLOG: usize = 1024;

/// Diagnostic describing a dropped datagram or evicted message.
#[derive(Clone, Debug, Display, PartialEq, Eq)]
pub enum Warning {
    /// A message did not complete before its expiration window.
    #[display("missing message {key} sent at {sent_at_ms}")]
    MissingMessage {
        /// Key of the evicted message.
        key: MessageKey,
        /// Sender timestamp from the message seed, in epoch milliseconds.
        sent_at_ms: u64,
    },
    /// The decryption capability rejected a datagram.
    #[display("decryption failed: {reason}")]
    DecryptionFailed {
        /// Error reported by the cipher.
        reason: String,
    },
    /// A datagram was too short to carry an identifier.
    #[display("datagram of {len} bytes cannot hold an identifier")]
    MalformedIdentifier {
        /// Length of the offending datagram.
        len: usize,
    },
    /// A fragment disagreed with the metadata of its message.
    #[display("invalid fragment {index}/{total} for message {key}")]
    InvalidFragment {
        /// Key of the message the fragment claimed.
        key: MessageKey,
        /// Index carried by the fragment.
        index: u32,
        /// Highest index carried by the fragment.
        total: u32,
    },
}

/// Fan-out point for [`Warning`]s.
#[derive(Clone, Debug, Default)]
pub struct WarningSink {
    tx: Option<mpsc::Sender<Warning>>,
}

impl WarningSink {
    /// Create a sink that only logs.
    #[must_use]
    pub fn log_only() -> Self { Self { tx: None } }

    /// Create a sink forwarding to a new channel holding at most
    /// [`WARNING_BACKLOG`] undelivered warnings.
    #[must_use]
    pub fn channel() -> (Self, mpsc::Receiver<Warning>) {
        let (tx, rx) = mpsc::channel(WARNING_BACKLOG);
        (Self { tx: Some(tx) }, rx)
    }

    /// Log `warning` and forward it to the listener, if still attached.
    ///
    /// Never blocks: a full or closed channel drops the forwarded copy.
    pub fn emit(&self, warning: Warning) {
        warn!("{warning}");
        let Some(tx) = &self.tx else {
            return;
        };
        if let Err(mpsc::error::TrySendError::Full(dropped)) = tx.try_send(warning) {
            debug!("warning backlog full; not forwarding: {dropped}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{WARNING_BACKLOG, Warning, WarningSink};

    #[test]
    fn full_backlog_drops_forwarded_copies() {
        let (sink, mut listener) = WarningSink::channel();
        for len in 0..WARNING_BACKLOG + 10 {
            sink.emit(Warning::MalformedIdentifier { len });
        }

        let mut forwarded = 0;
        while let Ok(warning) = listener.try_recv() {
            assert_eq!(warning, Warning::MalformedIdentifier { len: forwarded });
            forwarded += 1;
        }
        assert_eq!(forwarded, WARNING_BACKLOG);
    }

    #[test]
    fn display_names_the_cause() {
        let warning = Warning::DecryptionFailed {
            reason: "bad tag".into(),
        };
        assert_eq!(warning.to_string(), "decryption failed: bad tag");
    }
}
