//! Sender and receiver configuration.
//!
//! Both structs carry the documented defaults and are validated when a
//! [`Sender`](crate::sender::Sender) or
//! [`Defragmenter`](crate::defragmenter::Defragmenter) is constructed, so a
//! running instance never holds an unusable configuration.

use std::{num::NonZeroUsize, time::Duration};

use thiserror::Error;

use crate::{cipher::Encryption, identifier::ID_SIZE};

/// Default datagram budget in bytes.
pub const DEFAULT_PACKET_SIZE: usize = 1280;
/// Largest UDP payload over IPv4.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;
/// Default period between collector sweeps.
pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_millis(5_000);
/// Default lifetime of an incomplete message.
pub const DEFAULT_GC_EXPIRATION: Duration = Duration::from_millis(10_000);

/// Errors raised while validating configuration.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The packet budget cannot hold the identifier, cipher overhead, and one byte.
    #[error("packet size {packet_size} is below the minimum of {minimum} bytes")]
    PacketTooSmall { packet_size: usize, minimum: usize },
    /// The packet budget exceeds what one datagram can carry.
    #[error("packet size {packet_size} exceeds the maximum of {maximum} bytes")]
    PacketTooLarge { packet_size: usize, maximum: usize },
    /// The sweep interval must be positive.
    #[error("collector sweep interval must be non-zero")]
    ZeroSweepInterval,
}

/// Settings for the outbound path.
#[derive(Clone, Debug)]
pub struct SenderConfig {
    /// Split payloads into identifier-tagged fragments.
    pub fragmentation: bool,
    /// Maximum bytes per datagram, including identifier and cipher overhead.
    pub packet_size: usize,
    /// Transform applied to each datagram before sending.
    pub encryption: Encryption,
    /// Keep flushing queued fragments after [`Sender::close`](crate::sender::Sender::close).
    pub drain_on_close: bool,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            fragmentation: true,
            packet_size: DEFAULT_PACKET_SIZE,
            encryption: Encryption::None,
            drain_on_close: false,
        }
    }
}

impl SenderConfig {
    /// Enable or disable fragmentation.
    #[must_use]
    pub fn with_fragmentation(mut self, enabled: bool) -> Self {
        self.fragmentation = enabled;
        self
    }

    /// Set the per-datagram byte budget.
    #[must_use]
    pub fn with_packet_size(mut self, packet_size: usize) -> Self {
        self.packet_size = packet_size;
        self
    }

    /// Set the encryption capability.
    #[must_use]
    pub fn with_encryption(mut self, encryption: Encryption) -> Self {
        self.encryption = encryption;
        self
    }

    /// Keep draining queued fragments after close.
    #[must_use]
    pub fn with_drain_on_close(mut self, drain: bool) -> Self {
        self.drain_on_close = drain;
        self
    }

    /// Payload bytes available to each fragment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::PacketTooSmall`] when the budget cannot hold
    /// the identifier, the cipher overhead, and one payload byte, or
    /// [`ConfigError::PacketTooLarge`] above [`MAX_DATAGRAM_SIZE`].
    ///
    /// # Examples
    ///
    /// ```
    /// use udpfrag::config::SenderConfig;
    ///
    /// let config = SenderConfig::default().with_packet_size(300);
    /// assert_eq!(config.chunk_size().expect("valid").get(), 276);
    /// ```
    pub fn chunk_size(&self) -> Result<NonZeroUsize, ConfigError> {
        if self.packet_size > MAX_DATAGRAM_SIZE {
            return Err(ConfigError::PacketTooLarge {
                packet_size: self.packet_size,
                maximum: MAX_DATAGRAM_SIZE,
            });
        }
        let overhead = ID_SIZE + self.encryption.overhead();
        self.packet_size
            .checked_sub(overhead)
            .and_then(NonZeroUsize::new)
            .ok_or(ConfigError::PacketTooSmall {
                packet_size: self.packet_size,
                minimum: overhead + 1,
            })
    }
}

/// Settings for the inbound path.
#[derive(Clone, Debug)]
pub struct ReceiverConfig {
    /// Expect identifier-tagged fragments.
    pub fragmentation: bool,
    /// Transform applied to each datagram before parsing.
    pub decryption: Encryption,
    /// Period between collector sweeps.
    pub gc_interval: Duration,
    /// How long an incomplete message may wait for missing fragments.
    pub gc_expiration: Duration,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            fragmentation: true,
            decryption: Encryption::None,
            gc_interval: DEFAULT_GC_INTERVAL,
            gc_expiration: DEFAULT_GC_EXPIRATION,
        }
    }
}

impl ReceiverConfig {
    /// Enable or disable fragmentation.
    #[must_use]
    pub fn with_fragmentation(mut self, enabled: bool) -> Self {
        self.fragmentation = enabled;
        self
    }

    /// Set the decryption capability.
    #[must_use]
    pub fn with_decryption(mut self, decryption: Encryption) -> Self {
        self.decryption = decryption;
        self
    }

    /// Set the sweep period and expiration window.
    #[must_use]
    pub fn with_gc(mut self, interval: Duration, expiration: Duration) -> Self {
        self.gc_interval = interval;
        self.gc_expiration = expiration;
        self
    }

    /// Check the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroSweepInterval`] for a zero sweep period.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gc_interval.is_zero() {
            return Err(ConfigError::ZeroSweepInterval);
        }
        Ok(())
    }
}
