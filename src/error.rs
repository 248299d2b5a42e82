//! Canonical error and result types for the crate.
//!
//! Module-level errors stay specific; [`Error`] gathers them for callers that
//! drive both paths, such as the UDP adapters and the binary.

use std::io;

use thiserror::Error;

use crate::{
    cipher::CipherError,
    config::ConfigError,
    fragment::FragmentationError,
    identifier::IdentifierError,
    sender::SendError,
};

/// Top-level error type exposed by `udpfrag`.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration rejected at construction time.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// Encryption setup or transform failed.
    #[error(transparent)]
    Cipher(#[from] CipherError),
    /// A write was refused.
    #[error(transparent)]
    Send(#[from] SendError),
    /// A payload could not be fragmented.
    #[error(transparent)]
    Fragmentation(#[from] FragmentationError),
    /// An identifier could not be stamped or parsed.
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
    /// The underlying socket failed.
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

/// Canonical result alias used by `udpfrag` public APIs.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use std::io;

    use super::Error;
    use crate::{config::ConfigError, sender::SendError};

    #[test]
    fn display_prefixes_configuration_errors() {
        let err = Error::from(ConfigError::ZeroSweepInterval);
        assert_eq!(
            err.to_string(),
            "invalid configuration: collector sweep interval must be non-zero"
        );
    }

    #[test]
    fn io_errors_keep_their_source() {
        let err = Error::from(io::Error::from(io::ErrorKind::BrokenPipe));
        assert!(matches!(err, Error::Io(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn send_errors_are_transparent() {
        assert_eq!(Error::from(SendError::Closed).to_string(), "sender is closed");
    }
}
