//! Error types emitted by the fragmentation layer.
//!
//! These enums keep both the outbound splitter and the inbound accumulator
//! decoupled from transport concerns while still surfacing precise
//! diagnostics for tests and warnings.

use thiserror::Error;

use crate::identifier::{IdentifierError, MAX_FRAGMENT_META};

/// Errors produced by a [`FragmentAccumulator`](crate::fragment::FragmentAccumulator).
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FragmentError {
    /// The fragment index does not fit the accumulator.
    #[error("fragment index {index} out of range for {capacity} fragments")]
    IndexOutOfRange { index: usize, capacity: usize },
    /// The fragment declares a different fragment count than its message.
    #[error("fragment declares {found} fragments but the message has {expected}")]
    CapacityMismatch { expected: usize, found: usize },
    /// Compilation was requested before every fragment arrived.
    #[error("message incomplete: {received} of {capacity} fragments received")]
    Incomplete { received: usize, capacity: usize },
}

/// Errors produced while fragmenting outbound payloads.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum FragmentationError {
    /// The payload needs more fragments than the identifier can index.
    #[error(
        "payload of {len} bytes needs {fragments} fragments; at most {} are addressable",
        MAX_FRAGMENT_META + 1
    )]
    TooManyFragments { len: usize, fragments: usize },
    /// Stamping fragment metadata failed.
    #[error("failed to stamp identifier: {0}")]
    Identifier(#[from] IdentifierError),
}
