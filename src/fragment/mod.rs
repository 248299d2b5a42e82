//! Fragment splitting and per-message accumulation.
//!
//! The outbound [`Fragmenter`] turns one payload into identifier-tagged
//! fragments; the inbound [`FragmentAccumulator`] collects the fragments of
//! one message by index and compiles them back into the original bytes.

pub mod accumulator;
pub mod error;
pub mod fragmenter;

pub use accumulator::FragmentAccumulator;
pub use error::{FragmentError, FragmentationError};
pub use fragmenter::{FragmentBatch, FragmentFrame, Fragmenter};
