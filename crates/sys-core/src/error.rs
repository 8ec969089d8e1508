//! Ambient error type for fallible setup/configuration APIs.
//!
//! Per-cycle `tick()` methods never return a `Result`: hardware exceptions
//! and interrupts are modelled as register state, not host-language control
//! flow. `CoreError` is only for things that go wrong at configuration time
//! (bad ROM image, misconfigured DMA, duplicate lock registration).

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A ROM/RAM image did not match the expected size.
    SizeMismatch { expected: usize, actual: usize },
    /// An index (bank, core, slot) was out of the configured range.
    OutOfRange { what: &'static str, index: usize, limit: usize },
    /// A component was asked to start an operation while already busy.
    Busy(&'static str),
    /// A generic configuration failure with a free-form reason.
    Invalid(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::SizeMismatch { expected, actual } => {
                write!(f, "size mismatch: expected {expected}, got {actual}")
            }
            CoreError::OutOfRange { what, index, limit } => {
                write!(f, "{what} index {index} out of range (limit {limit})")
            }
            CoreError::Busy(what) => write!(f, "{what} is busy"),
            CoreError::Invalid(reason) => write!(f, "invalid configuration: {reason}"),
        }
    }
}

impl std::error::Error for CoreError {}
