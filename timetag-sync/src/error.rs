//! Synchronization error types.

use thiserror::Error;

/// Result type for matching and merging operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Synchronization error types.
#[derive(Error, Debug)]
pub enum Error {
    /// No clock anchor stood out during the signature scan.
    #[error("no clock match: forward distance {forward}, backward distance {backward}")]
    NoMatch { forward: u64, backward: u64 },

    /// A stream holds too few clock events for the signature scan.
    #[error("too few clock events to match: {first} and {second}, need more than {time_depth}")]
    InsufficientClocks {
        first: usize,
        second: usize,
        time_depth: usize,
    },

    /// The drift regression has no spread to fit against.
    #[error("degenerate drift fit: no clock spread past the anchor")]
    DegenerateFit,

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] timetag_core::Error),
}
