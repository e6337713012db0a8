//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid file format.
    #[error("invalid file format: {0}")]
    Format(String),

    /// Buffer reservation failed.
    #[error("allocation failed: {0}")]
    Alloc(#[from] std::collections::TryReserveError),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] timetag_core::Error),
}
