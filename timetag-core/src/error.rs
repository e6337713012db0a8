//! Error types for timetag-core.

use thiserror::Error;

/// Result type alias for timetag operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for timetag operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A clock event was requested past the end of the stream.
    #[error("clock event {wanted} not found: stream holds {available} clock events")]
    ClockNotFound { wanted: u64, available: u64 },

    /// A raw channel index does not fit the stream's channel count.
    #[error("channel {channel} out of range for {num_channels} channels")]
    ChannelOutOfRange { channel: u16, num_channels: u16 },

    /// The offset table does not cover every channel.
    #[error("expected {expected} channel offsets, got {actual}")]
    OffsetCount { expected: usize, actual: usize },

    /// Timestamp and channel arrays disagree in length.
    #[error("timestamp and channel arrays differ in length: {timestamps} vs {channels}")]
    LengthMismatch { timestamps: usize, channels: usize },
}
