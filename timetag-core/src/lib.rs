//! timetag-core: Core event-stream types for time tagger data processing.
//!
//! This crate provides the `TagStream` event store for multi-channel
//! time-to-digital converter data, together with clock indexing,
//! per-channel calibration offsets, and n-fold coincidence extraction.

mod coincidence;
mod error;
mod stream;

pub use coincidence::{scan_coincidences, CoincidenceTally};
pub use error::{Error, Result};
pub use stream::{TagStream, BIN_SIZE, CHANNELS_PER_BOX, ONE_SEC_BINS};
