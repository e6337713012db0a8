//! timetag-io: Memory-mapped file I/O for timetag.
//!
//! This crate reads the binary dump format written by the tagger
//! acquisition software, parses per-channel offset calibration files,
//! and writes the ASCII result files consumed downstream.

mod error;
mod offset;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use offset::{apply_offset_file, read_offsets};
pub use reader::{
    MappedFileReader, TagFileReader, CHANNEL_SIZE, HEADER_SIZE, RECORD_SIZE, TIMESTAMP_SIZE,
};
pub use writer::{
    write_coincidences, write_completion_sentinel, write_singles, write_stream_dump,
};
