//! Memory-mapped readers for tagger dump files.

use crate::{Error, Result};
use memmap2::Mmap;
use std::fs::File;
use std::path::Path;
use timetag_core::{TagStream, CHANNELS_PER_BOX};

/// Size of the opaque file header, skipped verbatim.
pub const HEADER_SIZE: usize = 40;

/// Size of the timestamp field of one record.
pub const TIMESTAMP_SIZE: usize = 8;

/// Size of the channel field of one record.
pub const CHANNEL_SIZE: usize = 2;

/// Size of one on-disk event record.
pub const RECORD_SIZE: usize = TIMESTAMP_SIZE + CHANNEL_SIZE;

/// A memory-mapped file reader.
///
/// Uses memmap2 to access file contents in one bulk transfer without
/// copying the whole file through a read loop.
pub struct MappedFileReader {
    mmap: Mmap,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { mmap })
    }

    /// Returns the file contents as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// Returns the file size in bytes.
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}

/// A tagger dump reader with memory-mapped I/O.
///
/// The dump format is a 40-byte opaque header followed by fixed 10-byte
/// little-endian records: a `u64` timestamp in TDC bins, then a `u16`
/// raw channel number. Trailing bytes past the last whole record are
/// ignored.
pub struct TagFileReader {
    reader: MappedFileReader,
}

impl TagFileReader {
    /// Opens a tagger dump for reading.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = MappedFileReader::open(path)?;
        Ok(Self { reader })
    }

    /// Returns the file size in bytes.
    pub fn file_size(&self) -> usize {
        self.reader.len()
    }

    /// Returns the number of whole event records in the file.
    ///
    /// A file that ends within its header, or exactly at one record's
    /// worth of payload, holds zero events. A payload shorter than one
    /// record is rejected as an ambiguous tail.
    pub fn record_count(&self) -> Result<usize> {
        let len = self.reader.len();
        if len > HEADER_SIZE + RECORD_SIZE {
            Ok((len - HEADER_SIZE) / RECORD_SIZE)
        } else if len > HEADER_SIZE && len < HEADER_SIZE + RECORD_SIZE {
            Err(Error::Format(format!(
                "file holds {} bytes past the header, less than one {}-byte record",
                len - HEADER_SIZE,
                RECORD_SIZE
            )))
        } else {
            Ok(0)
        }
    }

    /// Reads and demuxes all records into a [`TagStream`].
    ///
    /// The stream is created with the per-box channel count and zeroed
    /// calibration offsets.
    pub fn read_stream(&self, clock_channel: u16, box_number: u16) -> Result<TagStream> {
        let count = self.record_count()?;

        let mut timestamps: Vec<u64> = Vec::new();
        timestamps.try_reserve_exact(count)?;
        let mut channels: Vec<u16> = Vec::new();
        channels.try_reserve_exact(count)?;

        if count > 0 {
            let payload = &self.reader.as_bytes()[HEADER_SIZE..HEADER_SIZE + count * RECORD_SIZE];
            for record in payload.chunks_exact(RECORD_SIZE) {
                timestamps.push(u64::from_le_bytes(
                    record[..TIMESTAMP_SIZE].try_into().unwrap(),
                ));
                channels.push(u16::from_le_bytes(
                    record[TIMESTAMP_SIZE..].try_into().unwrap(),
                ));
            }
        }

        let stream = TagStream::from_parts(
            timestamps,
            channels,
            CHANNELS_PER_BOX,
            box_number,
            clock_channel,
        )?;
        Ok(stream)
    }
}
