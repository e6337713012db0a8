//! Per-channel calibration offset files.
//!
//! An offset file lists one signed decimal integer per channel, separated
//! by whitespace. Surplus values are ignored; a shortfall is an error.

use crate::{Error, Result};
use std::path::Path;
use timetag_core::TagStream;

/// Reads `num_channels` signed offsets (in bins) from an ASCII file.
pub fn read_offsets<P: AsRef<Path>>(path: P, num_channels: u16) -> Result<Vec<i16>> {
    let text = std::fs::read_to_string(path)?;

    let mut offsets = Vec::with_capacity(num_channels as usize);
    for token in text.split_whitespace().take(num_channels as usize) {
        let value = token.parse::<i16>().map_err(|err| {
            Error::Format(format!("bad offset value {:?}: {}", token, err))
        })?;
        offsets.push(value);
    }

    if offsets.len() < num_channels as usize {
        return Err(Error::Format(format!(
            "offset file lists {} values, expected {}",
            offsets.len(),
            num_channels
        )));
    }

    Ok(offsets)
}

/// Reads an offset file and applies it to `stream` in one step.
pub fn apply_offset_file<P: AsRef<Path>>(stream: &mut TagStream, path: P) -> Result<()> {
    let offsets = read_offsets(path, stream.num_channels())?;
    stream.apply_offsets(&offsets)?;
    Ok(())
}
