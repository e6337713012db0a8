//! ASCII writers for scan results and stream dumps.

use crate::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use timetag_core::{CoincidenceTally, TagStream};

/// Writes per-channel singles counts, one `"<channel>\t<count>"` line per
/// channel with a nonzero count, in ascending channel order. Channels are
/// printed 1-based.
pub fn write_singles<P: AsRef<Path>>(path: P, tally: &CoincidenceTally) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for (channel, &count) in tally.singles.iter().enumerate() {
        if count != 0 {
            writeln!(writer, "{}\t{}", channel + 1, count)?;
        }
    }
    writer.flush()?;
    Ok(())
}

/// Writes coincidence counts, one `"<key>\t<count>"` line per tuple, in
/// ascending key order.
pub fn write_coincidences<P: AsRef<Path>>(path: P, tally: &CoincidenceTally) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for (key, count) in &tally.coincidences {
        writeln!(writer, "{}\t{}", key, count)?;
    }
    writer.flush()?;
    Ok(())
}

/// Dumps a stream as `"<timestamp> <external_channel>"` lines.
pub fn write_stream_dump<P: AsRef<Path>>(path: P, stream: &TagStream) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for i in 0..stream.len() {
        writeln!(writer, "{} {}", stream.timestamp(i), stream.external_channel(i))?;
    }
    writer.flush()?;
    Ok(())
}

/// Writes the completion sentinel consumed by the acquisition scripts.
pub fn write_completion_sentinel<P: AsRef<Path>>(path: P) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(b"Task completed.\n")?;
    writer.flush()?;
    Ok(())
}
