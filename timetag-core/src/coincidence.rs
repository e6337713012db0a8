//! Single-pass sliding-window n-fold coincidence scanner.
//!
//! The scanner walks a time-ordered stream once, opening a window at the
//! first unmatched event. A window closes when an event falls more than
//! `window_bins` past its start; if the closed window collected exactly
//! `fold` distinct channels it is tallied under a canonical sorted key.
//! A duplicate channel inside the window, or more than `fold` events,
//! disqualifies it.

use crate::stream::TagStream;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Singles and coincidence counts produced by one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CoincidenceTally {
    /// Per-channel event counts, indexed by raw channel.
    pub singles: Vec<u64>,
    /// Coincidence counts keyed by the canonical channel tuple.
    ///
    /// Keys are the window's channel numbers (raw + 1) sorted ascending,
    /// zero-padded to two digits and joined by `_`, e.g. `"01_03_06"`.
    /// `BTreeMap` iteration therefore yields keys in ascending order.
    pub coincidences: BTreeMap<String, u64>,
}

impl CoincidenceTally {
    /// Returns the total number of events counted across all channels.
    #[must_use]
    pub fn singles_total(&self) -> u64 {
        self.singles.iter().sum()
    }
}

/// Builds the canonical tally key for a closed window.
fn coincidence_key(window: &[u16]) -> String {
    let mut sorted = window.to_vec();
    sorted.sort_unstable();
    let parts: Vec<String> = sorted.iter().map(|c| format!("{:02}", c + 1)).collect();
    parts.join("_")
}

/// Scans `stream` for exact `fold`-fold coincidences within `window_bins`.
///
/// Also counts per-channel singles over the whole stream. The final open
/// window is never tallied: it would race against events past the end of
/// the recording, so only windows closed by a later event count.
#[must_use]
pub fn scan_coincidences(stream: &TagStream, fold: u16, window_bins: u64) -> CoincidenceTally {
    let mut tally = CoincidenceTally {
        singles: vec![0; stream.num_channels() as usize],
        coincidences: BTreeMap::new(),
    };
    if stream.is_empty() || fold == 0 {
        for &channel in stream.channels() {
            tally.singles[channel as usize] += 1;
        }
        return tally;
    }

    let timestamps = stream.timestamps();
    let channels = stream.channels();
    let fold = fold as usize;

    let mut window: Vec<u16> = Vec::with_capacity(fold);
    let mut window_start = timestamps[0];
    let mut still_good = true;

    tally.singles[channels[0] as usize] += 1;
    window.push(channels[0]);

    for i in 1..stream.len() {
        let channel = channels[i];
        tally.singles[channel as usize] += 1;

        if timestamps[i] - window_start <= window_bins {
            if window.len() < fold {
                if window.contains(&channel) {
                    // Two events on one channel cannot form an exact n-fold.
                    still_good = false;
                } else {
                    window.push(channel);
                }
            } else {
                // Too many events in the window.
                still_good = false;
            }
        } else {
            if still_good && window.len() == fold {
                *tally
                    .coincidences
                    .entry(coincidence_key(&window))
                    .or_insert(0) += 1;
            }

            window_start = timestamps[i];
            window.clear();
            window.push(channel);
            still_good = true;
        }
    }

    tally
}
