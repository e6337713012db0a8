//! Drift-corrected merging of two matched streams.
//!
//! Once a clock anchor is known, both streams are rebased so the anchor
//! tick sits at time zero, the second stream's timeline is rescaled by a
//! linear drift factor fitted over the shared clock ticks, and the two
//! event sequences are merged in a single ordered pass. The second
//! stream's clock events are dropped so the reference pulse appears only
//! once in the result.

use crate::matcher::{ClockMatch, MatchSide};
use crate::{Error, Result};
use rayon::prelude::*;
use timetag_core::{TagStream, ONE_SEC_BINS};

/// Event count above which the drift rescale runs on the rayon pool.
const PARALLEL_RESCALE_THRESHOLD: usize = 1 << 20;

/// Tuning parameters for the drift fit.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// Largest number of clock pairs fed into the drift regression.
    pub max_fit_points: usize,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            max_fit_points: 100,
        }
    }
}

impl MergeConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the largest number of clock pairs used for the drift fit.
    pub fn with_max_fit_points(mut self, max_fit_points: usize) -> Self {
        self.max_fit_points = max_fit_points;
        self
    }
}

/// Merges `second` into `first` at the given clock anchor.
///
/// The result is a fresh [`TagStream`] with `box_number` 1, the first
/// stream's clock channel, the summed channel count, and zeroed offsets.
/// Channels are renumbered into the merged 0-based space (the external
/// channel number minus one), so the first stream occupies the lower
/// channel block and the second the upper. Events are emitted in
/// non-decreasing time order and the stream is truncated once the last
/// emitted timestamp reaches one second.
pub fn merge(
    first: &TagStream,
    second: &TagStream,
    anchor: &ClockMatch,
    config: &MergeConfig,
) -> Result<TagStream> {
    let (clock_first, clock_second) = match anchor.side {
        MatchSide::First => (anchor.matching_clock, 1),
        MatchSide::Second => (1, anchor.matching_clock),
    };

    let start_first = first.nth_clock_index(clock_first)?;
    let start_second = second.nth_clock_index(clock_second)?;

    let slope = fit_drift_slope(
        &first.clock_timestamps(),
        &second.clock_timestamps(),
        clock_first as usize,
        clock_second as usize,
        config.max_fit_points,
    )?;

    // Rebase both timelines on the anchor event.
    let base_first = first.timestamp(start_first);
    let shifted_first: Vec<u64> = first.timestamps()[start_first..]
        .iter()
        .map(|&t| t - base_first)
        .collect();

    let base_second = second.timestamp(start_second);
    let mut shifted_second: Vec<u64> = second.timestamps()[start_second..]
        .iter()
        .map(|&t| t - base_second)
        .collect();

    // Undo the relative clock drift on the second timeline.
    if shifted_second.len() >= PARALLEL_RESCALE_THRESHOLD {
        shifted_second
            .par_iter_mut()
            .for_each(|t| *t = (*t as f64 / slope).round() as u64);
    } else {
        for t in &mut shifted_second {
            *t = (*t as f64 / slope).round() as u64;
        }
    }

    let mut merged = TagStream::with_capacity(
        shifted_first.len() + shifted_second.len(),
        first.num_channels() + second.num_channels(),
        1,
        first.clock_channel(),
    );

    let mut i = 0;
    let mut j = 0;
    loop {
        // Only the first stream's copy of the reference pulse survives.
        while j < shifted_second.len() && second.is_clock(start_second + j) {
            j += 1;
        }

        let take_first = if i < shifted_first.len() {
            j >= shifted_second.len() || shifted_first[i] < shifted_second[j]
        } else if j < shifted_second.len() {
            false
        } else {
            break;
        };

        let emitted = if take_first {
            let t = shifted_first[i];
            merged.push(t, first.external_channel(start_first + i) - 1);
            i += 1;
            t
        } else {
            let t = shifted_second[j];
            merged.push(t, second.external_channel(start_second + j) - 1);
            j += 1;
            t
        };

        // Downstream analysis is framed to one second per run; the first
        // event at or past the boundary is kept, the rest dropped.
        if emitted >= ONE_SEC_BINS {
            break;
        }
    }

    Ok(merged)
}

/// Fits the relative clock-rate factor between the two pulse trains.
///
/// Least squares through the origin over the clock ticks that follow the
/// anchor on both sides: `slope = Σxy / Σx²` with the first stream's
/// rebased ticks as x and the second's as y.
fn fit_drift_slope(
    first_clocks: &[u64],
    second_clocks: &[u64],
    clock_first: usize,
    clock_second: usize,
    max_fit_points: usize,
) -> Result<f64> {
    if clock_first >= first_clocks.len() || clock_second >= second_clocks.len() {
        return Err(Error::DegenerateFit);
    }

    let after_first = first_clocks.len() - clock_first;
    let after_second = second_clocks.len() - clock_second;
    let common = after_first.min(after_second).min(max_fit_points);

    let base_first = first_clocks[clock_first];
    let base_second = second_clocks[clock_second];

    let mut xy = 0.0;
    let mut xx = 0.0;
    for i in 1..common {
        let x = (first_clocks[clock_first + i] - base_first) as f64;
        let y = (second_clocks[clock_second + i] - base_second) as f64;
        xy += x * y;
        xx += x * x;
    }

    if xx == 0.0 {
        return Err(Error::DegenerateFit);
    }
    Ok(xy / xx)
}
