//! Clock-anchor matching between two tagger streams.
//!
//! Both boxes see the same reference pulse train, but start recording at
//! different moments and with an arbitrary absolute-time offset. The
//! intervals between consecutive clock ticks, however, carry a shared
//! jitter signature: sliding one stream's interval sequence against the
//! other's and minimizing the L1 distance recovers how many clock ticks
//! one stream leads the other. The scan runs in both directions at once,
//! so either stream may be the late one.

use crate::{Error, Result};
use timetag_core::TagStream;

/// Ratio between the best backward and forward signature distances above
/// which one direction is considered decisively better.
pub const MATCH_THRESHOLD: u64 = 1000;

/// Tuning parameters for the signature scan.
#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Largest clock-tick lead to consider between the two streams.
    pub max_shift: usize,
    /// Number of clock intervals compared per candidate shift.
    pub time_depth: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            max_shift: 200,
            time_depth: 20,
        }
    }
}

impl MatchConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the largest clock-tick lead to consider.
    pub fn with_max_shift(mut self, max_shift: usize) -> Self {
        self.max_shift = max_shift;
        self
    }

    /// Sets the number of intervals compared per candidate shift.
    pub fn with_time_depth(mut self, time_depth: usize) -> Self {
        self.time_depth = time_depth;
        self
    }
}

/// Which stream's n-th clock aligns with the other stream's first clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchSide {
    /// The first stream started early: its `matching_clock`-th tick is
    /// the second stream's first tick.
    First,
    /// The second stream started early: its `matching_clock`-th tick is
    /// the first stream's first tick.
    Second,
}

/// A resolved clock anchor between two streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockMatch {
    /// 1-based clock ordinal on the side named by `side`.
    pub matching_clock: u64,
    /// The stream whose `matching_clock`-th tick is the anchor.
    pub side: MatchSide,
}

fn ratio(x: u64, y: u64) -> u64 {
    if x == 0 || y == 0 {
        return 0;
    }
    if x > y {
        x / y
    } else {
        y / x
    }
}

/// Locates the first clock tick common to `first` and `second`.
///
/// Fails with [`Error::NoMatch`] when neither scan direction beats the
/// other by [`MATCH_THRESHOLD`], and with [`Error::InsufficientClocks`]
/// when either stream holds too few clock ticks for the configured
/// depth.
pub fn find_clock_match(
    first: &TagStream,
    second: &TagStream,
    config: &MatchConfig,
) -> Result<ClockMatch> {
    let first_clocks = first.clock_timestamps();
    let second_clocks = second.clock_timestamps();
    let depth = config.time_depth;

    if first_clocks.len() <= depth || second_clocks.len() <= depth {
        return Err(Error::InsufficientClocks {
            first: first_clocks.len(),
            second: second_clocks.len(),
            time_depth: depth,
        });
    }

    let first_deltas: Vec<u64> = first_clocks.windows(2).map(|w| w[1] - w[0]).collect();
    let second_deltas: Vec<u64> = second_clocks.windows(2).map(|w| w[1] - w[0]).collect();

    let max_shift = config
        .max_shift
        .min(first_clocks.len() - depth)
        .min(second_clocks.len() - depth);

    let mut min_forward = u64::MAX;
    let mut min_forward_pos = 0;
    let mut min_backward = u64::MAX;
    let mut min_backward_pos = 0;

    for shift in 0..max_shift {
        let mut forward = 0;
        let mut backward = 0;
        for j in 0..depth {
            forward += first_deltas[j].abs_diff(second_deltas[shift + j]);
            backward += first_deltas[shift + j].abs_diff(second_deltas[j]);
        }

        let mut improved = false;
        if forward < min_forward {
            min_forward = forward;
            min_forward_pos = shift;
            improved = true;
        }
        if backward < min_backward {
            min_backward = backward;
            min_backward_pos = shift;
            improved = true;
        }

        // One direction already dwarfs the other; no better anchor can
        // change the outcome.
        if improved && ratio(min_backward, min_forward) >= MATCH_THRESHOLD {
            break;
        }
    }

    if ratio(min_backward, min_forward) < MATCH_THRESHOLD {
        return Err(Error::NoMatch {
            forward: min_forward,
            backward: min_backward,
        });
    }

    if min_forward <= min_backward {
        Ok(ClockMatch {
            matching_clock: min_forward_pos as u64 + 1,
            side: MatchSide::Second,
        })
    } else {
        Ok(ClockMatch {
            matching_clock: min_backward_pos as u64 + 1,
            side: MatchSide::First,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio() {
        assert_eq!(ratio(0, 5), 0);
        assert_eq!(ratio(5, 0), 0);
        assert_eq!(ratio(0, 0), 0);
        assert_eq!(ratio(10, 2), 5);
        assert_eq!(ratio(2, 10), 5);
        assert_eq!(ratio(7, 7), 1);
    }

    #[test]
    fn test_config_builders() {
        let config = MatchConfig::new().with_max_shift(50).with_time_depth(10);
        assert_eq!(config.max_shift, 50);
        assert_eq!(config.time_depth, 10);
    }
}
