//! Structure-of-arrays event stream for time tagger data.
//!
//! A `TagStream` stores detection events in parallel vectors (timestamps
//! and raw channel numbers) rather than as an array of event structs.
//! The columnar layout keeps the hot scans (clock collection, windowed
//! coincidence search, merging) cache-friendly.

use crate::coincidence::{scan_coincidences, CoincidenceTally};
use crate::{Error, Result};
use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Average width of one TDC bin in seconds (81 ps).
pub const BIN_SIZE: f64 = 81e-12;

/// Number of TDC bins in one second of real time.
pub const ONE_SEC_BINS: u64 = 12_345_679_012;

/// Detection channels on one physical tagger box.
pub const CHANNELS_PER_BOX: u16 = 8;

/// Event count above which the offset shift runs on the rayon pool.
const PARALLEL_SHIFT_THRESHOLD: usize = 1 << 20;

/// A time-ordered stream of detection events from one logical unit:
/// a single tagger box, or the result of merging several boxes.
///
/// Raw channel numbers are always stored 0-based; the 1-based numbering
/// used in reports is derived through [`TagStream::external_channel`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TagStream {
    /// Columnar storage for event timestamps, in TDC bins.
    timestamps: Vec<u64>,
    /// Columnar storage for raw (0-based) channel numbers.
    channels: Vec<u16>,
    /// Channel count of the logical unit (8 per physical box, summed on merge).
    num_channels: u16,
    /// Box number, 1-based. Merged streams use box 1.
    box_number: u16,
    /// The 1-based channel number carrying the reference clock.
    clock_channel: u16,
    /// Per-channel calibration offsets, in bins. Zero until applied.
    offsets: Vec<i16>,
}

impl TagStream {
    /// Creates an empty stream with the given metadata.
    #[must_use]
    pub fn new(num_channels: u16, box_number: u16, clock_channel: u16) -> Self {
        Self::with_capacity(0, num_channels, box_number, clock_channel)
    }

    /// Creates an empty stream with room for `capacity` events.
    #[must_use]
    pub fn with_capacity(
        capacity: usize,
        num_channels: u16,
        box_number: u16,
        clock_channel: u16,
    ) -> Self {
        Self {
            timestamps: Vec::with_capacity(capacity),
            channels: Vec::with_capacity(capacity),
            num_channels,
            box_number,
            clock_channel,
            offsets: vec![0; num_channels as usize],
        }
    }

    /// Builds a stream from pre-filled columnar vectors.
    ///
    /// Validates that the vectors agree in length and that every raw
    /// channel number fits `num_channels`.
    pub fn from_parts(
        timestamps: Vec<u64>,
        channels: Vec<u16>,
        num_channels: u16,
        box_number: u16,
        clock_channel: u16,
    ) -> Result<Self> {
        if timestamps.len() != channels.len() {
            return Err(Error::LengthMismatch {
                timestamps: timestamps.len(),
                channels: channels.len(),
            });
        }
        if let Some(&bad) = channels.iter().find(|&&c| c >= num_channels) {
            return Err(Error::ChannelOutOfRange {
                channel: bad,
                num_channels,
            });
        }
        Ok(Self {
            timestamps,
            channels,
            num_channels,
            box_number,
            clock_channel,
            offsets: vec![0; num_channels as usize],
        })
    }

    /// Appends a single event.
    pub fn push(&mut self, timestamp: u64, channel: u16) {
        debug_assert!(channel < self.num_channels);
        self.timestamps.push(timestamp);
        self.channels.push(channel);
    }

    /// Returns the number of events in the stream.
    #[must_use]
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    /// Returns true if the stream holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Returns the timestamp of the event at `index`, in bins.
    #[must_use]
    pub fn timestamp(&self, index: usize) -> u64 {
        self.timestamps[index]
    }

    /// Returns the raw (0-based) channel of the event at `index`.
    #[must_use]
    pub fn raw_channel(&self, index: usize) -> u16 {
        self.channels[index]
    }

    /// Returns the timestamp column.
    #[must_use]
    pub fn timestamps(&self) -> &[u64] {
        &self.timestamps
    }

    /// Returns the raw channel column.
    #[must_use]
    pub fn channels(&self) -> &[u16] {
        &self.channels
    }

    /// Returns the channel count of the logical unit.
    #[must_use]
    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }

    /// Returns the box number (1-based).
    #[must_use]
    pub fn box_number(&self) -> u16 {
        self.box_number
    }

    /// Returns the 1-based clock channel number.
    #[must_use]
    pub fn clock_channel(&self) -> u16 {
        self.clock_channel
    }

    /// Returns the per-channel calibration offsets.
    #[must_use]
    pub fn offsets(&self) -> &[i16] {
        &self.offsets
    }

    /// Returns the externally visible channel number of the event at `index`.
    ///
    /// Box 1 reports raw channels 0..=7 as 1..=8; every further box adds
    /// another 8, so box 2 reports 9..=16 and so on. Merged streams use
    /// box 1, where the projection reduces to `raw + 1`.
    #[must_use]
    pub fn external_channel(&self, index: usize) -> u16 {
        self.channels[index] + (self.box_number - 1) * CHANNELS_PER_BOX + 1
    }

    /// Returns true if the event at `index` is a clock tick.
    #[must_use]
    pub fn is_clock(&self, index: usize) -> bool {
        self.channels[index] + 1 == self.clock_channel
    }

    /// Collects the timestamps of all clock-channel events, in stream order.
    #[must_use]
    pub fn clock_timestamps(&self) -> Vec<u64> {
        self.timestamps
            .iter()
            .zip(self.channels.iter())
            .filter(|&(_, &c)| c + 1 == self.clock_channel)
            .map(|(&t, _)| t)
            .collect()
    }

    /// Returns the event index of the n-th clock tick, 1-indexed.
    pub fn nth_clock_index(&self, n: u64) -> Result<usize> {
        let mut seen = 0;
        for index in 0..self.len() {
            if self.is_clock(index) {
                seen += 1;
                if seen == n {
                    return Ok(index);
                }
            }
        }
        Err(Error::ClockNotFound {
            wanted: n,
            available: seen,
        })
    }

    /// Returns the smallest index whose timestamp lies at least one second
    /// past the first event, or `None` when the stream is shorter than a
    /// second of real time.
    #[must_use]
    pub fn one_second_index(&self) -> Option<usize> {
        let first = *self.timestamps.first()?;
        let index = self
            .timestamps
            .partition_point(|&t| t - first < ONE_SEC_BINS);
        (index < self.len()).then_some(index)
    }

    /// Returns the wall-clock span of the stream in seconds.
    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        match (self.timestamps.first(), self.timestamps.last()) {
            (Some(&first), Some(&last)) => (last - first) as f64 * BIN_SIZE,
            _ => 0.0,
        }
    }

    /// Returns true if timestamps are non-decreasing across the stream.
    #[must_use]
    pub fn is_time_ordered(&self) -> bool {
        self.timestamps.windows(2).all(|w| w[0] <= w[1])
    }

    /// Applies per-channel calibration offsets and restores time order.
    ///
    /// The minimum signed offset (clamped to at most zero) is subtracted
    /// from every shift so no timestamp can underflow. Re-application is
    /// additive on top of already shifted timestamps; calibration is a
    /// one-shot step.
    ///
    /// Re-sorting uses insertion sort: per-channel offsets move events by
    /// a few bins at most, so the array stays near-sorted and the typical
    /// cost is O(n).
    pub fn apply_offsets(&mut self, offsets: &[i16]) -> Result<()> {
        if offsets.len() != self.num_channels as usize {
            return Err(Error::OffsetCount {
                expected: self.num_channels as usize,
                actual: offsets.len(),
            });
        }

        self.offsets.copy_from_slice(offsets);

        let min_offset = offsets.iter().copied().min().unwrap_or(0).min(0);
        let shifts: Vec<u64> = offsets
            .iter()
            .map(|&o| (i64::from(o) - i64::from(min_offset)) as u64)
            .collect();

        if self.len() >= PARALLEL_SHIFT_THRESHOLD {
            self.timestamps
                .par_iter_mut()
                .zip(self.channels.par_iter())
                .for_each(|(t, &c)| *t += shifts[c as usize]);
        } else {
            for (t, &c) in self.timestamps.iter_mut().zip(self.channels.iter()) {
                *t += shifts[c as usize];
            }
        }

        self.sort_by_timestamp();
        Ok(())
    }

    /// Finds exact n-fold coincidences and per-channel singles.
    ///
    /// See [`scan_coincidences`] for the window semantics.
    #[must_use]
    pub fn find_n_fold_coincidences(&self, fold: u16, window_bins: u64) -> CoincidenceTally {
        scan_coincidences(self, fold, window_bins)
    }

    /// In-place insertion sort of the (timestamp, channel) pairs.
    fn sort_by_timestamp(&mut self) {
        for i in 1..self.timestamps.len() {
            let timestamp = self.timestamps[i];
            let channel = self.channels[i];
            let mut j = i;
            while j > 0 && self.timestamps[j - 1] > timestamp {
                self.timestamps[j] = self.timestamps[j - 1];
                self.channels[j] = self.channels[j - 1];
                j -= 1;
            }
            self.timestamps[j] = timestamp;
            self.channels[j] = channel;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn stream_from_events(events: &[(u64, u16)], box_number: u16, clock: u16) -> TagStream {
        let timestamps = events.iter().map(|&(t, _)| t).collect();
        let channels = events.iter().map(|&(_, c)| c).collect();
        TagStream::from_parts(timestamps, channels, CHANNELS_PER_BOX, box_number, clock).unwrap()
    }

    #[test]
    fn test_push_and_accessors() {
        let mut stream = TagStream::with_capacity(4, 8, 1, 8);
        assert!(stream.is_empty());

        stream.push(100, 0);
        stream.push(200, 7);
        assert_eq!(stream.len(), 2);
        assert_eq!(stream.timestamp(0), 100);
        assert_eq!(stream.raw_channel(1), 7);
        assert_eq!(stream.num_channels(), 8);
        assert!(stream.is_time_ordered());
    }

    #[test]
    fn test_from_parts_rejects_bad_channel() {
        let err = TagStream::from_parts(vec![1, 2], vec![0, 8], 8, 1, 8).unwrap_err();
        assert!(matches!(
            err,
            Error::ChannelOutOfRange {
                channel: 8,
                num_channels: 8
            }
        ));
    }

    #[test]
    fn test_from_parts_rejects_length_mismatch() {
        let err = TagStream::from_parts(vec![1, 2, 3], vec![0], 8, 1, 8).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { .. }));
    }

    #[test]
    fn test_external_channel_projection() {
        let box1 = stream_from_events(&[(10, 0), (20, 7)], 1, 8);
        assert_eq!(box1.external_channel(0), 1);
        assert_eq!(box1.external_channel(1), 8);

        let box2 = stream_from_events(&[(10, 0), (20, 7)], 2, 8);
        assert_eq!(box2.external_channel(0), 9);
        assert_eq!(box2.external_channel(1), 16);
    }

    #[test]
    fn test_clock_predicates() {
        let stream = stream_from_events(&[(10, 0), (20, 7), (30, 7), (40, 1)], 1, 8);
        assert!(!stream.is_clock(0));
        assert!(stream.is_clock(1));
        assert_eq!(stream.clock_timestamps(), vec![20, 30]);
    }

    #[test]
    fn test_nth_clock_index() {
        let stream = stream_from_events(&[(10, 7), (20, 0), (30, 7), (40, 7)], 1, 8);
        assert_eq!(stream.nth_clock_index(1).unwrap(), 0);
        assert_eq!(stream.nth_clock_index(2).unwrap(), 2);
        assert_eq!(stream.nth_clock_index(3).unwrap(), 3);

        let err = stream.nth_clock_index(4).unwrap_err();
        assert!(matches!(
            err,
            Error::ClockNotFound {
                wanted: 4,
                available: 3
            }
        ));
    }

    #[test]
    fn test_one_second_index() {
        let stream = stream_from_events(
            &[
                (1000, 0),
                (2000, 1),
                (1000 + ONE_SEC_BINS - 1, 2),
                (1000 + ONE_SEC_BINS, 3),
                (1000 + ONE_SEC_BINS + 5, 4),
            ],
            1,
            8,
        );
        assert_eq!(stream.one_second_index(), Some(3));
    }

    #[test]
    fn test_one_second_index_short_stream() {
        let stream = stream_from_events(&[(1000, 0), (2000, 1)], 1, 8);
        assert_eq!(stream.one_second_index(), None);

        let empty = TagStream::new(8, 1, 8);
        assert_eq!(empty.one_second_index(), None);
    }

    #[test]
    fn test_duration_secs() {
        let stream = stream_from_events(&[(0, 0), (ONE_SEC_BINS, 1)], 1, 8);
        assert_relative_eq!(stream.duration_secs(), 1.0, max_relative = 1e-9);
    }

    #[test]
    fn test_apply_offsets_zero_is_identity() {
        let mut stream = stream_from_events(&[(100, 0), (110, 1), (120, 2)], 1, 8);
        let before = stream.clone();
        stream.apply_offsets(&[0; 8]).unwrap();
        assert_eq!(stream.timestamps(), before.timestamps());
        assert_eq!(stream.channels(), before.channels());
    }

    #[test]
    fn test_apply_offsets_negative_does_not_underflow() {
        // Channel 0 would go to -40 without the minimum-offset correction.
        let mut stream = stream_from_events(&[(10, 0), (20, 1)], 1, 8);
        let mut offsets = [0i16; 8];
        offsets[0] = -50;
        stream.apply_offsets(&offsets).unwrap();

        // Every timestamp is shifted up by 50, channel 0 additionally by -50.
        assert_eq!(stream.timestamp(0), 10);
        assert_eq!(stream.timestamp(1), 70);
        assert!(stream.is_time_ordered());
    }

    #[test]
    fn test_apply_offsets_resorts_events() {
        let mut stream = stream_from_events(&[(100, 0), (101, 1), (102, 0), (103, 1)], 1, 8);
        let mut offsets = [0i16; 8];
        offsets[1] = -3;
        stream.apply_offsets(&offsets).unwrap();

        assert!(stream.is_time_ordered());
        // Channel 1 events moved ahead of their channel 0 neighbors.
        assert_eq!(stream.timestamps(), &[101, 103, 103, 105]);
        assert_eq!(stream.channels(), &[1, 0, 1, 0]);
    }

    #[test]
    fn test_apply_offsets_wrong_count() {
        let mut stream = stream_from_events(&[(100, 0)], 1, 8);
        let err = stream.apply_offsets(&[0; 4]).unwrap_err();
        assert!(matches!(
            err,
            Error::OffsetCount {
                expected: 8,
                actual: 4
            }
        ));
    }
}
