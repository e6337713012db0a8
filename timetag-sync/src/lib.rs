//! timetag-sync: Cross-stream clock matching and merging.
//!
//! Two tagger boxes record a shared periodic reference pulse on their
//! clock channels. This crate locates the first clock tick common to two
//! streams by comparing clock-interval signatures, fits a linear
//! clock-drift correction, and merges the streams into one time-ordered
//! [`timetag_core::TagStream`].

mod error;
mod matcher;
mod merger;

pub use error::{Error, Result};
pub use matcher::{find_clock_match, ClockMatch, MatchConfig, MatchSide, MATCH_THRESHOLD};
pub use merger::{merge, MergeConfig};
