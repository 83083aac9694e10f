//! Error types for arcstream core types.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Error for invalid time windows.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimeWindowError {
    /// Start time is after end time.
    #[error("Invalid time window: {start} > {end}")]
    Inverted {
        /// The start time.
        start: DateTime<Utc>,
        /// The end time.
        end: DateTime<Utc>,
    },
}

/// Error for stream ids that are not `NET.STA.LOC.CHA`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid stream id '{0}' (expected NET.STA.LOC.CHA)")]
pub struct StreamKeyParseError(pub String);
