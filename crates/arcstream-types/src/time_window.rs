//! Time windows and request time formatting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::TimeWindowError;

/// `strftime` pattern used for times in request bodies.
///
/// Times are always UTC and carry microsecond precision, without a zone suffix.
pub const REQUEST_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Formats a timestamp the way the data service expects it in a request line.
///
/// # Example
///
/// ```
/// use arcstream_types::format_request_time;
/// use chrono::{TimeZone, Utc};
///
/// let t = Utc.with_ymd_and_hms(2024, 1, 15, 12, 30, 0).unwrap();
/// assert_eq!(format_request_time(t), "2024-01-15T12:30:00.000000");
/// ```
#[must_use]
pub fn format_request_time(time: DateTime<Utc>) -> String {
    time.format(REQUEST_TIME_FORMAT).to_string()
}

/// A window of time for data retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Start time (inclusive).
    pub start: DateTime<Utc>,
    /// End time (exclusive).
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Creates a new time window, validating that start <= end.
    ///
    /// # Errors
    ///
    /// Returns an error if start > end.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TimeWindowError> {
        if start > end {
            return Err(TimeWindowError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// Returns the length of the window.
    #[must_use]
    pub fn duration(&self) -> chrono::TimeDelta {
        self.end - self.start
    }

    /// Returns true if the window contains the given instant.
    #[must_use]
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        time >= self.start && time < self.end
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to {}",
            format_request_time(self.start),
            format_request_time(self.end)
        )
    }
}
