//! Decoded record representation.

use bytes::Bytes;
use chrono::{DateTime, TimeDelta, Utc};

/// A single miniSEED record.
///
/// Only the fixed header is decoded; the payload stays in `raw`, untouched, so
/// records can be written out byte-for-byte.
#[derive(Debug, Clone, PartialEq)]
pub struct MseedRecord {
    /// Record sequence number from the fixed header.
    pub sequence: u32,
    /// Data quality indicator (`D`, `R`, `Q` or `M`).
    pub quality: char,
    /// Network code.
    pub network: String,
    /// Station code.
    pub station: String,
    /// Location code, possibly empty.
    pub location: String,
    /// Channel code.
    pub channel: String,
    /// Time of the first sample.
    pub start_time: DateTime<Utc>,
    /// Number of samples in the record.
    pub sample_count: u16,
    /// Nominal sample rate in Hz (0 for log records).
    pub sample_rate: f64,
    /// The complete record as received.
    pub raw: Bytes,
}

impl MseedRecord {
    /// Returns the record length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    /// Returns true if the record carries no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Returns the `NET.STA.LOC.CHA` identifier of the record.
    #[must_use]
    pub fn stream_id(&self) -> String {
        format!(
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }

    /// Returns the time just after the last sample.
    ///
    /// Records without a sample rate end where they start.
    #[must_use]
    pub fn end_time(&self) -> DateTime<Utc> {
        if self.sample_rate <= 0.0 || self.sample_count == 0 {
            return self.start_time;
        }
        let micros = (f64::from(self.sample_count) / self.sample_rate * 1e6).round() as i64;
        self.start_time + TimeDelta::microseconds(micros)
    }
}
