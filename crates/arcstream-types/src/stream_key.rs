//! Stream identification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{StreamKeyParseError, format_request_time};

/// Location code written in request lines when a stream has an empty location.
pub const LOCATION_PLACEHOLDER: &str = "--";

/// Identifies one logical data stream to retrieve.
///
/// Keys compare on every field, so the same channel requested for two different
/// time windows yields two distinct keys.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamKey {
    /// Network code (e.g. `GE`).
    pub network: String,
    /// Station code (e.g. `APE`).
    pub station: String,
    /// Location code, possibly empty.
    pub location: String,
    /// Channel code (e.g. `BHZ`).
    pub channel: String,
    /// Per-stream start time, overriding the selector's global start.
    pub start: Option<DateTime<Utc>>,
    /// Per-stream end time, overriding the selector's global end.
    pub end: Option<DateTime<Utc>>,
}

impl StreamKey {
    /// Creates a key without its own time bounds.
    #[must_use]
    pub fn new(network: &str, station: &str, location: &str, channel: &str) -> Self {
        Self {
            network: network.to_string(),
            station: station.to_string(),
            location: location.to_string(),
            channel: channel.to_string(),
            start: None,
            end: None,
        }
    }

    /// Sets the per-stream time bounds.
    #[must_use]
    pub fn with_window(
        mut self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    /// Returns true if the four stream codes match, ignoring time bounds.
    #[must_use]
    pub fn matches(&self, network: &str, station: &str, location: &str, channel: &str) -> bool {
        self.network == network
            && self.station == station
            && self.location == location
            && self.channel == channel
    }

    /// Returns the location code as written on the wire.
    #[must_use]
    pub fn wire_location(&self) -> &str {
        if self.location.is_empty() {
            LOCATION_PLACEHOLDER
        } else {
            &self.location
        }
    }

    /// Renders the request line for this stream over `[start, end)`.
    ///
    /// The line is terminated with CRLF.
    #[must_use]
    pub fn request_line(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
        format!(
            "{} {} {} {} {} {}\r\n",
            self.network,
            self.station,
            self.wire_location(),
            self.channel,
            format_request_time(start),
            format_request_time(end)
        )
    }
}

impl std::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.network, self.station, self.location, self.channel
        )
    }
}

impl std::str::FromStr for StreamKey {
    type Err = StreamKeyParseError;

    /// Parses `NET.STA.LOC.CHA`; the location may be empty (`NET.STA..CHA`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        match parts.as_slice() {
            [net, sta, loc, cha] if !net.is_empty() && !sta.is_empty() && !cha.is_empty() => {
                let loc = if *loc == LOCATION_PLACEHOLDER { "" } else { loc };
                Ok(Self::new(net, sta, loc, cha))
            }
            _ => Err(StreamKeyParseError(s.to_string())),
        }
    }
}
