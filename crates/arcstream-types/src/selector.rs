//! Deduplicated stream selection.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::{StreamKey, TimeWindow};

/// A set of streams to request plus a global fallback time window.
///
/// Inserting the same key twice is a no-op, and keys that resolve to the same
/// codes and bounds render a single request line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSelector {
    keys: BTreeSet<StreamKey>,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl StreamSelector {
    /// Creates an empty selector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a key, returning true if it was not present yet.
    pub fn insert(&mut self, key: StreamKey) -> bool {
        self.keys.insert(key)
    }

    /// Removes every key with the given codes regardless of its time bounds.
    ///
    /// Returns true if anything was removed.
    pub fn remove(&mut self, network: &str, station: &str, location: &str, channel: &str) -> bool {
        let before = self.keys.len();
        self.keys
            .retain(|key| !key.matches(network, station, location, channel));
        self.keys.len() != before
    }

    /// Sets the global start time used by keys without their own.
    pub const fn set_start(&mut self, start: DateTime<Utc>) {
        self.start = Some(start);
    }

    /// Sets the global end time used by keys without their own.
    pub const fn set_end(&mut self, end: DateTime<Utc>) {
        self.end = Some(end);
    }

    /// Sets both global bounds from a validated window.
    pub const fn set_window(&mut self, window: TimeWindow) {
        self.start = Some(window.start);
        self.end = Some(window.end);
    }

    /// Returns the global start time.
    #[must_use]
    pub const fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    /// Returns the global end time.
    #[must_use]
    pub const fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    /// Discards all keys and both global bounds.
    pub fn clear(&mut self) {
        self.keys.clear();
        self.start = None;
        self.end = None;
    }

    /// Returns the keys in request order.
    pub fn keys(&self) -> impl Iterator<Item = &StreamKey> {
        self.keys.iter()
    }

    /// Returns the number of distinct keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if no key has been added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Resolves the effective window of a key against the global bounds.
    ///
    /// A key without any start time cannot be requested and yields `None`.
    /// A missing end time resolves to `now`.
    #[must_use]
    pub fn resolve(
        &self,
        key: &StreamKey,
        now: DateTime<Utc>,
    ) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let start = key.start.or(self.start)?;
        let end = key.end.or(self.end).unwrap_or(now);
        Some((start, end))
    }

    /// Renders one request line per distinct resolved stream and window.
    ///
    /// A key without bounds of its own and a key whose explicit bounds equal
    /// the global ones yield the same line, which is written once. Keys that
    /// cannot be resolved are returned separately so the caller can report
    /// them.
    #[must_use]
    pub fn request_lines(&self, now: DateTime<Utc>) -> (Vec<String>, Vec<&StreamKey>) {
        let mut seen = BTreeSet::new();
        let mut lines = Vec::with_capacity(self.keys.len());
        let mut skipped = Vec::new();

        for key in &self.keys {
            match self.resolve(key, now) {
                Some((start, end)) => {
                    let line = key.request_line(start, end);
                    if seen.insert(line.clone()) {
                        lines.push(line);
                    }
                }
                None => skipped.push(key),
            }
        }

        (lines, skipped)
    }
}
