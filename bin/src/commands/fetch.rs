//! Fetch command implementation.
//!
//! This module streams records from a dataselect service and writes their raw
//! bytes to a file or stdout.

use anyhow::{Context, Result};
use arcstream_lib::prelude::*;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Arguments of the fetch command.
pub(crate) struct FetchArgs<'a> {
    pub(crate) url: &'a str,
    pub(crate) streams: &'a [String],
    pub(crate) start: &'a str,
    pub(crate) end: Option<&'a str>,
    pub(crate) timeout: Option<u64>,
    pub(crate) config: Option<PathBuf>,
    pub(crate) output: Option<PathBuf>,
    pub(crate) quiet: bool,
}

/// Fetch records for the requested streams.
pub(crate) fn fetch(args: FetchArgs<'_>) -> Result<()> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => SessionConfig::default(),
    };

    let mut session = arcstream_lib::open(args.url)
        .with_context(|| format!("Cannot open {}", args.url))?
        .with_config(config);
    if let Some(timeout) = args.timeout {
        session.set_timeout(timeout);
    }

    for stream in args.streams {
        let key: StreamKey = stream.parse()?;
        if !session.add_stream(&key.network, &key.station, &key.location, &key.channel) {
            tracing::warn!(%key, "Duplicate stream ignored");
        }
    }

    let start = parse_time(args.start).with_context(|| format!("Invalid start time: {}", args.start))?;
    match args.end {
        Some(end) => {
            let end = parse_time(end).with_context(|| format!("Invalid end time: {end}"))?;
            session.set_time_window(TimeWindow::new(start, end)?);
        }
        None => session.set_start_time(start),
    }

    let mut out: BufWriter<Box<dyn Write>> = match &args.output {
        Some(path) => BufWriter::new(Box::new(
            File::create(path).with_context(|| format!("Cannot create {}", path.display()))?,
        )),
        None => BufWriter::new(Box::new(std::io::stdout().lock())),
    };

    let progress = if args.quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos} records {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(args.url.to_string());
        pb
    };

    let mut bytes = 0usize;
    while let Some(record) = session.next_record()? {
        out.write_all(&record.raw)?;
        bytes += record.len();
        progress.inc(1);
        progress.set_message(format!("{} ({} bytes)", record.stream_id(), bytes));
    }
    out.flush()?;

    progress.finish_with_message(format!("done ({bytes} bytes)"));

    if session.try_reconnect() {
        tracing::warn!("Transfer ended on a transient error; the data may be incomplete");
    }

    if !args.quiet && let Some(path) = &args.output {
        eprintln!("Output written to: {}", path.display());
    }

    Ok(())
}

/// Loads a session configuration from a JSON file.
fn load_config(path: &Path) -> Result<SessionConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read config {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
}

/// Parses an RFC 3339 timestamp, a naive date-time or a date, all as UTC.
fn parse_time(s: &str) -> Result<DateTime<Utc>> {
    if let Ok(time) = DateTime::parse_from_rfc3339(s) {
        return Ok(time.with_timezone(&Utc));
    }
    if let Ok(time) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(time.and_utc());
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")?;
    date.and_hms_opt(0, 0, 0)
        .map(|time| time.and_utc())
        .context("invalid date")
}
