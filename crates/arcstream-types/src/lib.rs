//! Core types for the arcstream waveform retrieval client.
//!
//! This crate provides the fundamental data structures used throughout arcstream:
//!
//! - [`StreamKey`] - Network/station/location/channel code with optional time bounds
//! - [`StreamSelector`] - Deduplicated set of stream keys plus a fallback time window
//! - [`TimeWindow`] - Validated time window for data retrieval
//! - [`MseedRecord`] - A decoded miniSEED record header with its raw bytes

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/arcstream/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod record;
mod selector;
mod stream_key;
mod time_window;

pub use error::{StreamKeyParseError, TimeWindowError};
pub use record::MseedRecord;
pub use selector::StreamSelector;
pub use stream_key::{LOCATION_PLACEHOLDER, StreamKey};
pub use time_window::{REQUEST_TIME_FORMAT, TimeWindow, format_request_time};
