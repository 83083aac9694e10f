//! Dataselect protocol session and record decoding for arcstream.
//!
//! This crate provides the retrieval pipeline:
//!
//! - [`Source`] - Service address parsing and redirect resolution
//! - [`Session`] - Request handshake, redirects and pull-based record streaming
//! - [`RecordDecoder`] - Length probe and parse interface for body records
//! - [`MseedDecoder`] - miniSEED 2 implementation of [`RecordDecoder`]
//! - [`SessionConfig`] - Timeout, redirect limit and user agent

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/arcstream/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod body;
mod config;
mod decoder;
mod error;
mod mseed;
mod request;
mod response;
mod session;
mod source;

pub use config::SessionConfig;
pub use decoder::{DecodeError, RecordDecoder};
pub use error::SessionError;
pub use mseed::MseedDecoder;
pub use session::{CloseHandle, Session};
pub use source::{DEFAULT_PATH, Source, SourceError};
