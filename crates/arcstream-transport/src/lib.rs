//! Cancellable, timeout-bound byte transport for arcstream.
//!
//! This crate provides the byte channel the protocol session is built on:
//!
//! - [`Transport`] - Buffered blocking reads and writes over plain TCP or TLS
//! - [`TransportKind`] - The closed set of channel kinds, keyed by URL scheme
//! - [`Interrupter`] - Thread-safe handle that cancels a blocked call
//! - [`TlsSettings`] - Client TLS configuration used by secure transports

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/arcstream/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod buffer;
mod channel;
mod error;
mod interrupt;
mod tls;
mod transport;

pub use error::TransportError;
pub use interrupt::Interrupter;
pub use tls::TlsSettings;
pub use transport::{DEFAULT_BUFFER_SIZE, Transport, TransportKind};
