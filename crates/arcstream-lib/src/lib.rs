//! Streaming FDSNWS waveform retrieval client.
//!
//! This is a facade crate that re-exports functionality from the arcstream
//! workspace crates for convenient access.
//!
//! # Quick Start
//!
//! ```no_run
//! use arcstream_lib::prelude::*;
//! use chrono::{TimeZone, Utc};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = arcstream_lib::open("fdsnwss://service.example.org")?;
//!     session.set_timeout(30);
//!     session.add_stream("GE", "APE", "", "BHZ");
//!     session.set_time_window(TimeWindow::new(
//!         Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
//!         Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap(),
//!     )?);
//!
//!     while let Some(record) = session.next_record()? {
//!         println!("{} {}", record.stream_id(), record.start_time);
//!     }
//!
//!     Ok(())
//! }
//! ```

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/arcstream/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use arcstream_types::*;

// Re-export transport
pub use arcstream_transport::{Interrupter, TlsSettings, Transport, TransportError, TransportKind};

// Re-export session functionality
#[cfg(feature = "fetch")]
pub use arcstream_fetch::{
    CloseHandle, DEFAULT_PATH, DecodeError, MseedDecoder, RecordDecoder, Session, SessionConfig,
    SessionError, Source, SourceError,
};

// Re-export service registry
#[cfg(feature = "registry")]
pub use arcstream_registry::{RegistryError, Service, ServiceRegistry, create, open};

/// Prelude module for convenient imports.
///
/// ```
/// use arcstream_lib::prelude::*;
/// ```
pub mod prelude {
    pub use arcstream_types::{
        MseedRecord, StreamKey, StreamKeyParseError, StreamSelector, TimeWindow, TimeWindowError,
    };

    pub use arcstream_transport::{TlsSettings, TransportError, TransportKind};

    #[cfg(feature = "fetch")]
    pub use arcstream_fetch::{
        CloseHandle, MseedDecoder, RecordDecoder, Session, SessionConfig, SessionError,
    };

    #[cfg(feature = "registry")]
    pub use arcstream_registry::ServiceRegistry;
}
