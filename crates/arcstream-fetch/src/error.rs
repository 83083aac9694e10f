//! Session error types.

use arcstream_transport::TransportError;
use thiserror::Error;

use crate::SourceError;

/// Errors raised by a [`Session`](crate::Session).
#[derive(Error, Debug)]
pub enum SessionError {
    /// The transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The server sent something that is not valid HTTP framing.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server answered with an error status.
    #[error("server returned {status}: {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Response body, or the reason phrase if the body was empty.
        message: String,
    },

    /// The source address is missing or invalid.
    #[error("invalid source: {0}")]
    Source(#[from] SourceError),

    /// The redirect chain exceeded the configured hop limit.
    #[error("more than {0} redirects")]
    TooManyRedirects(usize),

    /// No stream could be requested.
    #[error("no requestable streams")]
    NoStreams,
}

impl SessionError {
    /// Returns true if the error came from cancelling the session.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Cancelled))
    }
}
