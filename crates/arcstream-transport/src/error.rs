//! Transport error taxonomy.

use std::io;

use thiserror::Error;

/// Errors raised by [`Transport`](crate::Transport) operations.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Host name could not be resolved.
    #[error("Cannot resolve {host}: {source}")]
    Resolve {
        /// The host that failed to resolve.
        host: String,
        /// Underlying resolver error.
        #[source]
        source: io::Error,
    },

    /// Connection could not be established (refused, unreachable or timed out).
    #[error("Cannot connect to {addr}: {source}")]
    Connect {
        /// The address that was tried last.
        addr: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// TLS configuration, certificate or protocol failure.
    #[error("TLS error: {0}")]
    Tls(String),

    /// I/O error on an established channel.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The peer closed the channel.
    #[error("Connection closed by peer")]
    Closed,

    /// The deadline expired while waiting for the channel.
    #[error("Operation timed out")]
    Timeout,

    /// The blocked call was interrupted from another thread.
    #[error("Operation cancelled")]
    Cancelled,

    /// A line did not fit into the receive buffer.
    #[error("Line exceeds {0} bytes")]
    LineTooLong(usize),

    /// The transport has no open channel.
    #[error("Transport is not open")]
    NotOpen,
}

impl TransportError {
    /// Returns true if reopening the channel may succeed where this failed.
    ///
    /// Cancellation is never a reason to reconnect.
    #[must_use]
    pub fn suggests_reconnect(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::Closed | Self::Timeout => true,
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::UnexpectedEof
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::NotConnected
            ),
            Self::Resolve { .. }
            | Self::Tls(_)
            | Self::Cancelled
            | Self::LineTooLong(_)
            | Self::NotOpen => false,
        }
    }

    /// Returns true if this error reports a cooperative cancellation.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Returns true if this error reports an expired deadline.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }
}
