//! Response body framing.

use arcstream_transport::{Transport, TransportError};

use crate::SessionError;
use crate::response::Headers;

/// How the end of a response body is found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    /// `Content-Length`: `remaining` bytes left.
    Length { remaining: u64 },
    /// `Transfer-Encoding: chunked`: `remaining` bytes left in the current chunk.
    Chunked { remaining: u64, started: bool },
    /// Neither header: the body ends when the peer closes.
    UntilClose,
    /// Nothing left.
    Done,
}

/// Reads a response body according to its framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BodyReader {
    framing: Framing,
}

impl BodyReader {
    /// A body that is already complete.
    pub(crate) const fn empty() -> Self {
        Self {
            framing: Framing::Done,
        }
    }

    /// Framing for a data response, which must name exactly one of
    /// `Content-Length` and chunked encoding.
    pub(crate) fn for_data(headers: &Headers) -> Result<Self, SessionError> {
        match (headers.content_length, headers.chunked) {
            (Some(_), true) => Err(SessionError::Protocol(
                "both Content-Length and chunked encoding".to_string(),
            )),
            (None, false) => Err(SessionError::Protocol(
                "neither Content-Length nor chunked encoding".to_string(),
            )),
            (Some(length), false) => Ok(Self::length(length)),
            (None, true) => Ok(Self::chunked()),
        }
    }

    /// Framing for a diagnostic body, which may also run until close.
    pub(crate) fn for_diagnostic(headers: &Headers) -> Self {
        if headers.chunked {
            Self::chunked()
        } else if let Some(length) = headers.content_length {
            Self::length(length)
        } else {
            Self {
                framing: Framing::UntilClose,
            }
        }
    }

    const fn length(remaining: u64) -> Self {
        let framing = if remaining == 0 {
            Framing::Done
        } else {
            Framing::Length { remaining }
        };
        Self { framing }
    }

    const fn chunked() -> Self {
        Self {
            framing: Framing::Chunked {
                remaining: 0,
                started: false,
            },
        }
    }

    /// Returns true once the whole body has been consumed.
    pub(crate) const fn is_done(&self) -> bool {
        matches!(self.framing, Framing::Done)
    }

    /// Reads up to `n` body bytes; fewer only when the body ends first.
    pub(crate) fn read(
        &mut self,
        transport: &mut Transport,
        n: usize,
    ) -> Result<Vec<u8>, SessionError> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            let want = n - out.len();
            match self.framing {
                Framing::Done => break,
                Framing::Length { remaining } => {
                    let take = want.min(usize::try_from(remaining).unwrap_or(usize::MAX));
                    out.extend(transport.read(take)?);
                    self.framing = Self::length(remaining - take as u64).framing;
                }
                Framing::Chunked { remaining: 0, started } => {
                    if started {
                        expect_crlf(transport)?;
                    }
                    let size = parse_chunk_size(&transport.read_line()?)?;
                    if size == 0 {
                        skip_trailers(transport)?;
                        self.framing = Framing::Done;
                    } else {
                        self.framing = Framing::Chunked {
                            remaining: size,
                            started: true,
                        };
                    }
                }
                Framing::Chunked { remaining, .. } => {
                    let take = want.min(usize::try_from(remaining).unwrap_or(usize::MAX));
                    out.extend(transport.read(take)?);
                    self.framing = Framing::Chunked {
                        remaining: remaining - take as u64,
                        started: true,
                    };
                }
                Framing::UntilClose => match transport.read_some(want) {
                    Ok(bytes) => out.extend(bytes),
                    Err(TransportError::Closed) => self.framing = Framing::Done,
                    Err(e) => return Err(e.into()),
                },
            }
        }
        Ok(out)
    }
}

/// Parses `<hex-size>[;ext]`.
fn parse_chunk_size(line: &str) -> Result<u64, SessionError> {
    let size = line.split(';').next().unwrap_or_default().trim();
    if size.is_empty() || !size.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(SessionError::Protocol(format!("invalid chunk size '{line}'")));
    }
    u64::from_str_radix(size, 16)
        .map_err(|_| SessionError::Protocol(format!("chunk size out of range '{line}'")))
}

/// Consumes the CRLF that follows a chunk's payload.
fn expect_crlf(transport: &mut Transport) -> Result<(), SessionError> {
    let line = transport.read_line()?;
    if line.is_empty() {
        Ok(())
    } else {
        Err(SessionError::Protocol(format!(
            "missing CRLF after chunk, found '{line}'"
        )))
    }
}

/// Consumes trailer fields after the last chunk. A peer that closes right
/// after the zero-size chunk is tolerated.
fn skip_trailers(transport: &mut Transport) -> Result<(), SessionError> {
    loop {
        match transport.read_line() {
            Ok(line) if line.is_empty() => return Ok(()),
            Ok(_) => {}
            Err(TransportError::Closed) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
    }
}
