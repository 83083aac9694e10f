//! Status line and header parsing.

use crate::SessionError;

/// Upper bound on header lines per response.
const MAX_HEADERS: usize = 128;

/// Parsed `HTTP/1.x <code> <reason>` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StatusLine {
    pub(crate) code: u16,
    pub(crate) reason: String,
}

impl StatusLine {
    pub(crate) fn parse(line: &str) -> Result<Self, SessionError> {
        let malformed = || SessionError::Protocol(format!("malformed status line '{line}'"));

        let mut parts = line.splitn(3, ' ');
        let version = parts.next().ok_or_else(malformed)?;
        if !version.starts_with("HTTP/1.") {
            return Err(malformed());
        }
        let code = parts
            .next()
            .filter(|c| c.len() == 3)
            .and_then(|c| c.parse::<u16>().ok())
            .ok_or_else(malformed)?;
        let reason = parts.next().unwrap_or_default().trim().to_string();

        Ok(Self { code, reason })
    }

    pub(crate) const fn is_redirect(&self) -> bool {
        matches!(self.code, 301 | 302 | 303 | 307 | 308)
    }
}

/// The headers a session acts on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Headers {
    pub(crate) content_length: Option<u64>,
    pub(crate) chunked: bool,
    pub(crate) location: Option<String>,
}

impl Headers {
    /// Parses header lines until the empty line that ends the header block.
    pub(crate) fn read<F>(mut next_line: F) -> Result<Self, SessionError>
    where
        F: FnMut() -> Result<String, SessionError>,
    {
        let mut headers = Self::default();
        for _ in 0..MAX_HEADERS {
            let line = next_line()?;
            if line.is_empty() {
                return Ok(headers);
            }
            headers.apply(&line)?;
        }
        Err(SessionError::Protocol(format!(
            "more than {MAX_HEADERS} header lines"
        )))
    }

    fn apply(&mut self, line: &str) -> Result<(), SessionError> {
        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| SessionError::Protocol(format!("malformed header '{line}'")))?;
        let name = name.trim();
        let value = value.trim();

        if name.eq_ignore_ascii_case("content-length") {
            let length = value.parse::<u64>().map_err(|_| {
                SessionError::Protocol(format!("invalid Content-Length '{value}'"))
            })?;
            self.content_length = Some(length);
        } else if name.eq_ignore_ascii_case("transfer-encoding") {
            self.chunked = value
                .rsplit(',')
                .next()
                .is_some_and(|coding| coding.trim().eq_ignore_ascii_case("chunked"));
        } else if name.eq_ignore_ascii_case("location") {
            self.location = Some(value.to_string());
        }
        Ok(())
    }
}
