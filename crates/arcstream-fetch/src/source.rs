//! Service address parsing and redirect target resolution.

use arcstream_transport::TransportKind;
use thiserror::Error;

/// Path used when an address names none.
pub const DEFAULT_PATH: &str = "/fdsnws/dataselect/1/query";

/// Errors from parsing a service address or a redirect target.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// No source was set before the first pull.
    #[error("no source address set")]
    Missing,

    /// The address has no host part.
    #[error("empty host in address '{0}'")]
    EmptyHost(String),

    /// The port is not a number in 1..=65535.
    #[error("invalid port '{port}' in address '{address}'")]
    InvalidPort {
        /// The full address.
        address: String,
        /// The offending port text.
        port: String,
    },

    /// A redirect target uses a scheme other than `http` or `https`.
    #[error("unsupported scheme '{0}'")]
    UnsupportedScheme(String),

    /// A redirect target is neither absolute nor origin-relative.
    #[error("unsupported redirect target '{0}'")]
    UnsupportedLocation(String),
}

/// Where a session sends its request: `host[:port][/path]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    host: String,
    port: Option<u16>,
    path: String,
}

impl Source {
    /// Parses `host[:port][/path]`.
    ///
    /// IPv6 hosts must be bracketed (`[::1]:8080`). A missing path becomes
    /// [`DEFAULT_PATH`].
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::EmptyHost`] or [`SourceError::InvalidPort`].
    ///
    /// # Example
    ///
    /// ```
    /// use arcstream_fetch::Source;
    ///
    /// let source = Source::parse("service.example.org:8080").unwrap();
    /// assert_eq!(source.host(), "service.example.org");
    /// assert_eq!(source.port(), Some(8080));
    /// assert_eq!(source.path(), "/fdsnws/dataselect/1/query");
    /// ```
    pub fn parse(address: &str) -> Result<Self, SourceError> {
        Self::parse_with_default(address, DEFAULT_PATH)
    }

    fn parse_with_default(address: &str, default_path: &str) -> Result<Self, SourceError> {
        let address = address.trim();
        let (authority, path) = match address.find('/') {
            Some(i) => (&address[..i], &address[i..]),
            None => (address, ""),
        };

        let (host, port) = split_authority(authority);
        if host.is_empty() {
            return Err(SourceError::EmptyHost(address.to_string()));
        }

        let port = port
            .map(|p| match p.parse::<u16>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(SourceError::InvalidPort {
                    address: address.to_string(),
                    port: p.to_string(),
                }),
            })
            .transpose()?;

        let path = if path.is_empty() { default_path } else { path };

        Ok(Self {
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }

    /// Host name or address, without IPv6 brackets.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Explicit port, if the address named one.
    #[must_use]
    pub const fn port(&self) -> Option<u16> {
        self.port
    }

    /// Request path, including any query string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Port to connect to for the given transport kind.
    #[must_use]
    pub fn port_or_default(&self, kind: TransportKind) -> u16 {
        self.port.unwrap_or_else(|| kind.default_port())
    }

    /// `host` or `host:port`, as sent in the `Host` header.
    #[must_use]
    pub fn authority(&self) -> String {
        let host = if self.host.contains(':') {
            format!("[{}]", self.host)
        } else {
            self.host.clone()
        };
        match self.port {
            Some(port) => format!("{host}:{port}"),
            None => host,
        }
    }

    /// Resolves a `Location` header against this source.
    ///
    /// Absolute targets (`http://…`, `https://…`) carry their own transport
    /// kind. Origin-relative targets (`/path`) keep `kind`, host and port.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::UnsupportedScheme`] for other schemes,
    /// [`SourceError::UnsupportedLocation`] for relative paths without a
    /// leading slash and the [`parse`](Self::parse) errors for bad authorities.
    pub fn resolve_location(
        &self,
        location: &str,
        kind: TransportKind,
    ) -> Result<(TransportKind, Self), SourceError> {
        let location = location.trim();

        if let Some((scheme, rest)) = location.split_once("://") {
            let target_kind = TransportKind::from_scheme(scheme)
                .ok_or_else(|| SourceError::UnsupportedScheme(scheme.to_string()))?;
            return Ok((target_kind, Self::parse_with_default(rest, "/")?));
        }

        if location.starts_with('/') {
            let target = Self {
                host: self.host.clone(),
                port: self.port,
                path: location.to_string(),
            };
            return Ok((kind, target));
        }

        Err(SourceError::UnsupportedLocation(location.to_string()))
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.authority(), self.path)
    }
}

/// Splits an authority into host and optional port text.
fn split_authority(authority: &str) -> (&str, Option<&str>) {
    if let Some(rest) = authority.strip_prefix('[')
        && let Some((host, tail)) = rest.split_once(']')
    {
        return (host, tail.strip_prefix(':'));
    }

    match authority.split_once(':') {
        // Unbracketed IPv6 literal: no port.
        Some((_, port)) if port.contains(':') => (authority, None),
        Some((host, port)) => (host, Some(port)),
        None => (authority, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_only() {
        let source = Source::parse("example.org").unwrap();
        assert_eq!(source.host(), "example.org");
        assert_eq!(source.port(), None);
        assert_eq!(source.path(), DEFAULT_PATH);
        assert_eq!(source.port_or_default(TransportKind::Plain), 80);
        assert_eq!(source.port_or_default(TransportKind::Secure), 443);
        assert_eq!(source.authority(), "example.org");
    }

    #[test]
    fn test_parse_port_and_path() {
        let source = Source::parse("example.org:8080/custom/query?nodata=404").unwrap();
        assert_eq!(source.port(), Some(8080));
        assert_eq!(source.path(), "/custom/query?nodata=404");
        assert_eq!(source.authority(), "example.org:8080");
        assert_eq!(source.to_string(), "example.org:8080/custom/query?nodata=404");
    }

    #[test]
    fn test_parse_ipv6() {
        let source = Source::parse("[::1]:18000").unwrap();
        assert_eq!(source.host(), "::1");
        assert_eq!(source.port(), Some(18000));
        assert_eq!(source.authority(), "[::1]:18000");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(Source::parse(""), Err(SourceError::EmptyHost(_))));
        assert!(matches!(Source::parse(":80/x"), Err(SourceError::EmptyHost(_))));
        assert!(matches!(
            Source::parse("example.org:http"),
            Err(SourceError::InvalidPort { .. })
        ));
        assert!(matches!(
            Source::parse("example.org:0"),
            Err(SourceError::InvalidPort { .. })
        ));
        assert!(matches!(
            Source::parse("example.org:70000"),
            Err(SourceError::InvalidPort { .. })
        ));
    }

    #[test]
    fn test_resolve_absolute_location_switches_kind() {
        let source = Source::parse("old.example.org").unwrap();
        let (kind, target) = source
            .resolve_location("https://new.example.org:8443/fdsnws/dataselect/1/query", TransportKind::Plain)
            .unwrap();

        assert_eq!(kind, TransportKind::Secure);
        assert_eq!(target.host(), "new.example.org");
        assert_eq!(target.port(), Some(8443));
        assert_eq!(target.path(), "/fdsnws/dataselect/1/query");
    }

    #[test]
    fn test_resolve_absolute_location_without_path() {
        let source = Source::parse("old.example.org").unwrap();
        let (kind, target) = source
            .resolve_location("HTTP://new.example.org", TransportKind::Secure)
            .unwrap();

        assert_eq!(kind, TransportKind::Plain);
        assert_eq!(target.path(), "/");
    }

    #[test]
    fn test_resolve_relative_location_keeps_origin() {
        let source = Source::parse("example.org:8080").unwrap();
        let (kind, target) = source
            .resolve_location("/other/query", TransportKind::Secure)
            .unwrap();

        assert_eq!(kind, TransportKind::Secure);
        assert_eq!(target.authority(), "example.org:8080");
        assert_eq!(target.path(), "/other/query");
    }

    #[test]
    fn test_resolve_unsupported_locations() {
        let source = Source::parse("example.org").unwrap();
        assert!(matches!(
            source.resolve_location("ftp://example.org/x", TransportKind::Plain),
            Err(SourceError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            source.resolve_location("query", TransportKind::Plain),
            Err(SourceError::UnsupportedLocation(_))
        ));
    }
}
