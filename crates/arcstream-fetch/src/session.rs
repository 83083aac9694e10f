//! Protocol session: request handshake and record streaming.

use std::sync::Arc;

use arcstream_transport::{Interrupter, TlsSettings, Transport, TransportError, TransportKind};
use arcstream_types::{StreamKey, StreamSelector, TimeWindow};
use bytes::BytesMut;
use chrono::{DateTime, Utc};

use crate::body::BodyReader;
use crate::request::build_request;
use crate::response::{Headers, StatusLine};
use crate::{MseedDecoder, RecordDecoder, SessionConfig, SessionError, Source, SourceError};

/// Diagnostic text kept from an error response.
const MAX_DIAGNOSTIC_BYTES: usize = 64 * 1024;

#[derive(Debug)]
enum State {
    /// No handshake yet, or reconnect requested.
    Idle,
    /// Handshake done; records come from the body.
    Streaming(BodyReader),
    /// End of data or terminated by an error.
    Finished,
}

/// Cancels a session from another thread.
///
/// Closing is idempotent and safe while the owner thread is blocked in a pull;
/// the pull then ends the session.
#[derive(Debug, Clone)]
pub struct CloseHandle {
    interrupter: Arc<Interrupter>,
}

impl CloseHandle {
    /// Interrupts any blocked I/O of the session.
    pub fn close(&self) {
        self.interrupter.interrupt();
    }
}

/// A dataselect session over one transport.
///
/// The request is built additively (`set_source`, `add_stream`, time bounds)
/// and sent on the first pull. Each pull then returns one record in server
/// order. The transport is opened lazily and replaced when a redirect points
/// at a different scheme.
///
/// Only the first handshake after construction or [`reconnect`](Self::reconnect)
/// reports errors. Failures while streaming end the session quietly; use
/// [`try_reconnect`](Self::try_reconnect) to tell transient faults from fatal
/// ones.
#[derive(Debug)]
pub struct Session<D: RecordDecoder = MseedDecoder> {
    config: SessionConfig,
    decoder: D,
    tls: TlsSettings,
    interrupter: Arc<Interrupter>,
    transport: Transport,
    source: Option<Source>,
    selector: StreamSelector,
    state: State,
    pending: BytesMut,
    reconnect: bool,
}

impl Session {
    /// Creates a miniSEED session using the given transport kind.
    #[must_use]
    pub fn new(kind: TransportKind) -> Self {
        Self::with_decoder(kind, MseedDecoder::new())
    }
}

impl<D: RecordDecoder> Session<D> {
    /// Creates a session that decodes records with `decoder`.
    #[must_use]
    pub fn with_decoder(kind: TransportKind, decoder: D) -> Self {
        let interrupter = Arc::new(Interrupter::new());
        let config = SessionConfig::default();
        let tls = TlsSettings::default();
        let transport = new_transport(kind, &interrupter, &tls, &config);
        Self {
            config,
            decoder,
            tls,
            interrupter,
            transport,
            source: None,
            selector: StreamSelector::new(),
            state: State::Idle,
            pending: BytesMut::new(),
            reconnect: false,
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.transport.set_timeout(config.timeout_secs);
        self.config = config;
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns the kind of the current transport, which may change on redirect.
    #[must_use]
    pub const fn kind(&self) -> TransportKind {
        self.transport.kind()
    }

    /// Returns the current request target, which may change on redirect.
    #[must_use]
    pub const fn source(&self) -> Option<&Source> {
        self.source.as_ref()
    }

    /// Returns the stream selection.
    #[must_use]
    pub const fn selector(&self) -> &StreamSelector {
        &self.selector
    }

    /// Sets the request target from `host[:port][/path]`.
    ///
    /// # Errors
    ///
    /// Returns a [`SourceError`] if the address is invalid.
    pub fn set_source(&mut self, address: &str) -> Result<(), SourceError> {
        let source = Source::parse(address)?;
        tracing::debug!(%source, "Source set");
        self.source = Some(source);
        Ok(())
    }

    /// Adds a stream bounded by the global time window. Returns false if
    /// it was already present.
    pub fn add_stream(&mut self, network: &str, station: &str, location: &str, channel: &str) -> bool {
        self.selector
            .insert(StreamKey::new(network, station, location, channel))
    }

    /// Adds a stream with its own time bounds. Returns false if it was
    /// already present.
    pub fn add_stream_window(
        &mut self,
        network: &str,
        station: &str,
        location: &str,
        channel: &str,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> bool {
        self.selector.insert(
            StreamKey::new(network, station, location, channel).with_window(start, end),
        )
    }

    /// Removes every entry for the four codes. Returns true if any existed.
    pub fn remove_stream(
        &mut self,
        network: &str,
        station: &str,
        location: &str,
        channel: &str,
    ) -> bool {
        self.selector.remove(network, station, location, channel)
    }

    /// Sets the global start time.
    pub const fn set_start_time(&mut self, start: DateTime<Utc>) {
        self.selector.set_start(start);
    }

    /// Sets the global end time.
    pub const fn set_end_time(&mut self, end: DateTime<Utc>) {
        self.selector.set_end(end);
    }

    /// Sets both global time bounds.
    pub const fn set_time_window(&mut self, window: TimeWindow) {
        self.selector.set_window(window);
    }

    /// Sets the I/O wait budget in seconds; 0 disables it.
    pub fn set_timeout(&mut self, seconds: u64) {
        self.config.timeout_secs = seconds;
        self.transport.set_timeout(seconds);
    }

    /// Sets the TLS settings for secure transports created from now on.
    pub fn set_tls(&mut self, tls: TlsSettings) {
        self.tls = tls;
        if !self.transport.is_open() {
            self.transport = self.new_transport(self.transport.kind());
        }
    }

    /// Interrupts blocked I/O. Safe to call repeatedly, also after the
    /// session finished.
    pub fn close(&self) {
        self.interrupter.interrupt();
    }

    /// Returns a handle that closes the session from another thread.
    #[must_use]
    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            interrupter: Arc::clone(&self.interrupter),
        }
    }

    /// Drops the connection so the next pull repeats the handshake.
    ///
    /// Streams, time bounds and source are kept.
    pub fn reconnect(&mut self) {
        self.transport.close();
        self.transport = self.new_transport(self.transport.kind());
        self.pending.clear();
        self.state = State::Idle;
        self.reconnect = false;
    }

    /// Discards all streams and time bounds; the source is kept.
    pub fn clear(&mut self) {
        self.selector.clear();
    }

    /// Returns true if the session ended on a fault that a reconnect may fix.
    #[must_use]
    pub const fn try_reconnect(&self) -> bool {
        self.reconnect
    }

    /// Returns the next record.
    ///
    /// `Ok(None)` means the data ended, or the session was terminated by a
    /// streaming error; it stays `None` until [`reconnect`](Self::reconnect).
    ///
    /// # Errors
    ///
    /// Only the handshake fails with an error: connection, TLS, protocol and
    /// server errors, an exceeded redirect limit or an empty request.
    pub fn next_record(&mut self) -> Result<Option<D::Record>, SessionError> {
        if matches!(self.state, State::Finished) {
            return Ok(None);
        }
        self.transport.start_timer();

        if matches!(self.state, State::Idle) {
            match self.handshake() {
                Ok(body) => self.state = State::Streaming(body),
                Err(e) => {
                    self.finish();
                    return Err(e);
                }
            }
        }

        match self.pull() {
            Ok(Some(record)) => Ok(Some(record)),
            Ok(None) => {
                tracing::info!("End of data");
                self.finish();
                Ok(None)
            }
            Err(e) => {
                tracing::warn!("Session terminated: {e}");
                self.finish();
                Ok(None)
            }
        }
    }

    fn new_transport(&self, kind: TransportKind) -> Transport {
        new_transport(kind, &self.interrupter, &self.tls, &self.config)
    }

    /// Closes the transport, keeping its reconnect hint.
    fn finish(&mut self) {
        self.reconnect = self.transport.try_reconnect();
        self.transport.close();
        self.pending.clear();
        self.state = State::Finished;
    }

    /// Sends the request and follows redirects until a data or error response.
    fn handshake(&mut self) -> Result<BodyReader, SessionError> {
        let mut redirects = 0;
        loop {
            let source = self.source.clone().ok_or(SourceError::Missing)?;
            let (lines, skipped) = self.selector.request_lines(Utc::now());
            for key in skipped {
                tracing::warn!(stream = %key, "Skipping stream without start time");
            }
            if lines.is_empty() {
                return Err(SessionError::NoStreams);
            }
            let body = lines.concat();

            let kind = self.transport.kind();
            if !self.transport.is_open() {
                self.transport
                    .open(source.host(), source.port_or_default(kind))?;
            }

            tracing::info!(%source, %kind, streams = lines.len(), "Requesting data");
            let request = build_request(&source, &self.config.user_agent, &body);
            self.transport.write(request.as_bytes())?;

            let status = StatusLine::parse(&self.transport.read_line()?)?;
            let headers = Headers::read(|| self.transport.read_line().map_err(SessionError::from))?;
            tracing::debug!(
                status = status.code,
                reason = %status.reason,
                content_length = ?headers.content_length,
                chunked = headers.chunked,
                "Response received"
            );

            match status.code {
                200 => return BodyReader::for_data(&headers),
                204 => return Ok(BodyReader::empty()),
                _ if status.is_redirect() => {
                    let location = headers.location.ok_or_else(|| {
                        SessionError::Protocol(format!("{} response without Location", status.code))
                    })?;
                    redirects += 1;
                    if redirects > self.config.max_redirects {
                        return Err(SessionError::TooManyRedirects(self.config.max_redirects));
                    }
                    let (target_kind, target) = source.resolve_location(&location, kind)?;
                    tracing::info!(from = %source, to = %target, kind = %target_kind, "Following redirect");
                    self.switch_transport(target_kind)?;
                    self.source = Some(target);
                }
                code => {
                    let message = self.diagnostic(&headers);
                    let message = if message.is_empty() { status.reason } else { message };
                    return Err(SessionError::Server {
                        status: code,
                        message,
                    });
                }
            }
        }
    }

    /// Drops the current connection and, if the scheme changed, the transport.
    ///
    /// A replacement transport keeps the running wait budget of the pull.
    fn switch_transport(&mut self, kind: TransportKind) -> Result<(), SessionError> {
        if self.interrupter.is_interrupted() {
            return Err(TransportError::Cancelled.into());
        }
        self.transport.close();
        if kind != self.transport.kind() {
            let started = self.transport.timer_started();
            self.transport = self.new_transport(kind);
            self.transport.start_timer_at(started);
        }
        Ok(())
    }

    /// Reads an error response body as text.
    fn diagnostic(&mut self, headers: &Headers) -> String {
        let mut body = BodyReader::for_diagnostic(headers);
        let mut text = Vec::new();
        while text.len() < MAX_DIAGNOSTIC_BYTES {
            match body.read(&mut self.transport, 4096) {
                Ok(chunk) if chunk.is_empty() => break,
                Ok(chunk) => text.extend(chunk),
                Err(e) => {
                    tracing::debug!("Error body incomplete: {e}");
                    break;
                }
            }
        }
        String::from_utf8_lossy(&text).trim().to_string()
    }

    /// Slices the next record out of the body.
    fn pull(&mut self) -> Result<Option<D::Record>, SessionError> {
        let State::Streaming(body) = &mut self.state else {
            return Ok(None);
        };

        loop {
            if self.pending.is_empty() && body.is_done() {
                return Ok(None);
            }
            if self.pending.len() < D::PROBE_SIZE {
                let more = body.read(&mut self.transport, D::PROBE_SIZE - self.pending.len())?;
                self.pending.extend_from_slice(&more);
            }
            if self.pending.is_empty() {
                return Ok(None);
            }

            let length = match self.decoder.classify_length(&self.pending) {
                Ok(0) => {
                    tracing::warn!("Dropping record of zero length");
                    self.pending.clear();
                    continue;
                }
                Ok(length) => length,
                Err(e) => {
                    tracing::warn!("Dropping unrecognised record: {e}");
                    self.pending.clear();
                    continue;
                }
            };

            if length > self.pending.len() {
                let rest = body.read(&mut self.transport, length - self.pending.len())?;
                self.pending.extend_from_slice(&rest);
                if self.pending.len() < length {
                    tracing::warn!(
                        expected = length,
                        received = self.pending.len(),
                        "Body ended inside a record"
                    );
                    self.pending.clear();
                    continue;
                }
            }

            let bytes = self.pending.split_to(length).freeze();
            match self.decoder.parse(bytes) {
                Ok(record) => return Ok(Some(record)),
                Err(e) => tracing::warn!(length, "Dropping malformed record: {e}"),
            }
        }
    }
}

fn new_transport(
    kind: TransportKind,
    interrupter: &Arc<Interrupter>,
    tls: &TlsSettings,
    config: &SessionConfig,
) -> Transport {
    let mut transport = Transport::new(kind, Arc::clone(interrupter)).with_tls(tls.clone());
    transport.set_timeout(config.timeout_secs);
    transport
}

impl<D: RecordDecoder> Iterator for Session<D> {
    type Item = Result<D::Record, SessionError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}
