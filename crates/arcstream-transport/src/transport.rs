//! Buffered blocking transport over plain TCP or TLS.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Token, Waker};
use rustls::ClientConnection;
use rustls::pki_types::ServerName;

use crate::buffer::RecvBuffer;
use crate::channel::{Channel, SecureChannel};
use crate::{Interrupter, TlsSettings, TransportError};

/// Capacity of the receive buffer, which also bounds the length of a line.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

const SOCKET: Token = Token(0);
const WAKE: Token = Token(1);

/// The kind of channel a transport establishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportKind {
    /// Plain TCP.
    #[default]
    Plain,
    /// TLS over TCP.
    Secure,
}

impl TransportKind {
    /// Maps a URL scheme (`http`, `https`) to a transport kind.
    #[must_use]
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "http" => Some(Self::Plain),
            "https" => Some(Self::Secure),
            _ => None,
        }
    }

    /// Returns the URL scheme of this kind.
    #[must_use]
    pub const fn scheme(&self) -> &'static str {
        match self {
            Self::Plain => "http",
            Self::Secure => "https",
        }
    }

    /// Returns the port used when an address does not name one.
    #[must_use]
    pub const fn default_port(&self) -> u16 {
        match self {
            Self::Plain => 80,
            Self::Secure => 443,
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.scheme())
    }
}

/// Readiness multiplexer for one channel: the socket plus the interrupt waker.
#[derive(Debug)]
struct Poller {
    poll: Poll,
    events: Events,
}

impl Poller {
    /// Creates the poll and arms `interrupter` with its waker.
    fn new(interrupter: &Interrupter) -> io::Result<Self> {
        let poll = Poll::new()?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKE)?);
        interrupter.arm(waker);
        Ok(Self {
            poll,
            events: Events::with_capacity(8),
        })
    }

    /// Blocks until the socket or the waker fires, or the deadline passes.
    ///
    /// Returning `Ok` does not guarantee readiness; callers retry their
    /// operation and come back here on `WouldBlock`.
    fn wait(
        &mut self,
        deadline: Option<Instant>,
        interrupter: &Interrupter,
    ) -> Result<(), TransportError> {
        if interrupter.is_interrupted() {
            return Err(TransportError::Cancelled);
        }

        let timeout = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return Err(TransportError::Timeout);
                }
                Some(deadline - now)
            }
            None => None,
        };

        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(TransportError::Io(e)),
        }

        if interrupter.is_interrupted() {
            return Err(TransportError::Cancelled);
        }
        Ok(())
    }
}

/// An open channel together with its poller.
#[derive(Debug)]
struct Connection {
    poller: Poller,
    channel: Channel,
    peer: SocketAddr,
}

/// A buffered, timeout-bound, cancellable byte channel.
///
/// Calls block the owner thread. Any other thread holding the transport's
/// [`Interrupter`] can cancel a blocked call, which then fails with
/// [`TransportError::Cancelled`].
///
/// The timeout is a budget shared by all waits since the last
/// [`start_timer`](Self::start_timer), not a per-call limit.
#[derive(Debug)]
pub struct Transport {
    kind: TransportKind,
    tls: TlsSettings,
    conn: Option<Connection>,
    buffer: RecvBuffer,
    timeout: Option<Duration>,
    timer: Instant,
    interrupter: Arc<Interrupter>,
    reconnect: bool,
    bytes_read: u64,
    bytes_written: u64,
}

impl Transport {
    /// Creates a closed transport of the given kind.
    #[must_use]
    pub fn new(kind: TransportKind, interrupter: Arc<Interrupter>) -> Self {
        Self {
            kind,
            tls: TlsSettings::default(),
            conn: None,
            buffer: RecvBuffer::new(DEFAULT_BUFFER_SIZE),
            timeout: None,
            timer: Instant::now(),
            interrupter,
            reconnect: false,
            bytes_read: 0,
            bytes_written: 0,
        }
    }

    /// Sets the TLS settings used by secure transports.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsSettings) -> Self {
        self.tls = tls;
        self
    }

    /// Returns the channel kind.
    #[must_use]
    pub const fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Returns the handle that cancels blocked calls.
    #[must_use]
    pub const fn interrupter(&self) -> &Arc<Interrupter> {
        &self.interrupter
    }

    /// Sets the wait budget in seconds; 0 disables it.
    pub fn set_timeout(&mut self, seconds: u64) {
        self.timeout = (seconds > 0).then(|| Duration::from_secs(seconds));
    }

    /// Returns the configured wait budget.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Resets the reference point the wait budget is measured from.
    pub fn start_timer(&mut self) {
        self.timer = Instant::now();
    }

    /// Measures the wait budget from `started`, e.g. to carry a running budget
    /// over to a replacement transport.
    pub const fn start_timer_at(&mut self, started: Instant) {
        self.timer = started;
    }

    /// Returns the reference point of the wait budget.
    #[must_use]
    pub const fn timer_started(&self) -> Instant {
        self.timer
    }

    fn deadline(&self) -> Option<Instant> {
        self.timeout.map(|timeout| self.timer + timeout)
    }

    /// Returns true while a channel is established.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Returns true if the last failure suggests reopening the channel.
    #[must_use]
    pub const fn try_reconnect(&self) -> bool {
        self.reconnect
    }

    /// Total bytes received since the transport was created.
    #[must_use]
    pub const fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Total bytes sent since the transport was created.
    #[must_use]
    pub const fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Flags cancellation and wakes a blocked call. Same as calling
    /// [`Interrupter::interrupt`] on [`interrupter`](Self::interrupter).
    pub fn interrupt(&self) {
        self.interrupter.interrupt();
    }

    /// Resolves `host`, connects and, for secure transports, completes the TLS
    /// handshake, all within the current wait budget.
    ///
    /// An already open channel is closed first.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Resolve`] if the host does not resolve,
    /// [`TransportError::Connect`] if no address accepts the connection in
    /// time, [`TransportError::Tls`] on certificate or protocol failures and
    /// [`TransportError::Cancelled`] if interrupted.
    pub fn open(&mut self, host: &str, port: u16) -> Result<(), TransportError> {
        if self.is_open() {
            self.close();
        }

        match self.connect(host, port) {
            Ok(conn) => {
                tracing::debug!(peer = %conn.peer, kind = %self.kind, "transport open");
                self.conn = Some(conn);
                Ok(())
            }
            Err(e) => {
                self.interrupter.disarm();
                Err(self.note(e))
            }
        }
    }

    fn connect(&self, host: &str, port: u16) -> Result<Connection, TransportError> {
        if self.interrupter.is_interrupted() {
            return Err(TransportError::Cancelled);
        }

        let resolve_error = |source| TransportError::Resolve {
            host: host.to_string(),
            source,
        };
        let addrs: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(resolve_error)?
            .collect();
        if addrs.is_empty() {
            return Err(resolve_error(io::Error::new(
                io::ErrorKind::NotFound,
                "no addresses",
            )));
        }

        let mut last_error = None;
        for addr in addrs {
            match self.connect_addr(host, addr) {
                Ok(conn) => return Ok(conn),
                Err(e @ (TransportError::Cancelled | TransportError::Tls(_))) => return Err(e),
                Err(e) => {
                    tracing::debug!("Connecting to {addr} failed: {e}");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(TransportError::NotOpen))
    }

    fn connect_addr(&self, host: &str, addr: SocketAddr) -> Result<Connection, TransportError> {
        let deadline = self.deadline();
        let connect_error = |source| TransportError::Connect {
            addr: addr.to_string(),
            source,
        };
        let wait_error = |e| match e {
            TransportError::Timeout => connect_error(io::Error::new(
                io::ErrorKind::TimedOut,
                "connection timed out",
            )),
            TransportError::Io(source) => connect_error(source),
            other => other,
        };

        let mut poller = Poller::new(&self.interrupter)?;
        let mut sock = TcpStream::connect(addr).map_err(connect_error)?;
        poller
            .poll
            .registry()
            .register(&mut sock, SOCKET, Interest::READABLE | Interest::WRITABLE)?;

        loop {
            poller
                .wait(deadline, &self.interrupter)
                .map_err(wait_error)?;
            if let Some(e) = sock.take_error()? {
                return Err(connect_error(e));
            }
            match sock.peer_addr() {
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::NotConnected => {}
                Err(e) => return Err(connect_error(e)),
            }
        }
        let _ = sock.set_nodelay(true);

        let channel = match self.kind {
            TransportKind::Plain => Channel::Plain(sock),
            TransportKind::Secure => {
                let name = ServerName::try_from(host.to_string())
                    .map_err(|e| TransportError::Tls(e.to_string()))?;
                let tls = ClientConnection::new(self.tls.client_config(), name)
                    .map_err(|e| TransportError::Tls(e.to_string()))?;
                Channel::Secure(Box::new(SecureChannel::new(tls, sock)))
            }
        };

        let mut conn = Connection {
            poller,
            channel,
            peer: addr,
        };
        loop {
            match conn.channel.handshake() {
                Ok(()) => break,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => conn
                    .poller
                    .wait(deadline, &self.interrupter)
                    .map_err(wait_error)?,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    return Err(TransportError::Tls(e.to_string()));
                }
                Err(e) => return Err(connect_error(e)),
            }
        }

        Ok(conn)
    }

    /// Releases the channel and clears the cancellation and reconnect flags.
    ///
    /// Closing a closed transport does nothing harmful.
    pub fn close(&mut self) {
        self.release();
        self.interrupter.reset();
        self.reconnect = false;
    }

    /// Drops the channel but keeps the flags, so a failure stays observable.
    fn release(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.channel.shutdown();
            tracing::debug!(peer = %conn.peer, "transport closed");
        }
        self.interrupter.disarm();
        self.buffer.clear();
    }

    /// Records the reconnect hint of `err` and drops dead channels.
    fn note(&mut self, err: TransportError) -> TransportError {
        if err.suggests_reconnect() {
            self.reconnect = true;
        }
        if matches!(err, TransportError::Closed | TransportError::Io(_)) {
            self.release();
        }
        err
    }

    /// Reads more bytes into the buffer, blocking until at least one arrives.
    fn fill(&mut self) -> Result<(), TransportError> {
        let deadline = self.deadline();
        let conn = self.conn.as_mut().ok_or(TransportError::NotOpen)?;
        if self.interrupter.is_interrupted() {
            return Err(TransportError::Cancelled);
        }

        self.buffer.compact();
        loop {
            match conn.channel.recv(self.buffer.spare_mut()) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => {
                    self.buffer.commit(n);
                    self.bytes_read += n as u64;
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    conn.poller.wait(deadline, &self.interrupter)?;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Err(TransportError::Closed);
                }
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
    }

    /// Reads exactly `n` bytes.
    ///
    /// # Errors
    ///
    /// Fails with [`TransportError::Closed`] if the peer closes first,
    /// [`TransportError::Timeout`] when the budget runs out and
    /// [`TransportError::Cancelled`] when interrupted.
    pub fn read(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
        let mut out = Vec::with_capacity(n);
        while out.len() < n {
            if self.buffer.is_empty() {
                if let Err(e) = self.fill() {
                    return Err(self.note(e));
                }
                continue;
            }
            let take = (n - out.len()).min(self.buffer.len());
            out.extend_from_slice(&self.buffer.available()[..take]);
            self.buffer.consume(take);
        }
        Ok(out)
    }

    /// Reads at least one and at most `max` bytes.
    ///
    /// # Errors
    ///
    /// Fails like [`read`](Self::read).
    pub fn read_some(&mut self, max: usize) -> Result<Vec<u8>, TransportError> {
        if max == 0 {
            return Ok(Vec::new());
        }
        if self.buffer.is_empty()
            && let Err(e) = self.fill()
        {
            return Err(self.note(e));
        }
        let take = max.min(self.buffer.len());
        let out = self.buffer.available()[..take].to_vec();
        self.buffer.consume(take);
        Ok(out)
    }

    /// Reads one line terminated by `\n`, without the terminator and without a
    /// preceding `\r`.
    ///
    /// # Errors
    ///
    /// Fails like [`read`](Self::read), and with
    /// [`TransportError::LineTooLong`] if no terminator arrives before the
    /// receive buffer is full.
    pub fn read_line(&mut self) -> Result<String, TransportError> {
        let mut scanned = 0;
        loop {
            let available = self.buffer.available();
            if let Some(pos) = available[scanned..].iter().position(|&b| b == b'\n') {
                let end = scanned + pos;
                let line = available[..end]
                    .strip_suffix(b"\r")
                    .unwrap_or(&available[..end]);
                let text = String::from_utf8_lossy(line).into_owned();
                self.buffer.consume(end + 1);
                return Ok(text);
            }
            scanned = available.len();

            if self.buffer.is_full() {
                let err = TransportError::LineTooLong(self.buffer.capacity());
                return Err(self.note(err));
            }
            if let Err(e) = self.fill() {
                return Err(self.note(e));
            }
        }
    }

    /// Writes all of `data`, blocking until the channel has taken it.
    ///
    /// # Errors
    ///
    /// Fails with [`TransportError::Io`] on socket errors,
    /// [`TransportError::Timeout`] when the budget runs out and
    /// [`TransportError::Cancelled`] when interrupted.
    pub fn write(&mut self, data: &[u8]) -> Result<(), TransportError> {
        match self.write_all(data) {
            Ok(()) => Ok(()),
            Err(e) => Err(self.note(e)),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let deadline = self.deadline();
        let conn = self.conn.as_mut().ok_or(TransportError::NotOpen)?;

        let mut written = 0;
        while written < data.len() {
            if self.interrupter.is_interrupted() {
                return Err(TransportError::Cancelled);
            }
            match conn.channel.send(&data[written..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    conn.poller.wait(deadline, &self.interrupter)?;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(TransportError::Io(e)),
            }
        }

        loop {
            match conn.channel.flush() {
                Ok(()) => break,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    conn.poller.wait(deadline, &self.interrupter)?;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(TransportError::Io(e)),
            }
        }

        self.bytes_written += data.len() as u64;
        Ok(())
    }
}
