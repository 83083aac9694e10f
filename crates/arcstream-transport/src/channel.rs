//! Raw byte movement for the plain and TLS channel kinds.
//!
//! Every operation here is non-blocking and reports `WouldBlock` when the
//! socket is not ready; waiting is the transport's job.

use std::io::{self, Read as _, Write as _};
use std::net::Shutdown;

use mio::net::TcpStream;
use rustls::ClientConnection;

/// An established channel.
#[derive(Debug)]
pub(crate) enum Channel {
    Plain(TcpStream),
    Secure(Box<SecureChannel>),
}

/// TLS client state over a non-blocking socket.
#[derive(Debug)]
pub(crate) struct SecureChannel {
    tls: ClientConnection,
    sock: TcpStream,
}

impl SecureChannel {
    pub(crate) const fn new(tls: ClientConnection, sock: TcpStream) -> Self {
        Self { tls, sock }
    }

    /// Pushes buffered TLS records to the socket.
    fn flush_tls(&mut self) -> io::Result<()> {
        while self.tls.wants_write() {
            self.tls.write_tls(&mut self.sock)?;
        }
        Ok(())
    }

    fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut eof = false;
        loop {
            match self.tls.reader().read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock && eof => return Ok(0),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }

            // Key updates and alerts may be pending.
            match self.flush_tls() {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }

            if self.tls.read_tls(&mut self.sock)? == 0 {
                eof = true;
            }
            self.tls
                .process_new_packets()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        }
    }

    fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            let accepted = self.tls.writer().write(buf)?;
            match self.flush_tls() {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::WouldBlock && accepted == 0 => return Err(e),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }
            if accepted > 0 || buf.is_empty() {
                return Ok(accepted);
            }
        }
    }

    fn handshake(&mut self) -> io::Result<()> {
        while self.tls.is_handshaking() {
            self.tls.complete_io(&mut self.sock)?;
        }
        self.flush_tls()
    }
}

impl Channel {
    /// The socket registered with the transport's poll.
    pub(crate) fn socket_mut(&mut self) -> &mut TcpStream {
        match self {
            Self::Plain(sock) => sock,
            Self::Secure(c) => &mut c.sock,
        }
    }

    /// Reads available plaintext. `Ok(0)` means the peer closed the channel.
    pub(crate) fn recv(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Plain(sock) => sock.read(buf),
            Self::Secure(c) => c.recv(buf),
        }
    }

    /// Writes as much plaintext as the channel accepts without blocking.
    pub(crate) fn send(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Plain(sock) => sock.write(buf),
            Self::Secure(c) => c.send(buf),
        }
    }

    /// Completes delivery of everything accepted by [`send`](Self::send).
    pub(crate) fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(_) => Ok(()),
            Self::Secure(c) => c.flush_tls(),
        }
    }

    /// Advances the TLS handshake; plain channels are ready immediately.
    pub(crate) fn handshake(&mut self) -> io::Result<()> {
        match self {
            Self::Plain(_) => Ok(()),
            Self::Secure(c) => c.handshake(),
        }
    }

    /// Best-effort orderly shutdown.
    pub(crate) fn shutdown(&mut self) {
        if let Self::Secure(c) = self {
            c.tls.send_close_notify();
            let _ = c.flush_tls();
        }
        let _ = self.socket_mut().shutdown(Shutdown::Both);
    }
}
