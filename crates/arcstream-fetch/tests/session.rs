//! End-to-end session tests against in-process HTTP servers.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use arcstream_fetch::{DecodeError, RecordDecoder, Session, SessionConfig, SessionError};
use arcstream_transport::{TlsSettings, TransportError, TransportKind};
use byteorder::{BigEndian, ByteOrder};
use bytes::Bytes;
use chrono::{TimeZone, Utc};

/// One scripted reply: bytes written in `piece`-sized writes, then the
/// connection is held open for `hold` before closing.
struct Reply {
    bytes: Vec<u8>,
    piece: usize,
    hold: Duration,
}

impl Reply {
    fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            piece: usize::MAX,
            hold: Duration::ZERO,
        }
    }

    fn dribbled(mut self, piece: usize) -> Self {
        self.piece = piece;
        self
    }

    fn held(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    fn write_to<W: Write>(&self, out: &mut W) {
        for piece in self.bytes.chunks(self.piece.min(self.bytes.len()).max(1)) {
            if out.write_all(piece).is_err() {
                return;
            }
            let _ = out.flush();
            if self.piece != usize::MAX {
                std::thread::sleep(Duration::from_millis(2));
            }
        }
    }
}

/// Serves one reply per accepted connection and returns the requests seen.
fn serve(replies: Vec<Reply>) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = std::thread::spawn(move || {
        let mut requests = Vec::new();
        for reply in replies {
            let (mut sock, _) = listener.accept().unwrap();
            requests.push(read_request(&mut sock));
            reply.write_to(&mut sock);
            std::thread::sleep(reply.hold);
        }
        requests
    });
    (port, handle)
}

fn read_request<S: Read>(stream: &mut S) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        if let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            let head = String::from_utf8_lossy(&data[..end]).into_owned();
            let length = head
                .lines()
                .find_map(|l| l.strip_prefix("Content-Length: "))
                .map_or(0, |v| v.trim().parse::<usize>().unwrap());
            while data.len() < end + 4 + length {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                data.extend_from_slice(&buf[..n]);
            }
            return String::from_utf8_lossy(&data).into_owned();
        }
        let n = stream.read(&mut buf).unwrap();
        if n == 0 {
            return String::from_utf8_lossy(&data).into_owned();
        }
        data.extend_from_slice(&buf[..n]);
    }
}

/// A 512-byte big-endian miniSEED record with blockette 1000.
fn mseed_record(sequence: u32) -> Vec<u8> {
    let mut data = vec![0u8; 512];
    data[0..6].copy_from_slice(format!("{sequence:06}").as_bytes());
    data[6] = b'D';
    data[7] = b' ';
    data[8..13].copy_from_slice(b"APE  ");
    data[13..15].copy_from_slice(b"  ");
    data[15..18].copy_from_slice(b"BHZ");
    data[18..20].copy_from_slice(b"GE");
    BigEndian::write_u16(&mut data[20..22], 2024);
    BigEndian::write_u16(&mut data[22..24], 1);
    BigEndian::write_u16(&mut data[30..32], 100);
    BigEndian::write_i16(&mut data[32..34], 20);
    BigEndian::write_i16(&mut data[34..36], 1);
    data[39] = 1;
    BigEndian::write_u16(&mut data[44..46], 64);
    BigEndian::write_u16(&mut data[46..48], 48);
    BigEndian::write_u16(&mut data[48..50], 1000);
    data[52] = 11;
    data[53] = 1;
    data[54] = 9;
    data
}

fn records(sequences: &[u32]) -> Vec<u8> {
    sequences.iter().flat_map(|s| mseed_record(*s)).collect()
}

fn with_length(status: &str, body: &[u8]) -> Vec<u8> {
    let mut out = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/vnd.fdsn.mseed\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    out.extend_from_slice(body);
    out
}

fn chunked(chunks: &[&[u8]]) -> Vec<u8> {
    let mut out = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n".to_vec();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            out.extend_from_slice(format!("{:x};part=first\r\n", chunk.len()).as_bytes());
        } else {
            out.extend_from_slice(format!("{:X}\r\n", chunk.len()).as_bytes());
        }
        out.extend_from_slice(chunk);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b"0\r\n\r\n");
    out
}

fn redirect(status: &str, location: &str) -> Vec<u8> {
    format!("HTTP/1.1 {status}\r\nLocation: {location}\r\nContent-Length: 0\r\n\r\n").into_bytes()
}

fn session(port: u16) -> Session {
    let mut session = Session::new(TransportKind::Plain);
    session.set_source(&format!("127.0.0.1:{port}")).unwrap();
    session.set_timeout(10);
    session.add_stream("GE", "APE", "", "BHZ");
    session.set_start_time(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    session.set_end_time(Utc.with_ymd_and_hms(2024, 1, 1, 1, 0, 0).unwrap());
    session
}

fn sequences(session: &mut Session) -> Vec<u32> {
    let mut seen = Vec::new();
    while let Some(record) = session.next_record().unwrap() {
        seen.push(record.sequence);
    }
    seen
}

#[test]
fn test_three_records_with_content_length() {
    let mut reply = with_length("200 OK", &records(&[1, 2, 3]));
    reply.extend_from_slice(b"TRAILING BYTES OUTSIDE THE BODY");
    let (port, server) = serve(vec![Reply::new(reply).dribbled(100)]);

    let mut session = session(port);
    assert!(!session.add_stream("GE", "APE", "", "BHZ"));

    let first = session.next_record().unwrap().unwrap();
    assert_eq!(first.sequence, 1);
    assert_eq!(first.stream_id(), "GE.APE..BHZ");
    assert_eq!(first.len(), 512);
    assert_eq!(first.raw[..], mseed_record(1)[..]);

    assert_eq!(session.next_record().unwrap().unwrap().sequence, 2);
    assert_eq!(session.next_record().unwrap().unwrap().sequence, 3);
    assert!(session.next_record().unwrap().is_none());
    assert!(session.next_record().unwrap().is_none());
    assert!(!session.try_reconnect());

    let requests = server.join().unwrap();
    let body = "GE APE -- BHZ 2024-01-01T00:00:00.000000 2024-01-01T01:00:00.000000\r\n";
    assert_eq!(
        requests[0],
        format!(
            "POST /fdsnws/dataselect/1/query HTTP/1.1\r\n\
             Host: 127.0.0.1:{port}\r\n\
             User-Agent: {}\r\n\
             Content-Type: text/plain\r\n\
             Content-Length: {}\r\n\r\n{body}",
            SessionConfig::default().user_agent,
            body.len()
        )
    );
}

#[test]
fn test_chunked_body() {
    let body = records(&[1, 2, 3]);
    let reply = chunked(&[&body[..100], &body[100..512], &body[512..]]);
    let (port, server) = serve(vec![Reply::new(reply).dribbled(37)]);

    let mut session = session(port);
    assert_eq!(sequences(&mut session), vec![1, 2, 3]);
    server.join().unwrap();
}

#[test]
fn test_no_content_ends_immediately() {
    let (port, server) = serve(vec![
        Reply::new(b"HTTP/1.1 204 No Content\r\n\r\n".to_vec()),
        Reply::new(with_length("200 OK", b"")),
    ]);

    let mut session = session(port);
    assert!(session.next_record().unwrap().is_none());

    session.reconnect();
    assert!(session.next_record().unwrap().is_none());
    server.join().unwrap();
}

#[test]
fn test_invalid_chunk_size_ends_session() {
    let reply = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\nzz\r\n".to_vec();
    let (port, server) = serve(vec![Reply::new(reply).held(Duration::from_secs(2))]);

    let mut session = session(port);
    let started = Instant::now();
    assert!(session.next_record().unwrap().is_none());
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(session.next_record().unwrap().is_none());
    server.join().unwrap();
}

#[test]
fn test_unrecognised_record_is_skipped() {
    let mut body = mseed_record(1);
    body.extend(vec![b'?'; 512]);
    body.extend(mseed_record(2));
    let (port, server) = serve(vec![Reply::new(with_length("200 OK", &body))]);

    let mut session = session(port);
    assert_eq!(sequences(&mut session), vec![1, 2]);
    server.join().unwrap();
}

/// Records are `[length, tag, tag...]`; a `!` tag fails to parse. Every slice
/// handed to `parse` is logged by length.
#[derive(Debug, Default)]
struct TaggedDecoder {
    parsed: Arc<Mutex<Vec<usize>>>,
}

impl RecordDecoder for TaggedDecoder {
    type Record = char;

    const PROBE_SIZE: usize = 16;

    fn classify_length(&self, probe: &[u8]) -> Result<usize, DecodeError> {
        probe
            .first()
            .map(|&length| usize::from(length))
            .ok_or(DecodeError::TooShort { needed: 1, got: 0 })
    }

    fn parse(&self, bytes: Bytes) -> Result<char, DecodeError> {
        self.parsed.lock().unwrap().push(bytes.len());
        assert_eq!(usize::from(bytes[0]), bytes.len());
        match bytes[1] {
            b'!' => Err(DecodeError::InvalidSequence),
            tag => Ok(char::from(tag)),
        }
    }
}

fn tagged(length: u8, tag: u8) -> Vec<u8> {
    let mut record = vec![tag; usize::from(length)];
    record[0] = length;
    record
}

#[test]
fn test_custom_decoder_slices_every_record() {
    let body: Vec<u8> = [(16, b'a'), (4, b'b'), (32, b'!'), (16, b'c'), (8, b'd')]
        .into_iter()
        .flat_map(|(length, tag)| tagged(length, tag))
        .collect();
    let (port, server) = serve(vec![Reply::new(with_length("200 OK", &body)).dribbled(7)]);

    let decoder = TaggedDecoder::default();
    let parsed = Arc::clone(&decoder.parsed);
    let mut session = Session::with_decoder(TransportKind::Plain, decoder);
    session.set_source(&format!("127.0.0.1:{port}")).unwrap();
    session.set_timeout(10);
    session.add_stream("GE", "APE", "", "BHZ");
    session.set_start_time(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());

    let mut tags = String::new();
    while let Some(tag) = session.next_record().unwrap() {
        tags.push(tag);
    }

    assert_eq!(tags, "abcd");
    assert_eq!(*parsed.lock().unwrap(), vec![16, 4, 32, 16, 8]);
    assert!(!session.try_reconnect());
    assert!(session.next_record().unwrap().is_none());
    server.join().unwrap();
}

#[test]
fn test_server_error_surfaces_message() {
    let (port, server) = serve(vec![Reply::new(with_length(
        "500 Internal Server Error",
        b"Error 500: database unavailable\n",
    ))]);

    let mut session = session(port);
    match session.next_record() {
        Err(SessionError::Server { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "Error 500: database unavailable");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(session.next_record().unwrap().is_none());
    server.join().unwrap();
}

#[test]
fn test_server_error_body_until_close() {
    let (port, server) = serve(vec![Reply::new(
        b"HTTP/1.1 404 Not Found\r\n\r\nno data for request".to_vec(),
    )]);

    let mut session = session(port);
    match session.next_record() {
        Err(SessionError::Server { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "no data for request");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    server.join().unwrap();
}

#[test]
fn test_relative_redirect_changes_path() {
    let (port, server) = serve(vec![
        Reply::new(redirect("307 Temporary Redirect", "/mirror/query")),
        Reply::new(with_length("200 OK", &records(&[5]))),
    ]);

    let mut session = session(port);
    assert_eq!(sequences(&mut session), vec![5]);
    assert_eq!(session.source().unwrap().path(), "/mirror/query");

    let requests = server.join().unwrap();
    assert!(requests[0].starts_with("POST /fdsnws/dataselect/1/query HTTP/1.1\r\n"));
    assert!(requests[1].starts_with("POST /mirror/query HTTP/1.1\r\n"));
}

#[test]
fn test_redirect_limit() {
    let (port, server) = serve(vec![
        Reply::new(redirect("302 Found", "/a")),
        Reply::new(redirect("302 Found", "/b")),
        Reply::new(redirect("302 Found", "/c")),
    ]);

    let mut session = session(port).with_config(SessionConfig {
        timeout_secs: 10,
        max_redirects: 2,
        ..SessionConfig::default()
    });
    assert!(matches!(
        session.next_record(),
        Err(SessionError::TooManyRedirects(2))
    ));
    assert_eq!(server.join().unwrap().len(), 3);
}

#[test]
fn test_silent_server_times_out() {
    let (port, server) = serve(vec![Reply::new(Vec::new()).held(Duration::from_secs(3))]);

    let mut session = session(port);
    session.set_timeout(1);

    let started = Instant::now();
    let result = session.next_record();
    let elapsed = started.elapsed();

    assert!(
        matches!(result, Err(SessionError::Transport(TransportError::Timeout))),
        "{result:?}"
    );
    assert!(elapsed >= Duration::from_millis(900), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(2500), "{elapsed:?}");
    assert!(session.try_reconnect());
    server.join().unwrap();
}

#[test]
fn test_close_from_other_thread_unblocks_pull() {
    let mut partial = with_length("200 OK", &records(&[1, 2, 3]));
    partial.truncate(partial.len() - 1024);
    let (port, server) = serve(vec![
        Reply::new(partial).held(Duration::from_secs(2)),
        Reply::new(with_length("200 OK", &records(&[7, 8]))),
    ]);

    let mut session = session(port);
    session.set_timeout(0);
    assert_eq!(session.next_record().unwrap().unwrap().sequence, 1);

    let handle = session.close_handle();
    let closer = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(100));
        handle.close();
        handle.close();
    });

    let started = Instant::now();
    assert!(session.next_record().unwrap().is_none());
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!session.try_reconnect());
    closer.join().unwrap();

    session.close();
    assert!(session.next_record().unwrap().is_none());

    session.reconnect();
    session.set_timeout(10);
    assert_eq!(sequences(&mut session), vec![7, 8]);
    server.join().unwrap();
}

#[test]
fn test_iterator_yields_records() {
    let (port, server) = serve(vec![Reply::new(with_length("200 OK", &records(&[1, 2])))]);

    let collected: Vec<_> = session(port).map(|r| r.unwrap().sequence).collect();
    assert_eq!(collected, vec![1, 2]);
    server.join().unwrap();
}

#[test]
fn test_redirect_to_https_switches_transport() {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let cert_der = certified.cert.der().clone();
    let key_der = rustls::pki_types::PrivateKeyDer::Pkcs8(
        rustls::pki_types::PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()),
    );

    let server_config = Arc::new(
        rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(vec![cert_der.clone()], key_der)
            .unwrap(),
    );
    let mut roots = rustls::RootCertStore::empty();
    roots.add(cert_der).unwrap();
    let client_config = Arc::new(
        rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth(),
    );

    let tls_listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let tls_port = tls_listener.local_addr().unwrap().port();
    let tls_server = std::thread::spawn(move || {
        let (sock, _) = tls_listener.accept().unwrap();
        let conn = rustls::ServerConnection::new(server_config).unwrap();
        let mut stream = rustls::StreamOwned::new(conn, sock);
        let request = read_request(&mut stream);
        Reply::new(with_length("200 OK", &records(&[1, 2, 3])))
            .dribbled(300)
            .write_to(&mut stream);
        stream.conn.send_close_notify();
        let _ = stream.flush();
        request
    });

    let location = format!("https://localhost:{tls_port}/fdsnws/dataselect/1/query");
    let (port, plain_server) = serve(vec![Reply::new(redirect("302 Found", &location))]);

    let mut session = session(port);
    session.set_tls(TlsSettings::with_config(client_config));
    assert_eq!(session.kind(), TransportKind::Plain);

    assert_eq!(sequences(&mut session), vec![1, 2, 3]);
    assert_eq!(session.kind(), TransportKind::Secure);
    assert_eq!(session.source().unwrap().host(), "localhost");

    plain_server.join().unwrap();
    let request = tls_server.join().unwrap();
    assert!(request.starts_with(&format!(
        "POST /fdsnws/dataselect/1/query HTTP/1.1\r\nHost: localhost:{tls_port}\r\n"
    )));
    assert!(request.ends_with("GE APE -- BHZ 2024-01-01T00:00:00.000000 2024-01-01T01:00:00.000000\r\n"));
}
