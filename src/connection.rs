//! HTTP/1.0 request/response exchange over a single connection.
//!
//! A [`TimedConnection`] is opened for one call and discarded afterwards. The
//! request is written as-is, header names keep their case, and the response
//! body is left unread for the caller to frame.
//!
//! ```text
//!   connect ──▶ put_request ──▶ put_header* ──▶ end_headers ──▶ send
//!                                                                 │
//!                                   close ◀── get_file ◀── get_reply
//! ```

use std::fmt;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use http::{HeaderMap, HeaderName, HeaderValue, Version};

use crate::address::Scheme;
use crate::util::log_data;
use crate::Error;

/// Max number of headers to parse from an HTTP response
pub const MAX_RESPONSE_HEADERS: usize = 128;

/// Max length of the status line or of one header line, in bytes.
pub const MAX_LINE_LENGTH: usize = 65536;

/// Status reported when the peer sent something that is not a status line.
pub const MALFORMED_STATUS: i32 = -1;

/// Requests are always sent as HTTP/1.0.
const HTTP_VERSION: Version = Version::HTTP_10;

/// A byte stream to a peer.
pub trait Stream: Read + Write {}

impl<T: Read + Write> Stream for T {}

/// Opens streams for a scheme.
///
/// This is where secure transports plug in. The connector decides how `https`
/// and `httpg` streams are established.
pub trait Connector {
    /// Open a stream to `host` (`name` or `name:port`).
    ///
    /// The `timeout`, if any, must apply to connecting as well as every
    /// following read and write on the stream.
    fn connect(
        &self,
        scheme: Scheme,
        host: &str,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn Stream>, Error>;
}

/// Plain TCP connector. Only serves `http`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    fn connect(
        &self,
        scheme: Scheme,
        host: &str,
        timeout: Option<Duration>,
    ) -> Result<Box<dyn Stream>, Error> {
        if scheme != Scheme::Http {
            return Err(Error::NoConnector(scheme));
        }

        let (name, port) = split_host_port(host, scheme.default_port());

        // A zero timeout means no timeout.
        let timeout = timeout.filter(|t| !t.is_zero());

        let stream = match timeout {
            Some(t) => connect_timeout(name, port, t)?,
            None => TcpStream::connect((name, port))?,
        };

        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)?;

        debug!("Connected {}:{} (timeout: {:?})", name, port, timeout);

        Ok(Box::new(stream))
    }
}

fn connect_timeout(name: &str, port: u16, timeout: Duration) -> Result<TcpStream, Error> {
    let mut last_err = None;

    for addr in (name, port).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(v) => return Ok(v),
            Err(e) => last_err = Some(e),
        }
    }

    Err(last_err
        .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address for host"))
        .into())
}

/// Split `host:port`. Brackets of IPv6 literals are removed.
pub(crate) fn split_host_port(host: &str, default_port: u16) -> (&str, u16) {
    let bracket = host.rfind(']');
    let colon = host.rfind(':');

    let (name, port) = match (colon, bracket) {
        (Some(i), Some(j)) if i > j => (&host[..i], Some(&host[i + 1..])),
        (Some(i), None) => (&host[..i], Some(&host[i + 1..])),
        _ => (host, None),
    };

    let port = match port {
        Some("") => Some(default_port),
        Some(p) => p.parse().ok(),
        None => Some(default_port),
    };

    let Some(port) = port else {
        return (strip_brackets(host), default_port);
    };

    (strip_brackets(name), port)
}

fn strip_brackets(s: &str) -> &str {
    s.strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(s)
}

/// Status line and headers of a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// HTTP status, or [`MALFORMED_STATUS`].
    pub status: i32,
    /// Reason phrase, or the raw line when the status is malformed.
    pub reason: String,
    /// `None` when the status is malformed.
    pub headers: Option<HeaderMap>,
}

impl Reply {
    pub fn is_malformed(&self) -> bool {
        self.status == MALFORMED_STATUS
    }
}

/// A connection for exactly one request/response.
pub struct TimedConnection {
    host: String,
    timeout: Option<Duration>,
    sock: Option<Box<dyn Stream>>,
    prelude: Vec<u8>,
    file: Option<BufReader<Box<dyn Stream>>>,
}

impl TimedConnection {
    /// Create an unconnected connection to `host`.
    pub fn new(host: impl Into<String>, timeout: Option<Duration>) -> Self {
        TimedConnection {
            host: host.into(),
            timeout,
            sock: None,
            prelude: Vec::new(),
            file: None,
        }
    }

    /// Open the stream, optionally to another host than the one given in `new()`.
    pub fn connect(
        &mut self,
        connector: &dyn Connector,
        scheme: Scheme,
        host: Option<&str>,
    ) -> Result<(), Error> {
        if let Some(host) = host {
            self.host = host.to_string();
        }

        let sock = connector.connect(scheme, &self.host, self.timeout)?;

        self.sock = Some(sock);
        self.file = None;
        self.prelude.clear();

        Ok(())
    }

    /// Start the request with the request line.
    pub fn put_request(&mut self, method: &str, path: &str) -> Result<(), Error> {
        self.prelude.clear();
        write!(self.prelude, "{} {} {:?}\r\n", method, path, HTTP_VERSION)?;
        Ok(())
    }

    /// Add a header. The name is sent with its case intact.
    pub fn put_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        // Validate to not smuggle line breaks into the request.
        HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::BadHeader(e.to_string()))?;
        HeaderValue::from_str(value).map_err(|e| Error::BadHeader(e.to_string()))?;

        write!(self.prelude, "{}: {}\r\n", name, value)?;
        Ok(())
    }

    /// Finish the headers and flush them to the peer.
    pub fn end_headers(&mut self, loud: bool) -> Result<(), Error> {
        self.prelude.extend_from_slice(b"\r\n");

        log_data("Outgoing HTTP headers", &self.prelude, loud);

        let sock = self.sock.as_mut().ok_or_else(not_connected)?;
        sock.write_all(&self.prelude)?;
        sock.flush()?;

        self.prelude.clear();

        Ok(())
    }

    /// Send body data.
    pub fn send(&mut self, data: &[u8]) -> Result<(), Error> {
        let sock = self.sock.as_mut().ok_or_else(not_connected)?;
        sock.write_all(data)?;
        sock.flush()?;
        Ok(())
    }

    /// Read the status line and headers.
    ///
    /// A status line that does not parse is not an error. The stream is kept as
    /// the response file, the connection handle is dropped and the reply gets
    /// status [`MALFORMED_STATUS`] with the raw line as reason.
    ///
    /// A header line that does not parse ends the headers. It and the lines
    /// after it, up to the blank line, are skipped.
    ///
    /// Lines longer than [`MAX_LINE_LENGTH`] or more than
    /// [`MAX_RESPONSE_HEADERS`] header lines fail with [`Error::HttpParseFail`].
    pub fn get_reply(&mut self) -> Result<Reply, Error> {
        let sock = self.sock.take().ok_or_else(not_connected)?;
        let mut reader = BufReader::new(sock);

        let mut head = Vec::new();
        read_line(&mut reader, &mut head)?;

        if let Err(line) = check_status_line(&head) {
            debug!("Malformed status line: {:?}", line);
            self.file = Some(reader);
            return Ok(Reply {
                status: MALFORMED_STATUS,
                reason: line,
                headers: None,
            });
        }

        let mut line = Vec::new();
        let mut count = 0;
        let mut skipping = false;

        loop {
            line.clear();
            if read_line(&mut reader, &mut line)? == 0 {
                // Peer closed in the headers, take what we have.
                break;
            }
            if line == b"\r\n" || line == b"\n" {
                break;
            }

            count += 1;
            if count > MAX_RESPONSE_HEADERS {
                return Err(Error::HttpParseFail("too many headers".into()));
            }

            if skipping {
                continue;
            }
            if is_header_line(&line) {
                head.extend_from_slice(&line);
            } else {
                debug!(
                    "Skip headers from: {:?}",
                    String::from_utf8_lossy(&line).trim_end()
                );
                skipping = true;
            }
        }

        head.extend_from_slice(b"\r\n");

        let reply = parse_reply(&head)?;

        self.file = Some(reader);

        Ok(reply)
    }

    /// The response body stream, available after `get_reply()`.
    pub fn get_file(&mut self) -> Option<&mut dyn Read> {
        self.file.as_mut().map(|f| f as &mut dyn Read)
    }

    /// Drop the stream and any unread response.
    pub fn close(&mut self) {
        self.sock = None;
        self.file = None;
        self.prelude.clear();
    }
}

fn not_connected() -> Error {
    io::Error::from(io::ErrorKind::NotConnected).into()
}

/// Read up to and including `\n`, at most [`MAX_LINE_LENGTH`] bytes.
fn read_line(reader: &mut impl BufRead, buf: &mut Vec<u8>) -> Result<usize, Error> {
    let limit = MAX_LINE_LENGTH as u64 + 1;
    let n = reader.take(limit).read_until(b'\n', buf)?;

    if n > MAX_LINE_LENGTH {
        return Err(Error::HttpParseFail("line too long".into()));
    }

    Ok(n)
}

/// Whether a single line (with its line break) is a well formed header.
fn is_header_line(line: &[u8]) -> bool {
    let mut buf = Vec::with_capacity(line.len() + 2);
    buf.extend_from_slice(line);
    buf.extend_from_slice(b"\r\n");

    let mut headers = [httparse::EMPTY_HEADER; 1];
    matches!(
        httparse::parse_headers(&buf, &mut headers),
        Ok(httparse::Status::Complete(_))
    )
}

/// The raw line (without line break) if it is not an HTTP status line.
fn check_status_line(line: &[u8]) -> Result<(), String> {
    let mut no_headers: [httparse::Header; 0] = [];
    let mut res = httparse::Response::new(&mut no_headers);

    // A lone status line is a partial response.
    match res.parse(line) {
        Ok(_) if res.code.is_some() => Ok(()),
        _ => Err(String::from_utf8_lossy(line).trim_end().to_string()),
    }
}

fn parse_reply(head: &[u8]) -> Result<Reply, Error> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_RESPONSE_HEADERS];
    let mut res = httparse::Response::new(&mut headers);

    match res.parse(head) {
        Ok(httparse::Status::Complete(_)) => {}
        Ok(httparse::Status::Partial) => {
            return Err(Error::HttpParseFail("incomplete response head".into()))
        }
        Err(httparse::Error::TooManyHeaders) => {
            return Err(Error::HttpParseFail("too many headers".into()))
        }
        Err(e) => return Err(e.into()),
    }

    let mut map = HeaderMap::new();
    for h in res.headers.iter() {
        let name =
            HeaderName::from_bytes(h.name.as_bytes()).map_err(|e| Error::BadHeader(e.to_string()))?;
        let value = HeaderValue::from_bytes(h.value).map_err(|e| Error::BadHeader(e.to_string()))?;
        map.append(name, value);
    }

    Ok(Reply {
        status: res.code.map(i32::from).unwrap_or(MALFORMED_STATUS),
        reason: res.reason.unwrap_or_default().to_string(),
        headers: Some(map),
    })
}

impl fmt::Debug for TimedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedConnection")
            .field("host", &self.host)
            .field("timeout", &self.timeout)
            .field("connected", &self.sock.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::scenario::MockConnector;
    use std::str;

    fn exchange(response: &[u8]) -> (TimedConnection, Reply) {
        let connector = MockConnector::new().respond(response);
        let mut conn = TimedConnection::new("h.test", None);
        conn.connect(&connector, Scheme::Http, None).unwrap();
        conn.put_request("POST", "/").unwrap();
        conn.end_headers(false).unwrap();
        let reply = conn.get_reply().unwrap();
        (conn, reply)
    }

    #[test]
    fn request_prelude() {
        let connector = MockConnector::new().respond(b"HTTP/1.0 200 OK\r\n\r\n");

        let mut conn = TimedConnection::new("h.test", None);
        conn.connect(&connector, Scheme::Http, None).unwrap();
        conn.put_request("POST", "/rpc").unwrap();
        conn.put_header("Host", "h.test").unwrap();
        conn.put_header("SOAPAction", "\"\"").unwrap();
        conn.end_headers(false).unwrap();
        conn.send(b"<x/>").unwrap();
        conn.close();

        let sent = connector.requests();
        assert_eq!(
            str::from_utf8(&sent[0]).unwrap(),
            "POST /rpc HTTP/1.0\r\nHost: h.test\r\nSOAPAction: \"\"\r\n\r\n<x/>"
        );
    }

    #[test]
    fn header_with_line_break_is_rejected() {
        let mut conn = TimedConnection::new("h.test", None);
        conn.put_request("POST", "/").unwrap();
        let err = conn.put_header("X-Evil", "a\r\nHost: b").unwrap_err();
        assert!(matches!(err, Error::BadHeader(_)));
    }

    #[test]
    fn reply_and_body() {
        let (mut conn, reply) = exchange(
            b"HTTP/1.1 500 Internal Server Error\r\n\
            Content-Type: text/xml\r\n\
            Set-Cookie: a=1\r\n\
            Set-Cookie: b=2\r\n\
            \r\n\
            <fault/>",
        );

        assert_eq!(reply.status, 500);
        assert_eq!(reply.reason, "Internal Server Error");
        let headers = reply.headers.unwrap();
        assert_eq!(headers.get("content-type").unwrap(), "text/xml");
        assert_eq!(headers.get_all("set-cookie").iter().count(), 2);

        let mut body = Vec::new();
        conn.get_file().unwrap().read_to_end(&mut body).unwrap();
        assert_eq!(body, b"<fault/>");
    }

    #[test]
    fn malformed_status_line_salvages_stream() {
        let (mut conn, reply) = exchange(b"garbage here\r\n<xml/>");

        assert!(reply.is_malformed());
        assert_eq!(reply.status, -1);
        assert_eq!(reply.reason, "garbage here");
        assert!(reply.headers.is_none());

        let mut body = Vec::new();
        conn.get_file().unwrap().read_to_end(&mut body).unwrap();
        assert_eq!(body, b"<xml/>");
    }

    #[test]
    fn empty_response_is_malformed() {
        let (_, reply) = exchange(b"");
        assert!(reply.is_malformed());
        assert_eq!(reply.reason, "");
    }

    #[test]
    fn headers_cut_short() {
        let (mut conn, reply) = exchange(b"HTTP/1.0 200 OK\r\nContent-Length: 3\r\n");
        assert_eq!(reply.status, 200);
        assert_eq!(
            reply.headers.unwrap().get("content-length").unwrap(),
            "3"
        );
        assert!(conn.get_file().is_some());
    }

    #[test]
    fn headers_end_at_unparsable_line() {
        let (mut conn, reply) = exchange(
            b"HTTP/1.0 200 OK\r\n\
            Content-Type: text/xml\r\n\
            X-Junk\r\n\
            Content-Length: 5\r\n\
            \r\n\
            <ok/>",
        );

        assert_eq!(reply.status, 200);
        let headers = reply.headers.unwrap();
        assert_eq!(headers.get("content-type").unwrap(), "text/xml");
        assert!(headers.get("content-length").is_none());

        let mut body = Vec::new();
        conn.get_file().unwrap().read_to_end(&mut body).unwrap();
        assert_eq!(body, b"<ok/>");
    }

    #[test]
    fn line_at_limit_is_accepted() {
        let mut response = b"HTTP/1.0 200 OK\r\nX: ".to_vec();
        response.extend(std::iter::repeat(b'a').take(MAX_LINE_LENGTH - 5));
        response.extend_from_slice(b"\r\n\r\n");

        let (_, reply) = exchange(&response);
        let headers = reply.headers.unwrap();
        assert_eq!(headers.get("x").unwrap().len(), MAX_LINE_LENGTH - 5);
    }

    #[test]
    fn no_file_before_reply() {
        let mut conn = TimedConnection::new("h.test", None);
        assert!(conn.get_file().is_none());
    }

    #[test]
    fn reply_without_connect() {
        let mut conn = TimedConnection::new("h.test", None);
        let err = conn.get_reply().unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn host_port_splitting() {
        assert_eq!(split_host_port("h.test", 80), ("h.test", 80));
        assert_eq!(split_host_port("h.test:8080", 80), ("h.test", 8080));
        assert_eq!(split_host_port("h.test:", 80), ("h.test", 80));
        assert_eq!(split_host_port("[::1]:8080", 80), ("::1", 8080));
        assert_eq!(split_host_port("[::1]", 443), ("::1", 443));
    }

    #[test]
    fn tcp_connector_refuses_secure_schemes() {
        let err = TcpConnector
            .connect(Scheme::Https, "h.test", None)
            .err()
            .unwrap();
        assert!(matches!(err, Error::NoConnector(Scheme::Https)));
    }
}
