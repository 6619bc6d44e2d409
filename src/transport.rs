//! One SOAP request/response exchange over HTTP.
//!
//! The [`HttpTransport`] runs these steps for every call:
//!
//! * **Connect** - resolve the target, pick the connector for the scheme and
//!   open a [`TimedConnection`] (to the forwarding proxy if there is one).
//! * **SendRequest** - `POST` with `Host`, `User-agent`, `Content-type`,
//!   `Content-length`, the cookie jar, basic auth and `SOAPAction`.
//! * **SendBody** - the envelope bytes.
//! * **RecvResponse** - status line and headers. A malformed status line is
//!   not an error at this point.
//! * **RecvBody** - framed by `Content-Length` if it can be parsed, otherwise
//!   read until the peer closes.
//! * **Cookies** - the jar is replaced by the response's `Set-Cookie` headers.
//! * **Classify** - `200` is a result, `500` with an XML body carries a fault,
//!   anything else is [`Error::Http`].
//!
//! # Out of scope:
//!
//! * Connection reuse
//! * `transfer-encoding: chunked`
//! * Redirects

use std::fmt;
use std::io::Read;
use std::time::Duration;

use base64::prelude::BASE64_STANDARD;
use base64::Engine;
use http::{header, HeaderMap};
use regex::bytes::Regex;

use crate::address::Address;
use crate::connection::{Connector, TcpConnector, TimedConnection};
use crate::cookie::CookieJar;
use crate::util::{log_data, starts_with_ignore_case};
use crate::{Config, Error};

/// Where to send a request.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// A locator that still needs to be resolved.
    Locator(&'a str),
    /// An already resolved address.
    Address(&'a Address),
}

impl<'a> From<&'a str> for Target<'a> {
    fn from(value: &'a str) -> Self {
        Target::Locator(value)
    }
}

impl<'a> From<&'a Address> for Target<'a> {
    fn from(value: &'a Address) -> Self {
        Target::Address(value)
    }
}

/// Input to one [`Transport::call`].
#[derive(Debug, Clone, Copy)]
pub struct TransportRequest<'a> {
    pub target: Target<'a>,
    /// Encoded envelope.
    pub data: &'a [u8],
    /// Namespace to look for an extended version of in the response.
    pub namespace: Option<&'a str>,
    pub soap_action: Option<&'a str>,
    /// Charset of `data`, sent in the content type.
    pub encoding: Option<&'a str>,
    /// Forwarding proxy as `host[:port]`.
    pub http_proxy: Option<&'a str>,
    pub timeout: Option<Duration>,
}

impl<'a> TransportRequest<'a> {
    pub fn new(target: impl Into<Target<'a>>, data: &'a [u8]) -> Self {
        TransportRequest {
            target: target.into(),
            data,
            namespace: None,
            soap_action: None,
            encoding: None,
            http_proxy: None,
            timeout: None,
        }
    }
}

/// Output of one [`Transport::call`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    /// Response body.
    pub data: Vec<u8>,
    /// The request namespace, or the extension of it declared in the response.
    pub namespace: Option<String>,
}

/// Performs exactly one request/response exchange per call.
pub trait Transport {
    fn call(
        &mut self,
        request: &TransportRequest<'_>,
        config: &Config,
    ) -> Result<TransportResponse, Error>;
}

/// A received response, framed.
#[derive(Debug, Clone)]
pub struct ResponseFrame {
    /// HTTP status, `-1` if the status line was malformed.
    pub status: i32,
    pub reason: String,
    /// `None` if the status line was malformed.
    pub headers: Option<HeaderMap>,
    /// Parsed `Content-Length`, `None` if absent or unparseable.
    pub content_length: Option<u64>,
    pub body: Vec<u8>,
}

impl ResponseFrame {
    /// Declared length, or the length actually read when none was declared.
    pub fn body_length(&self) -> u64 {
        self.content_length.unwrap_or(self.body.len() as u64)
    }

    /// Raw content type. Defaults to `text/xml` when there are headers without one.
    ///
    /// Bytes, since parameters may carry non-ascii octets.
    pub fn content_type(&self) -> Option<&[u8]> {
        let headers = self.headers.as_ref()?;
        match headers.get(header::CONTENT_TYPE) {
            Some(v) => Some(v.as_bytes()),
            None => Some(&b"text/xml"[..]),
        }
    }

    fn is_xml_fault_carrier(&self) -> bool {
        let is_xml = self
            .content_type()
            .map(|c| starts_with_ignore_case(c, b"text/xml"))
            .unwrap_or(false);

        is_xml && self.body_length() > 0
    }
}

/// Value of the `User-agent` header.
pub fn user_agent() -> String {
    format!("soap-rpc/{}", env!("CARGO_PKG_VERSION"))
}

/// HTTP transport keeping a cookie jar between calls.
pub struct HttpTransport {
    cookies: CookieJar,
    connector: Box<dyn Connector>,
}

impl HttpTransport {
    /// Transport over plain TCP.
    pub fn new() -> Self {
        Self::with_connector(TcpConnector)
    }

    /// Transport opening streams through `connector`.
    pub fn with_connector(connector: impl Connector + 'static) -> Self {
        HttpTransport {
            cookies: CookieJar::new(),
            connector: Box::new(connector),
        }
    }

    /// Cookies set by the last response.
    pub fn cookies(&self) -> &CookieJar {
        &self.cookies
    }

    fn exchange(
        &mut self,
        conn: &mut TimedConnection,
        addr: &Address,
        path: &str,
        request: &TransportRequest<'_>,
        config: &Config,
    ) -> Result<TransportResponse, Error> {
        conn.put_request("POST", path)?;

        conn.put_header("Host", addr.host())?;
        conn.put_header("User-agent", &user_agent())?;

        let content_type = match request.encoding {
            Some(enc) => format!("text/xml; charset={}", enc),
            None => "text/xml".to_string(),
        };
        conn.put_header("Content-type", &content_type)?;
        conn.put_header("Content-length", &request.data.len().to_string())?;

        for cookie in self.cookies.request_headers() {
            conn.put_header("Cookie", &cookie)?;
        }

        if let Some(user) = addr.user() {
            // Not checked to be user:password. The server will tell.
            let creds = BASE64_STANDARD.encode(user);
            conn.put_header("Authorization", &format!("Basic {}", creds))?;
        }

        match request.soap_action {
            Some(action) if !action.is_empty() => {
                conn.put_header("SOAPAction", &format!("\"{}\"", action))?
            }
            _ => conn.put_header("SOAPAction", "\"\"")?,
        }

        conn.end_headers(config.dump_headers_out)?;

        log_data("Outgoing SOAP", request.data, config.dump_soap_out);

        conn.send(request.data)?;

        let frame = read_frame(conn)?;

        self.cookies.replace_from(frame.headers.as_ref());

        if config.debug {
            debug!(
                "code={} msg={} headers={:?} content-type={:?}",
                frame.status,
                frame.reason,
                frame.headers,
                frame.content_type().map(String::from_utf8_lossy)
            );
        }

        if config.dump_headers_in {
            if let Some(headers) = &frame.headers {
                debug!("Incoming HTTP headers: {} {}", frame.status, frame.reason);
                for (k, v) in headers {
                    debug!("{}: {:?}", k, v);
                }
            }
        }

        if frame.status == 500 && !frame.is_xml_fault_carrier() {
            return Err(Error::Http {
                code: frame.status,
                reason: frame.reason,
            });
        }

        log_data("Incoming SOAP", &frame.body, config.dump_soap_in);

        if frame.status != 200 && frame.status != 500 {
            return Err(Error::Http {
                code: frame.status,
                reason: frame.reason,
            });
        }

        let namespace = request
            .namespace
            .map(|ns| extract_namespace(ns, &frame.body));

        Ok(TransportResponse {
            data: frame.body,
            namespace,
        })
    }
}

impl Transport for HttpTransport {
    fn call(
        &mut self,
        request: &TransportRequest<'_>,
        config: &Config,
    ) -> Result<TransportResponse, Error> {
        let resolved;
        let addr = match request.target {
            Target::Address(v) => v,
            Target::Locator(v) => {
                resolved = Address::resolve(v, config)?;
                &resolved
            }
        };

        // Through a proxy we ask for the absolute URL.
        let (real_host, real_path) = match request.http_proxy {
            Some(proxy) => (proxy.to_string(), addr.to_string()),
            None => (addr.host().to_string(), addr.path().to_string()),
        };

        debug!("POST {} via {}", addr, real_host);

        let mut conn = TimedConnection::new(real_host, request.timeout);
        conn.connect(self.connector.as_ref(), addr.scheme(), None)?;

        let result = self.exchange(&mut conn, addr, &real_path, request, config);

        conn.close();

        result
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("cookies", &self.cookies)
            .finish()
    }
}

/// Read status, headers and the body framed by `Content-Length`.
pub(crate) fn read_frame(conn: &mut TimedConnection) -> Result<ResponseFrame, Error> {
    let reply = conn.get_reply()?;

    let content_length = reply
        .headers
        .as_ref()
        .and_then(|h| h.get(header::CONTENT_LENGTH))
        .and_then(|v| v.to_str().ok())
        .and_then(parse_content_length);

    let Some(file) = conn.get_file() else {
        return Err(Error::Protocol(format!(
            "empty response from server, code: {} {}",
            reply.status, reply.reason
        )));
    };

    let mut body = Vec::new();
    match content_length {
        Some(n) => file.take(n).read_to_end(&mut body)?,
        // Missing or invalid, read until the peer closes.
        None => file.read_to_end(&mut body)?,
    };

    Ok(ResponseFrame {
        status: reply.status,
        reason: reply.reason,
        headers: reply.headers,
        content_length,
        body,
    })
}

/// Parse a `Content-Length` value.
///
/// Some servers send the length twice, as `120, 120`. Only the part before the
/// first comma is used.
pub(crate) fn parse_content_length(v: &str) -> Option<u64> {
    let v = match v.find(',') {
        Some(i) if i > 0 => &v[..i],
        _ => v,
    };
    v.trim().parse().ok()
}

/// Find a namespace declaration extending `namespace` in `data`.
///
/// `urn:svc` matches `xmlns:ns1="urn:svc/v2"` and gives `urn:svc/v2`. Without a
/// match the namespace is returned unchanged.
pub(crate) fn extract_namespace(namespace: &str, data: &[u8]) -> String {
    let pattern = format!(r#"xmlns:\w+=['"]({}[^'"]*)['"]"#, regex::escape(namespace));

    let found = Regex::new(&pattern).ok().and_then(|re| {
        re.captures(data)
            .and_then(|c| c.get(1))
            .map(|m| String::from_utf8_lossy(m.as_bytes()).into_owned())
    });

    found.unwrap_or_else(|| namespace.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_length_duplicate() {
        assert_eq!(parse_content_length("120, 120"), Some(120));
        assert_eq!(parse_content_length("120,120"), Some(120));
    }

    #[test]
    fn content_length_plain() {
        assert_eq!(parse_content_length("42"), Some(42));
        assert_eq!(parse_content_length(" 42 "), Some(42));
    }

    #[test]
    fn content_length_invalid() {
        assert_eq!(parse_content_length(""), None);
        assert_eq!(parse_content_length("abc"), None);
        assert_eq!(parse_content_length("-5"), None);
        // Comma first is not the duplicate quirk.
        assert_eq!(parse_content_length(",120"), None);
    }

    #[test]
    fn namespace_extended() {
        let body = br#"<e:Envelope xmlns:ns1="urn:svc/v2"><ns1:r/></e:Envelope>"#;
        assert_eq!(extract_namespace("urn:svc", body), "urn:svc/v2");
    }

    #[test]
    fn namespace_single_quotes() {
        let body = br#"<e:Envelope xmlns:m='http://x.test/ns/Ext'/>"#;
        assert_eq!(
            extract_namespace("http://x.test/ns", body),
            "http://x.test/ns/Ext"
        );
    }

    #[test]
    fn namespace_unchanged_without_match() {
        let body = br#"<e:Envelope xmlns:ns1="urn:other"/>"#;
        assert_eq!(extract_namespace("urn:svc", body), "urn:svc");
    }

    #[test]
    fn namespace_is_matched_literally() {
        let body = br#"<e:Envelope xmlns:ns1="urnXsvc.v2"/>"#;
        assert_eq!(extract_namespace("urn:svc.", body), "urn:svc.");
    }

    #[test]
    fn user_agent_has_version() {
        assert!(user_agent().starts_with("soap-rpc/"));
        assert!(user_agent().ends_with(env!("CARGO_PKG_VERSION")));
    }
}
