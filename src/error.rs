use std::fmt;
use std::io;

use crate::address::Scheme;
use crate::value::Fault;

/// Error type for soap-rpc
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    UnsupportedProtocol(String),
    Capability(Scheme),
    NoConnector(Scheme),
    Timeout,
    Io(io::Error),
    Protocol(String),
    HttpParseFail(String),
    BadHeader(String),
    Http { code: i32, reason: String },
    Fault(Fault),
    BadEncoding(String),
    BadDirective(String),
    Codec(String),
}

impl Error {
    /// The HTTP status for `Error::Http`.
    ///
    /// A malformed status line from the peer is reported as `-1`.
    pub fn http_code(&self) -> Option<i32> {
        match self {
            Error::Http { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Tell if this is the distinguished timeout failure.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout)
    }
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        match value.kind() {
            // Read timeouts surface as WouldBlock on some platforms.
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Error::Timeout,
            _ => Error::Io(value),
        }
    }
}

impl From<httparse::Error> for Error {
    fn from(value: httparse::Error) -> Self {
        Error::HttpParseFail(value.to_string())
    }
}

impl From<Fault> for Error {
    fn from(value: Fault) -> Self {
        Error::Fault(value)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedProtocol(v) => write!(f, "unsupported SOAP protocol: {}", v),
            Error::Capability(s) => {
                write!(f, "{} client not supported by this configuration", s.capability())
            }
            Error::NoConnector(s) => write!(f, "no connector available for scheme {}", s),
            Error::Timeout => write!(f, "timeout in SOAP operation"),
            Error::Io(e) => write!(f, "io: {}", e),
            Error::Protocol(v) => write!(f, "protocol error: {}", v),
            Error::HttpParseFail(v) => write!(f, "http parse fail: {}", v),
            Error::BadHeader(v) => write!(f, "bad header: {}", v),
            Error::Http { code, reason } => write!(f, "HTTP error {}: {}", code, reason),
            Error::Fault(v) => write!(f, "{}", v),
            Error::BadEncoding(v) => write!(f, "unknown encoding: {}", v),
            Error::BadDirective(v) => write!(f, "bad directive argument for {}", v),
            Error::Codec(v) => write!(f, "codec: {}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_timeout_is_distinguished() {
        let err: Error = io::Error::new(io::ErrorKind::TimedOut, "deadline").into();
        assert!(err.is_timeout());

        let err: Error = io::Error::new(io::ErrorKind::WouldBlock, "deadline").into();
        assert!(err.is_timeout());
    }

    #[test]
    fn io_other_is_io() {
        let err: Error = io::Error::new(io::ErrorKind::ConnectionRefused, "nope").into();
        assert!(matches!(err, Error::Io(_)));
        assert!(!err.is_timeout());
    }

    #[test]
    fn from_httparse_error() {
        let httparse_error = httparse::Error::HeaderName;
        let error: Error = httparse_error.into();
        let Error::HttpParseFail(_) = error else {
            panic!("Not Error::HttpParseFail");
        };
    }

    #[test]
    fn http_code() {
        let err = Error::Http {
            code: -1,
            reason: "garbage".into(),
        };
        assert_eq!(err.http_code(), Some(-1));
        assert_eq!(err.to_string(), "HTTP error -1: garbage");
        assert_eq!(Error::Timeout.http_code(), None);
    }

    #[test]
    fn capability_message() {
        let err = Error::Capability(Scheme::Https);
        assert_eq!(
            err.to_string(),
            "SSL client not supported by this configuration"
        );
    }
}
