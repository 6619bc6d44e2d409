//! Synchronous SOAP client engine.
//!
//! The crate places remote procedure calls against a SOAP endpoint over
//! HTTP/1.0. It does everything around the envelope: resolving the endpoint
//! address, the HTTP exchange with cookies and basic auth, classifying the
//! response, a one-shot retry hook and post-processing of results. Building
//! and parsing the XML envelope is left to a [`Codec`].
//!
//! # Flow
//!
//! ```text
//!  Proxy::method("a").with_segment("b")
//!        │
//!        ▼
//!  MethodStub ──call──▶ Proxy::call ──encode──▶ Codec
//!                           │
//!                           ▼
//!                     HttpTransport ──▶ TimedConnection ──▶ peer
//!                           │       (one retry if RetryPolicy allows)
//!                           ▼
//!                      Codec::decode ──▶ fault? unwrap? simplify? ──▶ Output
//! ```
//!
//! # Example
//!
//! ```no_run
//! use soap_rpc::{Attributes, Codec, Config, Envelope, Error, Proxy, Value};
//!
//! struct RawCodec;
//!
//! impl Codec for RawCodec {
//!     fn encode(&self, envelope: &Envelope<'_>, _: &Config) -> Result<Vec<u8>, Error> {
//!         let body = format!("<call method={:?}/>", envelope.method);
//!         Ok(body.into_bytes())
//!     }
//!
//!     fn decode(&self, data: &[u8], _: &Config) -> Result<(Value, Attributes), Error> {
//!         let text = String::from_utf8_lossy(data).into_owned();
//!         Ok((Value::String(text), Attributes::new()))
//!     }
//! }
//!
//! let mut proxy = Proxy::builder("http://user:pw@services.test/rpc", RawCodec)
//!     .namespace("urn:test")
//!     .soap_action("urn:test#echo")
//!     .build()?;
//!
//! let output = proxy.invoke("echo", vec!["hello".into()])?;
//! println!("{:?}", output.value);
//! # Ok::<_, Error>(())
//! ```
//!
//! # Secure schemes
//!
//! `https` and `httpg` locators are accepted when [`Config::ssl_client`] or
//! [`Config::gsi_client`] is set. The streams for them come from a
//! [`Connector`] given to [`HttpTransport::with_connector()`]. The built in
//! [`TcpConnector`] only does plain `http`.

#![forbid(unsafe_code)]

#[macro_use]
extern crate log;

mod util;

mod error;
pub use error::Error;

mod address;
pub use address::{Address, Scheme};

mod config;
pub use config::{Config, RetryPolicy};

mod value;
pub use value::{simplify, Attributes, Fault, Keywords, Struct, Value};

mod codec;
pub use codec::{Codec, Envelope};

mod cookie;
pub use cookie::{Cookie, CookieJar};

mod connection;
pub use connection::{Connector, Reply, Stream, TcpConnector, TimedConnection};
pub use connection::{MALFORMED_STATUS, MAX_LINE_LENGTH, MAX_RESPONSE_HEADERS};

mod transport;
pub use transport::{user_agent, HttpTransport, ResponseFrame, Target, Transport};
pub use transport::{TransportRequest, TransportResponse};

mod proxy;
pub use proxy::{CallContext, Caller, Directive, Invoked, MethodStub, Output};
pub use proxy::{Proxy, ProxyBuilder};

#[cfg(test)]
mod test;

// Re-export the basis for this library.
pub use http;
