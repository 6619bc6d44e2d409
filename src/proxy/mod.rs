//! SOAP endpoint proxy
//!
//! A [`Proxy`] holds everything about one endpoint: the resolved address,
//! defaults for namespace, action, header and method attributes, the codec,
//! the transport and the policy for results. Calls go through
//! [`Proxy::method()`] stubs or directly through [`Proxy::call()`].
//!
//! A call runs:
//!
//! * **Encode** - the codec builds the envelope from the call context, with
//!   the proxy defaults filling in what the context does not override.
//! * **Transport** - one exchange. On failure, other than a timeout, the
//!   configured [`RetryPolicy`][crate::RetryPolicy] may allow exactly one
//!   more attempt.
//! * **Decode** - the codec turns the response into a value.
//! * **Policy** - faults are raised as [`Error::Fault`] (unless disabled),
//!   single member structs are unwrapped and results simplified when enabled.
//!
//! # Example
//!
//! ```no_run
//! use soap_rpc::{Attributes, Codec, Config, Envelope, Error, Keywords, Proxy, Value};
//!
//! struct MyCodec;
//!
//! impl Codec for MyCodec {
//!     fn encode(&self, envelope: &Envelope<'_>, _: &Config) -> Result<Vec<u8>, Error> {
//!         // Build the SOAP envelope.
//!         # let _ = envelope;
//!         Ok(Vec::new())
//!     }
//!
//!     fn decode(&self, data: &[u8], _: &Config) -> Result<(Value, Attributes), Error> {
//!         // Parse the SOAP envelope.
//!         # let _ = data;
//!         Ok((Value::Null, Attributes::new()))
//!     }
//! }
//!
//! let mut proxy = Proxy::builder("http://services.test/soap", MyCodec)
//!     .namespace("urn:examples")
//!     .build()
//!     .unwrap();
//!
//! // examples.getStateName(41)
//! let output = proxy
//!     .method("examples")
//!     .with_segment("getStateName")
//!     .call(vec![Value::Int(41)], Keywords::new())
//!     .unwrap();
//!
//! println!("{:?}", output.value);
//! ```

use std::fmt;
use std::time::Duration;

use encoding_rs::Encoding;

use crate::address::Address;
use crate::codec::{Codec, Envelope};
use crate::transport::{HttpTransport, Target, Transport, TransportRequest, TransportResponse};
use crate::value::{Attributes, Keywords, Value};
use crate::{Config, Error};

mod method;

pub use method::{Caller, Directive, Invoked, MethodStub};

/// Everything known about a call before proxy defaults are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallContext {
    /// Dotted method path. `None` when the args are the whole body.
    pub method: Option<String>,
    pub args: Vec<Value>,
    pub kwargs: Keywords,
    pub namespace: Option<String>,
    pub soap_action: Option<String>,
    pub header: Option<Value>,
    pub method_attrs: Option<Value>,
}

impl CallContext {
    pub fn new(method: impl Into<String>, args: Vec<Value>) -> Self {
        CallContext {
            method: Some(method.into()),
            args,
            ..Default::default()
        }
    }
}

/// The result of a call.
#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub value: Value,
    /// Decoded attributes, when `Config::return_all_attrs` is set.
    pub attrs: Option<Attributes>,
}

impl Output {
    pub fn into_value(self) -> Value {
        self.value
    }
}

/// Client side stand-in for a SOAP endpoint.
pub struct Proxy<C, T = HttpTransport> {
    address: Address,
    namespace: Option<String>,
    soap_action: Option<String>,
    header: Option<Value>,
    method_attrs: Option<Value>,
    codec: C,
    transport: T,
    encoding: Option<String>,
    throw_faults: bool,
    unwrap_results: bool,
    simplify_objects: bool,
    http_proxy: Option<String>,
    timeout: Option<Duration>,
    no_root: bool,
    config: Config,
    resolved_namespace: Option<String>,
}

impl<C: Codec> Proxy<C, HttpTransport> {
    /// Start building a proxy for the endpoint at `locator`.
    pub fn builder(locator: impl Into<String>, codec: C) -> ProxyBuilder<C, HttpTransport> {
        ProxyBuilder::new(locator.into(), codec)
    }
}

impl<C: Codec, T: Transport> Proxy<C, T> {
    /// A stub for remote method `name`, or for a directive marker.
    pub fn method(&mut self, name: impl Into<String>) -> MethodStub<'_, Self> {
        MethodStub::new(self, name)
    }

    /// Call `method` with positional arguments only.
    pub fn invoke(&mut self, method: &str, args: Vec<Value>) -> Result<Output, Error> {
        self.call(CallContext::new(method, args))
    }

    /// Call without a method name, `body` being the entire envelope body.
    pub fn call_with_body(&mut self, body: Value) -> Result<Output, Error> {
        self.call(CallContext {
            args: vec![body],
            ..Default::default()
        })
    }

    /// Perform a call.
    pub fn call(&mut self, context: CallContext) -> Result<Output, Error> {
        let namespace = non_empty(context.namespace).or_else(|| self.namespace.clone());
        let soap_action = non_empty(context.soap_action).or_else(|| self.soap_action.clone());
        let header = context.header.or_else(|| self.header.clone());
        let method_attrs = context.method_attrs.or_else(|| self.method_attrs.clone());

        let envelope = Envelope {
            method: context.method.as_deref(),
            args: &context.args,
            kwargs: &context.kwargs,
            namespace: namespace.as_deref(),
            header: header.as_ref(),
            method_attrs: method_attrs.as_ref(),
            encoding: self.encoding.as_deref(),
            no_root: self.no_root,
        };

        let data = self.codec.encode(&envelope, &self.config)?;

        let request = TransportRequest {
            target: Target::Address(&self.address),
            data: &data,
            namespace: namespace.as_deref(),
            soap_action: soap_action.as_deref(),
            encoding: self.encoding.as_deref(),
            http_proxy: self.http_proxy.as_deref(),
            timeout: self.timeout,
        };

        let response = call_with_retry(&mut self.transport, &request, &self.address, &self.config)?;

        self.resolved_namespace = response.namespace;

        let (value, attrs) = self.codec.decode(&response.data, &self.config)?;

        let value = match value {
            Value::Fault(fault) if self.throw_faults => {
                if self.config.debug {
                    debug!("Remote fault: {}", fault);
                }
                return Err(Error::Fault(fault));
            }
            v => v,
        };

        let value = if self.unwrap_results {
            value.into_single_member().unwrap_or_else(|v| v)
        } else {
            value
        };

        let value = if self.simplify_objects {
            (self.config.simplifier)(value)
        } else {
            value
        };

        Ok(Output {
            value,
            attrs: self.config.return_all_attrs.then_some(attrs),
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Namespace the last response declared, see [`TransportResponse::namespace`].
    ///
    /// This does not change the namespace used for the next call.
    pub fn resolved_namespace(&self) -> Option<&str> {
        self.resolved_namespace.as_deref()
    }
}

impl<C: Codec, T: Transport> Caller for Proxy<C, T> {
    fn call(&mut self, context: CallContext) -> Result<Output, Error> {
        Proxy::call(self, context)
    }
}

fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.is_empty())
}

/// One transport call, and at most one more if the retry policy says so.
///
/// Timeouts are never retried.
fn call_with_retry<T: Transport>(
    transport: &mut T,
    request: &TransportRequest<'_>,
    address: &Address,
    config: &Config,
) -> Result<TransportResponse, Error> {
    let err = match transport.call(request, config) {
        Ok(v) => return Ok(v),
        Err(Error::Timeout) => return Err(Error::Timeout),
        Err(e) => e,
    };

    let Some(handler) = &config.fault_handler else {
        return Err(err);
    };

    if !handler.should_retry(address, &err)? {
        debug!("No retry for {}: {}", address, err);
        return Err(err);
    }

    debug!("Retry call to {} after: {}", address, err);

    transport.call(request, config)
}

/// Builder for a [`Proxy`].
pub struct ProxyBuilder<C, T = HttpTransport> {
    locator: String,
    codec: C,
    transport: T,
    namespace: Option<String>,
    soap_action: Option<String>,
    header: Option<Value>,
    method_attrs: Option<Value>,
    encoding: Option<String>,
    throw_faults: bool,
    unwrap_results: Option<bool>,
    simplify_objects: Option<bool>,
    http_proxy: Option<String>,
    timeout: Option<Duration>,
    no_root: bool,
    config: Config,
}

impl<C: Codec> ProxyBuilder<C, HttpTransport> {
    fn new(locator: String, codec: C) -> Self {
        ProxyBuilder {
            locator,
            codec,
            transport: HttpTransport::new(),
            namespace: None,
            soap_action: None,
            header: None,
            method_attrs: None,
            encoding: Some("UTF-8".to_string()),
            throw_faults: true,
            unwrap_results: None,
            simplify_objects: None,
            http_proxy: None,
            timeout: None,
            no_root: false,
            config: Config::default(),
        }
    }
}

impl<C: Codec, T: Transport> ProxyBuilder<C, T> {
    /// Default method namespace.
    pub fn namespace(mut self, v: impl Into<String>) -> Self {
        self.namespace = Some(v.into());
        self
    }

    /// Default `SOAPAction`.
    ///
    /// Without a default or a per-call override the header is sent as `""`.
    /// The method name is never used as the action.
    pub fn soap_action(mut self, v: impl Into<String>) -> Self {
        self.soap_action = Some(v.into());
        self
    }

    /// Default envelope header.
    pub fn header(mut self, v: Value) -> Self {
        self.header = Some(v);
        self
    }

    /// Default method element attributes.
    pub fn method_attrs(mut self, v: Value) -> Self {
        self.method_attrs = Some(v);
        self
    }

    /// Charset of the envelope. `None` leaves it out of the content type.
    ///
    /// Defaults to `UTF-8`.
    pub fn encoding(mut self, v: Option<&str>) -> Self {
        self.encoding = v.map(|s| s.to_string());
        self
    }

    /// Raise decoded faults as [`Error::Fault`]. Defaults to `true`.
    pub fn throw_faults(mut self, v: bool) -> Self {
        self.throw_faults = v;
        self
    }

    /// Overrides `Config::unwrap_results`.
    pub fn unwrap_results(mut self, v: bool) -> Self {
        self.unwrap_results = Some(v);
        self
    }

    /// Overrides `Config::simplify_objects`.
    pub fn simplify_objects(mut self, v: bool) -> Self {
        self.simplify_objects = Some(v);
        self
    }

    /// Send requests through a forwarding proxy at `host[:port]`.
    pub fn http_proxy(mut self, v: impl Into<String>) -> Self {
        self.http_proxy = Some(v.into());
        self
    }

    pub fn timeout(mut self, v: Duration) -> Self {
        self.timeout = Some(v);
        self
    }

    pub fn no_root(mut self, v: bool) -> Self {
        self.no_root = v;
        self
    }

    pub fn config(mut self, v: Config) -> Self {
        self.config = v;
        self
    }

    /// Use another transport.
    pub fn transport<T2: Transport>(self, transport: T2) -> ProxyBuilder<C, T2> {
        ProxyBuilder {
            locator: self.locator,
            codec: self.codec,
            transport,
            namespace: self.namespace,
            soap_action: self.soap_action,
            header: self.header,
            method_attrs: self.method_attrs,
            encoding: self.encoding,
            throw_faults: self.throw_faults,
            unwrap_results: self.unwrap_results,
            simplify_objects: self.simplify_objects,
            http_proxy: self.http_proxy,
            timeout: self.timeout,
            no_root: self.no_root,
            config: self.config,
        }
    }

    /// Resolve the locator and build the proxy.
    ///
    /// Fails if the encoding is not a charset label, or the locator does not
    /// resolve under the configuration.
    pub fn build(self) -> Result<Proxy<C, T>, Error> {
        if let Some(enc) = &self.encoding {
            check_encoding(enc)?;
        }

        let address = Address::resolve(&self.locator, &self.config)?;

        Ok(Proxy {
            address,
            namespace: self.namespace,
            soap_action: self.soap_action,
            header: self.header,
            method_attrs: self.method_attrs,
            codec: self.codec,
            transport: self.transport,
            encoding: self.encoding,
            throw_faults: self.throw_faults,
            unwrap_results: self.unwrap_results.unwrap_or(self.config.unwrap_results),
            simplify_objects: self
                .simplify_objects
                .unwrap_or(self.config.simplify_objects),
            http_proxy: self.http_proxy,
            timeout: self.timeout,
            no_root: self.no_root,
            config: self.config,
            resolved_namespace: None,
        })
    }
}

/// The encoding must be a charset label known to the WHATWG registry, written
/// as a bare token (`UTF-8`, `iso-8859-1`, `Shift_JIS`).
fn check_encoding(enc: &str) -> Result<(), Error> {
    let is_token = !enc.is_empty()
        && enc
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b':'));

    if is_token && Encoding::for_label(enc.as_bytes()).is_some() {
        Ok(())
    } else {
        Err(Error::BadEncoding(enc.to_string()))
    }
}

impl<C, T> fmt::Debug for Proxy<C, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("address", &self.address)
            .field("namespace", &self.namespace)
            .field("soap_action", &self.soap_action)
            .field("encoding", &self.encoding)
            .field("throw_faults", &self.throw_faults)
            .field("unwrap_results", &self.unwrap_results)
            .field("simplify_objects", &self.simplify_objects)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoding_labels() {
        assert!(check_encoding("UTF-8").is_ok());
        assert!(check_encoding("iso-8859-1").is_ok());
        assert!(check_encoding("Shift_JIS").is_ok());
        assert!(matches!(check_encoding(""), Err(Error::BadEncoding(_))));
        assert!(matches!(
            check_encoding("utf-8\r\nX-Evil: 1"),
            Err(Error::BadEncoding(_))
        ));
    }

    #[test]
    fn unknown_charset_is_rejected() {
        assert!(matches!(
            check_encoding("no-such-charset"),
            Err(Error::BadEncoding(ref e)) if e == "no-such-charset"
        ));
        // Surrounding whitespace would end up in the content type.
        assert!(check_encoding(" utf-8").is_err());
    }

    #[test]
    fn empty_override_falls_back() {
        assert_eq!(non_empty(Some(String::new())), None);
        assert_eq!(non_empty(Some("a".into())), Some("a".into()));
        assert_eq!(non_empty(None), None);
    }
}
