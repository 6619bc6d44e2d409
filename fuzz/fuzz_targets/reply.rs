#![no_main]

use std::io::Cursor;
use std::time::Duration;

use libfuzzer_sys::fuzz_target;
use soap_rpc::{
    Config, Connector, Error, HttpTransport, Scheme, Stream, Transport, TransportRequest,
};

// Namespaces to look for in the response body
const NAMESPACES: &[&str] = &["urn:svc", "http://soap.test/ns", ""];

// Status lines that drive the classification logic
const STATUS_LINES: &[&str] = &[
    "HTTP/1.0 200 OK\r\n",
    "HTTP/1.1 500 Internal Server Error\r\n",
    "HTTP/1.0 404 Not Found\r\n",
    "HTTP/1.0 302 Found\r\n",
    "",
];

/// Connector answering with the fuzz input.
struct Canned(Vec<u8>);

impl Connector for Canned {
    fn connect(
        &self,
        _: Scheme,
        _: &str,
        _: Option<Duration>,
    ) -> Result<Box<dyn Stream>, Error> {
        Ok(Box::new(Cursor::new(self.0.clone())))
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 2 {
        return;
    }

    // First byte picks a status line to prepend (or none, for raw input)
    let status = STATUS_LINES[(data[0] as usize) % STATUS_LINES.len()];

    // Second byte picks the namespace hint
    let ns = NAMESPACES[(data[1] as usize) % NAMESPACES.len()];

    let mut response = status.as_bytes().to_vec();
    response.extend_from_slice(&data[2..]);

    let mut transport = HttpTransport::with_connector(Canned(response));

    let mut request = TransportRequest::new("http://fuzz.test/rpc", b"<req/>");
    request.soap_action = Some("urn:svc#op");
    if !ns.is_empty() {
        request.namespace = Some(ns);
    }

    let config = Config {
        debug: data[1] % 2 == 0,
        ..Default::default()
    };

    // Any outcome is fine, as long as there is no panic
    let _ = transport.call(&request, &config);

    // The jar only ever holds what the last response set
    for cookie in transport.cookies().request_headers() {
        assert!(!cookie.contains('\n'));
    }
});
