use std::fmt;
use std::sync::Arc;

use crate::address::{Address, Scheme};
use crate::value::{simplify, Value};
use crate::Error;

/// Decides whether a failed transport call gets one more attempt.
///
/// Consulted at most once per call. `Ok(true)` triggers exactly one retry,
/// `Ok(false)` lets the original error through, and `Err` replaces it.
pub trait RetryPolicy {
    /// Inspect a failed call to `address`.
    fn should_retry(&self, address: &Address, error: &Error) -> Result<bool, Error>;
}

impl<F> RetryPolicy for F
where
    F: Fn(&Address, &Error) -> Result<bool, Error>,
{
    fn should_retry(&self, address: &Address, error: &Error) -> Result<bool, Error> {
        (self)(address, error)
    }
}

/// Client policy, passed explicitly to every [`Proxy`][crate::Proxy].
#[derive(Clone)]
pub struct Config {
    /// Log response status and headers at debug level.
    pub debug: bool,
    /// Log outgoing HTTP headers at debug level.
    pub dump_headers_out: bool,
    /// Log the outgoing envelope at debug level.
    pub dump_soap_out: bool,
    /// Log incoming HTTP headers at debug level.
    pub dump_headers_in: bool,
    /// Log the incoming envelope at debug level.
    pub dump_soap_in: bool,

    /// An SSL capable connector is available (enables `https`).
    pub ssl_client: bool,
    /// A GSI capable connector is available (enables `httpg`).
    pub gsi_client: bool,

    /// Default for unwrapping single member struct results.
    pub unwrap_results: bool,
    /// Default for running results through `simplifier`.
    pub simplify_objects: bool,
    /// Hand back decoded attributes along with the result.
    pub return_all_attrs: bool,

    /// Hook for retrying a failed transport call.
    pub fault_handler: Option<Arc<dyn RetryPolicy + Send + Sync>>,

    /// Post-processing for results when `simplify_objects` is on.
    pub simplifier: fn(Value) -> Value,
}

impl Config {
    /// Whether this configuration can open connections for `scheme`.
    pub fn supports(&self, scheme: Scheme) -> bool {
        match scheme {
            Scheme::Http => true,
            Scheme::Https => self.ssl_client,
            Scheme::Httpg => self.gsi_client,
        }
    }

    /// Set the retry hook.
    pub fn with_fault_handler<P>(mut self, policy: P) -> Self
    where
        P: RetryPolicy + Send + Sync + 'static,
    {
        self.fault_handler = Some(Arc::new(policy));
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            debug: false,
            dump_headers_out: false,
            dump_soap_out: false,
            dump_headers_in: false,
            dump_soap_in: false,
            ssl_client: false,
            gsi_client: false,
            unwrap_results: true,
            simplify_objects: false,
            return_all_attrs: false,
            fault_handler: None,
            simplifier: simplify,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("debug", &self.debug)
            .field("ssl_client", &self.ssl_client)
            .field("gsi_client", &self.gsi_client)
            .field("unwrap_results", &self.unwrap_results)
            .field("simplify_objects", &self.simplify_objects)
            .field("return_all_attrs", &self.return_all_attrs)
            .field("fault_handler", &self.fault_handler.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_supports_only_http() {
        let config = Config::default();
        assert!(config.supports(Scheme::Http));
        assert!(!config.supports(Scheme::Https));
        assert!(!config.supports(Scheme::Httpg));
    }

    #[test]
    fn closure_as_retry_policy() {
        let config = Config::default()
            .with_fault_handler(|_: &Address, e: &Error| -> Result<bool, Error> {
                Ok(matches!(e, Error::Io(_)))
            });

        let address = Address::resolve("http://a.test/", &config).unwrap();
        let handler = config.fault_handler.as_ref().unwrap();

        assert!(!handler.should_retry(&address, &Error::Timeout).unwrap());
    }
}
