//! Remote method names built up segment by segment.
//!
//! A [`MethodStub`] is an in-progress call. Segments append to a dotted
//! method path, so `examples` then `getStateName` calls
//! `examples.getStateName`. A stub whose name is one of the directive markers
//! (`_ns`, `_sa`, `_hd`, `_ma`) does not call anything when invoked. It keeps
//! the first argument as an override for the call eventually made through it,
//! and the next segment replaces the marker instead of nesting under it.
//! Only these four exact names are markers. Any other name starting with `_`,
//! such as `_private`, is an ordinary method segment.
//!
//! ```text
//! method("_ns") ─invoke("urn:x")─▶ [_ns, ns=urn:x] ─with_segment("echo")─▶ [echo, ns=urn:x]
//!                                                                              │
//!                                                          invoke(5) ─▶ call "echo"(5) in urn:x
//! ```

use std::fmt;

use crate::value::{Keywords, Value};
use crate::Error;

use super::{CallContext, Output};

/// Anything a stub can place its call with.
pub trait Caller {
    /// Perform the call.
    fn call(&mut self, context: CallContext) -> Result<Output, Error>;
}

/// Per-call overrides, set through directive markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    /// `_ns`, the method namespace.
    Namespace,
    /// `_sa`, the `SOAPAction` header.
    SoapAction,
    /// `_hd`, the envelope header.
    Header,
    /// `_ma`, attributes on the method element.
    MethodAttrs,
}

impl Directive {
    /// The directive for a marker name.
    pub fn from_marker(name: &str) -> Option<Directive> {
        match name {
            "_ns" => Some(Directive::Namespace),
            "_sa" => Some(Directive::SoapAction),
            "_hd" => Some(Directive::Header),
            "_ma" => Some(Directive::MethodAttrs),
            _ => None,
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            Directive::Namespace => "_ns",
            Directive::SoapAction => "_sa",
            Directive::Header => "_hd",
            Directive::MethodAttrs => "_ma",
        }
    }
}

/// An in-progress call through a [`Caller`].
pub struct MethodStub<'c, C: ?Sized> {
    caller: &'c mut C,
    name: String,
    namespace: Option<String>,
    soap_action: Option<String>,
    header: Option<Value>,
    method_attrs: Option<Value>,
}

/// Result of [`MethodStub::invoke()`].
pub enum Invoked<'c, C: ?Sized> {
    /// A directive was applied, the stub continues the chain.
    Configured(MethodStub<'c, C>),
    /// The remote call was made.
    Returned(Output),
}

impl<'c, C: ?Sized> Invoked<'c, C> {
    pub fn into_stub(self) -> Option<MethodStub<'c, C>> {
        match self {
            Invoked::Configured(v) => Some(v),
            Invoked::Returned(_) => None,
        }
    }

    pub fn into_output(self) -> Option<Output> {
        match self {
            Invoked::Configured(_) => None,
            Invoked::Returned(v) => Some(v),
        }
    }
}

impl<'c, C: Caller + ?Sized> MethodStub<'c, C> {
    /// A stub for `name` on `caller`, without overrides.
    pub fn new(caller: &'c mut C, name: impl Into<String>) -> Self {
        MethodStub {
            caller,
            name: name.into(),
            namespace: None,
            soap_action: None,
            header: None,
            method_attrs: None,
        }
    }

    /// The method path so far, or the directive marker.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The directive this stub applies when invoked, if it is a marker.
    pub fn directive(&self) -> Option<Directive> {
        Directive::from_marker(&self.name)
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn soap_action(&self) -> Option<&str> {
        self.soap_action.as_deref()
    }

    pub fn header(&self) -> Option<&Value> {
        self.header.as_ref()
    }

    pub fn method_attrs(&self) -> Option<&Value> {
        self.method_attrs.as_ref()
    }

    /// Continue the method path with `segment`.
    ///
    /// On a directive marker the segment replaces the marker. Directives are
    /// not nested into method names.
    pub fn with_segment(mut self, segment: &str) -> Self {
        if self.directive().is_some() {
            self.name = segment.to_string();
        } else {
            self.name = format!("{}.{}", self.name, segment);
        }
        self
    }

    /// Set an override directly. `None` clears it.
    ///
    /// Namespace and SOAP action must be strings.
    pub fn with_directive(mut self, kind: Directive, value: Option<Value>) -> Result<Self, Error> {
        self.set(kind, value)?;
        Ok(self)
    }

    fn set(&mut self, kind: Directive, value: Option<Value>) -> Result<(), Error> {
        fn string(kind: Directive, value: Option<Value>) -> Result<Option<String>, Error> {
            match value {
                None => Ok(None),
                Some(Value::String(v)) => Ok(Some(v)),
                Some(_) => Err(Error::BadDirective(kind.marker().to_string())),
            }
        }

        match kind {
            Directive::Namespace => self.namespace = string(kind, value)?,
            Directive::SoapAction => self.soap_action = string(kind, value)?,
            Directive::Header => self.header = value,
            Directive::MethodAttrs => self.method_attrs = value,
        }

        Ok(())
    }

    /// Invoke the stub with arguments.
    ///
    /// A directive marker stores its first argument as the override (no
    /// arguments clears it) and hands the stub back. Anything else is a
    /// remote call with the overrides gathered so far.
    pub fn invoke(mut self, args: Vec<Value>, kwargs: Keywords) -> Result<Invoked<'c, C>, Error> {
        if let Some(kind) = self.directive() {
            self.set(kind, args.into_iter().next())?;
            return Ok(Invoked::Configured(self));
        }

        let output = self.call(args, kwargs)?;

        Ok(Invoked::Returned(output))
    }

    /// Make the remote call. The stub can be called again.
    pub fn call(&mut self, args: Vec<Value>, kwargs: Keywords) -> Result<Output, Error> {
        if self.directive().is_some() {
            return Err(Error::BadDirective(self.name.clone()));
        }

        let context = CallContext {
            method: Some(self.name.clone()),
            args,
            kwargs,
            namespace: self.namespace.clone(),
            soap_action: self.soap_action.clone(),
            header: self.header.clone(),
            method_attrs: self.method_attrs.clone(),
        };

        trace!("Call through stub: {:?}", context);

        self.caller.call(context)
    }
}

impl<C: ?Sized> fmt::Debug for MethodStub<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodStub")
            .field("name", &self.name)
            .field("namespace", &self.namespace)
            .field("soap_action", &self.soap_action)
            .field("header", &self.header)
            .field("method_attrs", &self.method_attrs)
            .finish()
    }
}
