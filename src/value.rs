//! Dynamic values exchanged with the envelope [`Codec`][crate::Codec].

use std::collections::BTreeMap;
use std::fmt;

/// Keyword arguments of a call.
pub type Keywords = BTreeMap<String, Value>;

/// Attribute metadata the codec attaches to a decoded response.
pub type Attributes = BTreeMap<String, String>;

/// A value passed to or returned from a remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Struct(Struct),
    /// Remote-side application error.
    Fault(Fault),
}

/// A structured value with named, ordered fields.
///
/// Fields whose name starts with `_` are private metadata (type names,
/// encoding hints and such) and are ignored when unwrapping results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Struct {
    /// Element name, if the codec knows it.
    pub name: Option<String>,
    /// Fields in document order.
    pub fields: Vec<(String, Value)>,
}

/// A decoded SOAP fault.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fault {
    pub code: String,
    pub string: String,
    pub actor: Option<String>,
    pub detail: Option<Box<Value>>,
}

fn is_private(name: &str) -> bool {
    name.starts_with('_')
}

impl Value {
    pub fn is_fault(&self) -> bool {
        matches!(self, Value::Fault(_))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// If this is a struct with exactly one public field, the value of that field.
    pub(crate) fn into_single_member(self) -> Result<Value, Value> {
        let Value::Struct(s) = self else {
            return Err(self);
        };

        if s.public_fields().count() != 1 {
            return Err(Value::Struct(s));
        }

        let index = s.fields.iter().position(|(k, _)| !is_private(k));
        match index {
            Some(i) => {
                let mut s = s;
                Ok(s.fields.swap_remove(i).1)
            }
            None => Err(Value::Struct(s)),
        }
    }
}

impl Struct {
    pub fn new(name: impl Into<String>) -> Self {
        Struct {
            name: Some(name.into()),
            fields: Vec::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Fields not starting with `_`.
    pub fn public_fields(&self) -> impl Iterator<Item = &(String, Value)> {
        self.fields.iter().filter(|(k, _)| !is_private(k))
    }
}

impl Fault {
    pub fn new(code: impl Into<String>, string: impl Into<String>) -> Self {
        Fault {
            code: code.into(),
            string: string.into(),
            ..Default::default()
        }
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Fault {}: {}>", self.code, self.string)
    }
}

/// Simplify structured values into their plain counterparts.
///
/// Private members are dropped from structs, recursively. Faults keep their
/// detail, simplified.
pub fn simplify(value: Value) -> Value {
    match value {
        Value::Struct(s) => Value::Struct(Struct {
            name: s.name,
            fields: s
                .fields
                .into_iter()
                .filter(|(k, _)| !is_private(k))
                .map(|(k, v)| (k, simplify(v)))
                .collect(),
        }),
        Value::Array(v) => Value::Array(v.into_iter().map(simplify).collect()),
        Value::Fault(mut f) => {
            f.detail = f.detail.map(|d| Box::new(simplify(*d)));
            Value::Fault(f)
        }
        v => v,
    }
}

macro_rules! value_from {
    ($t:ty, $v:ident, $e:expr) => {
        impl From<$t> for Value {
            fn from($v: $t) -> Self {
                $e
            }
        }
    };
}

value_from!(bool, v, Value::Bool(v));
value_from!(i32, v, Value::Int(v as i64));
value_from!(i64, v, Value::Int(v));
value_from!(f64, v, Value::Float(v));
value_from!(&str, v, Value::String(v.to_string()));
value_from!(String, v, Value::String(v));
value_from!(Vec<Value>, v, Value::Array(v));
value_from!(Struct, v, Value::Struct(v));
value_from!(Fault, v, Value::Fault(v));
