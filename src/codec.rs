//! The envelope codec seam.
//!
//! The engine never looks inside an envelope. It hands the codec everything it
//! knows about a call and gets opaque bytes back, and turns response bytes
//! into a value through the same codec.

use crate::value::{Attributes, Keywords, Value};
use crate::{Config, Error};

/// Everything needed to encode one outgoing call.
#[derive(Debug, Clone, Copy)]
pub struct Envelope<'a> {
    /// Fully qualified method name. `None` when the args are the whole body.
    pub method: Option<&'a str>,
    pub args: &'a [Value],
    pub kwargs: &'a Keywords,
    pub namespace: Option<&'a str>,
    pub header: Option<&'a Value>,
    pub method_attrs: Option<&'a Value>,
    pub encoding: Option<&'a str>,
    /// Do not mark the method element as the root.
    pub no_root: bool,
}

/// Encodes calls into envelopes and decodes responses.
pub trait Codec {
    /// Encode a call into request body bytes.
    fn encode(&self, envelope: &Envelope<'_>, config: &Config) -> Result<Vec<u8>, Error>;

    /// Decode response bytes into a result, which may be a [`Value::Fault`].
    fn decode(&self, data: &[u8], config: &Config) -> Result<(Value, Attributes), Error>;
}
