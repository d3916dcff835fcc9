mod number;
mod wire;


use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error as ThisError;

// re-exports
pub use number::Number;
pub use wire::{WireTag, marshal, marshal_document, unmarshal, unmarshal_document};

///
/// Document
///
/// The dynamic record shape used throughout the engine: schema validation,
/// index derivation, and entity operations all work over documents.
/// Attribute order is canonicalized by the map.
///

pub type Document = BTreeMap<String, Value>;

///
/// CodecError
///
/// Failures converting between native values and the store's tagged wire
/// representation. Always local to a single value; never retried.
///

#[derive(Debug, ThisError)]
pub enum CodecError {
    #[error("unsupported value type: {reason}")]
    UnsupportedValueType { reason: String },

    #[error("invalid decimal number: {text:?}")]
    InvalidNumber { text: String },

    #[error("empty {tag} set cannot be marshalled")]
    EmptySet { tag: WireTag },

    #[error("malformed wire value: {reason}")]
    MalformedWire { reason: String },
}

///
/// ValueKind
///
/// Native-side discriminant of `Value`, used by schema shapes to declare the
/// expected kind of a field.
///

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq, Serialize, Deserialize)]
pub enum ValueKind {
    #[display("null")]
    Null,

    #[display("bool")]
    Bool,

    #[display("text")]
    Text,

    #[display("number")]
    Number,

    #[display("list")]
    List,

    #[display("map")]
    Map,

    #[display("text set")]
    TextSet,

    #[display("number set")]
    NumberSet,
}

///
/// Value
///
/// Tagged union over the store's representable domain. Numbers are carried
/// as validated decimal strings so nothing ever passes through a float on
/// the wire; sets are element-unique and unordered (a `BTreeSet` gives them
/// a canonical order locally, which the wire does not preserve).
///

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Text(String),
    Number(Number),
    List(Vec<Self>),
    Map(Document),
    TextSet(BTreeSet<String>),
    NumberSet(BTreeSet<Number>),
}

impl Value {
    #[must_use]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Text(_) => ValueKind::Text,
            Self::Number(_) => ValueKind::Number,
            Self::List(_) => ValueKind::List,
            Self::Map(_) => ValueKind::Map,
            Self::TextSet(_) => ValueKind::TextSet,
            Self::NumberSet(_) => ValueKind::NumberSet,
        }
    }

    #[must_use]
    pub const fn as_text(&self) -> Option<&String> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_number(&self) -> Option<&Number> {
        match self {
            Self::Number(n) => Some(n),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Read a number as `u64`, for metadata counters.
    #[must_use]
    pub fn as_u64(&self) -> Option<u64> {
        self.as_number().and_then(|n| n.as_str().parse().ok())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Number> for Value {
    fn from(v: Number) -> Self {
        Self::Number(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Number(Number::from(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Number(Number::from(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Number(Number::from(v))
    }
}

impl From<Vec<Self>> for Value {
    fn from(v: Vec<Self>) -> Self {
        Self::List(v)
    }
}

impl From<Document> for Value {
    fn from(v: Document) -> Self {
        Self::Map(v)
    }
}
