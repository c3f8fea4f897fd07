//! `Object`: the public-facing value type for host interop (`spec.md` §6/§9).
//!
//! Grounded on `ouros::object::Object`: a heap-free, owned mirror of the
//! internal runtime value that a host can construct, pass into a run, and
//! receive back out, without needing a `ScopeRef`/`Evaluator` in scope.
//! Unlike `ouros`'s `Object`, there's no `Repr`/`Exception` split — SLIP
//! errors already travel as `SlipError`, not as a runtime value variant.

use indexmap::IndexMap;
use serde::Serialize;

use crate::value::Value;

/// An owned SLIP value safe to hold outside an evaluation session.
///
/// Serializes externally tagged (`{"Int": 5}`, `{"Dict": {...}}`, ...),
/// the same convention `ast::Term` uses for its JSON wire form, so a host
/// can round-trip a run's result without a bespoke encoding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Object {
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    Str(String),
    Bytes(Vec<u8>),
    List(Vec<Object>),
    Dict(IndexMap<String, Object>),
}

impl Object {
    /// Converts a runtime `Value` into an owned `Object`, flattening
    /// containers recursively. Values with no host-facing representation
    /// (functions, scopes, paths, channels, tasks, host objects) become
    /// their `Display` text, matching `spec.md` §6's "best-effort host
    /// boundary" stance.
    pub(crate) fn from_value(value: &Value) -> Self {
        match value {
            Value::Int(i) => Self::Int(*i),
            Value::BigInt(b) => Self::Str(b.to_string()),
            Value::Float(f) => Self::Float(*f),
            Value::Bool(b) => Self::Bool(*b),
            Value::Null => Self::Null,
            Value::Str(s) | Value::IString(s) => Self::Str(s.to_string()),
            Value::Bytes(b) => Self::Bytes(b.to_vec()),
            Value::List(l) => Self::List(l.borrow().iter().map(Self::from_value).collect()),
            Value::Dict(d) => Self::Dict(d.borrow().iter().map(|(k, v)| (k.clone(), Self::from_value(v))).collect()),
            other => Self::Str(other.to_string()),
        }
    }

    /// Converts an `Object` back into a runtime `Value`, the inverse of
    /// `from_value` for the container/primitive cases.
    pub(crate) fn into_value(self) -> Value {
        match self {
            Self::Int(i) => Value::Int(i),
            Self::Float(f) => Value::Float(f),
            Self::Bool(b) => Value::Bool(b),
            Self::Null => Value::Null,
            Self::Str(s) => Value::str(s),
            Self::Bytes(b) => Value::Bytes(b.into()),
            Self::List(items) => Value::list(items.into_iter().map(Self::into_value).collect()),
            Self::Dict(map) => Value::dict(map.into_iter().map(|(k, v)| (k, v.into_value())).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_nested_list_of_dicts() {
        let mut inner = IndexMap::new();
        inner.insert("hp".to_owned(), Object::Int(10));
        let original = Object::List(vec![Object::Dict(inner)]);
        let value = original.clone().into_value();
        let back = Object::from_value(&value);
        assert_eq!(original, back);
    }
}
