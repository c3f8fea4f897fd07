//! Runtime value representation (`spec.md` §3).
//!
//! Shared-identity containers (List, Dict, Scope, GenericFunction) use
//! `Rc<RefCell<_>>` interior mutability so mutation is observed through
//! shared references, matching `spec.md` §3's lifecycle note. Everything
//! else (numbers, booleans, null, strings, paths, sigs) behaves as a value
//! type even where it happens to be `Rc`-backed for cheap cloning.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use num_bigint::BigInt;

use crate::ast::PathAst;
use crate::concurrency::{ChannelRef, TaskHandleRef};
use crate::error::EvalResult;
use crate::function::FunctionValue;
use crate::scope::ScopeRef;

pub(crate) type ListRef = Rc<RefCell<Vec<Value>>>;
pub(crate) type DictRef = Rc<RefCell<IndexMap<String, Value>>>;

/// A `(status, value)` pair (`spec.md` §3 Response).
#[derive(Debug, Clone)]
pub(crate) struct ResponseData {
    pub status: Rc<str>,
    pub value: Value,
}

/// Opaque reference to a host-managed value satisfying a mapping contract.
///
/// `spec.md` §3/§9: "an opaque reference satisfying a mapping contract
/// (get/set/delete by string key) and optionally exposing decorated
/// methods as functions."
pub(crate) trait HostObject: fmt::Debug {
    fn get(&self, key: &str) -> EvalResult<Value>;
    fn set(&self, key: &str, value: Value) -> EvalResult<()>;
    fn delete(&self, key: &str) -> EvalResult<()>;

    /// Exposes a decorated method as a callable, if the host chooses to.
    fn call_method(&self, _method: &str, _args: Vec<Value>) -> Option<EvalResult<Value>> {
        None
    }

    /// Used for `type-of`/`is-a?` reporting; defaults to `"host-object"`.
    fn type_name(&self) -> &str {
        "host-object"
    }
}

/// Primary runtime value type.
#[derive(Debug, Clone)]
pub(crate) enum Value {
    Int(i64),
    BigInt(Rc<BigInt>),
    Float(f64),
    Bool(bool),
    Null,
    Str(Rc<str>),
    /// A rendered interpolated string; distinct primitive name `i-string`.
    IString(Rc<str>),
    Bytes(Rc<[u8]>),
    List(ListRef),
    Dict(DictRef),
    Scope(ScopeRef),
    Code(Rc<crate::ast::CodeData>),
    Path(Rc<PathAst>),
    Sig(Rc<crate::ast::SigAst>),
    Function(FunctionValue),
    Native(Rc<crate::function::NativeFunction>),
    Response(Rc<ResponseData>),
    Host(Rc<dyn HostObject>),
    Channel(ChannelRef),
    Task(TaskHandleRef),
}

impl Value {
    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Self::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Self::List(Rc::new(RefCell::new(items)))
    }

    pub fn dict(map: IndexMap<String, Value>) -> Self {
        Self::Dict(Rc::new(RefCell::new(map)))
    }

    pub fn response(status: impl Into<Rc<str>>, value: Value) -> Self {
        Self::Response(Rc::new(ResponseData {
            status: status.into(),
            value,
        }))
    }

    /// The canonical primitive name used by `type-of` and dispatcher
    /// coverage scoring (`spec.md` §4.4/§4.5).
    pub fn primitive_name(&self) -> &'static str {
        match self {
            Self::Int(_) | Self::BigInt(_) => "int",
            Self::Float(_) => "float",
            Self::Bool(_) => "boolean",
            Self::Null => "none",
            Self::Str(_) => "string",
            Self::IString(_) => "i-string",
            Self::Bytes(_) => "bytes",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
            Self::Scope(_) => "scope",
            Self::Code(_) => "code",
            Self::Path(_) => "path",
            Self::Sig(_) => "sig",
            Self::Function(_) | Self::Native(_) => "function",
            Self::Response(_) => "response",
            Self::Host(h) => {
                let _ = h;
                "host-object"
            }
            Self::Channel(_) => "channel",
            Self::Task(_) => "task",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Null => false,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::BigInt(b) => !b.as_ref().eq(&BigInt::from(0)),
            Self::Float(f) => *f != 0.0,
            Self::Str(s) | Self::IString(s) => !s.is_empty(),
            Self::Bytes(b) => !b.is_empty(),
            Self::List(l) => !l.borrow().is_empty(),
            Self::Dict(d) => !d.borrow().is_empty(),
            _ => true,
        }
    }

    pub fn as_path(&self) -> Option<&Rc<PathAst>> {
        match self {
            Self::Path(p) => Some(p),
            _ => None,
        }
    }

    /// Structural/identity equality used by the `eq` primitive and by
    /// `spec.md` §8's "Path equality" invariant.
    #[must_use]
    pub fn slip_eq(a: &Value, b: &Value) -> bool {
        use Value::{BigInt as VBigInt, Bool, Bytes, Dict, Float, IString, Int, List, Null, Path, Scope, Str};
        match (a, b) {
            (Int(x), Int(y)) => x == y,
            (Float(x), Float(y)) => x == y,
            (Int(x), Float(y)) | (Float(y), Int(x)) => (*x as f64) == *y,
            (VBigInt(x), VBigInt(y)) => x == y,
            (Bool(x), Bool(y)) => x == y,
            (Null, Null) => true,
            (Str(x), Str(y)) | (IString(x), IString(y)) | (Str(x), IString(y)) | (IString(x), Str(y)) => x == y,
            (Bytes(x), Bytes(y)) => x == y,
            (List(x), List(y)) => {
                let x = x.borrow();
                let y = y.borrow();
                x.len() == y.len() && x.iter().zip(y.iter()).all(|(a, b)| Value::slip_eq(a, b))
            }
            (Dict(x), Dict(y)) => {
                let x = x.borrow();
                let y = y.borrow();
                x.len() == y.len()
                    && x.iter()
                        .all(|(k, v)| y.get(k).is_some_and(|other| Value::slip_eq(v, other)))
            }
            (Scope(x), Scope(y)) => Rc::ptr_eq(x, y),
            (Path(x), Path(y)) => x.pformat() == y.pformat(),
            _ => false,
        }
    }
}

/// Structural equality, delegating to `slip_eq` so `assert_eq!` in tests
/// and any incidental `==` use agree with the `eq` primitive's semantics.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        Value::slip_eq(self, other)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::BigInt(b) => write!(f, "{b}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Null => write!(f, "none"),
            Self::Str(s) | Self::IString(s) => f.write_str(s),
            Self::Bytes(b) => write!(f, "bytes({} bytes)", b.len()),
            Self::List(l) => {
                write!(f, "#[")?;
                for (i, v) in l.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Self::Dict(d) => {
                write!(f, "#{{")?;
                for (i, (k, v)) in d.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Self::Scope(s) => {
                let name = s.borrow().meta.name.clone();
                write!(f, "scope<{}>", name.unwrap_or_else(|| "anonymous".to_owned()))
            }
            Self::Code(_) => write!(f, "<code>"),
            Self::Path(p) => write!(f, "{}", p.pformat()),
            Self::Sig(_) => write!(f, "<sig>"),
            Self::Function(_) | Self::Native(_) => write!(f, "<function>"),
            Self::Response(r) => write!(f, "response({}, {})", r.status, r.value),
            Self::Host(_) => write!(f, "<host-object>"),
            Self::Channel(_) => write!(f, "<channel>"),
            Self::Task(_) => write!(f, "<task>"),
        }
    }
}
