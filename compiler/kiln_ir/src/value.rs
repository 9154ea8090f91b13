//! Runtime values stored in instance fields and passed through member calls.

use std::fmt;
use std::sync::Arc;

use crate::{Fault, Receiver, ValueType};

/// A runtime value.
///
/// Reference-typed values (`Str`, `Handler`, `List`) are `Arc`-backed so
/// cloning a value out of a field never copies its payload.
#[derive(Clone)]
pub enum Value {
    /// Null reference (zero value of every reference type).
    Null,
    /// Result of a `void` call.
    Void,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Arc<str>),
    Handler(Handler),
    List(Arc<[Value]>),
}

impl Value {
    /// Create a string value.
    pub fn str(s: &str) -> Self {
        Value::Str(Arc::from(s))
    }

    /// The zero value of a type (`false`, `0`, `0.0`, null, or void).
    pub fn zero(ty: &ValueType) -> Self {
        match ty {
            ValueType::Void => Value::Void,
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::Str | ValueType::Handler | ValueType::List(_) | ValueType::Param(_) => {
                Value::Null
            }
        }
    }

    /// Short name of the value's runtime kind, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Void => "void",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Handler(_) => "handler",
            Value::List(_) => "list",
        }
    }

    /// Whether this value may be stored in a slot of type `ty`.
    ///
    /// Null conforms to every reference type; open generic parameters
    /// accept anything.
    pub fn conforms_to(&self, ty: &ValueType) -> bool {
        match (self, ty) {
            (_, ValueType::Param(_)) => true,
            (Value::Null, ty) => ty.is_reference(),
            (Value::Void, ValueType::Void)
            | (Value::Bool(_), ValueType::Bool)
            | (Value::Int(_), ValueType::Int)
            | (Value::Float(_), ValueType::Float)
            | (Value::Str(_), ValueType::Str)
            | (Value::Handler(_), ValueType::Handler) => true,
            (Value::List(items), ValueType::List(elem)) => {
                items.iter().all(|item| item.conforms_to(elem))
            }
            _ => false,
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_handler(&self) -> Option<&Handler> {
        match self {
            Value::Handler(h) => Some(h),
            _ => None,
        }
    }

    /// Items of a list value; null reads as the empty list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            Value::Null => Some(&[]),
            _ => None,
        }
    }

    /// Expect a boolean, faulting with a type mismatch otherwise.
    pub fn expect_bool(&self) -> Result<bool, Fault> {
        self.as_bool()
            .ok_or_else(|| Fault::type_mismatch("bool", self.kind_name()))
    }

    /// Expect an integer, faulting with a type mismatch otherwise.
    pub fn expect_int(&self) -> Result<i64, Fault> {
        self.as_int()
            .ok_or_else(|| Fault::type_mismatch("int", self.kind_name()))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::Void, Value::Void) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a.to_bits() == b.to_bits(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Handler(a), Value::Handler(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Void => f.write_str("void"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x:?}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Handler(h) => write!(f, "{h:?}"),
            Value::List(items) => f.debug_list().entries(items.iter()).finish(),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::str(s)
    }
}

impl From<Handler> for Value {
    fn from(h: Handler) -> Self {
        Value::Handler(h)
    }
}

type HandlerFn = dyn Fn(&dyn Receiver, &Value) -> Result<(), Fault> + Send + Sync;

/// Event handler: called with the notification sender and an argument.
///
/// Handlers compare by identity, so unsubscribing requires the same
/// handler (or a clone of it) that was subscribed.
#[derive(Clone)]
pub struct Handler(Arc<HandlerFn>);

impl Handler {
    pub fn new(
        f: impl Fn(&dyn Receiver, &Value) -> Result<(), Fault> + Send + Sync + 'static,
    ) -> Self {
        Handler(Arc::new(f))
    }

    /// Invoke the handler.
    pub fn invoke(&self, sender: &dyn Receiver, arg: &Value) -> Result<(), Fault> {
        (self.0)(sender, arg)
    }
}

impl PartialEq for Handler {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", Arc::as_ptr(&self.0).cast::<()>())
    }
}
