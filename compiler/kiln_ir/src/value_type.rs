//! Structural value types used in member signatures and state layouts.

use std::fmt;

/// The type of a property, parameter, return value, or state field.
///
/// `Param(i)` refers to the i-th generic parameter of the declaring type
/// (an interface `IRepository<T>` declares members in terms of `Param(0)`);
/// it is replaced by a concrete type through [`ValueType::substitute`]
/// whenever a member is reached through an instantiated reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ValueType {
    Void,
    Bool,
    Int,
    Float,
    Str,
    /// Event handler (delegate).
    Handler,
    /// Immutable list of values.
    List(Box<ValueType>),
    /// Generic parameter of the declaring type, by position.
    Param(u32),
}

impl ValueType {
    /// Whether values of this type are references (nullable at runtime).
    pub fn is_reference(&self) -> bool {
        matches!(
            self,
            ValueType::Str | ValueType::Handler | ValueType::List(_) | ValueType::Param(_)
        )
    }

    /// Whether this type is `void`.
    #[inline]
    pub fn is_void(&self) -> bool {
        matches!(self, ValueType::Void)
    }

    /// Whether the type still mentions a generic parameter.
    pub fn has_params(&self) -> bool {
        match self {
            ValueType::Param(_) => true,
            ValueType::List(elem) => elem.has_params(),
            _ => false,
        }
    }

    /// Replace generic parameters with the given arguments.
    ///
    /// Parameters without a corresponding argument are left open.
    #[must_use]
    pub fn substitute(&self, args: &[ValueType]) -> ValueType {
        match self {
            ValueType::Param(i) => args
                .get(*i as usize)
                .cloned()
                .unwrap_or(ValueType::Param(*i)),
            ValueType::List(elem) => ValueType::List(Box::new(elem.substitute(args))),
            other => other.clone(),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Void => f.write_str("void"),
            ValueType::Bool => f.write_str("bool"),
            ValueType::Int => f.write_str("int"),
            ValueType::Float => f.write_str("float"),
            ValueType::Str => f.write_str("str"),
            ValueType::Handler => f.write_str("handler"),
            ValueType::List(elem) => write!(f, "list<{elem}>"),
            ValueType::Param(i) => write!(f, "T{i}"),
        }
    }
}
