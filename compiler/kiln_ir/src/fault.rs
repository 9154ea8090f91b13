//! Call-time faults.
//!
//! A `Fault` is the exception of the baked object model: raised by member
//! bodies and hooks, caught by wrapping code, and either suppressed or
//! rethrown. Rethrowing hands back the same `Arc`, so callers can check
//! identity with [`Fault::ptr_eq`].

use std::sync::Arc;

use crate::Name;

/// What went wrong during a member call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FaultKind {
    /// Raised by user code (a member body or a hook).
    #[error("{type_name}: {message}")]
    Raised { type_name: String, message: String },

    /// The instance has no member with that name and accessor kind.
    #[error("`{type_name}` has no member `{member}`")]
    UnknownMember { type_name: String, member: String },

    /// Wrong number of arguments.
    #[error("`{member}` takes {expected} argument(s) but {got} were supplied")]
    Arity {
        member: String,
        expected: usize,
        got: usize,
    },

    /// A field's state is already borrowed by an in-flight hook or body.
    #[error("field `{field}` is in use by an in-flight call")]
    FieldBusy { field: String },

    /// A value did not conform to the slot it was written to.
    #[error("type mismatch: expected `{expected}`, found `{found}`")]
    TypeMismatch { expected: String, found: String },

    /// A record was accessed with a field name its layout does not have.
    #[error("record has no field {0:?}")]
    UnknownField(Name),

    /// Interpreter invariant violated.
    #[error("internal fault: {0}")]
    Internal(String),
}

/// Shared handle to a [`FaultKind`].
#[derive(Clone, Debug, thiserror::Error)]
#[error("{0}")]
pub struct Fault(Arc<FaultKind>);

impl Fault {
    pub fn new(kind: FaultKind) -> Self {
        Fault(Arc::new(kind))
    }

    /// Raise a user fault of the given exception type.
    pub fn raise(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(FaultKind::Raised {
            type_name: type_name.into(),
            message: message.into(),
        })
    }

    pub fn unknown_member(type_name: &str, member: &str) -> Self {
        Self::new(FaultKind::UnknownMember {
            type_name: type_name.to_owned(),
            member: member.to_owned(),
        })
    }

    pub fn arity(member: &str, expected: usize, got: usize) -> Self {
        Self::new(FaultKind::Arity {
            member: member.to_owned(),
            expected,
            got,
        })
    }

    pub fn field_busy(field: &str) -> Self {
        Self::new(FaultKind::FieldBusy {
            field: field.to_owned(),
        })
    }

    pub fn type_mismatch(expected: &str, found: &str) -> Self {
        Self::new(FaultKind::TypeMismatch {
            expected: expected.to_owned(),
            found: found.to_owned(),
        })
    }

    pub fn no_field(field: Name) -> Self {
        Self::new(FaultKind::UnknownField(field))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(FaultKind::Internal(message.into()))
    }

    #[inline]
    pub fn kind(&self) -> &FaultKind {
        &self.0
    }

    /// Whether this is a user fault of the given exception type.
    pub fn is_raised(&self, type_name: &str) -> bool {
        matches!(&*self.0, FaultKind::Raised { type_name: t, .. } if t == type_name)
    }

    /// Identity comparison: `true` only for clones of the same fault.
    pub fn ptr_eq(&self, other: &Fault) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<FaultKind> for Fault {
    fn from(kind: FaultKind) -> Self {
        Fault::new(kind)
    }
}
