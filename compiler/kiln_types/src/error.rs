//! Bake-time errors.
//!
//! Everything here is raised while a type is being baked, never while an
//! instance runs, and is never retried: a bake either succeeds or reports
//! the first configuration problem it finds.

use kiln_emit::VerifyError;
use kiln_ir::Fault;

/// Why a type could not be baked.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BakeError {
    #[error("type `{name}` is already registered")]
    DuplicateType { name: String },

    #[error("unknown type `{name}`")]
    UnknownType { name: String },

    #[error("ambiguous default implementation for `{member}`: {}", .candidates.join(", "))]
    AmbiguousImplementation {
        member: String,
        candidates: Vec<String>,
    },

    #[error(
        "`{member}` requires an implementation, none found in: {}",
        .search_space.join(", ")
    )]
    MissingImplementation {
        member: String,
        search_space: Vec<String>,
    },

    #[error("implementation `{implementation}` is invalid: {reason}")]
    InvalidImplementation {
        implementation: String,
        reason: String,
    },

    #[error("implementation `{implementation}`, hook `{hook}`: {reason}")]
    HookMismatch {
        implementation: String,
        hook: String,
        reason: String,
    },

    #[error("implementation `{implementation}` is a {found} implementation but `{member}` needs {expected}")]
    ShapeMismatch {
        member: String,
        implementation: String,
        expected: String,
        found: String,
    },

    #[error("property `{property}` is neither readable nor writable")]
    NeitherReadableNorWritable { property: String },

    #[error("property `{property}` is writable but not readable")]
    NotReadable { property: String },

    #[error("property `{property}`: getter is {getter} but setter is {setter}")]
    ConflictingAccessorKinds {
        property: String,
        getter: String,
        setter: String,
    },

    #[error("event `{event}`: adder is {add} but remover is {remove}")]
    ConflictingEventAccessors {
        event: String,
        add: String,
        remove: String,
    },

    #[error("`{member}` requests more than one mix-in: {}", .mixins.join(", "))]
    MultipleMixins { member: String, mixins: Vec<String> },

    #[error("interface `{interface}` is already implemented by `{baked}`")]
    DuplicateInterface { interface: String, baked: String },

    #[error("`{member}` is declared twice with different signatures: `{first}` and `{second}`")]
    MemberCollision {
        member: String,
        first: String,
        second: String,
    },

    #[error("constructing `{type_name}` failed: {fault}")]
    Construction {
        type_name: String,
        #[source]
        fault: Fault,
    },

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BakeError {
    pub fn internal(message: impl Into<String>) -> Self {
        BakeError::Internal(message.into())
    }

    pub fn invalid(implementation: &str, reason: impl Into<String>) -> Self {
        BakeError::InvalidImplementation {
            implementation: implementation.to_owned(),
            reason: reason.into(),
        }
    }

    pub fn hook(implementation: &str, hook: &str, reason: impl Into<String>) -> Self {
        BakeError::HookMismatch {
            implementation: implementation.to_owned(),
            hook: hook.to_owned(),
            reason: reason.into(),
        }
    }
}
