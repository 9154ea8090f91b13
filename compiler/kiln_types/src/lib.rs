//! Kiln types - what a bake reads.
//!
//! - [`TypeRegistry`] and its builders: interfaces, mix-ins, classes, and
//!   implementation types
//! - [`SignatureAnalyzer`]: member identities and flags, memoized
//! - [`ImplementationMap`]: which declaration implements each member
//! - [`CheckedImplementation`]: implementation types validated against
//!   their shape and closed over a member type
//! - [`StandardLibrary`]: the stock implementation types and mix-ins
//! - [`BakeError`]: every configuration error a bake can report

mod error;
mod implementation;
mod mapping;
mod nullability;
mod registry;
mod signature;
mod stdlib;

pub use error::BakeError;
pub use implementation::{
    CheckedImplementation, ClosedHook, ClosedImplementation, HookDecl, HookParam, HookResult,
    HookReturn, ImplInterface, ImplParam, ImplementationDef, ParamBinding, Role, Shape,
};
pub use mapping::{ImplementationMap, Resolution};
pub use nullability::Nullability;
pub use registry::{
    Accessor, EventBuilder, EventDecl, HookBuilder, ImplementationBuilder, MemberMeta,
    MethodBuilder, MethodDecl, MethodRef, MethodSlot, PropertyBuilder, PropertyDecl, TypeBuilder,
    TypeDef, TypeKind, TypeRef, TypeRegistry, Visibility,
};
pub use signature::{
    MemberFacts, MemberFlags, MemberIdentity, Modifier, Signature, SignatureAnalyzer,
};
pub use stdlib::StandardLibrary;
