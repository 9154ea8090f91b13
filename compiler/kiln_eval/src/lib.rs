//! Kiln Eval - runtime side of the baking engine.
//!
//! A bake produces a [`BakedType`]: a field layout, a constructor, and a
//! dispatch table from [`MemberKey`] to either a synthesized body function
//! or a declared default body. [`Instance`] allocates the fields, runs the
//! constructor, and dispatches member calls through the body interpreter.
//!
//! Instances are single-threaded (`Rc` plus one `RefCell` per field);
//! baked types are `Send + Sync` and shared through `Arc`.

mod baked;
mod instance;
mod interpreter;
mod member_key;
mod stack;

pub use baked::{
    BakedType, BakedTypeBuilder, EventInfo, FieldDef, FieldKind, MemberEntry, MemberTarget,
    MethodInfo, PropertyInfo,
};
pub use instance::{Instance, Traced};
pub use kiln_ir::Receiver;
pub use member_key::{AccessorKind, MemberKey, MemberKeyDisplay};
pub use stack::{ensure_sufficient_stack, with_call_depth, MAX_CALL_DEPTH};
