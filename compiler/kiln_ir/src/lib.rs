//! Kiln IR - shared vocabulary of the baking engine.
//!
//! This crate holds the data every other Kiln crate passes around:
//! - `Name`s for interned type, member, and field names
//! - `TypeKey`/`ImplKey` registry handles
//! - `ValueType` (declared types) and `Value` (runtime values)
//! - `Record` state blocks for implementations and mix-ins
//! - `Fault`, the call-time exception
//! - the `Receiver` seam and the `MemberBody`/`HookFn` callables
//!
//! Nothing here knows how a type is baked or how an instance dispatches;
//! that lives in `kiln_types`, `kiln_emit`, `kiln_eval`, and `kiln_bake`.

mod body;
mod fault;
mod interner;
mod name;
mod receiver;
mod record;
mod type_key;
mod value;
mod value_type;

pub use body::{BodyCx, HookCx, HookFn, MemberBody, Notification};
pub use fault::{Fault, FaultKind};
pub use interner::{InternError, SharedInterner, StringInterner};
pub use name::Name;
pub use receiver::Receiver;
pub use record::{Record, RecordLayout};
pub use type_key::{ImplKey, TypeKey};
pub use value::{Handler, Value};
pub use value_type::ValueType;
