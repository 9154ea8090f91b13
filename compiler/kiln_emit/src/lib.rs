//! Kiln body IR.
//!
//! Every member a bake synthesizes (direct delegation, mix-in forwarding,
//! the Before/After/AfterError wrapping protocol, and the constructor) is
//! emitted as a small basic-block [`BodyFunction`] through [`BodyBuilder`],
//! checked by [`verify`], and interpreted by `kiln_eval`.

mod builder;
mod dump;
mod ir;
mod verify;
mod wrap;

pub use builder::BodyBuilder;
pub use dump::dump;
pub use ir::{
    BlockId, BodyBlock, BodyFunction, BodyId, BodyInstr, BodyTerminator, CallTarget, FieldId,
    HookArg, LocalDecl, LocalId, LocalKind, Operand,
};
pub use verify::{verify, VerifyError};
pub use wrap::WrapState;
