//! Body IR: the basic-block form of every synthesized member.
//!
//! A baked type's accessors, event methods, wrapped methods, and its
//! constructor are all [`BodyFunction`]s. The shapes are fixed (direct
//! delegation, mix-in forwarding, the wrapping protocol, `Init` calls), so
//! the instruction set is small:
//!
//! - **[`BodyFunction`]**: signature, locals, blocks
//! - **[`BodyBlock`]**: straight-line instructions plus one terminator
//! - **[`BodyInstr`]**: local initialisation, hook/body calls, state marks
//! - **[`BodyTerminator`]**: return, jump, branch, protected call, rethrow
//!
//! Control flow is acyclic; the verifier rejects back edges.

use kiln_ir::{Name, Value, ValueType};
use smallvec::SmallVec;

use crate::WrapState;

// ── ID newtypes ─────────────────────────────────────────────────────

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create an ID from a raw index.
            #[inline]
            pub const fn new(raw: u32) -> Self {
                Self(raw)
            }

            /// Get the raw `u32` value.
            #[inline]
            pub const fn raw(self) -> u32 {
                self.0
            }

            /// Get the index as `usize` (for indexing into `Vec`s).
            #[inline]
            pub const fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_id! {
    /// Local slot within one [`BodyFunction`], allocated sequentially from 0.
    LocalId
}

define_id! {
    /// Basic block within one [`BodyFunction`]; block 0 is the entry.
    BlockId
}

define_id! {
    /// Field of a baked type (an implementation instance or a mix-in).
    FieldId
}

define_id! {
    /// Default body registered on a baked type.
    BodyId
}

// ── Locals ──────────────────────────────────────────────────────────

/// What a local slot holds.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum LocalKind {
    /// A value of the given type (the wrapping protocol's value local,
    /// constructor defaults, call results).
    Value(ValueType),
    /// A caught fault, null until something is caught.
    Exception,
    /// A boolean produced by a hook or an `IsNull` test.
    Flag,
}

/// A declared local.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct LocalDecl {
    pub kind: LocalKind,
    /// Reference-typed value locals are pinned: hooks hold them by
    /// reference across the protected call.
    pub pinned: bool,
}

// ── Operands ────────────────────────────────────────────────────────

/// A value read by an instruction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operand {
    /// Current content of a value local.
    Local(LocalId),
    /// Positional argument of the function.
    Arg(u32),
}

/// One role argument of a hook call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookArg {
    /// Value role, passed by value.
    Value(Operand),
    /// Value role, passed by reference: writes land in the local.
    ValueRef(LocalId),
    /// Mix-in role: the state block of a mix-in field, by reference.
    Mixin(FieldId),
    /// Container role: the instance itself.
    Container,
    /// Exception role: the fault held by an exception local.
    Exception(LocalId),
}

/// Callee of a body call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallTarget {
    /// A default body declared on an interface or class.
    Body(BodyId),
    /// A body declared on a mix-in, run against that mix-in's field.
    MixinBody { field: FieldId, body: BodyId },
}

// ── Instructions ────────────────────────────────────────────────────

/// A straight-line instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum BodyInstr {
    /// Reset a local to its zero value (null exception, cleared flag).
    Zero { dst: LocalId },

    /// Copy an operand into a value local.
    Move { dst: LocalId, src: Operand },

    /// Load a constant into a value local.
    Const { dst: LocalId, value: Value },

    /// Call a hook of the implementation stored in `field`.
    ///
    /// Faults raised by the hook propagate out of the function.
    CallHook {
        dst: Option<LocalId>,
        field: FieldId,
        hook: Name,
        args: SmallVec<[HookArg; 4]>,
    },

    /// Call a body outside any protected region.
    CallBody {
        dst: Option<LocalId>,
        target: CallTarget,
        args: SmallVec<[Operand; 4]>,
    },

    /// `dst = (src holds no fault)`.
    IsNull { dst: LocalId, src: LocalId },

    /// Record the wrapping-protocol state reached on this path.
    Mark(WrapState),
}

impl BodyInstr {
    /// The local this instruction writes, if any.
    pub fn defined_local(&self) -> Option<LocalId> {
        match self {
            BodyInstr::Zero { dst }
            | BodyInstr::Move { dst, .. }
            | BodyInstr::Const { dst, .. }
            | BodyInstr::IsNull { dst, .. } => Some(*dst),
            BodyInstr::CallHook { dst, .. } | BodyInstr::CallBody { dst, .. } => *dst,
            BodyInstr::Mark(_) => None,
        }
    }
}

// ── Terminators ─────────────────────────────────────────────────────

/// How control leaves a basic block.
#[derive(Clone, Debug, PartialEq)]
pub enum BodyTerminator {
    /// Return the content of a value local, or void.
    Return { value: Option<LocalId> },

    /// Unconditional jump.
    Jump { target: BlockId },

    /// Conditional branch on a flag local.
    Branch {
        cond: LocalId,
        then_block: BlockId,
        else_block: BlockId,
    },

    /// Protected call. On success the result (if any) lands in `dst` and
    /// control moves to `normal`; on a fault the fault lands in
    /// `exception` and control moves to `unwind`.
    Invoke {
        dst: Option<LocalId>,
        target: CallTarget,
        args: SmallVec<[Operand; 4]>,
        normal: BlockId,
        unwind: BlockId,
        exception: LocalId,
    },

    /// Re-raise the fault held by an exception local, unchanged.
    Rethrow { exception: LocalId },

    /// Control never reaches the end of this block.
    Unreachable,
}

impl BodyTerminator {
    /// Successor blocks, in branch order.
    pub fn successors(&self) -> SmallVec<[BlockId; 2]> {
        match self {
            BodyTerminator::Jump { target } => smallvec::smallvec![*target],
            BodyTerminator::Branch {
                then_block,
                else_block,
                ..
            } => smallvec::smallvec![*then_block, *else_block],
            BodyTerminator::Invoke { normal, unwind, .. } => smallvec::smallvec![*normal, *unwind],
            BodyTerminator::Return { .. }
            | BodyTerminator::Rethrow { .. }
            | BodyTerminator::Unreachable => SmallVec::new(),
        }
    }
}

// ── Blocks & functions ──────────────────────────────────────────────

/// A basic block.
#[derive(Clone, Debug, PartialEq)]
pub struct BodyBlock {
    pub id: BlockId,
    pub body: Vec<BodyInstr>,
    pub terminator: BodyTerminator,
}

/// A synthesized member body (or constructor).
#[derive(Clone, Debug, PartialEq)]
pub struct BodyFunction {
    /// Diagnostic name, e.g. `IPerson.get_Name`.
    pub name: String,
    /// Property, event, or method the function serves; passed to hooks.
    pub member: Name,
    pub params: Vec<ValueType>,
    pub return_type: ValueType,
    /// Locals, indexed by `LocalId::index()`.
    pub locals: Vec<LocalDecl>,
    /// Blocks in definition order; `blocks[entry.index()]` is the entry.
    pub blocks: Vec<BodyBlock>,
    pub entry: BlockId,
}

impl BodyFunction {
    /// Look up a local's declaration.
    #[inline]
    pub fn local(&self, local: LocalId) -> Option<&LocalDecl> {
        self.locals.get(local.index())
    }

    /// Look up a block.
    #[inline]
    pub fn block(&self, block: BlockId) -> Option<&BodyBlock> {
        self.blocks.get(block.index())
    }

    /// Whether any path through the function records a wrapping state.
    pub fn is_wrapping(&self) -> bool {
        self.blocks
            .iter()
            .flat_map(|b| &b.body)
            .any(|instr| matches!(instr, BodyInstr::Mark(_)))
    }
}
