//! Builder for body functions.
//!
//! Follows the "position at a block, emit instructions, terminate" pattern:
//! the member generators allocate the blocks of a fixed shape up front,
//! then fill each one in turn.

use kiln_ir::{Name, Value, ValueType};
use smallvec::SmallVec;

use crate::{
    BlockId, BodyBlock, BodyFunction, BodyInstr, BodyTerminator, CallTarget, FieldId, HookArg,
    LocalDecl, LocalId, LocalKind, Operand, WrapState,
};

/// In-progress basic block.
struct BlockBuilder {
    id: BlockId,
    body: Vec<BodyInstr>,
    terminator: Option<BodyTerminator>,
}

impl BlockBuilder {
    fn new(id: BlockId) -> Self {
        Self {
            id,
            body: Vec::new(),
            terminator: None,
        }
    }
}

/// Builder for an in-progress [`BodyFunction`].
///
/// Consumed by [`finish`](BodyBuilder::finish).
pub struct BodyBuilder {
    name: String,
    member: Name,
    params: Vec<ValueType>,
    return_type: ValueType,
    blocks: Vec<BlockBuilder>,
    current_block: BlockId,
    locals: Vec<LocalDecl>,
}

impl BodyBuilder {
    /// Create a builder with the entry block allocated and selected.
    pub fn new(
        name: impl Into<String>,
        member: Name,
        params: Vec<ValueType>,
        return_type: ValueType,
    ) -> Self {
        Self {
            name: name.into(),
            member,
            params,
            return_type,
            blocks: vec![BlockBuilder::new(BlockId::new(0))],
            current_block: BlockId::new(0),
            locals: Vec::new(),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn return_type(&self) -> &ValueType {
        &self.return_type
    }

    #[inline]
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    // Block management

    /// Allocate a new empty block and return its ID.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "member bodies have a handful of blocks"
    )]
    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId::new(self.blocks.len() as u32);
        self.blocks.push(BlockBuilder::new(id));
        id
    }

    /// Set the insertion point.
    pub fn position_at(&mut self, block: BlockId) {
        debug_assert!(
            block.index() < self.blocks.len(),
            "BlockId {} out of bounds (have {} blocks)",
            block.raw(),
            self.blocks.len(),
        );
        self.current_block = block;
    }

    #[inline]
    pub fn current_block(&self) -> BlockId {
        self.current_block
    }

    /// Check whether the current block already has a terminator.
    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.blocks[self.current_block.index()].terminator.is_some()
    }

    #[inline]
    pub fn entry_block(&self) -> BlockId {
        BlockId::new(0)
    }

    // Locals

    #[expect(
        clippy::cast_possible_truncation,
        reason = "member bodies have a handful of locals"
    )]
    fn declare(&mut self, kind: LocalKind, pinned: bool) -> LocalId {
        let id = LocalId::new(self.locals.len() as u32);
        self.locals.push(LocalDecl { kind, pinned });
        id
    }

    /// Declare a value local; reference types are pinned.
    pub fn declare_value(&mut self, ty: ValueType) -> LocalId {
        let pinned = ty.is_reference();
        self.declare(LocalKind::Value(ty), pinned)
    }

    /// Declare an exception local.
    pub fn declare_exception(&mut self) -> LocalId {
        self.declare(LocalKind::Exception, false)
    }

    /// Declare a flag local.
    pub fn declare_flag(&mut self) -> LocalId {
        self.declare(LocalKind::Flag, false)
    }

    // Instruction emission

    fn push(&mut self, instr: BodyInstr) {
        let block = &mut self.blocks[self.current_block.index()];
        debug_assert!(
            block.terminator.is_none(),
            "emitting into terminated block {}",
            block.id.raw()
        );
        block.body.push(instr);
    }

    /// Emit `Zero`.
    pub fn emit_zero(&mut self, dst: LocalId) {
        self.push(BodyInstr::Zero { dst });
    }

    /// Emit `Move`.
    pub fn emit_move(&mut self, dst: LocalId, src: Operand) {
        self.push(BodyInstr::Move { dst, src });
    }

    /// Emit `Const`.
    pub fn emit_const(&mut self, dst: LocalId, value: Value) {
        self.push(BodyInstr::Const { dst, value });
    }

    /// Emit a hook call.
    pub fn emit_call_hook(
        &mut self,
        dst: Option<LocalId>,
        field: FieldId,
        hook: Name,
        args: SmallVec<[HookArg; 4]>,
    ) {
        self.push(BodyInstr::CallHook {
            dst,
            field,
            hook,
            args,
        });
    }

    /// Emit an unprotected body call.
    pub fn emit_call_body(
        &mut self,
        dst: Option<LocalId>,
        target: CallTarget,
        args: SmallVec<[Operand; 4]>,
    ) {
        self.push(BodyInstr::CallBody { dst, target, args });
    }

    /// Emit an `IsNull` test on an exception local, returning a fresh flag.
    pub fn emit_is_null(&mut self, src: LocalId) -> LocalId {
        let dst = self.declare_flag();
        self.push(BodyInstr::IsNull { dst, src });
        dst
    }

    /// Emit a wrapping-state mark.
    pub fn emit_mark(&mut self, state: WrapState) {
        self.push(BodyInstr::Mark(state));
    }

    // Terminators

    fn terminate(&mut self, terminator: BodyTerminator) {
        let block = &mut self.blocks[self.current_block.index()];
        debug_assert!(
            block.terminator.is_none(),
            "block {} already terminated",
            self.current_block.raw()
        );
        block.terminator = Some(terminator);
    }

    /// Terminate with `Return`.
    pub fn terminate_return(&mut self, value: Option<LocalId>) {
        self.terminate(BodyTerminator::Return { value });
    }

    /// Terminate with `Jump`.
    pub fn terminate_jump(&mut self, target: BlockId) {
        self.terminate(BodyTerminator::Jump { target });
    }

    /// Terminate with `Branch`.
    pub fn terminate_branch(&mut self, cond: LocalId, then_block: BlockId, else_block: BlockId) {
        self.terminate(BodyTerminator::Branch {
            cond,
            then_block,
            else_block,
        });
    }

    /// Terminate with `Invoke` (protected call).
    pub fn terminate_invoke(
        &mut self,
        dst: Option<LocalId>,
        target: CallTarget,
        args: SmallVec<[Operand; 4]>,
        normal: BlockId,
        unwind: BlockId,
        exception: LocalId,
    ) {
        self.terminate(BodyTerminator::Invoke {
            dst,
            target,
            args,
            normal,
            unwind,
            exception,
        });
    }

    /// Terminate with `Rethrow`.
    pub fn terminate_rethrow(&mut self, exception: LocalId) {
        self.terminate(BodyTerminator::Rethrow { exception });
    }

    /// Terminate with `Unreachable`.
    pub fn terminate_unreachable(&mut self) {
        self.terminate(BodyTerminator::Unreachable);
    }

    // Finalization

    /// Consume the builder and produce a finished [`BodyFunction`].
    ///
    /// Unterminated blocks get `Unreachable` (with a tracing warning).
    pub fn finish(self) -> BodyFunction {
        let name = self.name;
        let blocks = self
            .blocks
            .into_iter()
            .map(|bb| {
                let terminator = bb.terminator.unwrap_or_else(|| {
                    tracing::warn!(
                        function = %name,
                        block = bb.id.raw(),
                        "unterminated block, patching with Unreachable"
                    );
                    BodyTerminator::Unreachable
                });
                BodyBlock {
                    id: bb.id,
                    body: bb.body,
                    terminator,
                }
            })
            .collect();

        BodyFunction {
            name,
            member: self.member,
            params: self.params,
            return_type: self.return_type,
            locals: self.locals,
            blocks,
            entry: BlockId::new(0),
        }
    }
}
