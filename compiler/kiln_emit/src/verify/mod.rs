//! Structural verification of body functions.
//!
//! Run on every function a bake produces before the baked type is handed
//! out. A failure here is an engine bug, never a user configuration error.

use rustc_hash::FxHashSet;

use crate::{
    BlockId, BodyFunction, BodyInstr, BodyTerminator, HookArg, LocalId, LocalKind, Operand,
};

/// A malformed body function.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("`{function}` has no blocks")]
    Empty { function: String },

    #[error("`{function}` references missing block bb{block}")]
    MissingBlock { function: String, block: u32 },

    #[error("`{function}` references undeclared local %{local}")]
    MissingLocal { function: String, local: u32 },

    #[error("`{function}`: local %{local} must be {expected}")]
    LocalKind {
        function: String,
        local: u32,
        expected: &'static str,
    },

    #[error("`{function}` reads argument {index} but takes {arity}")]
    MissingArg {
        function: String,
        index: u32,
        arity: usize,
    },

    #[error("`{function}`: return does not match declared return type")]
    ReturnMismatch { function: String },

    #[error("`{function}` has a control-flow cycle through bb{block}")]
    Cycle { function: String, block: u32 },
}

/// Expected kind of a local at a use site.
#[derive(Clone, Copy)]
enum Want {
    Value,
    Exception,
    Flag,
    /// Hook and body results: a value, or a flag for `bool` hooks.
    Result,
    Any,
}

impl Want {
    fn accepts(self, kind: &LocalKind) -> bool {
        matches!(
            (self, kind),
            (Want::Any, _)
                | (Want::Value | Want::Result, LocalKind::Value(_))
                | (Want::Exception, LocalKind::Exception)
                | (Want::Flag | Want::Result, LocalKind::Flag)
        )
    }

    fn describe(self) -> &'static str {
        match self {
            Want::Value => "a value local",
            Want::Exception => "an exception local",
            Want::Flag => "a flag local",
            Want::Result => "a value or flag local",
            Want::Any => "a local",
        }
    }
}

struct Verifier<'a> {
    func: &'a BodyFunction,
}

impl Verifier<'_> {
    fn local(&self, local: LocalId, want: Want) -> Result<(), VerifyError> {
        let decl = self
            .func
            .local(local)
            .ok_or_else(|| VerifyError::MissingLocal {
                function: self.func.name.clone(),
                local: local.raw(),
            })?;
        if want.accepts(&decl.kind) {
            Ok(())
        } else {
            Err(VerifyError::LocalKind {
                function: self.func.name.clone(),
                local: local.raw(),
                expected: want.describe(),
            })
        }
    }

    fn operand(&self, operand: Operand) -> Result<(), VerifyError> {
        match operand {
            Operand::Local(local) => self.local(local, Want::Value),
            Operand::Arg(index) => {
                if (index as usize) < self.func.params.len() {
                    Ok(())
                } else {
                    Err(VerifyError::MissingArg {
                        function: self.func.name.clone(),
                        index,
                        arity: self.func.params.len(),
                    })
                }
            }
        }
    }

    fn block_ref(&self, block: BlockId) -> Result<(), VerifyError> {
        if self.func.block(block).is_some() {
            Ok(())
        } else {
            Err(VerifyError::MissingBlock {
                function: self.func.name.clone(),
                block: block.raw(),
            })
        }
    }

    fn instr(&self, instr: &BodyInstr) -> Result<(), VerifyError> {
        match instr {
            BodyInstr::Zero { dst } => self.local(*dst, Want::Any),
            BodyInstr::Move { dst, src } => {
                self.local(*dst, Want::Value)?;
                self.operand(*src)
            }
            BodyInstr::Const { dst, .. } => self.local(*dst, Want::Value),
            BodyInstr::CallHook { dst, args, .. } => {
                if let Some(dst) = dst {
                    self.local(*dst, Want::Result)?;
                }
                for arg in args {
                    match arg {
                        HookArg::Value(operand) => self.operand(*operand)?,
                        HookArg::ValueRef(local) => self.local(*local, Want::Value)?,
                        HookArg::Exception(local) => self.local(*local, Want::Exception)?,
                        HookArg::Mixin(_) | HookArg::Container => {}
                    }
                }
                Ok(())
            }
            BodyInstr::CallBody { dst, args, .. } => {
                if let Some(dst) = dst {
                    self.local(*dst, Want::Value)?;
                }
                args.iter().try_for_each(|a| self.operand(*a))
            }
            BodyInstr::IsNull { dst, src } => {
                self.local(*dst, Want::Flag)?;
                self.local(*src, Want::Exception)
            }
            BodyInstr::Mark(_) => Ok(()),
        }
    }

    fn terminator(&self, terminator: &BodyTerminator) -> Result<(), VerifyError> {
        for succ in terminator.successors() {
            self.block_ref(succ)?;
        }
        match terminator {
            BodyTerminator::Return { value } => {
                let void = self.func.return_type.is_void();
                match value {
                    Some(local) if !void => self.local(*local, Want::Value),
                    None if void => Ok(()),
                    _ => Err(VerifyError::ReturnMismatch {
                        function: self.func.name.clone(),
                    }),
                }
            }
            BodyTerminator::Branch { cond, .. } => self.local(*cond, Want::Flag),
            BodyTerminator::Invoke {
                dst,
                args,
                exception,
                ..
            } => {
                if let Some(dst) = dst {
                    self.local(*dst, Want::Value)?;
                }
                args.iter().try_for_each(|a| self.operand(*a))?;
                self.local(*exception, Want::Exception)
            }
            BodyTerminator::Rethrow { exception } => self.local(*exception, Want::Exception),
            BodyTerminator::Jump { .. } | BodyTerminator::Unreachable => Ok(()),
        }
    }

    /// Depth-first search from the entry; a successor still on the stack
    /// is a back edge.
    fn acyclic(&self) -> Result<(), VerifyError> {
        let mut done = FxHashSet::default();
        let mut on_stack = FxHashSet::default();
        let mut stack = vec![(self.func.entry, 0usize)];
        on_stack.insert(self.func.entry);

        while let Some((block, next)) = stack.pop() {
            let succs = self
                .func
                .block(block)
                .map(|b| b.terminator.successors())
                .unwrap_or_default();
            if let Some(&succ) = succs.get(next) {
                stack.push((block, next + 1));
                if on_stack.contains(&succ) {
                    return Err(VerifyError::Cycle {
                        function: self.func.name.clone(),
                        block: succ.raw(),
                    });
                }
                if !done.contains(&succ) {
                    on_stack.insert(succ);
                    stack.push((succ, 0));
                }
            } else {
                on_stack.remove(&block);
                done.insert(block);
            }
        }
        Ok(())
    }
}

/// Verify one body function.
pub fn verify(func: &BodyFunction) -> Result<(), VerifyError> {
    if func.blocks.is_empty() {
        return Err(VerifyError::Empty {
            function: func.name.clone(),
        });
    }
    let verifier = Verifier { func };
    verifier.block_ref(func.entry)?;
    for block in &func.blocks {
        for instr in &block.body {
            verifier.instr(instr)?;
        }
        verifier.terminator(&block.terminator)?;
    }
    verifier.acyclic()
}

#[cfg(test)]
mod tests;
