//! The wrapping protocol around a default body.
//!
//! ```text
//! entry:      v = arg0 (setters) | zero;  ex = null
//!             ok = Before(v, ..)               -> call | vetoed
//! vetoed:     mark Vetoed                      -> exit
//! call:       invoke body                      -> succeeded | catch
//! succeeded:  mark Succeeded                   -> post
//! catch:      keep = AfterError(ex, v, ..)     -> rethrow | suppressed
//! suppressed: mark FailedSuppressed            -> post
//! rethrow:    mark FailedPropagating; rethrow ex
//! post:       ex is null                       -> after | exit
//! after:      After(v, ..)                     -> exit
//! exit:       return v
//! ```
//!
//! Implementations without `After`/`AfterError` get `catch` jumping
//! straight to `rethrow` and `post` jumping straight to `exit`.

use kiln_emit::{BodyId, CallTarget, Operand, WrapState};
use kiln_eval::AccessorKind;
use kiln_ir::Name;
use kiln_types::{BakeError, ClosedHook, ClosedImplementation};
use smallvec::smallvec;

use super::{arg_operands, hook_args, Accessor, Storage, Synthesizer, ValueSource};

/// Names of one Before/After/AfterError triple.
#[derive(Clone, Copy)]
pub(crate) struct WrapHooks {
    pub before: Name,
    pub after: Name,
    pub after_error: Name,
}

impl Synthesizer<'_> {
    /// Accessor body running `body` under the wrapping protocol.
    pub(super) fn wrapping(
        &mut self,
        acc: &Accessor,
        storage: &Storage,
        hooks: WrapHooks,
        body: BodyId,
    ) -> Result<(), BakeError> {
        let closed = &*storage.closed;
        let before = required(self, closed, hooks.before)?;
        let after = closed.hook(hooks.after);
        let after_error = closed.hook(hooks.after_error);

        let setter = acc.kind == AccessorKind::Set;
        let value_type = if setter {
            acc.facts
                .identity
                .signature
                .params
                .first()
                .cloned()
                .ok_or_else(|| BakeError::internal(format!("setter `{}` takes no value", acc.facts.qualified)))?
        } else {
            acc.ret().clone()
        };
        let returns = !acc.ret().is_void();

        let mut b = self.builder_for(acc);
        let v = b.declare_value(value_type.clone());
        let ex = b.declare_exception();
        let ok = b.declare_flag();

        let vetoed = b.new_block();
        let call = b.new_block();
        let succeeded = b.new_block();
        let catch = b.new_block();
        let rethrow = b.new_block();
        let post = b.new_block();
        let exit = b.new_block();

        if setter {
            b.emit_move(v, Operand::Arg(0));
        } else {
            b.emit_zero(v);
        }
        b.emit_zero(ex);
        let args = hook_args(&mut b, before, ValueSource::Local(v), &value_type, None, storage.mixin)?;
        b.emit_call_hook(Some(ok), storage.field, hooks.before, args);
        b.terminate_branch(ok, call, vetoed);

        b.position_at(vetoed);
        b.emit_mark(WrapState::Vetoed);
        b.terminate_jump(exit);

        b.position_at(call);
        let (dst, call_args) = if setter {
            (None, smallvec![Operand::Local(v)])
        } else {
            (returns.then_some(v), arg_operands(acc.arity())?)
        };
        b.terminate_invoke(dst, CallTarget::Body(body), call_args, succeeded, catch, ex);

        b.position_at(succeeded);
        b.emit_mark(WrapState::Succeeded);
        b.terminate_jump(post);

        b.position_at(catch);
        if let Some(after_error) = after_error {
            let keep = b.declare_flag();
            let suppressed = b.new_block();
            let args = hook_args(
                &mut b,
                after_error,
                ValueSource::Local(v),
                &value_type,
                Some(ex),
                storage.mixin,
            )?;
            b.emit_call_hook(Some(keep), storage.field, hooks.after_error, args);
            b.terminate_branch(keep, rethrow, suppressed);

            b.position_at(suppressed);
            b.emit_mark(WrapState::FailedSuppressed);
            b.terminate_jump(post);
        } else {
            b.terminate_jump(rethrow);
        }

        b.position_at(rethrow);
        b.emit_mark(WrapState::FailedPropagating);
        b.terminate_rethrow(ex);

        b.position_at(post);
        if let Some(after) = after {
            let clean = b.emit_is_null(ex);
            let run_after = b.new_block();
            b.terminate_branch(clean, run_after, exit);

            b.position_at(run_after);
            let args = hook_args(&mut b, after, ValueSource::Local(v), &value_type, None, storage.mixin)?;
            b.emit_call_hook(None, storage.field, hooks.after, args);
            b.terminate_jump(exit);
        } else {
            b.terminate_jump(exit);
        }

        b.position_at(exit);
        b.terminate_return(returns.then_some(v));

        tracing::trace!(member = %acc.facts.qualified, implementation = closed.name, "wrapped");
        let func = b.finish();
        self.synthesized(acc, func);
        Ok(())
    }
}

pub(super) fn required<'c>(
    syn: &Synthesizer<'_>,
    closed: &'c ClosedImplementation,
    hook: Name,
) -> Result<&'c ClosedHook, BakeError> {
    closed.hook(hook).ok_or_else(|| {
        BakeError::hook(
            closed.name,
            syn.registry.interner().lookup(hook),
            "required by the member but missing",
        )
    })
}
