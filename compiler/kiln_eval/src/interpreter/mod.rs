//! Body interpreter.
//!
//! Runs one [`BodyFunction`] against an [`Instance`]. Control flow is
//! acyclic (the verifier guarantees it), so a call walks at most every
//! block once.
//!
//! # Hook calls
//!
//! A `CallHook` borrows the implementation's field and, when the hook takes
//! the mix-in role, the mix-in's field, for exactly the duration of the
//! hook. By-reference value arguments are moved out of their local, lent
//! to the hook, and written back afterwards. Notifications the hook queued
//! are delivered after every borrow is released, so handlers may read back
//! any member of the instance.

use kiln_emit::{
    BlockId, BodyFunction, BodyInstr, BodyTerminator, CallTarget, FieldId, HookArg, LocalDecl,
    LocalId, LocalKind, Operand, WrapState,
};
use kiln_ir::{Fault, HookCx, Name, Receiver, Value};
use kiln_types::HookResult;
use smallvec::SmallVec;

use crate::Instance;

/// Content of a local slot.
#[derive(Clone, Debug)]
enum Slot {
    Value(Value),
    Exception(Option<Fault>),
    Flag(bool),
}

impl Slot {
    fn zero(kind: &LocalKind) -> Slot {
        match kind {
            LocalKind::Value(ty) => Slot::Value(Value::zero(ty)),
            LocalKind::Exception => Slot::Exception(None),
            LocalKind::Flag => Slot::Flag(false),
        }
    }
}

/// One activation of a body function.
pub(crate) struct Interpreter<'a> {
    instance: &'a Instance,
    func: &'a BodyFunction,
    args: &'a [Value],
    slots: Vec<Slot>,
    state: WrapState,
}

impl<'a> Interpreter<'a> {
    pub(crate) fn new(instance: &'a Instance, func: &'a BodyFunction, args: &'a [Value]) -> Self {
        Interpreter {
            instance,
            func,
            args,
            slots: func.locals.iter().map(|l| Slot::zero(&l.kind)).collect(),
            state: WrapState::NotStarted,
        }
    }

    /// Run to completion; the wrap state is reported even when the call
    /// faults.
    pub(crate) fn run(mut self) -> (Result<Value, Fault>, WrapState) {
        let result = self.execute();
        (result, self.state)
    }

    fn execute(&mut self) -> Result<Value, Fault> {
        let mut block = self.func.entry;
        loop {
            let func = self.func;
            let bb = func
                .block(block)
                .ok_or_else(|| self.internal(format!("missing block bb{}", block.raw())))?;
            for instr in &bb.body {
                self.step(instr)?;
            }
            match self.terminate(&bb.terminator)? {
                Next::Block(next) => block = next,
                Next::Return(value) => return Ok(value),
            }
        }
    }

    fn step(&mut self, instr: &BodyInstr) -> Result<(), Fault> {
        match instr {
            BodyInstr::Zero { dst } => {
                let kind = &self.decl(*dst)?.kind;
                let zero = Slot::zero(kind);
                self.store(*dst, zero)
            }
            BodyInstr::Move { dst, src } => {
                let value = self.operand(*src)?;
                self.store(*dst, Slot::Value(value))
            }
            BodyInstr::Const { dst, value } => self.store(*dst, Slot::Value(value.clone())),
            BodyInstr::CallHook {
                dst,
                field,
                hook,
                args,
            } => self.call_hook(*dst, *field, *hook, args),
            BodyInstr::CallBody { dst, target, args } => {
                let args = self.operands(args)?;
                let result = self.call_target(*target, &args)?;
                match dst {
                    Some(dst) => self.store(*dst, Slot::Value(result)),
                    None => Ok(()),
                }
            }
            BodyInstr::IsNull { dst, src } => {
                let is_null = match self.slot(*src)? {
                    Slot::Exception(fault) => fault.is_none(),
                    _ => return Err(self.internal(format!("%{} is not an exception", src.raw()))),
                };
                self.store(*dst, Slot::Flag(is_null))
            }
            BodyInstr::Mark(state) => {
                tracing::trace!(function = %self.func.name, %state, "wrap state");
                self.state = *state;
                Ok(())
            }
        }
    }

    fn terminate(&mut self, terminator: &BodyTerminator) -> Result<Next, Fault> {
        match terminator {
            BodyTerminator::Return { value: None } => Ok(Next::Return(Value::Void)),
            BodyTerminator::Return { value: Some(local) } => match self.slot(*local)? {
                Slot::Value(value) => Ok(Next::Return(value.clone())),
                _ => Err(self.internal(format!("%{} is not a value", local.raw()))),
            },
            BodyTerminator::Jump { target } => Ok(Next::Block(*target)),
            BodyTerminator::Branch {
                cond,
                then_block,
                else_block,
            } => match self.slot(*cond)? {
                Slot::Flag(true) => Ok(Next::Block(*then_block)),
                Slot::Flag(false) => Ok(Next::Block(*else_block)),
                _ => Err(self.internal(format!("%{} is not a flag", cond.raw()))),
            },
            BodyTerminator::Invoke {
                dst,
                target,
                args,
                normal,
                unwind,
                exception,
            } => {
                let args = self.operands(args)?;
                match self.call_target(*target, &args) {
                    Ok(result) => {
                        if let Some(dst) = dst {
                            self.store(*dst, Slot::Value(result))?;
                        }
                        Ok(Next::Block(*normal))
                    }
                    Err(fault) => {
                        tracing::trace!(function = %self.func.name, %fault, "caught");
                        self.store(*exception, Slot::Exception(Some(fault)))?;
                        Ok(Next::Block(*unwind))
                    }
                }
            }
            BodyTerminator::Rethrow { exception } => match self.slot(*exception)? {
                Slot::Exception(Some(fault)) => Err(fault.clone()),
                _ => Err(self.internal(format!("rethrow of empty %{}", exception.raw()))),
            },
            BodyTerminator::Unreachable => Err(self.internal("reached unreachable code".into())),
        }
    }

    // ── Calls ───────────────────────────────────────────────────────

    fn call_target(&self, target: CallTarget, args: &[Value]) -> Result<Value, Fault> {
        match target {
            CallTarget::Body(body) => self.instance.call_default(body, args),
            CallTarget::MixinBody { field, body } => {
                self.instance.call_mixin_body(field, body, args)
            }
        }
    }

    fn call_hook(
        &mut self,
        dst: Option<LocalId>,
        field: FieldId,
        hook: Name,
        args: &[HookArg],
    ) -> Result<(), Fault> {
        let instance = self.instance;
        let ty = instance.baked_type();
        let closed = ty
            .field(field)
            .and_then(|f| f.implementation())
            .ok_or_else(|| self.internal(format!("field {} holds no implementation", field.raw())))?;
        let hook_def = closed.hook(hook).ok_or_else(|| {
            self.internal(format!(
                "`{}` has no hook `{}`",
                closed.name,
                ty.interner().lookup(hook)
            ))
        })?;

        let mut value = None;
        let mut value_home = None;
        let mut mixin_field = None;
        let mut container = false;
        let mut exception = None;
        for arg in args {
            match *arg {
                HookArg::Value(operand) => value = Some(self.operand(operand)?),
                HookArg::ValueRef(local) => {
                    value = Some(self.take_value(local)?);
                    value_home = Some(local);
                }
                HookArg::Mixin(mixin) => mixin_field = Some(mixin),
                HookArg::Container => container = true,
                HookArg::Exception(local) => match self.slot(local)? {
                    Slot::Exception(fault) => exception = fault.clone(),
                    _ => return Err(self.internal(format!("%{} is not an exception", local.raw()))),
                },
            }
        }

        let member = ty.interner().lookup(self.func.member);
        let (result, notifications) = {
            let mut state = instance.borrow_field(field)?;
            let mut mixin = match mixin_field {
                Some(mixin) => Some(instance.borrow_field(mixin)?),
                None => None,
            };
            let mut cx = HookCx::new(member, &mut state, self.args);
            if let Some(value) = value.as_mut() {
                cx = cx.with_value(value);
            }
            if let Some(mixin) = mixin.as_mut() {
                cx = cx.with_mixin(mixin);
            }
            if container {
                cx = cx.with_container(instance as &dyn Receiver);
            }
            if let Some(exception) = exception.as_ref() {
                cx = cx.with_exception(exception);
            }
            let result = hook_def.body.call(&mut cx);
            (result, cx.take_notifications())
        };

        if let Some(home) = value_home {
            let value = value.unwrap_or(Value::Null);
            self.store(home, Slot::Value(value))?;
        }
        instance.deliver(notifications)?;
        let result = result?;

        match (dst, hook_def.result) {
            (None, _) => Ok(()),
            (Some(dst), HookResult::Bool) => {
                let flag = result.expect_bool()?;
                self.store(dst, Slot::Flag(flag))
            }
            (Some(dst), HookResult::Value) => self.store(dst, Slot::Value(result)),
            (Some(dst), HookResult::Void) => {
                Err(self.internal(format!("void hook result stored in %{}", dst.raw())))
            }
        }
    }

    // ── Slots ───────────────────────────────────────────────────────

    fn decl(&self, local: LocalId) -> Result<&'a LocalDecl, Fault> {
        self.func
            .local(local)
            .ok_or_else(|| self.internal(format!("undeclared local %{}", local.raw())))
    }

    fn slot(&self, local: LocalId) -> Result<&Slot, Fault> {
        self.slots
            .get(local.index())
            .ok_or_else(|| self.internal(format!("undeclared local %{}", local.raw())))
    }

    fn store(&mut self, local: LocalId, slot: Slot) -> Result<(), Fault> {
        match self.slots.get_mut(local.index()) {
            Some(target) => {
                *target = slot;
                Ok(())
            }
            None => Err(self.internal(format!("undeclared local %{}", local.raw()))),
        }
    }

    /// Move a value out of its local for a by-reference hook argument.
    fn take_value(&mut self, local: LocalId) -> Result<Value, Fault> {
        match self.slots.get_mut(local.index()) {
            Some(Slot::Value(value)) => Ok(std::mem::replace(value, Value::Null)),
            _ => Err(self.internal(format!("%{} is not a value", local.raw()))),
        }
    }

    fn operand(&self, operand: Operand) -> Result<Value, Fault> {
        match operand {
            Operand::Local(local) => match self.slot(local)? {
                Slot::Value(value) => Ok(value.clone()),
                _ => Err(self.internal(format!("%{} is not a value", local.raw()))),
            },
            Operand::Arg(index) => self
                .args
                .get(index as usize)
                .cloned()
                .ok_or_else(|| self.internal(format!("argument {index} out of range"))),
        }
    }

    fn operands(&self, operands: &[Operand]) -> Result<SmallVec<[Value; 4]>, Fault> {
        operands.iter().map(|op| self.operand(*op)).collect()
    }

    fn internal(&self, message: String) -> Fault {
        Fault::internal(format!("{}: {message}", self.func.name))
    }
}

/// Where control goes after a terminator.
enum Next {
    Block(BlockId),
    Return(Value),
}

#[cfg(test)]
mod tests;
