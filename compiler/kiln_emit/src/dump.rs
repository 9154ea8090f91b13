//! Textual dump of body functions, for tracing and test snapshots.
//!
//! ```text
//! fn IValue.get_Value() -> int
//!   %0: int
//!   %1: exception
//! bb0:
//!   %0 = zero
//!   %2 = hook field1.BeforeGet(&%0, mixin field0)
//!   branch %2, bb2, bb1
//! ```

use std::fmt::Write;

use kiln_ir::StringInterner;

use crate::{
    BodyFunction, BodyInstr, BodyTerminator, CallTarget, HookArg, LocalId, LocalKind, Operand,
};

fn dst(out: &mut String, dst: Option<LocalId>) {
    if let Some(dst) = dst {
        let _ = write!(out, "%{} = ", dst.raw());
    }
}

fn operand(op: Operand) -> String {
    match op {
        Operand::Local(local) => format!("%{}", local.raw()),
        Operand::Arg(index) => format!("arg{index}"),
    }
}

fn operands(ops: &[Operand]) -> String {
    ops.iter().copied().map(operand).collect::<Vec<_>>().join(", ")
}

fn target(target: CallTarget) -> String {
    match target {
        CallTarget::Body(body) => format!("body{}", body.raw()),
        CallTarget::MixinBody { field, body } => format!("field{}.body{}", field.raw(), body.raw()),
    }
}

fn hook_arg(arg: HookArg) -> String {
    match arg {
        HookArg::Value(op) => operand(op),
        HookArg::ValueRef(local) => format!("&%{}", local.raw()),
        HookArg::Mixin(field) => format!("mixin field{}", field.raw()),
        HookArg::Container => "this".to_owned(),
        HookArg::Exception(local) => format!("exception %{}", local.raw()),
    }
}

/// Render a function as text, resolving hook names through `interner`.
pub fn dump(func: &BodyFunction, interner: &StringInterner) -> String {
    let mut out = String::new();
    let params = func
        .params
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    let _ = writeln!(out, "fn {}({params}) -> {}", func.name, func.return_type);

    for (i, local) in func.locals.iter().enumerate() {
        let kind = match &local.kind {
            LocalKind::Value(ty) => ty.to_string(),
            LocalKind::Exception => "exception".to_owned(),
            LocalKind::Flag => "flag".to_owned(),
        };
        let pinned = if local.pinned { " pinned" } else { "" };
        let _ = writeln!(out, "  %{i}: {kind}{pinned}");
    }

    for block in &func.blocks {
        let _ = writeln!(out, "bb{}:", block.id.raw());
        for instr in &block.body {
            out.push_str("  ");
            match instr {
                BodyInstr::Zero { dst: d } => {
                    let _ = write!(out, "%{} = zero", d.raw());
                }
                BodyInstr::Move { dst: d, src } => {
                    let _ = write!(out, "%{} = {}", d.raw(), operand(*src));
                }
                BodyInstr::Const { dst: d, value } => {
                    let _ = write!(out, "%{} = const {value:?}", d.raw());
                }
                BodyInstr::CallHook {
                    dst: d,
                    field,
                    hook,
                    args,
                } => {
                    dst(&mut out, *d);
                    let args = args.iter().copied().map(hook_arg).collect::<Vec<_>>();
                    let _ = write!(
                        out,
                        "hook field{}.{}({})",
                        field.raw(),
                        interner.lookup(*hook),
                        args.join(", ")
                    );
                }
                BodyInstr::CallBody {
                    dst: d,
                    target: t,
                    args,
                } => {
                    dst(&mut out, *d);
                    let _ = write!(out, "call {}({})", target(*t), operands(args));
                }
                BodyInstr::IsNull { dst: d, src } => {
                    let _ = write!(out, "%{} = is_null %{}", d.raw(), src.raw());
                }
                BodyInstr::Mark(state) => {
                    let _ = write!(out, "mark {state}");
                }
            }
            out.push('\n');
        }

        out.push_str("  ");
        match &block.terminator {
            BodyTerminator::Return { value: Some(v) } => {
                let _ = write!(out, "return %{}", v.raw());
            }
            BodyTerminator::Return { value: None } => out.push_str("return"),
            BodyTerminator::Jump { target: t } => {
                let _ = write!(out, "jump bb{}", t.raw());
            }
            BodyTerminator::Branch {
                cond,
                then_block,
                else_block,
            } => {
                let _ = write!(
                    out,
                    "branch %{}, bb{}, bb{}",
                    cond.raw(),
                    then_block.raw(),
                    else_block.raw()
                );
            }
            BodyTerminator::Invoke {
                dst: d,
                target: t,
                args,
                normal,
                unwind,
                exception,
            } => {
                dst(&mut out, *d);
                let _ = write!(
                    out,
                    "invoke {}({}) to bb{} unwind bb{} catch %{}",
                    target(*t),
                    operands(args),
                    normal.raw(),
                    unwind.raw(),
                    exception.raw()
                );
            }
            BodyTerminator::Rethrow { exception } => {
                let _ = write!(out, "rethrow %{}", exception.raw());
            }
            BodyTerminator::Unreachable => out.push_str("unreachable"),
        }
        out.push('\n');
    }
    out
}
