use kiln_ir::{Name, ValueType};
use pretty_assertions::assert_eq;
use smallvec::smallvec;

use super::{verify, VerifyError};
use crate::{BodyBuilder, BodyId, CallTarget, FieldId, HookArg, LocalId, Operand};

fn getter() -> BodyBuilder {
    BodyBuilder::new("IValue.get_Value", Name::EMPTY, vec![], ValueType::Int)
}

#[test]
fn direct_getter_verifies() {
    let mut b = getter();
    let v = b.declare_value(ValueType::Int);
    b.emit_call_hook(Some(v), FieldId::new(0), Name::EMPTY, smallvec![]);
    b.terminate_return(Some(v));
    assert_eq!(verify(&b.finish()), Ok(()));
}

#[test]
fn void_return_from_getter_is_rejected() {
    let mut b = getter();
    b.terminate_return(None);
    assert!(matches!(
        verify(&b.finish()),
        Err(VerifyError::ReturnMismatch { .. })
    ));
}

#[test]
fn branch_on_value_local_is_rejected() {
    let mut b = getter();
    let v = b.declare_value(ValueType::Int);
    let then_block = b.new_block();
    let else_block = b.new_block();
    b.terminate_branch(v, then_block, else_block);
    for block in [then_block, else_block] {
        b.position_at(block);
        b.terminate_return(Some(v));
    }
    assert_eq!(
        verify(&b.finish()),
        Err(VerifyError::LocalKind {
            function: "IValue.get_Value".into(),
            local: 0,
            expected: "a flag local",
        })
    );
}

#[test]
fn undeclared_local_is_rejected() {
    let mut b = getter();
    b.terminate_return(Some(LocalId::new(9)));
    assert!(matches!(
        verify(&b.finish()),
        Err(VerifyError::MissingLocal { local: 9, .. })
    ));
}

#[test]
fn argument_out_of_range_is_rejected() {
    let mut b = BodyBuilder::new("IValue.set_Value", Name::EMPTY, vec![ValueType::Int], ValueType::Void);
    let v = b.declare_value(ValueType::Int);
    b.emit_move(v, Operand::Arg(1));
    b.terminate_return(None);
    assert!(matches!(
        verify(&b.finish()),
        Err(VerifyError::MissingArg { index: 1, arity: 1, .. })
    ));
}

#[test]
fn exception_role_needs_exception_local() {
    let mut b = getter();
    let v = b.declare_value(ValueType::Int);
    b.emit_call_hook(None, FieldId::new(0), Name::EMPTY, smallvec![HookArg::Exception(v)]);
    b.terminate_return(Some(v));
    assert!(matches!(
        verify(&b.finish()),
        Err(VerifyError::LocalKind { expected: "an exception local", .. })
    ));
}

#[test]
fn back_edge_is_rejected() {
    let mut b = getter();
    let v = b.declare_value(ValueType::Int);
    let ex = b.declare_exception();
    let body = b.new_block();
    b.terminate_jump(body);
    b.position_at(body);
    let again = b.entry_block();
    b.terminate_invoke(
        Some(v),
        CallTarget::Body(BodyId::new(0)),
        smallvec![],
        again,
        again,
        ex,
    );
    assert!(matches!(
        verify(&b.finish()),
        Err(VerifyError::Cycle { block: 0, .. })
    ));
}

#[test]
fn diamond_is_acyclic() {
    let mut b = BodyBuilder::new("IValue.get_Flag", Name::EMPTY, vec![], ValueType::Void);
    let ex = b.declare_exception();
    b.emit_zero(ex);
    let ok = b.emit_is_null(ex);
    let left = b.new_block();
    let right = b.new_block();
    let join = b.new_block();
    b.terminate_branch(ok, left, right);
    for block in [left, right] {
        b.position_at(block);
        b.terminate_jump(join);
    }
    b.position_at(join);
    b.terminate_return(None);
    assert_eq!(verify(&b.finish()), Ok(()));
}
