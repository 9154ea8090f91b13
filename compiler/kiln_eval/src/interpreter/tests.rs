use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use kiln_emit::{BodyBuilder, BodyId, CallTarget, HookArg, WrapState};
use kiln_ir::{
    Fault, FaultKind, HookFn, ImplKey, MemberBody, Name, Receiver, RecordLayout, SharedInterner,
    TypeKey, Value, ValueType,
};
use kiln_types::{ClosedHook, ClosedImplementation, HookResult, Role, Shape};
use pretty_assertions::assert_eq;
use rustc_hash::FxHashMap;
use smallvec::smallvec;

use crate::{
    AccessorKind, BakedTypeBuilder, FieldKind, Instance, MemberEntry, MemberKey, MemberTarget,
};

/// Behaviour of the test wrapper's hooks.
#[derive(Clone, Copy)]
struct Knobs {
    veto: bool,
    rethrow: bool,
}

fn hook(roles: &[Role], result: HookResult, body: HookFn) -> ClosedHook {
    ClosedHook {
        roles: roles.iter().map(|r| (*r, true)).collect(),
        result,
        body,
    }
}

/// Before vetoes with -1, After adds 100, AfterError zeroes the value when
/// it suppresses.
fn wrapper(interner: &SharedInterner, knobs: Knobs) -> ClosedImplementation {
    let mut hooks = FxHashMap::default();
    hooks.insert(
        interner.intern("Before"),
        hook(
            &[Role::Value],
            HookResult::Bool,
            HookFn::new(move |cx| {
                if knobs.veto {
                    *cx.value()? = Value::Int(-1);
                }
                Ok(Value::Bool(!knobs.veto))
            }),
        ),
    );
    hooks.insert(
        interner.intern("After"),
        hook(
            &[Role::Value],
            HookResult::Void,
            HookFn::new(|cx| {
                let v = cx.value()?.expect_int()?;
                *cx.value()? = Value::Int(v + 100);
                Ok(Value::Void)
            }),
        ),
    );
    hooks.insert(
        interner.intern("AfterError"),
        hook(
            &[Role::Exception, Role::Value],
            HookResult::Bool,
            HookFn::new(move |cx| {
                cx.exception()?;
                if !knobs.rethrow {
                    *cx.value()? = Value::Int(0);
                }
                Ok(Value::Bool(knobs.rethrow))
            }),
        ),
    );
    ClosedImplementation {
        key: ImplKey::from_raw(0),
        name: "Wrapper",
        shape: Shape::WrappingMethod,
        value_type: ValueType::Int,
        layout: Arc::new(RecordLayout::empty(Name::EMPTY)),
        hooks,
        mixin: None,
    }
}

/// A `Run() -> int` member wrapped around `body`.
fn wrapped(knobs: Knobs, body: MemberBody) -> Instance {
    let interner = SharedInterner::new();
    let run = interner.intern("Run");
    let mut ty = BakedTypeBuilder::new("Baked.IJob", TypeKey::from_raw(0), interner.clone());
    let field = ty.add_field(
        "<Run>impl",
        FieldKind::Implementation(Arc::new(wrapper(&interner, knobs))),
    );
    let body = ty.add_body(&body);

    let mut b = BodyBuilder::new("Baked.IJob.Run", run, vec![], ValueType::Int);
    let v = b.declare_value(ValueType::Int);
    let ex = b.declare_exception();
    let ok = b.declare_flag();
    let keep = b.declare_flag();
    let vetoed = b.new_block();
    let call = b.new_block();
    let succeeded = b.new_block();
    let catch = b.new_block();
    let suppressed = b.new_block();
    let rethrow = b.new_block();
    let exit = b.new_block();

    b.emit_zero(v);
    b.emit_call_hook(Some(ok), field, interner.intern("Before"), smallvec![HookArg::ValueRef(v)]);
    b.terminate_branch(ok, call, vetoed);

    b.position_at(vetoed);
    b.emit_mark(WrapState::Vetoed);
    b.terminate_jump(exit);

    b.position_at(call);
    b.terminate_invoke(Some(v), CallTarget::Body(body), smallvec![], succeeded, catch, ex);

    b.position_at(succeeded);
    b.emit_mark(WrapState::Succeeded);
    b.emit_call_hook(None, field, interner.intern("After"), smallvec![HookArg::ValueRef(v)]);
    b.terminate_jump(exit);

    b.position_at(catch);
    b.emit_call_hook(
        Some(keep),
        field,
        interner.intern("AfterError"),
        smallvec![HookArg::Exception(ex), HookArg::ValueRef(v)],
    );
    b.terminate_branch(keep, rethrow, suppressed);

    b.position_at(suppressed);
    b.emit_mark(WrapState::FailedSuppressed);
    b.terminate_jump(exit);

    b.position_at(rethrow);
    b.emit_mark(WrapState::FailedPropagating);
    b.terminate_rethrow(ex);

    b.position_at(exit);
    b.terminate_return(Some(v));

    ty.define(
        MemberKey::new(AccessorKind::Call, run, 0),
        MemberEntry {
            params: vec![],
            ret: ValueType::Int,
            target: MemberTarget::Synthesized(Arc::new(b.finish())),
            qualified: "IJob.Run".into(),
        },
    );
    Instance::construct(Arc::new(ty.finish())).unwrap()
}

const PASS: Knobs = Knobs {
    veto: false,
    rethrow: true,
};

#[test]
fn success_runs_after() {
    let obj = wrapped(PASS, MemberBody::new(|_| Ok(Value::Int(7))));
    let traced = obj.call_traced(AccessorKind::Call, "Run", &[]);
    assert_eq!(traced.result.unwrap(), Value::Int(107));
    assert_eq!(traced.state, WrapState::Succeeded);
}

#[test]
fn veto_skips_the_body() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let body = MemberBody::new(move |_| {
        counted.fetch_add(1, Ordering::Relaxed);
        Ok(Value::Int(7))
    });
    let obj = wrapped(
        Knobs {
            veto: true,
            rethrow: true,
        },
        body,
    );

    let traced = obj.call_traced(AccessorKind::Call, "Run", &[]);
    assert_eq!(traced.result.unwrap(), Value::Int(-1));
    assert_eq!(traced.state, WrapState::Vetoed);
    assert_eq!(calls.load(Ordering::Relaxed), 0);
}

#[test]
fn rethrow_preserves_fault_identity() {
    let fault = Fault::raise("IoError", "disk gone");
    let thrown = fault.clone();
    let obj = wrapped(PASS, MemberBody::new(move |_| Err(thrown.clone())));

    let traced = obj.call_traced(AccessorKind::Call, "Run", &[]);
    assert!(traced.result.unwrap_err().ptr_eq(&fault));
    assert_eq!(traced.state, WrapState::FailedPropagating);
}

#[test]
fn suppressed_fault_returns_hook_value() {
    let obj = wrapped(
        Knobs {
            veto: false,
            rethrow: false,
        },
        MemberBody::new(|_| Err(Fault::raise("IoError", "disk gone"))),
    );
    let traced = obj.call_traced(AccessorKind::Call, "Run", &[]);
    assert_eq!(traced.result.unwrap(), Value::Int(0));
    assert_eq!(traced.state, WrapState::FailedSuppressed);
}

#[test]
fn mixin_bodies_see_their_state() {
    let interner = SharedInterner::new();
    let hits = interner.intern("Hits");
    let touch = interner.intern("Touch");
    let mixin = TypeKey::from_raw(4);
    let mut ty = BakedTypeBuilder::new("Baked.ITouch", TypeKey::from_raw(0), interner.clone());
    let field = ty.add_field(
        "TouchMixin",
        FieldKind::Mixin {
            key: mixin,
            layout: Arc::new(RecordLayout::new(interner.intern("TouchMixin"), vec![(hits, ValueType::Int)])),
        },
    );
    let body = ty.add_body(&MemberBody::new(move |cx| {
        let mut state = cx.state()?;
        let n = state.get(hits)?.expect_int()? + 1;
        state.set(hits, Value::Int(n))?;
        Ok(Value::Int(n))
    }));

    let mut b = BodyBuilder::new("Baked.ITouch.Touch", touch, vec![], ValueType::Int);
    let v = b.declare_value(ValueType::Int);
    b.emit_call_body(Some(v), CallTarget::MixinBody { field, body }, smallvec![]);
    b.terminate_return(Some(v));
    ty.define(
        MemberKey::new(AccessorKind::Call, touch, 0),
        MemberEntry {
            params: vec![],
            ret: ValueType::Int,
            target: MemberTarget::Synthesized(Arc::new(b.finish())),
            qualified: "ITouch.Touch".into(),
        },
    );
    let obj = Instance::construct(Arc::new(ty.finish())).unwrap();

    assert_eq!(obj.call("Touch", &[]).unwrap(), Value::Int(1));
    assert_eq!(obj.call("Touch", &[]).unwrap(), Value::Int(2));
    assert_eq!(obj.mixin_state(mixin).unwrap().get(hits).unwrap(), &Value::Int(2));
}

#[test]
fn bad_ir_faults_instead_of_panicking() {
    let interner = SharedInterner::new();
    let name = interner.intern("Broken");
    let mut ty = BakedTypeBuilder::new("Baked.IBroken", TypeKey::from_raw(0), interner.clone());
    let mut b = BodyBuilder::new("Baked.IBroken.Broken", name, vec![], ValueType::Void);
    b.emit_call_body(None, CallTarget::Body(BodyId::new(9)), smallvec![]);
    b.terminate_unreachable();
    ty.define(
        MemberKey::new(AccessorKind::Call, name, 0),
        MemberEntry {
            params: vec![],
            ret: ValueType::Void,
            target: MemberTarget::Synthesized(Arc::new(b.finish())),
            qualified: "IBroken.Broken".into(),
        },
    );
    let obj = Instance::construct(Arc::new(ty.finish())).unwrap();

    let err = obj.call_traced(AccessorKind::Call, "Broken", &[]).result.unwrap_err();
    assert!(matches!(err.kind(), FaultKind::Internal(msg) if msg.contains("body 9")));
}
