//! The Before / After / AfterError protocol as seen from a baked instance.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use std::sync::Arc;

use kiln_bake::{Bakery, BakeryConfig};
use kiln_emit::WrapState;
use kiln_eval::{AccessorKind, Receiver};
use kiln_ir::{Fault, ImplKey, Value, ValueType};
use kiln_types::{BakeError, Role, Shape, StandardLibrary, TypeRegistry};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;

type Log = Arc<Mutex<Vec<String>>>;

/// Property wrapper that vetoes writes above `limit` and decides with
/// `rethrow` whether a failed write propagates.
fn guard(registry: &mut TypeRegistry, name: &str, limit: i64, rethrow: bool, log: &Log) -> ImplKey {
    let (after, failed) = (Arc::clone(log), Arc::clone(log));
    registry
        .implementation(name)
        .marker("IImplementation")
        .shape(Shape::WrappingProperty)
        .param("T", Role::Value)
        .param("TEx", Role::Exception)
        .hook("BeforeGet", |h| {
            h.by_ref(0).returns_bool().body(|_| Ok(Value::Bool(true)))
        })
        .hook("BeforeSet", |h| {
            h.by_ref(0).returns_bool().body(move |cx| {
                let value = cx.value()?.expect_int()?;
                Ok(Value::Bool(value <= limit))
            })
        })
        .hook("AfterSet", |h| {
            h.by_ref(0).body(move |cx| {
                let value = cx.value()?.expect_int()?;
                after.lock().push(format!("{} = {value}", cx.member));
                Ok(Value::Void)
            })
        })
        .hook("AfterErrorSet", |h| {
            h.by_value(1).by_ref(0).returns_bool().body(move |cx| {
                failed.lock().push(format!("{}: {}", cx.member, cx.exception()?));
                Ok(Value::Bool(rethrow))
            })
        })
        .finish()
        .unwrap()
}

/// Property wrapper whose `Before` hooks refuse every read and write.
fn shut(registry: &mut TypeRegistry) -> ImplKey {
    registry
        .implementation("Shut")
        .marker("IImplementation")
        .shape(Shape::WrappingProperty)
        .param("T", Role::Value)
        .hook("BeforeGet", |h| {
            h.by_ref(0).returns_bool().body(|_| Ok(Value::Bool(false)))
        })
        .hook("BeforeSet", |h| {
            h.by_ref(0).returns_bool().body(|_| Ok(Value::Bool(false)))
        })
        .finish()
        .unwrap()
}

fn account(registry: &mut TypeRegistry) -> kiln_ir::TypeKey {
    registry
        .interface("IAccount")
        .property("Stored", ValueType::Int, |p| p)
        .property("Balance", ValueType::Int, |p| {
            p.get(|cx| cx.this.get("Stored")).set(|cx| {
                let value = cx.arg(0)?.expect_int()?;
                if value < 0 {
                    return Err(Fault::raise("Negative", "balance cannot go below zero"));
                }
                cx.this.set("Stored", Value::Int(value))?;
                Ok(Value::Void)
            })
        })
        .finish()
        .unwrap()
}

fn guarded_bakery(rethrow: bool) -> (Bakery, kiln_ir::TypeKey, Log) {
    let mut registry = TypeRegistry::new();
    let std = StandardLibrary::install(&mut registry).unwrap();
    let log = Log::default();
    let guard = guard(&mut registry, "Guard", 1000, rethrow, &log);
    let account = account(&mut registry);
    let bakery = Bakery::new(registry, BakeryConfig::basic(&std).wrap_properties(guard));
    (bakery, account, log)
}

#[test]
fn successful_write_runs_after() {
    let (bakery, account, log) = guarded_bakery(false);
    let obj = bakery.create(account).unwrap();

    let traced = obj.call_traced(AccessorKind::Set, "Balance", &[Value::Int(40)]);
    assert_eq!(traced.state, WrapState::Succeeded);
    traced.result.unwrap();
    assert_eq!(obj.get("Balance").unwrap(), Value::Int(40));
    assert_eq!(*log.lock(), vec!["Balance = 40".to_owned()]);
}

#[test]
fn before_hook_vetoes_the_write() {
    let (bakery, account, log) = guarded_bakery(false);
    let obj = bakery.create(account).unwrap();
    obj.set("Balance", Value::Int(10)).unwrap();

    let traced = obj.call_traced(AccessorKind::Set, "Balance", &[Value::Int(5000)]);
    assert_eq!(traced.state, WrapState::Vetoed);
    assert_eq!(traced.result.unwrap(), Value::Void);
    assert_eq!(obj.get("Stored").unwrap(), Value::Int(10));
    // Vetoed calls skip the After hook.
    assert_eq!(log.lock().len(), 1);
}

#[test]
fn suppressed_failure_keeps_the_previous_value() {
    let (bakery, account, log) = guarded_bakery(false);
    let obj = bakery.create(account).unwrap();
    obj.set("Balance", Value::Int(25)).unwrap();

    let traced = obj.call_traced(AccessorKind::Set, "Balance", &[Value::Int(-5)]);
    assert_eq!(traced.state, WrapState::FailedSuppressed);
    assert_eq!(traced.result.unwrap(), Value::Void);
    assert_eq!(obj.get("Balance").unwrap(), Value::Int(25));
    assert_eq!(
        *log.lock(),
        vec![
            "Balance = 25".to_owned(),
            "Balance: Negative: balance cannot go below zero".to_owned(),
        ]
    );
}

#[test]
fn propagated_failure_reaches_the_caller() {
    let (bakery, account, log) = guarded_bakery(true);
    let obj = bakery.create(account).unwrap();

    let traced = obj.call_traced(AccessorKind::Set, "Balance", &[Value::Int(-1)]);
    assert_eq!(traced.state, WrapState::FailedPropagating);
    assert!(traced.result.unwrap_err().is_raised("Negative"));
    assert_eq!(obj.get("Balance").unwrap(), Value::Int(0));
    assert_eq!(log.lock().len(), 1);
}

#[test]
fn getters_pass_through_when_before_allows() {
    let (bakery, account, _) = guarded_bakery(false);
    let obj = bakery.create(account).unwrap();
    obj.set("Stored", Value::Int(7)).unwrap();

    let traced = obj.call_traced(AccessorKind::Get, "Balance", &[]);
    assert_eq!(traced.state, WrapState::Succeeded);
    assert_eq!(traced.result.unwrap(), Value::Int(7));

    // Unwrapped members report no wrapping state.
    let plain = obj.call_traced(AccessorKind::Get, "Stored", &[]);
    assert_eq!(plain.state, WrapState::NotStarted);
}

/// Method wrapper that lets `budget` calls through, then answers `-1`.
fn gate(registry: &mut TypeRegistry, budget: i64) -> ImplKey {
    let calls = registry.interner().intern("Calls");
    registry
        .implementation("Gate")
        .marker("IImplementation")
        .shape(Shape::WrappingMethod)
        .param("T", Role::Return)
        .param("TEx", Role::Exception)
        .state("Calls", ValueType::Int)
        .hook("Before", |h| {
            h.by_ref(0).returns_bool().body(move |cx| {
                if cx.state.get(calls)?.expect_int()? < budget {
                    return Ok(Value::Bool(true));
                }
                *cx.value()? = Value::Int(-1);
                Ok(Value::Bool(false))
            })
        })
        .hook("After", |h| {
            h.by_ref(0).body(move |cx| {
                let seen = cx.state.get(calls)?.expect_int()?;
                cx.state.set(calls, Value::Int(seen + 1))?;
                Ok(Value::Void)
            })
        })
        .hook("AfterError", |h| {
            h.by_value(1).returns_bool().body(|_| Ok(Value::Bool(true)))
        })
        .finish()
        .unwrap()
}

#[test]
fn method_wrapper_vetoes_with_a_replacement_result() {
    let mut registry = TypeRegistry::new();
    let std = StandardLibrary::install(&mut registry).unwrap();
    let gate = gate(&mut registry, 2);
    let dice = registry
        .interface("IDice")
        .method("Roll", [], ValueType::Int, |m| m.body(|_| Ok(Value::Int(4))))
        .method("Sides", [], ValueType::Int, |m| m.sealed().body(|_| Ok(Value::Int(6))))
        .finish()
        .unwrap();
    let bakery = Bakery::new(registry, BakeryConfig::basic(&std).wrap_methods(gate));
    let obj = bakery.create(dice).unwrap();

    let states: Vec<(Value, WrapState)> = (0..3)
        .map(|_| {
            let traced = obj.call_traced(AccessorKind::Call, "Roll", &[]);
            (traced.result.unwrap(), traced.state)
        })
        .collect();
    assert_eq!(
        states,
        vec![
            (Value::Int(4), WrapState::Succeeded),
            (Value::Int(4), WrapState::Succeeded),
            (Value::Int(-1), WrapState::Vetoed),
        ]
    );

    // Sealed members are never wrapped.
    let sides = obj.call_traced(AccessorKind::Call, "Sides", &[]);
    assert_eq!(sides.state, WrapState::NotStarted);
    assert_eq!(sides.result.unwrap(), Value::Int(6));
}

#[test]
fn method_failures_propagate_through_after_error() {
    let mut registry = TypeRegistry::new();
    let std = StandardLibrary::install(&mut registry).unwrap();
    let gate = gate(&mut registry, 10);
    let job = registry
        .interface("IJob")
        .method("Run", [ValueType::Int], ValueType::Int, |m| {
            m.body(|cx| match cx.arg(0)?.expect_int()? {
                0 => Err(Fault::raise("Zero", "nothing to do")),
                n => Ok(Value::Int(100 / n)),
            })
        })
        .finish()
        .unwrap();
    let bakery = Bakery::new(registry, BakeryConfig::basic(&std).wrap_methods(gate));
    let obj = bakery.create(job).unwrap();

    assert_eq!(obj.call("Run", &[Value::Int(5)]).unwrap(), Value::Int(20));
    let traced = obj.call_traced(AccessorKind::Call, "Run", &[Value::Int(0)]);
    assert_eq!(traced.state, WrapState::FailedPropagating);
    assert!(traced.result.unwrap_err().is_raised("Zero"));
}

#[test]
fn unpaired_after_hooks_are_rejected_at_bake_time() {
    let mut registry = TypeRegistry::new();
    let std = StandardLibrary::install(&mut registry).unwrap();
    let half = registry
        .implementation("HalfWrapper")
        .marker("IImplementation")
        .shape(Shape::WrappingMethod)
        .param("T", Role::Return)
        .hook("Before", |h| {
            h.by_ref(0).returns_bool().body(|_| Ok(Value::Bool(true)))
        })
        .hook("After", |h| h.by_ref(0).body(|_| Ok(Value::Void)))
        .finish()
        .unwrap();
    let job = registry
        .interface("IJob")
        .method("Run", [], ValueType::Int, |m| m.body(|_| Ok(Value::Int(1))))
        .finish()
        .unwrap();
    let bakery = Bakery::new(registry, BakeryConfig::basic(&std).wrap_methods(half));

    let err = bakery.resolve(job).unwrap_err();
    assert!(matches!(err, BakeError::HookMismatch { ref hook, .. } if hook == "AfterError"));
}

#[test]
fn vetoed_reads_and_writes_leave_the_zero_value() {
    let mut registry = TypeRegistry::new();
    let std = StandardLibrary::install(&mut registry).unwrap();
    let shut = shut(&mut registry);
    let account = account(&mut registry);
    let bakery = Bakery::new(registry, BakeryConfig::basic(&std).wrap_properties(shut));
    let obj = bakery.create(account).unwrap();

    let write = obj.call_traced(AccessorKind::Set, "Balance", &[Value::Int(42)]);
    assert_eq!(write.state, WrapState::Vetoed);
    write.result.unwrap();

    let read = obj.call_traced(AccessorKind::Get, "Balance", &[]);
    assert_eq!(read.state, WrapState::Vetoed);
    assert_eq!(read.result.unwrap(), Value::Int(0));
    assert_eq!(obj.get("Stored").unwrap(), Value::Int(0));
}
