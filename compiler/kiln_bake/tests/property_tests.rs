//! Property-based tests for baked instances.
//!
//! Random sequences of member calls are replayed against a plain model and
//! the baked object must agree with it after every step.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]
#![allow(
    clippy::needless_pass_by_value,
    reason = "Proptest macros generate code with these patterns"
)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use kiln_bake::{Bakery, BakeryConfig};
use kiln_eval::Receiver;
use kiln_ir::{Handler, TypeKey, Value, ValueType};
use kiln_types::{StandardLibrary, TypeRegistry};
use proptest::prelude::*;

// -- Strategies --

#[derive(Clone, Debug)]
enum Write {
    Name(String),
    Age(i64),
    Score(i64),
}

fn write_strategy() -> impl Strategy<Value = Write> {
    prop_oneof![
        "[A-Za-z]{0,8}".prop_map(Write::Name),
        (0i64..150).prop_map(Write::Age),
        any::<i64>().prop_map(Write::Score),
    ]
}

#[derive(Clone, Copy, Debug)]
enum Step {
    Increment,
    Add(i64),
}

fn step_strategy() -> impl Strategy<Value = Step> {
    prop_oneof![
        Just(Step::Increment),
        (-1000i64..1000).prop_map(Step::Add),
    ]
}

// -- Fixtures --

fn person(registry: &mut TypeRegistry, notify: Option<TypeKey>) -> TypeKey {
    let mut builder = registry.interface("IPerson");
    if let Some(notify) = notify {
        builder = builder.extends(notify);
    }
    builder
        .property("Name", ValueType::Str, |p| p.not_nullable())
        .property("Age", ValueType::Int, |p| p)
        .property("Score", ValueType::Int, |p| p)
        .finish()
        .unwrap()
}

fn counter(registry: &mut TypeRegistry) -> TypeKey {
    registry
        .interface("ICounter")
        .property("Count", ValueType::Int, |p| p)
        .method("Increment", [], ValueType::Void, |m| {
            m.body(|cx| {
                let count = cx.this.get("Count")?.expect_int()?;
                cx.this.set("Count", Value::Int(count.wrapping_add(1)))?;
                Ok(Value::Void)
            })
        })
        .method("Add", [ValueType::Int], ValueType::Int, |m| {
            m.body(|cx| {
                let total = cx
                    .this
                    .get("Count")?
                    .expect_int()?
                    .wrapping_add(cx.arg(0)?.expect_int()?);
                cx.this.set("Count", Value::Int(total))?;
                Ok(Value::Int(total))
            })
        })
        .finish()
        .unwrap()
}

/// Model of `IPerson` after the writes so far.
#[derive(Default)]
struct PersonModel {
    name: String,
    age: i64,
    score: i64,
}

impl PersonModel {
    /// Apply a write; true when it changed the stored value.
    fn apply(&mut self, write: &Write) -> bool {
        match write {
            Write::Name(v) => std::mem::replace(&mut self.name, v.clone()) != *v,
            Write::Age(v) => std::mem::replace(&mut self.age, *v) != *v,
            Write::Score(v) => std::mem::replace(&mut self.score, *v) != *v,
        }
    }
}

fn perform(obj: &dyn Receiver, write: &Write) {
    let (member, value) = match write {
        Write::Name(v) => ("Name", Value::str(v)),
        Write::Age(v) => ("Age", Value::Int(*v)),
        Write::Score(v) => ("Score", Value::Int(*v)),
    };
    obj.set(member, value).unwrap();
}

// -- Property Tests --

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        ..ProptestConfig::default()
    })]

    /// Every read returns the most recent write.
    #[test]
    fn prop_reads_follow_writes(writes in prop::collection::vec(write_strategy(), 0..40)) {
        let mut registry = TypeRegistry::new();
        let std = StandardLibrary::install(&mut registry).unwrap();
        let key = person(&mut registry, None);
        let bakery = Bakery::new(registry, BakeryConfig::basic(&std));
        let obj = bakery.create(key).unwrap();

        let mut model = PersonModel::default();
        for write in &writes {
            perform(&obj, write);
            model.apply(write);
            prop_assert_eq!(obj.get("Name").unwrap(), Value::str(&model.name));
            prop_assert_eq!(obj.get("Age").unwrap(), Value::Int(model.age));
            prop_assert_eq!(obj.get("Score").unwrap(), Value::Int(model.score));
        }
    }

    /// Default bodies reach the synthesized storage exactly once per call.
    #[test]
    fn prop_counter_is_exact(steps in prop::collection::vec(step_strategy(), 0..60)) {
        let mut registry = TypeRegistry::new();
        let std = StandardLibrary::install(&mut registry).unwrap();
        let key = counter(&mut registry);
        let bakery = Bakery::new(registry, BakeryConfig::basic(&std));
        let obj = bakery.create(key).unwrap();

        let mut expected = 0i64;
        for step in &steps {
            match step {
                Step::Increment => {
                    obj.call("Increment", &[]).unwrap();
                    expected = expected.wrapping_add(1);
                }
                Step::Add(by) => {
                    expected = expected.wrapping_add(*by);
                    prop_assert_eq!(obj.call("Add", &[Value::Int(*by)]).unwrap(), Value::Int(expected));
                }
            }
        }
        prop_assert_eq!(obj.get("Count").unwrap(), Value::Int(expected));
    }

    /// Notifying properties raise exactly once per change of value.
    #[test]
    fn prop_notifications_match_changes(writes in prop::collection::vec(write_strategy(), 0..40)) {
        let mut registry = TypeRegistry::new();
        let std = StandardLibrary::install(&mut registry).unwrap();
        let key = person(&mut registry, Some(std.notify_interface));
        let bakery = Bakery::new(registry, BakeryConfig::notifying(&std));
        let obj = bakery.create(key).unwrap();

        let raised = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&raised);
        obj.subscribe("PropertyChanged", Handler::new(move |_, _| {
            count.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }))
        .unwrap();

        let mut model = PersonModel::default();
        let mut changes = 0;
        for write in &writes {
            perform(&obj, write);
            if model.apply(write) {
                changes += 1;
            }
        }
        prop_assert_eq!(raised.load(Ordering::Relaxed), changes);
    }

    /// Baking the same source twice hands out one shared type.
    #[test]
    fn prop_resolve_is_stable(rounds in 1usize..8) {
        let mut registry = TypeRegistry::new();
        let std = StandardLibrary::install(&mut registry).unwrap();
        let key = counter(&mut registry);
        let bakery = Bakery::new(registry, BakeryConfig::basic(&std));

        let first = bakery.resolve(key).unwrap();
        for _ in 0..rounds {
            prop_assert!(Arc::ptr_eq(&first, &bakery.resolve(key).unwrap()));
        }
        prop_assert_eq!(bakery.cached_count(), 1);
    }
}
