use kiln_ir::{Value, ValueType};
use pretty_assertions::assert_eq;

use super::*;
use crate::{MethodSlot, SignatureAnalyzer};

fn method(owner: TypeKey, slot: MethodSlot) -> MethodRef {
    MethodRef {
        owner: TypeRef::plain(owner),
        slot,
    }
}

fn build(registry: &TypeRegistry, root: TypeKey, mixins: &[TypeKey]) -> Result<ImplementationMap, BakeError> {
    let closure = registry.interface_closure(&TypeRef::plain(root));
    ImplementationMap::build(registry, &SignatureAnalyzer::new(), &closure, mixins)
}

#[test]
fn abstract_property_is_not_implemented() {
    let mut registry = TypeRegistry::new();
    let person = registry
        .interface("IPerson")
        .property("Name", ValueType::Str, |p| p)
        .finish()
        .unwrap();
    let map = build(&registry, person, &[]).unwrap();
    assert_eq!(
        map.resolve(&method(person, MethodSlot::Getter(0))),
        Some(&Resolution::NotImplemented)
    );
    assert_eq!(map.len(), 2);
}

#[test]
fn derived_default_body_implements_base_member() {
    let mut registry = TypeRegistry::new();
    let person = registry
        .interface("IPerson")
        .property("Name", ValueType::Str, |p| p.read_only())
        .finish()
        .unwrap();
    let student = registry
        .interface("IStudent")
        .extends(person)
        .property("IPerson.Name", ValueType::Str, |p| {
            p.read_only().get(|_| Ok(Value::str("student")))
        })
        .finish()
        .unwrap();
    let map = build(&registry, student, &[]).unwrap();
    assert_eq!(
        map.resolve(&method(person, MethodSlot::Getter(0))),
        Some(&Resolution::ImplementedDirectly {
            method: method(student, MethodSlot::Getter(0)),
        })
    );
    // The explicit declaration itself is not a member to implement.
    assert_eq!(map.resolve(&method(student, MethodSlot::Getter(0))), None);
}

#[test]
fn most_derived_body_supersedes_ancestor_body() {
    let mut registry = TypeRegistry::new();
    let base = registry
        .interface("IBase")
        .method("Run", [], ValueType::Int, |m| m.body(|_| Ok(Value::Int(1))))
        .finish()
        .unwrap();
    let derived = registry
        .interface("IDerived")
        .extends(base)
        .method("Run", [], ValueType::Int, |m| m.body(|_| Ok(Value::Int(2))))
        .finish()
        .unwrap();
    let map = build(&registry, derived, &[]).unwrap();
    assert_eq!(
        map.resolve(&method(base, MethodSlot::Method(0))),
        Some(&Resolution::ImplementedDirectly {
            method: method(derived, MethodSlot::Method(0)),
        })
    );
}

#[test]
fn sibling_bodies_are_ambiguous() {
    let mut registry = TypeRegistry::new();
    let left = registry
        .interface("ILeft")
        .method("Run", [], ValueType::Void, |m| m.body(|_| Ok(Value::Void)))
        .finish()
        .unwrap();
    let right = registry
        .interface("IRight")
        .method("Run", [], ValueType::Void, |m| m.body(|_| Ok(Value::Void)))
        .finish()
        .unwrap();
    let both = registry
        .interface("IBoth")
        .extends(left)
        .extends(right)
        .finish()
        .unwrap();
    let err = build(&registry, both, &[]).unwrap_err();
    match err {
        BakeError::AmbiguousImplementation { member, candidates } => {
            assert_eq!(member, "ILeft.Run");
            assert_eq!(candidates, vec!["ILeft.Run".to_owned(), "IRight.Run".to_owned()]);
        }
        other => panic!("expected ambiguity, got {other}"),
    }
}

#[test]
fn ordinary_method_without_body_is_missing() {
    let mut registry = TypeRegistry::new();
    let ty = registry
        .interface("IWorker")
        .method("Work", [ValueType::Int], ValueType::Void, |m| m)
        .finish()
        .unwrap();
    let err = build(&registry, ty, &[]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "`IWorker.Work` requires an implementation, none found in: IWorker"
    );
}

#[test]
fn method_with_implementation_type_is_not_missing() {
    let mut registry = TypeRegistry::new();
    let impl_key = registry.implementation("Anything").finish().unwrap();
    let ty = registry
        .interface("IWorker")
        .method("Work", [], ValueType::Void, |m| m.implemented_by(impl_key))
        .finish()
        .unwrap();
    let map = build(&registry, ty, &[]).unwrap();
    assert_eq!(
        map.resolve(&method(ty, MethodSlot::Method(0))),
        Some(&Resolution::NotImplemented)
    );
}

#[test]
fn mixin_body_resolves_by_mixin() {
    let mut registry = TypeRegistry::new();
    let counter = registry
        .interface("ICounter")
        .method("Bump", [], ValueType::Void, |m| m)
        .finish()
        .unwrap();
    let mixin = registry
        .mixin("CounterMixin")
        .extends(counter)
        .state("Count", ValueType::Int)
        .method("Bump", [], ValueType::Void, |m| m.body(|_| Ok(Value::Void)))
        .finish()
        .unwrap();
    let map = build(&registry, counter, &[mixin]).unwrap();
    assert_eq!(
        map.resolve(&method(counter, MethodSlot::Method(0))),
        Some(&Resolution::ImplementedByMixin {
            mixin,
            method: method(mixin, MethodSlot::Method(0)),
        })
    );
    assert_eq!(map.len(), 1);
}

#[test]
fn generic_instantiations_match_by_substituted_signature() {
    let mut registry = TypeRegistry::new();
    let repo = registry
        .interface("IRepository")
        .type_param("T")
        .method("Find", [ValueType::Int], ValueType::Param(0), |m| m)
        .finish()
        .unwrap();
    let strings = registry
        .interface("IStringRepository")
        .extends_generic(repo, [ValueType::Str])
        .method("Find", [ValueType::Int], ValueType::Str, |m| {
            m.body(|_| Ok(Value::str("found")))
        })
        .finish()
        .unwrap();
    let map = build(&registry, strings, &[]).unwrap();
    let generic_find = MethodRef {
        owner: TypeRef::generic(repo, [ValueType::Str]),
        slot: MethodSlot::Method(0),
    };
    assert_eq!(
        map.resolve(&generic_find),
        Some(&Resolution::ImplementedDirectly {
            method: method(strings, MethodSlot::Method(0)),
        })
    );
}

#[test]
fn report_lists_one_line_per_member() {
    let mut registry = TypeRegistry::new();
    let ty = registry
        .interface("IThing")
        .property("Name", ValueType::Str, |p| p)
        .method("Run", [], ValueType::Void, |m| m.body(|_| Ok(Value::Void)))
        .finish()
        .unwrap();
    let map = build(&registry, ty, &[]).unwrap();
    assert_eq!(
        map.report(),
        "IThing.Run: directly by IThing.Run\n\
         IThing.get_Name: not implemented\n\
         IThing.set_Name: not implemented\n"
    );
}
