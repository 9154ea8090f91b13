use kiln_ir::{Value, ValueType};
use pretty_assertions::assert_eq;

use super::*;
use crate::TypeRef;

fn facts_for(registry: &TypeRegistry, owner: &TypeRef, slot: MethodSlot) -> Arc<MemberFacts> {
    SignatureAnalyzer::new()
        .analyze(
            registry,
            &MethodRef {
                owner: owner.clone(),
                slot,
            },
        )
        .unwrap()
}

#[test]
fn accessor_names_and_signatures() {
    let mut registry = TypeRegistry::new();
    let person = registry
        .interface("IPerson")
        .property("Name", ValueType::Str, |p| p.init_only())
        .event("Changed", |e| e)
        .finish()
        .unwrap();
    let owner = TypeRef::plain(person);
    let interner = registry.interner().clone();

    let getter = facts_for(&registry, &owner, MethodSlot::Getter(0));
    assert_eq!(interner.lookup(getter.identity.name), "get_Name");
    assert_eq!(getter.identity.signature.to_string(), "() -> str");
    assert_eq!(getter.qualified, "IPerson.get_Name");
    assert_eq!(interner.lookup(getter.member_name), "Name");
    assert!(getter.is_special());
    assert!(getter.is_implementable());
    assert!(!getter.is_implemented());

    let setter = facts_for(&registry, &owner, MethodSlot::Setter(0));
    assert_eq!(interner.lookup(setter.identity.name), "set_Name");
    assert_eq!(setter.identity.signature.to_string(), "(str) -> void init");

    let adder = facts_for(&registry, &owner, MethodSlot::Adder(0));
    assert_eq!(interner.lookup(adder.identity.name), "add_Changed");
    let remover = facts_for(&registry, &owner, MethodSlot::Remover(0));
    assert_eq!(interner.lookup(remover.identity.name), "remove_Changed");
    assert_eq!(remover.identity.signature.to_string(), "(handler) -> void");
}

#[test]
fn generic_arguments_are_substituted() {
    let mut registry = TypeRegistry::new();
    let repo = registry
        .interface("IRepository")
        .type_param("T")
        .method("Find", [ValueType::Int], ValueType::Param(0), |m| m)
        .finish()
        .unwrap();
    let owner = TypeRef::generic(repo, [ValueType::Str]);
    let facts = facts_for(&registry, &owner, MethodSlot::Method(0));
    assert_eq!(facts.identity.signature.to_string(), "(int) -> str");
    assert!(!facts.is_special());
}

#[test]
fn explicit_implementation_shares_identity() {
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

    let abstract_name = facts_for(&registry, &TypeRef::plain(person), MethodSlot::Getter(0));
    let explicit = facts_for(&registry, &TypeRef::plain(student), MethodSlot::Getter(0));

    assert_eq!(abstract_name.identity, explicit.identity);
    assert_eq!(explicit.qualified, "IStudent.IPerson.get_Name");
    assert_eq!(explicit.explicit_for, Some(person));
    assert!(explicit.flags.contains(MemberFlags::PRIVATE_IMPL));
    assert!(explicit.is_implemented());
    assert!(!explicit.is_implementable());
}

#[test]
fn init_only_setter_differs_from_plain_setter() {
    let mut registry = TypeRegistry::new();
    let a = registry
        .interface("IA")
        .property("X", ValueType::Int, |p| p)
        .finish()
        .unwrap();
    let b = registry
        .interface("IB")
        .property("X", ValueType::Int, |p| p.init_only())
        .finish()
        .unwrap();
    let plain = facts_for(&registry, &TypeRef::plain(a), MethodSlot::Setter(0));
    let init = facts_for(&registry, &TypeRef::plain(b), MethodSlot::Setter(0));
    assert_ne!(plain.identity, init.identity);
}

#[test]
fn modifiers_block_implementability() {
    let mut registry = TypeRegistry::new();
    let ty = registry
        .interface("IThing")
        .method("Hidden", [], ValueType::Void, |m| m.private())
        .method("Shared", [], ValueType::Void, |m| m.static_member())
        .method("Fixed", [], ValueType::Void, |m| m.sealed())
        .method("Open", [], ValueType::Void, |m| m)
        .finish()
        .unwrap();
    let owner = TypeRef::plain(ty);
    let implementable: Vec<bool> = (0..4)
        .map(|i| facts_for(&registry, &owner, MethodSlot::Method(i)).is_implementable())
        .collect();
    assert_eq!(implementable, vec![false, false, false, true]);
}

#[test]
fn analysis_is_memoized() {
    let mut registry = TypeRegistry::new();
    let ty = registry
        .interface("IThing")
        .method("Run", [], ValueType::Void, |m| m)
        .finish()
        .unwrap();
    let analyzer = SignatureAnalyzer::new();
    let method = MethodRef {
        owner: TypeRef::plain(ty),
        slot: MethodSlot::Method(0),
    };
    let first = analyzer.analyze(&registry, &method).unwrap();
    let second = analyzer.analyze(&registry, &method).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(analyzer.len(), 1);
}
