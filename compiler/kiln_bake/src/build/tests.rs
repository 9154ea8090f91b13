use kiln_emit::dump;
use kiln_ir::{Value, ValueType};
use kiln_types::{Nullability, StandardLibrary, TypeRef};
use pretty_assertions::assert_eq;

use super::*;
use crate::analyze::analyze;

fn installed() -> (TypeRegistry, StandardLibrary) {
    let mut registry = TypeRegistry::new();
    let std = StandardLibrary::install(&mut registry).unwrap();
    (registry, std)
}

fn bake(registry: &TypeRegistry, config: &BakeryConfig, root: TypeKey) -> Result<BakedType, BakeError> {
    let analyzer = SignatureAnalyzer::new();
    let analysis = analyze(registry, &analyzer, config, root)?;
    build(registry, &analyzer, config, &analysis)
}

fn field_names(ty: &BakedType) -> Vec<&str> {
    ty.fields().iter().map(|f| f.name.as_str()).collect()
}

fn target<'a>(ty: &'a BakedType, kind: AccessorKind, member: &str, arity: u32) -> &'a MemberTarget {
    let name = ty.interner().intern(member);
    &ty.member(&MemberKey::new(kind, name, arity)).unwrap().target
}

#[test]
fn plain_properties_get_one_implementation_field_each() {
    let (mut registry, std) = installed();
    let person = registry
        .interface("IPerson")
        .property("Name", ValueType::Str, |p| p.not_nullable())
        .property("Age", ValueType::Int, |p| p)
        .finish()
        .unwrap();

    let ty = bake(&registry, &BakeryConfig::basic(&std), person).unwrap();
    assert_eq!(ty.name(), "Baked.IPerson");
    assert_eq!(field_names(&ty), vec!["<Name>impl", "<Age>impl"]);
    assert_eq!(ty.members().count(), 4);
    assert!(matches!(
        target(&ty, AccessorKind::Get, "Name", 0),
        MemberTarget::Synthesized(_)
    ));
    assert!(matches!(
        target(&ty, AccessorKind::Set, "Age", 1),
        MemberTarget::Synthesized(_)
    ));

    let name = ty.property("Name").unwrap();
    assert_eq!(name.nullability, Nullability::NotNullable);
    assert!(name.readable && name.writable);
    assert_eq!(name.declaring, person);
}

#[test]
fn constructor_initializes_every_implementation() {
    let (mut registry, std) = installed();
    let person = registry
        .interface("IPerson")
        .property("Name", ValueType::Str, |p| p.not_nullable())
        .property("Nick", ValueType::Str, |p| p.nullable())
        .finish()
        .unwrap();

    let ty = bake(&registry, &BakeryConfig::basic(&std), person).unwrap();
    let consts: Vec<&Value> = ty
        .constructor()
        .blocks
        .iter()
        .flat_map(|b| &b.body)
        .filter_map(|instr| match instr {
            kiln_emit::BodyInstr::Const { value, .. } => Some(value),
            _ => None,
        })
        .collect();
    assert_eq!(consts, vec![&Value::str(""), &Value::Null]);
}

#[test]
fn context_nullability_applies_to_unannotated_properties() {
    let (mut registry, std) = installed();
    let person = registry
        .interface("IPerson")
        .nullable_context(Nullability::NotNullable)
        .property("Name", ValueType::Str, |p| p)
        .property("Nick", ValueType::Str, |p| p.nullable())
        .finish()
        .unwrap();

    let ty = bake(&registry, &BakeryConfig::basic(&std), person).unwrap();
    assert_eq!(ty.property("Name").unwrap().nullability, Nullability::NotNullable);
    assert_eq!(ty.property("Nick").unwrap().nullability, Nullability::Nullable);
}

#[test]
fn public_mixin_fields_come_first() {
    let (mut registry, std) = installed();
    let person = registry
        .interface("IPerson")
        .extends(std.notify_interface)
        .property("Name", ValueType::Str, |p| p)
        .finish()
        .unwrap();

    let ty = bake(&registry, &BakeryConfig::notifying(&std), person).unwrap();
    assert_eq!(field_names(&ty), vec!["NotifyMixin", "<Name>impl"]);
    assert_eq!(ty.interfaces(), &[person, std.notify_interface]);
    assert!(matches!(
        target(&ty, AccessorKind::Add, "PropertyChanged", 1),
        MemberTarget::Synthesized(_)
    ));
}

#[test]
fn default_bodies_are_dispatched_directly() {
    let (mut registry, std) = installed();
    let answer = registry
        .interface("IAnswer")
        .method("Ask", [], ValueType::Int, |m| m.body(|_| Ok(Value::Int(42))))
        .finish()
        .unwrap();

    let ty = bake(&registry, &BakeryConfig::basic(&std), answer).unwrap();
    assert!(ty.fields().is_empty());
    assert!(matches!(
        target(&ty, AccessorKind::Call, "Ask", 0),
        MemberTarget::Default(_)
    ));
    assert_eq!(ty.methods().len(), 1);
}

#[test]
fn wrapped_getter_follows_the_protocol() {
    let (mut registry, std) = installed();
    let answer = registry
        .interface("IAnswer")
        .property("Value", ValueType::Int, |p| {
            p.read_only().get(|_| Ok(Value::Int(42)))
        })
        .finish()
        .unwrap();

    let ty = bake(&registry, &BakeryConfig::caching(&std), answer).unwrap();
    assert_eq!(field_names(&ty), vec!["CacheMixin", "<Value>impl"]);
    let MemberTarget::Synthesized(func) = target(&ty, AccessorKind::Get, "Value", 0) else {
        panic!("getter is not synthesized");
    };
    assert!(func.is_wrapping());
    let text = dump(func, ty.interner());
    for hook in ["BeforeGet", "AfterGet", "AfterErrorGet"] {
        assert!(text.contains(hook), "{hook} missing from\n{text}");
    }
    assert!(text.contains("rethrow"), "{text}");
}

#[test]
fn same_member_through_two_paths_is_generated_once() {
    let (mut registry, std) = installed();
    let left = registry
        .interface("ILeft")
        .property("Name", ValueType::Str, |p| p)
        .finish()
        .unwrap();
    let right = registry
        .interface("IRight")
        .property("Name", ValueType::Str, |p| p)
        .finish()
        .unwrap();
    let both = registry
        .interface("IBoth")
        .extends(left)
        .extends(right)
        .finish()
        .unwrap();

    let ty = bake(&registry, &BakeryConfig::basic(&std), both).unwrap();
    assert_eq!(field_names(&ty), vec!["<Name>impl"]);
    assert_eq!(ty.properties().len(), 1);
    assert_eq!(ty.property("Name").unwrap().declaring, left);
}

#[test]
fn same_key_with_different_signatures_collides() {
    let (mut registry, std) = installed();
    let left = registry
        .interface("ILeft")
        .property("Value", ValueType::Int, |p| p)
        .finish()
        .unwrap();
    let right = registry
        .interface("IRight")
        .property("Value", ValueType::Str, |p| p)
        .finish()
        .unwrap();
    let both = registry
        .interface("IBoth")
        .extends(left)
        .extends(right)
        .finish()
        .unwrap();

    let err = bake(&registry, &BakeryConfig::basic(&std), both).unwrap_err();
    match err {
        BakeError::MemberCollision { first, second, .. } => {
            assert!(first.starts_with("ILeft."), "{first}");
            assert!(second.starts_with("IRight."), "{second}");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn registering_an_interface_twice_fails() {
    let (mut registry, std) = installed();
    let person = registry
        .interface("IPerson")
        .property("Name", ValueType::Str, |p| p)
        .finish()
        .unwrap();
    let config = BakeryConfig::basic(&std);
    let analyzer = SignatureAnalyzer::new();
    let mut analysis = analyze(&registry, &analyzer, &config, person).unwrap();
    analysis.interfaces.push(TypeRef::plain(person));

    let err = build(&registry, &analyzer, &config, &analysis).unwrap_err();
    match err {
        BakeError::DuplicateInterface { interface, baked } => {
            assert_eq!(interface, "IPerson");
            assert_eq!(baked, "Baked.IPerson");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn name_prefix_is_configurable() {
    let (mut registry, std) = installed();
    let person = registry
        .interface("IPerson")
        .property("Name", ValueType::Str, |p| p)
        .finish()
        .unwrap();

    let ty = bake(&registry, &BakeryConfig::basic(&std).name_prefix("Gen."), person).unwrap();
    assert_eq!(ty.name(), "Gen.IPerson");
    assert_eq!(ty.constructor().name, "Gen.IPerson..ctor");
}
