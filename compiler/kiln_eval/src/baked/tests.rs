use kiln_ir::{MemberBody, Name, RecordLayout, SharedInterner, TypeKey, Value, ValueType};
use kiln_types::Nullability;
use pretty_assertions::assert_eq;

use super::*;
use crate::AccessorKind;

fn builder(interner: &SharedInterner) -> BakedTypeBuilder {
    BakedTypeBuilder::new("Baked.IThing", TypeKey::from_raw(3), interner.clone())
}

#[test]
fn missing_constructor_is_empty() {
    let interner = SharedInterner::new();
    let ty = builder(&interner).finish();

    let ctor = ty.constructor();
    assert_eq!(ctor.name, "Baked.IThing..ctor");
    assert_eq!(ctor.blocks.len(), 1);
    assert_eq!(ty.functions().count(), 1);
}

#[test]
fn identical_bodies_share_a_slot() {
    let interner = SharedInterner::new();
    let mut b = builder(&interner);
    let body = MemberBody::new(|_| Ok(Value::Void));
    let other = MemberBody::new(|_| Ok(Value::Void));

    let first = b.add_body(&body);
    assert_eq!(b.add_body(&body.clone()), first);
    assert_ne!(b.add_body(&other), first);
}

#[test]
fn interfaces_are_recorded_once() {
    let interner = SharedInterner::new();
    let mut b = builder(&interner);
    let base = TypeKey::from_raw(1);
    assert!(b.add_interface(base));
    assert!(!b.add_interface(base));

    let ty = b.finish();
    assert_eq!(ty.interfaces(), &[base]);
    assert!(ty.implements(base));
    assert!(ty.implements(TypeKey::from_raw(3)));
    assert!(!ty.implements(TypeKey::from_raw(2)));
}

#[test]
fn mixin_fields_are_found_by_key() {
    let interner = SharedInterner::new();
    let mut b = builder(&interner);
    let mixin = TypeKey::from_raw(7);
    let field = b.add_field(
        "NotifyMixin",
        FieldKind::Mixin {
            key: mixin,
            layout: Arc::new(RecordLayout::empty(Name::EMPTY)),
        },
    );
    assert_eq!(b.mixin_field(mixin), Some(field));
    assert_eq!(b.mixin_field(TypeKey::from_raw(8)), None);

    let ty = b.finish();
    assert_eq!(ty.mixin_field(mixin), Some(field));
    assert!(ty.field(field).is_some_and(|f| f.implementation().is_none()));
}

#[test]
fn property_metadata_by_name() {
    let interner = SharedInterner::new();
    let mut b = builder(&interner);
    let name = interner.intern("Title");
    b.add_property(PropertyInfo {
        name,
        ty: ValueType::Str,
        nullability: Nullability::NotNullable,
        readable: true,
        writable: false,
        init_only: false,
        declaring: TypeKey::from_raw(3),
    });

    let ty = b.finish();
    let info = ty.property("Title").unwrap();
    assert_eq!(info.nullability, Nullability::NotNullable);
    assert!(!info.writable);
    assert!(ty.property("Missing").is_none());
}

#[test]
fn define_replaces_previous_entry() {
    let interner = SharedInterner::new();
    let mut b = builder(&interner);
    let key = MemberKey::new(AccessorKind::Call, interner.intern("Run"), 0);
    let entry = |qualified: &str| MemberEntry {
        params: Vec::new(),
        ret: ValueType::Void,
        target: MemberTarget::Default(BodyId::new(0)),
        qualified: qualified.to_owned(),
    };
    b.define(key, entry("IThing.Run"));
    b.define(key, entry("IOther.Run"));

    let ty = b.finish();
    assert_eq!(ty.member(&key).map(|e| e.qualified.as_str()), Some("IOther.Run"));
    assert_eq!(ty.members().count(), 1);
}
