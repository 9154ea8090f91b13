//! Baked types: the runtime dispatch tables a bake produces.
//!
//! A [`BakedType`] is immutable once built. It owns
//! - the field layout (mix-in state blocks and implementation instances),
//! - the constructor IR that runs every `Init` hook,
//! - the dispatch table from [`MemberKey`] to a synthesized
//!   [`BodyFunction`] or a declared default body,
//! - property, event, and method metadata (effective nullability included).

use std::sync::Arc;

use kiln_emit::{BodyFunction, BodyId, FieldId};
use kiln_ir::{MemberBody, Name, RecordLayout, SharedInterner, TypeKey, ValueType};
use kiln_types::{ClosedImplementation, Nullability};
use rustc_hash::FxHashMap;

use crate::MemberKey;

/// What lives in a field of a baked instance.
#[derive(Clone, Debug)]
pub enum FieldKind {
    /// State of one member's implementation.
    Implementation(Arc<ClosedImplementation>),
    /// State block of a mix-in, shared by every member that needs it.
    Mixin {
        key: TypeKey,
        layout: Arc<RecordLayout>,
    },
}

#[derive(Clone, Debug)]
pub struct FieldDef {
    /// Diagnostic name (`<Name>impl`, or the mix-in's name).
    pub name: String,
    pub kind: FieldKind,
}

impl FieldDef {
    /// Layout of the field's record.
    pub fn layout(&self) -> &Arc<RecordLayout> {
        match &self.kind {
            FieldKind::Implementation(closed) => &closed.layout,
            FieldKind::Mixin { layout, .. } => layout,
        }
    }

    /// The implementation stored here, if this is an implementation field.
    pub fn implementation(&self) -> Option<&ClosedImplementation> {
        match &self.kind {
            FieldKind::Implementation(closed) => Some(closed),
            FieldKind::Mixin { .. } => None,
        }
    }

    /// The mix-in stored here, if this is a mix-in field.
    pub fn mixin(&self) -> Option<TypeKey> {
        match &self.kind {
            FieldKind::Mixin { key, .. } => Some(*key),
            FieldKind::Implementation(_) => None,
        }
    }
}

/// What a dispatch entry runs.
#[derive(Clone, Debug)]
pub enum MemberTarget {
    Synthesized(Arc<BodyFunction>),
    /// The declared default body, called directly.
    Default(BodyId),
}

#[derive(Clone, Debug)]
pub struct MemberEntry {
    pub params: Vec<ValueType>,
    pub ret: ValueType,
    pub target: MemberTarget,
    /// `Declaring.member` of the declaration this entry implements.
    pub qualified: String,
}

/// Metadata of a baked property.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyInfo {
    pub name: Name,
    pub ty: ValueType,
    /// Effective nullability: the property's annotation, else its declaring
    /// context's, else oblivious.
    pub nullability: Nullability,
    pub readable: bool,
    pub writable: bool,
    pub init_only: bool,
    pub declaring: TypeKey,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventInfo {
    pub name: Name,
    pub declaring: TypeKey,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodInfo {
    pub name: Name,
    pub params: Vec<ValueType>,
    pub ret: ValueType,
    pub declaring: TypeKey,
}

/// A baked type.
#[derive(Debug)]
pub struct BakedType {
    name: String,
    source: TypeKey,
    interfaces: Vec<TypeKey>,
    fields: Vec<FieldDef>,
    constructor: BodyFunction,
    members: FxHashMap<MemberKey, MemberEntry>,
    bodies: Vec<MemberBody>,
    properties: Vec<PropertyInfo>,
    events: Vec<EventInfo>,
    methods: Vec<MethodInfo>,
    interner: SharedInterner,
}

impl BakedType {
    /// `Baked.<Source>` (or the configured prefix).
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type this one was baked from.
    #[inline]
    pub fn source(&self) -> TypeKey {
        self.source
    }

    /// Implemented interfaces in discovery order.
    #[inline]
    pub fn interfaces(&self) -> &[TypeKey] {
        &self.interfaces
    }

    pub fn implements(&self, interface: TypeKey) -> bool {
        self.source == interface || self.interfaces.contains(&interface)
    }

    #[inline]
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    #[inline]
    pub fn field(&self, field: FieldId) -> Option<&FieldDef> {
        self.fields.get(field.index())
    }

    /// Field holding the given mix-in's state.
    pub fn mixin_field(&self, mixin: TypeKey) -> Option<FieldId> {
        field_of_mixin(&self.fields, mixin)
    }

    #[inline]
    pub fn constructor(&self) -> &BodyFunction {
        &self.constructor
    }

    #[inline]
    pub fn member(&self, key: &MemberKey) -> Option<&MemberEntry> {
        self.members.get(key)
    }

    pub fn members(&self) -> impl Iterator<Item = (&MemberKey, &MemberEntry)> {
        self.members.iter()
    }

    #[inline]
    pub fn body(&self, body: BodyId) -> Option<&MemberBody> {
        self.bodies.get(body.index())
    }

    /// Property metadata by name.
    pub fn property(&self, name: &str) -> Option<&PropertyInfo> {
        let name = self.interner.get(name)?;
        self.properties.iter().find(|p| p.name == name)
    }

    #[inline]
    pub fn properties(&self) -> &[PropertyInfo] {
        &self.properties
    }

    #[inline]
    pub fn events(&self) -> &[EventInfo] {
        &self.events
    }

    #[inline]
    pub fn methods(&self) -> &[MethodInfo] {
        &self.methods
    }

    #[inline]
    pub fn interner(&self) -> &SharedInterner {
        &self.interner
    }

    /// Every IR function of the type: the constructor, then synthesized
    /// members in no particular order.
    pub fn functions(&self) -> impl Iterator<Item = &BodyFunction> {
        std::iter::once(&self.constructor).chain(self.members.values().filter_map(|entry| {
            match &entry.target {
                MemberTarget::Synthesized(func) => Some(func.as_ref()),
                MemberTarget::Default(_) => None,
            }
        }))
    }
}

fn field_of_mixin(fields: &[FieldDef], mixin: TypeKey) -> Option<FieldId> {
    fields
        .iter()
        .position(|f| f.mixin() == Some(mixin))
        .and_then(|i| u32::try_from(i).ok())
        .map(FieldId::new)
}

/// Incremental construction of a [`BakedType`].
pub struct BakedTypeBuilder {
    name: String,
    source: TypeKey,
    interfaces: Vec<TypeKey>,
    fields: Vec<FieldDef>,
    constructor: Option<BodyFunction>,
    members: FxHashMap<MemberKey, MemberEntry>,
    bodies: Vec<MemberBody>,
    properties: Vec<PropertyInfo>,
    events: Vec<EventInfo>,
    methods: Vec<MethodInfo>,
    interner: SharedInterner,
}

impl BakedTypeBuilder {
    pub fn new(name: impl Into<String>, source: TypeKey, interner: SharedInterner) -> Self {
        BakedTypeBuilder {
            name: name.into(),
            source,
            interfaces: Vec::new(),
            fields: Vec::new(),
            constructor: None,
            members: FxHashMap::default(),
            bodies: Vec::new(),
            properties: Vec::new(),
            events: Vec::new(),
            methods: Vec::new(),
            interner,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "a baked type has one field per member at most"
    )]
    pub fn add_field(&mut self, name: impl Into<String>, kind: FieldKind) -> FieldId {
        let id = FieldId::new(self.fields.len() as u32);
        self.fields.push(FieldDef {
            name: name.into(),
            kind,
        });
        id
    }

    #[inline]
    pub fn field(&self, field: FieldId) -> Option<&FieldDef> {
        self.fields.get(field.index())
    }

    /// Field already allocated for a mix-in.
    pub fn mixin_field(&self, mixin: TypeKey) -> Option<FieldId> {
        field_of_mixin(&self.fields, mixin)
    }

    /// Register a default body, reusing the slot of an identical one.
    #[expect(
        clippy::cast_possible_truncation,
        reason = "a baked type has one body per member at most"
    )]
    pub fn add_body(&mut self, body: &MemberBody) -> BodyId {
        if let Some(i) = self.bodies.iter().position(|b| b.ptr_eq(body)) {
            return BodyId::new(i as u32);
        }
        let id = BodyId::new(self.bodies.len() as u32);
        self.bodies.push(body.clone());
        id
    }

    /// Record an implemented interface; `false` if it was already recorded.
    pub fn add_interface(&mut self, interface: TypeKey) -> bool {
        if self.interfaces.contains(&interface) {
            return false;
        }
        self.interfaces.push(interface);
        true
    }

    #[inline]
    pub fn member(&self, key: &MemberKey) -> Option<&MemberEntry> {
        self.members.get(key)
    }

    /// Add a dispatch entry, replacing any previous one for `key`.
    pub fn define(&mut self, key: MemberKey, entry: MemberEntry) {
        self.members.insert(key, entry);
    }

    pub fn add_property(&mut self, info: PropertyInfo) {
        self.properties.push(info);
    }

    pub fn add_event(&mut self, info: EventInfo) {
        self.events.push(info);
    }

    pub fn add_method(&mut self, info: MethodInfo) {
        self.methods.push(info);
    }

    pub fn set_constructor(&mut self, constructor: BodyFunction) {
        self.constructor = Some(constructor);
    }

    /// Finish the type. A missing constructor becomes an empty one.
    pub fn finish(self) -> BakedType {
        let constructor = self.constructor.unwrap_or_else(|| {
            let mut builder = kiln_emit::BodyBuilder::new(
                format!("{}..ctor", self.name),
                self.interner.intern(".ctor"),
                Vec::new(),
                ValueType::Void,
            );
            builder.terminate_return(None);
            builder.finish()
        });
        BakedType {
            name: self.name,
            source: self.source,
            interfaces: self.interfaces,
            fields: self.fields,
            constructor,
            members: self.members,
            bodies: self.bodies,
            properties: self.properties,
            events: self.events,
            methods: self.methods,
            interner: self.interner,
        }
    }
}

#[cfg(test)]
mod tests;
