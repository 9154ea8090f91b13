//! Registry of source type definitions and implementation types.
//!
//! The `TypeRegistry` stores every interface, mix-in, and class a bake can
//! reach, plus the implementation types members can be wired to. It is
//! built up front (through the builders in [`builder`]) and frozen behind a
//! shared handle before baking starts.
//!
//! # Design
//!
//! - Definitions live in `Vec`s indexed by `TypeKey`/`ImplKey`
//! - Name lookups go through `BTreeMap`s for deterministic iteration
//! - Ancestry is a breadth-first walk with cycle protection

mod builder;

use std::collections::BTreeMap;
use std::sync::Arc;

use kiln_ir::{ImplKey, MemberBody, Name, RecordLayout, SharedInterner, TypeKey, ValueType};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::{BakeError, ImplementationDef, Nullability};

pub use builder::{
    EventBuilder, HookBuilder, ImplementationBuilder, MethodBuilder, PropertyBuilder, TypeBuilder,
};

/// What kind of type a definition is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Interface,
    /// Auxiliary per-instance state with member bodies.
    Mixin,
    Class {
        is_abstract: bool,
    },
}

/// A type reference with its generic arguments.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeRef {
    pub key: TypeKey,
    pub args: SmallVec<[ValueType; 2]>,
}

impl TypeRef {
    /// Reference to a non-generic type.
    pub fn plain(key: TypeKey) -> Self {
        TypeRef {
            key,
            args: SmallVec::new(),
        }
    }

    /// Reference to a generic type instantiated with `args`.
    pub fn generic(key: TypeKey, args: impl IntoIterator<Item = ValueType>) -> Self {
        TypeRef {
            key,
            args: args.into_iter().collect(),
        }
    }

    /// Rewrite the arguments of a reference written inside another type's
    /// declaration in terms of that type's own arguments.
    #[must_use]
    pub fn substitute(&self, outer: &[ValueType]) -> TypeRef {
        TypeRef {
            key: self.key,
            args: self.args.iter().map(|arg| arg.substitute(outer)).collect(),
        }
    }
}

impl From<TypeKey> for TypeRef {
    fn from(key: TypeKey) -> Self {
        TypeRef::plain(key)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Visibility {
    #[default]
    Public,
    Private,
}

/// Modifiers shared by every member declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberMeta {
    pub visibility: Visibility,
    pub is_static: bool,
    pub is_overridable: bool,
    /// Interface this declaration explicitly implements (`IPerson.Name`).
    pub explicit_for: Option<TypeKey>,
}

impl Default for MemberMeta {
    fn default() -> Self {
        MemberMeta {
            visibility: Visibility::Public,
            is_static: false,
            is_overridable: true,
            explicit_for: None,
        }
    }
}

/// A property accessor; `body` is its default implementation, if any.
#[derive(Clone, Debug, Default)]
pub struct Accessor {
    pub body: Option<MemberBody>,
}

#[derive(Clone, Debug)]
pub struct PropertyDecl {
    /// Name as declared; `IPerson.Name` for explicit implementations.
    pub name: Name,
    pub ty: ValueType,
    pub getter: Option<Accessor>,
    pub setter: Option<Accessor>,
    pub nullability: Nullability,
    pub init_only: bool,
    /// Implementation type chosen by the declaration itself.
    pub implementation: Option<ImplKey>,
    pub meta: MemberMeta,
}

#[derive(Clone, Debug)]
pub struct EventDecl {
    pub name: Name,
    pub add_body: Option<MemberBody>,
    pub remove_body: Option<MemberBody>,
    pub implementation: Option<ImplKey>,
    pub meta: MemberMeta,
}

#[derive(Clone, Debug)]
pub struct MethodDecl {
    pub name: Name,
    pub params: Vec<ValueType>,
    pub ret: ValueType,
    pub body: Option<MemberBody>,
    pub implementation: Option<ImplKey>,
    pub meta: MemberMeta,
}

/// A registered interface, mix-in, or class.
#[derive(Clone, Debug)]
pub struct TypeDef {
    pub key: TypeKey,
    pub name: Name,
    pub kind: TypeKind,
    /// Generic parameter names; members refer to them as `ValueType::Param(i)`.
    pub type_params: Vec<Name>,
    /// Base interfaces, with arguments in terms of this type's parameters.
    pub bases: Vec<TypeRef>,
    pub base_class: Option<TypeRef>,
    /// Mix-ins every type implementing this one carries.
    pub mixins: Vec<TypeKey>,
    pub properties: Vec<PropertyDecl>,
    pub events: Vec<EventDecl>,
    pub methods: Vec<MethodDecl>,
    /// State block layout (mix-ins only).
    pub state: Vec<(Name, ValueType)>,
    /// Nullability annotation of the declaring context.
    pub nullable_context: Nullability,
}

impl TypeDef {
    #[inline]
    pub fn is_interface(&self) -> bool {
        matches!(self.kind, TypeKind::Interface)
    }

    #[inline]
    pub fn is_mixin(&self) -> bool {
        matches!(self.kind, TypeKind::Mixin)
    }

    #[inline]
    pub fn is_class(&self) -> bool {
        matches!(self.kind, TypeKind::Class { .. })
    }

    /// Record layout of this mix-in's state block.
    pub fn state_layout(&self) -> Arc<RecordLayout> {
        Arc::new(RecordLayout::new(self.name, self.state.clone()))
    }
}

/// Which method of a declaration a [`MethodRef`] points at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MethodSlot {
    Getter(u32),
    Setter(u32),
    Adder(u32),
    Remover(u32),
    Method(u32),
}

impl MethodSlot {
    /// Accessor and event methods carry compiler-style special names.
    #[inline]
    pub fn is_special(self) -> bool {
        !matches!(self, MethodSlot::Method(_))
    }
}

/// A method of an instantiated type: the unit member analysis works on.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub owner: TypeRef,
    pub slot: MethodSlot,
}

/// Registry of type definitions and implementation types.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    interner: SharedInterner,

    /// All type definitions, indexed by `TypeKey`.
    types: Vec<TypeDef>,

    /// Name → type key (`BTreeMap` for deterministic iteration).
    types_by_name: BTreeMap<Name, TypeKey>,

    /// All implementation types, indexed by `ImplKey`.
    implementations: Vec<ImplementationDef>,

    /// Name → implementation key.
    implementations_by_name: BTreeMap<Name, ImplKey>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that interns into an existing interner.
    pub fn with_interner(interner: SharedInterner) -> Self {
        TypeRegistry {
            interner,
            ..Self::default()
        }
    }

    #[inline]
    pub fn interner(&self) -> &SharedInterner {
        &self.interner
    }

    // === Registration ===

    /// Register a type definition, assigning its key.
    pub fn register_type(&mut self, mut def: TypeDef) -> Result<TypeKey, BakeError> {
        if self.types_by_name.contains_key(&def.name) {
            return Err(BakeError::DuplicateType {
                name: self.interner.lookup(def.name).to_owned(),
            });
        }
        let key = TypeKey::from_raw(
            u32::try_from(self.types.len()).map_err(|_| BakeError::internal("too many types"))?,
        );
        def.key = key;
        self.types_by_name.insert(def.name, key);
        self.types.push(def);
        tracing::trace!(name = self.name_of(key), ?key, "registered type");
        Ok(key)
    }

    /// Register an implementation type, assigning its key.
    pub fn register_implementation(
        &mut self,
        mut def: ImplementationDef,
    ) -> Result<ImplKey, BakeError> {
        if self.implementations_by_name.contains_key(&def.name) {
            return Err(BakeError::DuplicateType {
                name: self.interner.lookup(def.name).to_owned(),
            });
        }
        let key = ImplKey::from_raw(
            u32::try_from(self.implementations.len())
                .map_err(|_| BakeError::internal("too many implementation types"))?,
        );
        def.key = key;
        self.implementations_by_name.insert(def.name, key);
        self.implementations.push(def);
        Ok(key)
    }

    /// Attach a mix-in to an already registered type.
    ///
    /// Lets an interface and the mix-in implementing it refer to each other.
    pub fn add_mixin(&mut self, ty: TypeKey, mixin: TypeKey) -> Result<(), BakeError> {
        if !self.type_def(mixin)?.is_mixin() {
            return Err(BakeError::internal(format!(
                "`{}` is not a mix-in",
                self.name_of(mixin)
            )));
        }
        let def = self
            .types
            .get_mut(ty.index())
            .ok_or_else(|| BakeError::internal(format!("unknown type key {ty:?}")))?;
        if !def.mixins.contains(&mixin) {
            def.mixins.push(mixin);
        }
        Ok(())
    }

    // === Lookup ===

    #[inline]
    pub fn get(&self, key: TypeKey) -> Option<&TypeDef> {
        self.types.get(key.index())
    }

    /// Like [`get`](Self::get), for call sites that treat a dangling key as
    /// an engine bug.
    pub fn type_def(&self, key: TypeKey) -> Result<&TypeDef, BakeError> {
        self.get(key)
            .ok_or_else(|| BakeError::internal(format!("unknown type key {key:?}")))
    }

    /// Find a type by name.
    pub fn lookup(&self, name: &str) -> Option<TypeKey> {
        let name = self.interner.get(name)?;
        self.types_by_name.get(&name).copied()
    }

    /// Find a type by name, failing with `UnknownType`.
    pub fn resolve_name(&self, name: &str) -> Result<TypeKey, BakeError> {
        self.lookup(name).ok_or_else(|| BakeError::UnknownType {
            name: name.to_owned(),
        })
    }

    /// Name of a type (empty for unknown keys).
    pub fn name_of(&self, key: TypeKey) -> &'static str {
        self.get(key).map_or("", |def| self.interner.lookup(def.name))
    }

    /// Display name of a type reference, e.g. `IRepository<int>`.
    pub fn display_ref(&self, ty: &TypeRef) -> String {
        if ty.args.is_empty() {
            return self.name_of(ty.key).to_owned();
        }
        let args = ty
            .args
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}<{args}>", self.name_of(ty.key))
    }

    #[inline]
    pub fn implementation_def(&self, key: ImplKey) -> Option<&ImplementationDef> {
        self.implementations.get(key.index())
    }

    /// Find an implementation type by name.
    pub fn lookup_implementation(&self, name: &str) -> Option<ImplKey> {
        let name = self.interner.get(name)?;
        self.implementations_by_name.get(&name).copied()
    }

    pub fn iter_types(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.iter()
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn implementation_count(&self) -> usize {
        self.implementations.len()
    }

    // === Ancestry ===

    /// Collect all base interfaces and base classes transitively.
    ///
    /// Returns a de-duplicated list in breadth-first order, not including
    /// `key` itself. Mix-ins are not ancestors.
    pub fn ancestors(&self, key: TypeKey) -> Vec<TypeKey> {
        let mut visited = FxHashSet::default();
        let mut result = Vec::new();
        let mut queue = std::collections::VecDeque::new();
        visited.insert(key);
        queue.push_back(key);

        while let Some(current) = queue.pop_front() {
            if current != key {
                result.push(current);
            }
            if let Some(def) = self.get(current) {
                for parent in def.bases.iter().chain(&def.base_class) {
                    if visited.insert(parent.key) {
                        queue.push_back(parent.key);
                    }
                }
            }
        }

        result
    }

    /// Whether `ancestor` is a (transitive) base of `of`.
    pub fn is_ancestor(&self, ancestor: TypeKey, of: TypeKey) -> bool {
        ancestor != of && self.ancestors(of).contains(&ancestor)
    }

    /// The instantiated base interfaces of `root`, transitively, starting
    /// with `root` itself. Arguments are substituted along the way.
    pub fn interface_closure(&self, root: &TypeRef) -> Vec<TypeRef> {
        let mut visited = FxHashSet::default();
        let mut result = Vec::new();
        let mut queue = std::collections::VecDeque::new();
        visited.insert(root.clone());
        queue.push_back(root.clone());

        while let Some(current) = queue.pop_front() {
            if let Some(def) = self.get(current.key) {
                for base in &def.bases {
                    let base = base.substitute(&current.args);
                    if visited.insert(base.clone()) {
                        queue.push_back(base);
                    }
                }
            }
            result.push(current);
        }

        result
    }

    // === Members ===

    /// Every method (accessors included) declared directly on `owner`.
    pub fn methods_of(&self, owner: &TypeRef) -> Result<Vec<MethodRef>, BakeError> {
        let def = self.type_def(owner.key)?;
        let mut methods = Vec::new();
        let slot_index = |i: usize| {
            u32::try_from(i).map_err(|_| BakeError::internal("too many members on one type"))
        };

        for (i, prop) in def.properties.iter().enumerate() {
            let i = slot_index(i)?;
            if prop.getter.is_some() {
                methods.push(MethodSlot::Getter(i));
            }
            if prop.setter.is_some() {
                methods.push(MethodSlot::Setter(i));
            }
        }
        for i in 0..def.events.len() {
            let i = slot_index(i)?;
            methods.push(MethodSlot::Adder(i));
            methods.push(MethodSlot::Remover(i));
        }
        for i in 0..def.methods.len() {
            methods.push(MethodSlot::Method(slot_index(i)?));
        }

        Ok(methods
            .into_iter()
            .map(|slot| MethodRef {
                owner: owner.clone(),
                slot,
            })
            .collect())
    }

    /// The default body of a method, if its declaration has one.
    pub fn method_body(&self, method: &MethodRef) -> Option<&MemberBody> {
        let def = self.get(method.owner.key)?;
        match method.slot {
            MethodSlot::Getter(i) => def.properties.get(i as usize)?.getter.as_ref()?.body.as_ref(),
            MethodSlot::Setter(i) => def.properties.get(i as usize)?.setter.as_ref()?.body.as_ref(),
            MethodSlot::Adder(i) => def.events.get(i as usize)?.add_body.as_ref(),
            MethodSlot::Remover(i) => def.events.get(i as usize)?.remove_body.as_ref(),
            MethodSlot::Method(i) => def.methods.get(i as usize)?.body.as_ref(),
        }
    }

    /// Implementation type chosen by the declaration owning `method`.
    pub fn declared_implementation(&self, method: &MethodRef) -> Option<ImplKey> {
        let def = self.get(method.owner.key)?;
        match method.slot {
            MethodSlot::Getter(i) | MethodSlot::Setter(i) => {
                def.properties.get(i as usize)?.implementation
            }
            MethodSlot::Adder(i) | MethodSlot::Remover(i) => {
                def.events.get(i as usize)?.implementation
            }
            MethodSlot::Method(i) => def.methods.get(i as usize)?.implementation,
        }
    }
}
