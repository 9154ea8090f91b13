//! Fluent builders for type definitions and implementation types.
//!
//! ```ignore
//! let person = registry
//!     .interface("IPerson")
//!     .property("Name", ValueType::Str, |p| p.not_nullable())
//!     .property("Age", ValueType::Int, |p| p)
//!     .finish()?;
//! ```

use kiln_ir::{
    BodyCx, Fault, HookCx, HookFn, ImplKey, MemberBody, Name, TypeKey, Value, ValueType,
};

use super::{
    Accessor, EventDecl, MemberMeta, MethodDecl, PropertyDecl, TypeDef, TypeKind, TypeRef,
    TypeRegistry, Visibility,
};
use crate::implementation::{
    HookDecl, HookParam, HookReturn, ImplInterface, ImplParam, ImplementationDef, ParamBinding,
    Role, Shape,
};
use crate::{BakeError, Nullability};

impl TypeRegistry {
    /// Start declaring an interface.
    pub fn interface(&mut self, name: &str) -> TypeBuilder<'_> {
        TypeBuilder::new(self, name, TypeKind::Interface)
    }

    /// Start declaring a mix-in.
    pub fn mixin(&mut self, name: &str) -> TypeBuilder<'_> {
        TypeBuilder::new(self, name, TypeKind::Mixin)
    }

    /// Start declaring an abstract class.
    pub fn abstract_class(&mut self, name: &str) -> TypeBuilder<'_> {
        TypeBuilder::new(self, name, TypeKind::Class { is_abstract: true })
    }

    /// Start declaring a concrete (base) class.
    pub fn class(&mut self, name: &str) -> TypeBuilder<'_> {
        TypeBuilder::new(self, name, TypeKind::Class { is_abstract: false })
    }

    /// Start declaring an implementation type.
    pub fn implementation(&mut self, name: &str) -> ImplementationBuilder<'_> {
        ImplementationBuilder::new(self, name)
    }
}

/// Split `IPerson.Name` into the explicitly implemented interface and the
/// member name.
fn split_explicit(registry: &TypeRegistry, declared: &str) -> Result<Option<TypeKey>, BakeError> {
    match declared.rsplit_once('.') {
        Some((interface, _)) => registry.resolve_name(interface).map(Some),
        None => Ok(None),
    }
}

// ── Types ───────────────────────────────────────────────────────────

/// Builder for a [`TypeDef`]. Errors are deferred to [`finish`](Self::finish).
pub struct TypeBuilder<'r> {
    registry: &'r mut TypeRegistry,
    def: TypeDef,
    error: Option<BakeError>,
}

impl<'r> TypeBuilder<'r> {
    fn new(registry: &'r mut TypeRegistry, name: &str, kind: TypeKind) -> Self {
        let name = registry.interner().intern(name);
        TypeBuilder {
            registry,
            def: TypeDef {
                key: TypeKey::from_raw(0),
                name,
                kind,
                type_params: Vec::new(),
                bases: Vec::new(),
                base_class: None,
                mixins: Vec::new(),
                properties: Vec::new(),
                events: Vec::new(),
                methods: Vec::new(),
                state: Vec::new(),
                nullable_context: Nullability::Oblivious,
            },
            error: None,
        }
    }

    fn intern(&self, s: &str) -> Name {
        self.registry.interner().intern(s)
    }

    fn meta_for(&mut self, declared: &str) -> MemberMeta {
        let explicit_for = match split_explicit(self.registry, declared) {
            Ok(explicit_for) => explicit_for,
            Err(e) => {
                self.error.get_or_insert(e);
                None
            }
        };
        MemberMeta {
            explicit_for,
            ..MemberMeta::default()
        }
    }

    /// Declare a generic parameter (`ValueType::Param(i)` in declaration order).
    #[must_use]
    pub fn type_param(mut self, name: &str) -> Self {
        let name = self.intern(name);
        self.def.type_params.push(name);
        self
    }

    /// Inherit from a base interface.
    #[must_use]
    pub fn extends(mut self, base: impl Into<TypeRef>) -> Self {
        self.def.bases.push(base.into());
        self
    }

    /// Inherit from an instantiated generic base interface.
    #[must_use]
    pub fn extends_generic(
        mut self,
        base: TypeKey,
        args: impl IntoIterator<Item = ValueType>,
    ) -> Self {
        self.def.bases.push(TypeRef::generic(base, args));
        self
    }

    /// Set the base class (classes only).
    #[must_use]
    pub fn base_class(mut self, base: impl Into<TypeRef>) -> Self {
        self.def.base_class = Some(base.into());
        self
    }

    /// Require a mix-in on every type implementing this one.
    #[must_use]
    pub fn mixin(mut self, mixin: TypeKey) -> Self {
        self.def.mixins.push(mixin);
        self
    }

    /// Add a state field (mix-ins only).
    #[must_use]
    pub fn state(mut self, name: &str, ty: ValueType) -> Self {
        let name = self.intern(name);
        self.def.state.push((name, ty));
        self
    }

    /// Nullability annotation of the declaring context.
    #[must_use]
    pub fn nullable_context(mut self, nullability: Nullability) -> Self {
        self.def.nullable_context = nullability;
        self
    }

    /// Declare a property (abstract `{ get; set; }` unless configured).
    #[must_use]
    pub fn property(
        mut self,
        name: &str,
        ty: ValueType,
        configure: impl FnOnce(PropertyBuilder) -> PropertyBuilder,
    ) -> Self {
        let meta = self.meta_for(name);
        let decl = PropertyDecl {
            name: self.intern(name),
            ty,
            getter: Some(Accessor::default()),
            setter: Some(Accessor::default()),
            nullability: Nullability::Oblivious,
            init_only: false,
            implementation: None,
            meta,
        };
        self.def.properties.push(configure(PropertyBuilder { decl }).decl);
        self
    }

    /// Declare an event.
    #[must_use]
    pub fn event(
        mut self,
        name: &str,
        configure: impl FnOnce(EventBuilder) -> EventBuilder,
    ) -> Self {
        let meta = self.meta_for(name);
        let decl = EventDecl {
            name: self.intern(name),
            add_body: None,
            remove_body: None,
            implementation: None,
            meta,
        };
        self.def.events.push(configure(EventBuilder { decl }).decl);
        self
    }

    /// Declare a method.
    #[must_use]
    pub fn method(
        mut self,
        name: &str,
        params: impl IntoIterator<Item = ValueType>,
        ret: ValueType,
        configure: impl FnOnce(MethodBuilder) -> MethodBuilder,
    ) -> Self {
        let meta = self.meta_for(name);
        let decl = MethodDecl {
            name: self.intern(name),
            params: params.into_iter().collect(),
            ret,
            body: None,
            implementation: None,
            meta,
        };
        self.def.methods.push(configure(MethodBuilder { decl }).decl);
        self
    }

    /// Register the definition.
    pub fn finish(self) -> Result<TypeKey, BakeError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        self.registry.register_type(self.def)
    }
}

macro_rules! member_modifiers {
    ($builder:ident) => {
        impl $builder {
            /// Private declaration: never implementable.
            #[must_use]
            pub fn private(mut self) -> Self {
                self.decl.meta.visibility = Visibility::Private;
                self
            }

            /// Static declaration: never implementable.
            #[must_use]
            pub fn static_member(mut self) -> Self {
                self.decl.meta.is_static = true;
                self
            }

            /// Non-overridable declaration.
            #[must_use]
            pub fn sealed(mut self) -> Self {
                self.decl.meta.is_overridable = false;
                self
            }

            /// Wire this member to a specific implementation type.
            #[must_use]
            pub fn implemented_by(mut self, implementation: ImplKey) -> Self {
                self.decl.implementation = Some(implementation);
                self
            }
        }
    };
}

/// Configures a [`PropertyDecl`].
pub struct PropertyBuilder {
    decl: PropertyDecl,
}

member_modifiers!(PropertyBuilder);

impl PropertyBuilder {
    /// Getter with a default body.
    #[must_use]
    pub fn get(
        mut self,
        body: impl Fn(&mut BodyCx<'_>) -> Result<Value, Fault> + Send + Sync + 'static,
    ) -> Self {
        self.decl.getter = Some(Accessor {
            body: Some(MemberBody::new(body)),
        });
        self
    }

    /// Setter with a default body; the new value is argument 0.
    #[must_use]
    pub fn set(
        mut self,
        body: impl Fn(&mut BodyCx<'_>) -> Result<Value, Fault> + Send + Sync + 'static,
    ) -> Self {
        self.decl.setter = Some(Accessor {
            body: Some(MemberBody::new(body)),
        });
        self
    }

    /// No setter.
    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.decl.setter = None;
        self
    }

    /// No getter.
    #[must_use]
    pub fn write_only(mut self) -> Self {
        self.decl.getter = None;
        self
    }

    /// Setter is `init`-only.
    #[must_use]
    pub fn init_only(mut self) -> Self {
        self.decl.init_only = true;
        self
    }

    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.decl.nullability = Nullability::Nullable;
        self
    }

    #[must_use]
    pub fn not_nullable(mut self) -> Self {
        self.decl.nullability = Nullability::NotNullable;
        self
    }
}

/// Configures an [`EventDecl`].
pub struct EventBuilder {
    decl: EventDecl,
}

member_modifiers!(EventBuilder);

impl EventBuilder {
    /// `add` with a default body; the handler is argument 0.
    #[must_use]
    pub fn add(
        mut self,
        body: impl Fn(&mut BodyCx<'_>) -> Result<Value, Fault> + Send + Sync + 'static,
    ) -> Self {
        self.decl.add_body = Some(MemberBody::new(body));
        self
    }

    /// `remove` with a default body; the handler is argument 0.
    #[must_use]
    pub fn remove(
        mut self,
        body: impl Fn(&mut BodyCx<'_>) -> Result<Value, Fault> + Send + Sync + 'static,
    ) -> Self {
        self.decl.remove_body = Some(MemberBody::new(body));
        self
    }
}

/// Configures a [`MethodDecl`].
pub struct MethodBuilder {
    decl: MethodDecl,
}

member_modifiers!(MethodBuilder);

impl MethodBuilder {
    /// Default body.
    #[must_use]
    pub fn body(
        mut self,
        body: impl Fn(&mut BodyCx<'_>) -> Result<Value, Fault> + Send + Sync + 'static,
    ) -> Self {
        self.decl.body = Some(MemberBody::new(body));
        self
    }
}

// ── Implementation types ────────────────────────────────────────────

/// Builder for an [`ImplementationDef`].
///
/// Nothing is validated here; [`CheckedImplementation::check`] does that
/// when a bake first uses the type.
///
/// [`CheckedImplementation::check`]: crate::CheckedImplementation::check
pub struct ImplementationBuilder<'r> {
    registry: &'r mut TypeRegistry,
    def: ImplementationDef,
}

impl<'r> ImplementationBuilder<'r> {
    fn new(registry: &'r mut TypeRegistry, name: &str) -> Self {
        let name = registry.interner().intern(name);
        ImplementationBuilder {
            registry,
            def: ImplementationDef {
                key: ImplKey::from_raw(0),
                name,
                interfaces: Vec::new(),
                params: Vec::new(),
                state: Vec::new(),
                hooks: Vec::new(),
            },
        }
    }

    fn intern(&self, s: &str) -> Name {
        self.registry.interner().intern(s)
    }

    /// Implement a shape interface.
    #[must_use]
    pub fn shape(mut self, shape: Shape) -> Self {
        self.def.interfaces.push(ImplInterface::Shape(shape));
        self
    }

    /// Implement an empty marker interface.
    #[must_use]
    pub fn marker(mut self, name: &str) -> Self {
        let name = self.intern(name);
        self.def.interfaces.push(ImplInterface::Marker(name));
        self
    }

    /// Declare an open generic parameter with a role.
    #[must_use]
    pub fn param(mut self, name: &str, role: Role) -> Self {
        let name = self.intern(name);
        self.def.params.push(ImplParam {
            name,
            role: Some(role),
            binding: None,
        });
        self
    }

    /// Declare a generic parameter without a role tag.
    #[must_use]
    pub fn untagged_param(mut self, name: &str) -> Self {
        let name = self.intern(name);
        self.def.params.push(ImplParam {
            name,
            role: None,
            binding: None,
        });
        self
    }

    /// Declare a parameter with a role, closed over a concrete type.
    #[must_use]
    pub fn bound_param(mut self, name: &str, role: Role, ty: ValueType) -> Self {
        let name = self.intern(name);
        self.def.params.push(ImplParam {
            name,
            role: Some(role),
            binding: Some(ParamBinding::Type(ty)),
        });
        self
    }

    /// Declare the mix-in parameter, bound to a mix-in type.
    #[must_use]
    pub fn mixin_param(mut self, name: &str, mixin: TypeKey) -> Self {
        let name = self.intern(name);
        self.def.params.push(ImplParam {
            name,
            role: Some(Role::Mixin),
            binding: Some(ParamBinding::Mixin(mixin)),
        });
        self
    }

    /// Add a state field; `ValueType::Param(i)` refers to the i-th parameter.
    #[must_use]
    pub fn state(mut self, name: &str, ty: ValueType) -> Self {
        let name = self.intern(name);
        self.def.state.push((name, ty));
        self
    }

    /// Add a hook.
    #[must_use]
    pub fn hook(mut self, name: &str, configure: impl FnOnce(HookBuilder) -> HookBuilder) -> Self {
        let decl = HookDecl {
            name: self.intern(name),
            params: Vec::new(),
            returns: HookReturn::Void,
            body: None,
        };
        self.def.hooks.push(configure(HookBuilder { decl }).decl);
        self
    }

    /// Register the implementation type.
    pub fn finish(self) -> Result<ImplKey, BakeError> {
        self.registry.register_implementation(self.def)
    }
}

/// Configures a [`HookDecl`]. Parameters refer to the implementation's
/// generic parameters by position.
pub struct HookBuilder {
    decl: HookDecl,
}

impl HookBuilder {
    /// Take the argument for parameter `param` by value.
    #[must_use]
    pub fn by_value(mut self, param: u32) -> Self {
        self.decl.params.push(HookParam {
            param,
            by_ref: false,
        });
        self
    }

    /// Take the argument for parameter `param` by reference.
    #[must_use]
    pub fn by_ref(mut self, param: u32) -> Self {
        self.decl.params.push(HookParam {
            param,
            by_ref: true,
        });
        self
    }

    #[must_use]
    pub fn returns(mut self, returns: HookReturn) -> Self {
        self.decl.returns = returns;
        self
    }

    #[must_use]
    pub fn returns_bool(self) -> Self {
        self.returns(HookReturn::Bool)
    }

    #[must_use]
    pub fn body(
        mut self,
        body: impl Fn(&mut HookCx<'_>) -> Result<Value, Fault> + Send + Sync + 'static,
    ) -> Self {
        self.decl.body = Some(HookFn::new(body));
        self
    }
}
