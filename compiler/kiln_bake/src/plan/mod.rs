//! Member planning: which generator handles a member.
//!
//! Every accessor of a member is routed from its resolution in the
//! [`ImplementationMap`]:
//!
//! | Resolution | Route |
//! |------------|-------|
//! | not implemented | needs an implementation type |
//! | implemented directly | default body (optionally wrapped) |
//! | implemented by mix-in | forwarded to the mix-in |
//!
//! The accessors of one member must agree on the route. The route then
//! picks the generator: the declaration's own implementation type wins,
//! otherwise the bakery configuration decides.

use std::sync::Arc;

use kiln_ir::{ImplKey, Name, TypeKey};
use kiln_types::{
    BakeError, CheckedImplementation, ImplementationMap, MemberMeta, MethodRef, MethodSlot,
    Resolution, Shape, TypeRef, TypeRegistry, Visibility,
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::BakeryConfig;

/// What kind of member a declaration is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Property,
    Event,
    Method,
}

impl MemberKind {
    /// Shape of an implementation that replaces the member outright.
    pub fn direct_shape(self) -> Shape {
        match self {
            MemberKind::Property => Shape::PlainProperty,
            MemberKind::Event => Shape::Event,
            MemberKind::Method => Shape::PlainMethod,
        }
    }

    /// Shape of an implementation that wraps the member's default body.
    pub fn wrapping_shape(self) -> Option<Shape> {
        match self {
            MemberKind::Property => Some(Shape::WrappingProperty),
            MemberKind::Method => Some(Shape::WrappingMethod),
            MemberKind::Event => None,
        }
    }
}

/// A member declaration, by index into its owner's declaration lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberDecl {
    Property(u32),
    Event(u32),
    Method(u32),
}

impl MemberDecl {
    pub fn kind(self) -> MemberKind {
        match self {
            MemberDecl::Property(_) => MemberKind::Property,
            MemberDecl::Event(_) => MemberKind::Event,
            MemberDecl::Method(_) => MemberKind::Method,
        }
    }

    /// Every member declared directly on `owner`, properties first.
    pub fn all_of(registry: &TypeRegistry, owner: TypeKey) -> Result<Vec<MemberDecl>, BakeError> {
        let def = registry.type_def(owner)?;
        let index = |i: usize| {
            u32::try_from(i).map_err(|_| BakeError::internal("too many members on one type"))
        };
        let mut members = Vec::new();
        for i in 0..def.properties.len() {
            members.push(MemberDecl::Property(index(i)?));
        }
        for i in 0..def.events.len() {
            members.push(MemberDecl::Event(index(i)?));
        }
        for i in 0..def.methods.len() {
            members.push(MemberDecl::Method(index(i)?));
        }
        Ok(members)
    }
}

/// The parts of a declaration planning looks at.
struct DeclView<'r> {
    name: Name,
    meta: &'r MemberMeta,
    implementation: Option<ImplKey>,
    slots: SmallVec<[MethodSlot; 2]>,
}

fn view(registry: &TypeRegistry, owner: TypeKey, member: MemberDecl) -> Result<DeclView<'_>, BakeError> {
    let def = registry.type_def(owner)?;
    let missing = || {
        BakeError::internal(format!("`{}` has no member {member:?}", registry.name_of(owner)))
    };
    Ok(match member {
        MemberDecl::Property(i) => {
            let prop = def.properties.get(i as usize).ok_or_else(missing)?;
            let mut slots = SmallVec::new();
            if prop.getter.is_some() {
                slots.push(MethodSlot::Getter(i));
            }
            if prop.setter.is_some() {
                slots.push(MethodSlot::Setter(i));
            }
            DeclView {
                name: prop.name,
                meta: &prop.meta,
                implementation: prop.implementation,
                slots,
            }
        }
        MemberDecl::Event(i) => {
            let event = def.events.get(i as usize).ok_or_else(missing)?;
            DeclView {
                name: event.name,
                meta: &event.meta,
                implementation: event.implementation,
                slots: SmallVec::from_slice(&[MethodSlot::Adder(i), MethodSlot::Remover(i)]),
            }
        }
        MemberDecl::Method(i) => {
            let method = def.methods.get(i as usize).ok_or_else(missing)?;
            DeclView {
                name: method.name,
                meta: &method.meta,
                implementation: method.implementation,
                slots: SmallVec::from_slice(&[MethodSlot::Method(i)]),
            }
        }
    })
}

/// How a member's calls are served.
#[derive(Clone, Debug)]
pub enum Generator {
    /// Dispatch straight to the default body.
    Default,
    /// Forward to a body declared on a mix-in.
    Forward { mixin: TypeKey },
    /// An implementation type replaces the member.
    Direct(Arc<CheckedImplementation>),
    /// An implementation type wraps the default body.
    Wrapping(Arc<CheckedImplementation>),
}

impl Generator {
    /// Mix-in whose state the generated code needs.
    pub fn mixin(&self) -> Option<TypeKey> {
        match self {
            Generator::Default => None,
            Generator::Forward { mixin } => Some(*mixin),
            Generator::Direct(checked) | Generator::Wrapping(checked) => checked.mixin(),
        }
    }

    pub fn implementation(&self) -> Option<&CheckedImplementation> {
        match self {
            Generator::Direct(checked) | Generator::Wrapping(checked) => Some(checked),
            Generator::Default | Generator::Forward { .. } => None,
        }
    }
}

/// Planned handling of one member.
#[derive(Clone, Debug)]
pub struct MemberPlan {
    pub owner: TypeRef,
    pub member: MemberDecl,
    /// `Owner.Member`, for diagnostics.
    pub qualified: String,
    pub generator: Generator,
}

/// Where one accessor's calls go.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Route {
    Default,
    Forward(TypeKey),
    Implement,
}

impl Route {
    fn label(self) -> &'static str {
        match self {
            Route::Default => "a default body",
            Route::Forward(_) => "forwarded to a mix-in",
            Route::Implement => "left to an implementation",
        }
    }
}

/// Plans members against one implementation map.
pub struct Planner<'a> {
    registry: &'a TypeRegistry,
    config: &'a BakeryConfig,
    map: &'a ImplementationMap,
    checked: FxHashMap<ImplKey, Arc<CheckedImplementation>>,
}

impl<'a> Planner<'a> {
    pub fn new(registry: &'a TypeRegistry, config: &'a BakeryConfig, map: &'a ImplementationMap) -> Self {
        Planner {
            registry,
            config,
            map,
            checked: FxHashMap::default(),
        }
    }

    /// Plan one member; `None` for members the baked type does not
    /// dispatch (private, static, explicit implementations).
    pub fn plan(&mut self, owner: &TypeRef, member: MemberDecl) -> Result<Option<MemberPlan>, BakeError> {
        let decl = view(self.registry, owner.key, member)?;
        let qualified = format!(
            "{}.{}",
            self.registry.name_of(owner.key),
            self.registry.interner().lookup(decl.name)
        );

        if let MemberDecl::Property(_) = member {
            match decl.slots.as_slice() {
                [] => return Err(BakeError::NeitherReadableNorWritable { property: qualified }),
                [MethodSlot::Setter(_)] => return Err(BakeError::NotReadable { property: qualified }),
                _ => {}
            }
        }
        if decl.meta.visibility == Visibility::Private
            || decl.meta.is_static
            || decl.meta.explicit_for.is_some()
        {
            return Ok(None);
        }

        let mut routes: SmallVec<[Route; 2]> = SmallVec::new();
        for slot in &decl.slots {
            let method = MethodRef {
                owner: owner.clone(),
                slot: *slot,
            };
            if let Some(route) = self.route(&method, decl.meta) {
                routes.push(route);
            }
        }
        let Some(&first) = routes.first() else {
            return Ok(None);
        };
        if let Some(&other) = routes.iter().find(|r| **r != first) {
            return Err(self.conflict(member, qualified, first, other));
        }

        let kind = member.kind();
        let generator = match first {
            Route::Forward(mixin) => Generator::Forward { mixin },
            Route::Implement => self.implement(kind, owner, decl.implementation, &qualified)?,
            // Sealed bodies are never intercepted.
            Route::Default if !decl.meta.is_overridable => Generator::Default,
            Route::Default => self.wrap(kind, decl.implementation, &qualified)?,
        };
        tracing::trace!(member = %qualified, ?generator, "planned");

        Ok(Some(MemberPlan {
            owner: owner.clone(),
            member,
            qualified,
            generator,
        }))
    }

    /// `None` for accessors without a dispatch entry.
    fn route(&self, method: &MethodRef, meta: &MemberMeta) -> Option<Route> {
        match self.map.resolve(method) {
            Some(Resolution::NotImplemented) => Some(Route::Implement),
            Some(Resolution::ImplementedDirectly { .. }) => Some(Route::Default),
            Some(Resolution::ImplementedByMixin { mixin, .. }) => Some(Route::Forward(*mixin)),
            // Sealed members are not implementable; a body still dispatches.
            None if !meta.is_overridable && self.registry.method_body(method).is_some() => {
                Some(Route::Default)
            }
            None => None,
        }
    }

    fn implement(
        &mut self,
        kind: MemberKind,
        owner: &TypeRef,
        declared: Option<ImplKey>,
        qualified: &str,
    ) -> Result<Generator, BakeError> {
        let configured = match kind {
            MemberKind::Property => self.config.property_impl(),
            MemberKind::Event => self.config.event_impl(),
            MemberKind::Method => None,
        };
        let key = declared.or(configured).ok_or_else(|| BakeError::MissingImplementation {
            member: qualified.to_owned(),
            search_space: vec![self.registry.display_ref(owner)],
        })?;
        let checked = self.check(key)?;
        if checked.shape() != kind.direct_shape() {
            return Err(shape_mismatch(qualified, &checked, kind.direct_shape().to_string()));
        }
        Ok(Generator::Direct(checked))
    }

    fn wrap(
        &mut self,
        kind: MemberKind,
        declared: Option<ImplKey>,
        qualified: &str,
    ) -> Result<Generator, BakeError> {
        if let Some(key) = declared {
            let checked = self.check(key)?;
            let shape = checked.shape();
            return if shape == kind.direct_shape() {
                Ok(Generator::Direct(checked))
            } else if Some(shape) == kind.wrapping_shape() {
                Ok(Generator::Wrapping(checked))
            } else {
                let expected = match kind.wrapping_shape() {
                    Some(wrapping) => format!("{} or {wrapping}", kind.direct_shape()),
                    None => kind.direct_shape().to_string(),
                };
                Err(shape_mismatch(qualified, &checked, expected))
            };
        }

        let wrapper = match kind {
            MemberKind::Property => self.config.property_wrapper(),
            MemberKind::Method => self.config.method_wrapper(),
            MemberKind::Event => None,
        };
        let (Some(key), Some(expected)) = (wrapper, kind.wrapping_shape()) else {
            return Ok(Generator::Default);
        };
        let checked = self.check(key)?;
        if checked.shape() != expected {
            return Err(shape_mismatch(qualified, &checked, expected.to_string()));
        }
        Ok(Generator::Wrapping(checked))
    }

    fn check(&mut self, key: ImplKey) -> Result<Arc<CheckedImplementation>, BakeError> {
        if let Some(checked) = self.checked.get(&key) {
            return Ok(Arc::clone(checked));
        }
        let checked = Arc::new(CheckedImplementation::check(self.registry, key)?);
        self.checked.insert(key, Arc::clone(&checked));
        Ok(checked)
    }

    fn conflict(&self, member: MemberDecl, qualified: String, first: Route, other: Route) -> BakeError {
        match (member, first, other) {
            (_, Route::Forward(a), Route::Forward(b)) => BakeError::MultipleMixins {
                member: qualified,
                mixins: vec![
                    self.registry.name_of(a).to_owned(),
                    self.registry.name_of(b).to_owned(),
                ],
            },
            (MemberDecl::Event(_), ..) => BakeError::ConflictingEventAccessors {
                event: qualified,
                add: first.label().to_owned(),
                remove: other.label().to_owned(),
            },
            _ => BakeError::ConflictingAccessorKinds {
                property: qualified,
                getter: first.label().to_owned(),
                setter: other.label().to_owned(),
            },
        }
    }
}

fn shape_mismatch(member: &str, checked: &CheckedImplementation, expected: String) -> BakeError {
    BakeError::ShapeMismatch {
        member: member.to_owned(),
        implementation: checked.name().to_owned(),
        expected,
        found: checked.shape().to_string(),
    }
}
