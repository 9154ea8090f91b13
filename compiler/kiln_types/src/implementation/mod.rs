//! Implementation types and their validated descriptors.
//!
//! An implementation type supplies the behavior of a baked member through
//! named hooks (`Get`/`Set`, `Before`/`After`/`AfterError`, `Add`/`Remove`,
//! `Call`, and the optional `Init`). [`CheckedImplementation::check`]
//! validates a definition once against its shape; [`close`] then fixes the
//! open value parameter to the member's type and produces the
//! [`ClosedImplementation`] the synthesizer and interpreter consume.
//!
//! [`close`]: CheckedImplementation::close

use std::fmt;
use std::sync::Arc;

use kiln_ir::{HookFn, ImplKey, Name, RecordLayout, TypeKey, ValueType};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::{BakeError, TypeRegistry};

/// The role interface an implementation type implements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    /// `Get` + `Set`.
    PlainProperty,
    /// `BeforeGet`/`AfterGet`/`AfterErrorGet` + the `*Set` trio.
    WrappingProperty,
    /// `Call`.
    PlainMethod,
    /// `Before`/`After`/`AfterError` around the member's own body.
    WrappingMethod,
    /// `Add` + `Remove`.
    Event,
}

impl Shape {
    /// Hooks that must be present.
    pub fn required_hooks(self) -> &'static [&'static str] {
        match self {
            Shape::PlainProperty => &["Get", "Set"],
            Shape::WrappingProperty => &["BeforeGet", "BeforeSet"],
            Shape::PlainMethod => &["Call"],
            Shape::WrappingMethod => &["Before"],
            Shape::Event => &["Add", "Remove"],
        }
    }

    /// Hooks that may be present.
    pub fn optional_hooks(self) -> &'static [&'static str] {
        match self {
            Shape::PlainProperty | Shape::PlainMethod | Shape::Event => &["Init"],
            Shape::WrappingProperty => &[
                "AfterGet",
                "AfterErrorGet",
                "AfterSet",
                "AfterErrorSet",
                "Init",
            ],
            Shape::WrappingMethod => &["After", "AfterError", "Init"],
        }
    }

    #[inline]
    pub fn is_wrapping(self) -> bool {
        matches!(self, Shape::WrappingProperty | Shape::WrappingMethod)
    }

    #[inline]
    pub fn is_property(self) -> bool {
        matches!(self, Shape::PlainProperty | Shape::WrappingProperty)
    }

    fn allows(self, hook: &str) -> bool {
        self.required_hooks().contains(&hook) || self.optional_hooks().contains(&hook)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Shape::PlainProperty => "plain property",
            Shape::WrappingProperty => "wrapping property",
            Shape::PlainMethod => "plain method",
            Shape::WrappingMethod => "wrapping method",
            Shape::Event => "event",
        })
    }
}

/// What a generic parameter of an implementation type stands for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// The property type.
    Value,
    /// The method return type.
    Return,
    /// The event handler type.
    Handler,
    /// The caught fault (wrapping `AfterError*` hooks only).
    Exception,
    /// The baked instance.
    Container,
    /// The state block of the mix-in the implementation depends on.
    Mixin,
}

impl Role {
    /// Roles that are closed over the member's type.
    #[inline]
    pub fn is_value_like(self) -> bool {
        matches!(self, Role::Value | Role::Return | Role::Handler)
    }
}

/// An interface an implementation type declares.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImplInterface {
    /// An empty marker (e.g. `IImplementation`).
    Marker(Name),
    Shape(Shape),
}

/// A generic parameter binding fixed by the implementation type itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParamBinding {
    Type(ValueType),
    /// Bound to a mix-in type (mix-in role only).
    Mixin(TypeKey),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImplParam {
    pub name: Name,
    pub role: Option<Role>,
    pub binding: Option<ParamBinding>,
}

/// A hook parameter: which generic parameter it carries, and how.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HookParam {
    pub param: u32,
    pub by_ref: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookReturn {
    Void,
    Bool,
    /// Returns the generic parameter at this index.
    Param(u32),
}

#[derive(Clone, Debug)]
pub struct HookDecl {
    pub name: Name,
    pub params: Vec<HookParam>,
    pub returns: HookReturn,
    pub body: Option<HookFn>,
}

/// An implementation type as registered.
#[derive(Clone, Debug)]
pub struct ImplementationDef {
    pub key: ImplKey,
    pub name: Name,
    pub interfaces: Vec<ImplInterface>,
    pub params: Vec<ImplParam>,
    /// State fields; `ValueType::Param(i)` refers to `params[i]`.
    pub state: Vec<(Name, ValueType)>,
    pub hooks: Vec<HookDecl>,
}

/// How a closed hook's result is interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HookResult {
    Void,
    Bool,
    Value,
}

/// A hook ready to be called: roles of its arguments in order.
#[derive(Clone, Debug)]
pub struct ClosedHook {
    pub roles: SmallVec<[(Role, bool); 4]>,
    pub result: HookResult,
    pub body: HookFn,
}

impl ClosedHook {
    /// Whether the hook takes an argument of this role.
    pub fn takes(&self, role: Role) -> bool {
        self.roles.iter().any(|(r, _)| *r == role)
    }
}

/// An implementation type closed over a member's value type.
#[derive(Clone, Debug)]
pub struct ClosedImplementation {
    pub key: ImplKey,
    pub name: &'static str,
    pub shape: Shape,
    pub value_type: ValueType,
    /// State layout with parameters substituted.
    pub layout: Arc<RecordLayout>,
    pub hooks: FxHashMap<Name, ClosedHook>,
    /// Mix-in the hooks expect, if any.
    pub mixin: Option<TypeKey>,
}

impl ClosedImplementation {
    #[inline]
    pub fn hook(&self, name: Name) -> Option<&ClosedHook> {
        self.hooks.get(&name)
    }
}

/// A validated implementation type.
#[derive(Clone, Debug)]
pub struct CheckedImplementation {
    def: ImplementationDef,
    name: &'static str,
    shape: Shape,
    /// Index of the open value-like parameter.
    value_param: Option<u32>,
    mixin: Option<TypeKey>,
}

impl CheckedImplementation {
    /// Validate an implementation type against its shape.
    ///
    /// # Errors
    ///
    /// `InvalidImplementation` for structural problems (shape count, role
    /// tags, bindings, state) and `HookMismatch` for a hook whose name,
    /// parameters, return type, or body does not fit the shape.
    #[tracing::instrument(level = "debug", skip_all, fields(implementation = ?key))]
    pub fn check(registry: &TypeRegistry, key: ImplKey) -> Result<Self, BakeError> {
        let def = registry
            .implementation_def(key)
            .ok_or_else(|| BakeError::internal(format!("unknown implementation key {key:?}")))?;
        let interner = registry.interner();
        let name = interner.lookup(def.name);

        let shapes: Vec<Shape> = def
            .interfaces
            .iter()
            .filter_map(|i| match i {
                ImplInterface::Shape(s) => Some(*s),
                ImplInterface::Marker(_) => None,
            })
            .collect();
        let shape = match shapes.as_slice() {
            [shape] => *shape,
            [] => return Err(BakeError::invalid(name, "implements no shape interface")),
            _ => {
                return Err(BakeError::invalid(
                    name,
                    "implements more than one shape interface",
                ))
            }
        };

        let (value_param, mixin) = check_params(registry, name, def)?;
        check_state(name, def)?;

        let mut seen = FxHashSet::default();
        for hook in &def.hooks {
            let hook_name = interner.lookup(hook.name);
            if !seen.insert(hook_name) {
                return Err(BakeError::hook(name, hook_name, "declared twice"));
            }
            check_hook(name, shape, def, hook_name, hook, value_param)?;
        }
        for required in shape.required_hooks() {
            if !seen.contains(required) {
                return Err(BakeError::hook(name, required, "required by the shape but missing"));
            }
        }
        for (after, after_error) in [
            ("After", "AfterError"),
            ("AfterGet", "AfterErrorGet"),
            ("AfterSet", "AfterErrorSet"),
        ] {
            if seen.contains(after) != seen.contains(after_error) {
                return Err(BakeError::hook(
                    name,
                    if seen.contains(after) { after_error } else { after },
                    format!("`{after}` and `{after_error}` must be supplied together"),
                ));
            }
        }

        tracing::debug!(implementation = name, %shape, "implementation checked");
        Ok(CheckedImplementation {
            def: def.clone(),
            name,
            shape,
            value_param,
            mixin,
        })
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn key(&self) -> ImplKey {
        self.def.key
    }

    /// Mix-in the hooks depend on.
    #[inline]
    pub fn mixin(&self) -> Option<TypeKey> {
        self.mixin
    }

    /// Fix the open value parameter to `value_type`.
    pub fn close(&self, value_type: &ValueType) -> Result<ClosedImplementation, BakeError> {
        let args: Vec<ValueType> = self
            .def
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| match &p.binding {
                Some(ParamBinding::Type(ty)) => ty.clone(),
                Some(ParamBinding::Mixin(_)) => ValueType::Void,
                None if self.value_param == u32::try_from(i).ok() => value_type.clone(),
                None => ValueType::Void,
            })
            .collect();

        let layout = Arc::new(RecordLayout::new(
            self.def.name,
            self.def
                .state
                .iter()
                .map(|(field, ty)| (*field, ty.substitute(&args)))
                .collect(),
        ));

        let mut hooks = FxHashMap::default();
        for hook in &self.def.hooks {
            let body = hook.body.clone().ok_or_else(|| {
                BakeError::internal(format!("unchecked hook on `{}`", self.name))
            })?;
            let roles = hook
                .params
                .iter()
                .map(|p| {
                    self.def
                        .params
                        .get(p.param as usize)
                        .and_then(|param| param.role)
                        .map(|role| (role, p.by_ref))
                        .ok_or_else(|| {
                            BakeError::internal(format!("unchecked hook on `{}`", self.name))
                        })
                })
                .collect::<Result<_, _>>()?;
            let result = match hook.returns {
                HookReturn::Void => HookResult::Void,
                HookReturn::Bool => HookResult::Bool,
                HookReturn::Param(_) => HookResult::Value,
            };
            hooks.insert(
                hook.name,
                ClosedHook {
                    roles,
                    result,
                    body,
                },
            );
        }

        Ok(ClosedImplementation {
            key: self.def.key,
            name: self.name,
            shape: self.shape,
            value_type: value_type.clone(),
            layout,
            hooks,
            mixin: self.mixin,
        })
    }
}

/// Role tags and bindings; returns the open value parameter and the mix-in.
fn check_params(
    registry: &TypeRegistry,
    name: &str,
    def: &ImplementationDef,
) -> Result<(Option<u32>, Option<TypeKey>), BakeError> {
    let mut value_param = None;
    let mut mixin = None;

    for (i, param) in def.params.iter().enumerate() {
        let param_name = registry.interner().lookup(param.name);
        let index =
            u32::try_from(i).map_err(|_| BakeError::invalid(name, "too many parameters"))?;
        let Some(role) = param.role else {
            return Err(BakeError::invalid(
                name,
                format!("parameter `{param_name}` has no role"),
            ));
        };

        match (role, &param.binding) {
            (role, None) if role.is_value_like() => {
                if value_param.replace(index).is_some() {
                    return Err(BakeError::invalid(
                        name,
                        "more than one open value parameter",
                    ));
                }
            }
            (role, Some(ParamBinding::Type(_))) if role.is_value_like() => {}
            (Role::Mixin, Some(ParamBinding::Mixin(key))) => {
                if !registry.type_def(*key)?.is_mixin() {
                    return Err(BakeError::invalid(
                        name,
                        format!(
                            "parameter `{param_name}` is bound to `{}`, which is not a mix-in",
                            registry.name_of(*key)
                        ),
                    ));
                }
                if mixin.replace(*key).is_some() {
                    return Err(BakeError::invalid(name, "more than one mix-in parameter"));
                }
            }
            (Role::Mixin, _) => {
                return Err(BakeError::invalid(
                    name,
                    format!("mix-in parameter `{param_name}` must be bound to a mix-in type"),
                ));
            }
            (Role::Container | Role::Exception, None) => {}
            (role, Some(_)) => {
                return Err(BakeError::invalid(
                    name,
                    format!("parameter `{param_name}` ({role:?}) cannot be bound"),
                ));
            }
            (_, None) => {}
        }
    }

    Ok((value_param, mixin))
}

fn check_state(name: &str, def: &ImplementationDef) -> Result<(), BakeError> {
    fn in_range(ty: &ValueType, arity: usize) -> bool {
        match ty {
            ValueType::Param(i) => (*i as usize) < arity,
            ValueType::List(elem) => in_range(elem, arity),
            _ => true,
        }
    }
    for (_, ty) in &def.state {
        if !in_range(ty, def.params.len()) {
            return Err(BakeError::invalid(
                name,
                format!("state field of type `{ty}` refers to a missing parameter"),
            ));
        }
    }
    Ok(())
}

fn check_hook(
    name: &str,
    shape: Shape,
    def: &ImplementationDef,
    hook_name: &str,
    hook: &HookDecl,
    value_param: Option<u32>,
) -> Result<(), BakeError> {
    if !shape.allows(hook_name) {
        return Err(BakeError::hook(
            name,
            hook_name,
            format!("not a hook of a {shape} implementation"),
        ));
    }
    if hook.body.is_none() {
        return Err(BakeError::hook(name, hook_name, "has no body"));
    }

    let is_after_error = hook_name.starts_with("AfterError");
    for param in &hook.params {
        let role = def
            .params
            .get(param.param as usize)
            .and_then(|p| p.role)
            .ok_or_else(|| {
                BakeError::hook(
                    name,
                    hook_name,
                    format!("refers to missing parameter {}", param.param),
                )
            })?;
        if role == Role::Exception && !is_after_error {
            return Err(BakeError::hook(
                name,
                hook_name,
                "only `AfterError` hooks receive the exception",
            ));
        }
    }

    let expected = match hook_name {
        "Get" | "Call" => match value_param {
            Some(param) => HookReturn::Param(param),
            None => {
                return Err(BakeError::hook(
                    name,
                    hook_name,
                    "returns the value but the implementation has no value parameter",
                ))
            }
        },
        _ if hook_name.starts_with("Before") || is_after_error => HookReturn::Bool,
        _ => HookReturn::Void,
    };
    if hook.returns != expected {
        return Err(BakeError::hook(
            name,
            hook_name,
            format!("must return {expected:?}, declared {:?}", hook.returns),
        ));
    }

    Ok(())
}
