//! Building processor: turns an [`Analysis`] into a [`BakedType`].
//!
//! # Steps
//!
//! 1. Declare the type and open its constructor.
//! 2. Allocate one field per public mix-in.
//! 3. Register every owner (classes, then interfaces) exactly once.
//! 4. Generate each planned member: dispatch entries, implementation
//!    fields (private mix-ins are allocated the first time one is needed),
//!    and `Init` calls in the constructor.
//! 5. Close the constructor and verify every IR function.
//!
//! Member generators live in [`property`], [`event`], and [`method`];
//! the shared call shapes (direct hook call, mix-in forwarding, wrapping)
//! live here and in [`wrapping`].

mod event;
mod method;
mod property;
mod wrapping;

use std::sync::Arc;

use kiln_emit::{
    verify, BodyBuilder, BodyFunction, BodyId, CallTarget, FieldId, HookArg, LocalId, Operand,
};
use kiln_eval::{
    AccessorKind, BakedType, BakedTypeBuilder, FieldKind, MemberEntry, MemberKey, MemberTarget,
};
use kiln_ir::{Name, SharedInterner, TypeKey, Value, ValueType};
use kiln_types::{
    BakeError, CheckedImplementation, ClosedHook, ClosedImplementation, MemberFacts,
    MemberIdentity, MethodRef, MethodSlot, Role, SignatureAnalyzer, TypeRegistry,
};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::analyze::Analysis;
use crate::plan::{MemberDecl, MemberPlan};
use crate::BakeryConfig;

pub(crate) use wrapping::WrapHooks;

/// Interned hook names.
#[derive(Clone, Copy)]
pub(crate) struct HookNames {
    get: Name,
    set: Name,
    add: Name,
    remove: Name,
    call: Name,
    init: Name,
    ctor: Name,
    get_hooks: WrapHooks,
    set_hooks: WrapHooks,
    call_hooks: WrapHooks,
}

impl HookNames {
    fn new(interner: &SharedInterner) -> Self {
        let wrap = |suffix: &str| WrapHooks {
            before: interner.intern(&format!("Before{suffix}")),
            after: interner.intern(&format!("After{suffix}")),
            after_error: interner.intern(&format!("AfterError{suffix}")),
        };
        HookNames {
            get: interner.intern("Get"),
            set: interner.intern("Set"),
            add: interner.intern("Add"),
            remove: interner.intern("Remove"),
            call: interner.intern("Call"),
            init: interner.intern("Init"),
            ctor: interner.intern(".ctor"),
            get_hooks: wrap("Get"),
            set_hooks: wrap("Set"),
            call_hooks: wrap(""),
        }
    }
}

/// One accessor of a member being generated.
pub(crate) struct Accessor {
    pub kind: AccessorKind,
    pub method: MethodRef,
    pub facts: Arc<MemberFacts>,
    pub key: MemberKey,
}

impl Accessor {
    fn params(&self) -> Vec<ValueType> {
        self.facts.identity.signature.params.to_vec()
    }

    fn ret(&self) -> &ValueType {
        &self.facts.identity.signature.ret
    }

    fn arity(&self) -> usize {
        self.facts.identity.signature.params.len()
    }
}

/// Where the value-role argument of a hook call comes from.
#[derive(Clone, Copy)]
pub(crate) enum ValueSource {
    /// A zeroed local, if the hook asks for a value at all.
    None,
    Operand(Operand),
    Local(LocalId),
}

/// Everything a generated member stores per instance.
pub(crate) struct Storage {
    pub field: FieldId,
    pub closed: Arc<ClosedImplementation>,
    pub mixin: Option<FieldId>,
}

/// Build the baked type for an analyzed root.
#[tracing::instrument(level = "debug", skip_all, fields(root = registry.name_of(analysis.root.key)))]
pub fn build(
    registry: &TypeRegistry,
    analyzer: &SignatureAnalyzer,
    config: &BakeryConfig,
    analysis: &Analysis,
) -> Result<BakedType, BakeError> {
    let interner = registry.interner().clone();
    let name = config.baked_name(&registry.display_ref(&analysis.root));
    let names = HookNames::new(&interner);
    let ctor = BodyBuilder::new(format!("{name}..ctor"), names.ctor, Vec::new(), ValueType::Void);
    let mut syn = Synthesizer {
        registry,
        analyzer,
        config,
        analysis,
        baked: BakedTypeBuilder::new(name, analysis.root.key, interner),
        ctor,
        entries: FxHashMap::default(),
        names,
    };

    for mixin in &analysis.public_mixins {
        syn.add_mixin_field(*mixin)?;
    }
    for owner in analysis.owners() {
        if !syn.baked.add_interface(owner.key) {
            return Err(BakeError::DuplicateInterface {
                interface: registry.display_ref(owner),
                baked: syn.baked.name().to_owned(),
            });
        }
    }
    for plan in &analysis.plans {
        match plan.member {
            MemberDecl::Property(index) => property::generate(&mut syn, plan, index)?,
            MemberDecl::Event(index) => event::generate(&mut syn, plan, index)?,
            MemberDecl::Method(index) => method::generate(&mut syn, plan, index)?,
        }
    }

    let Synthesizer {
        baked: mut builder,
        mut ctor,
        ..
    } = syn;
    ctor.terminate_return(None);
    builder.set_constructor(ctor.finish());
    let baked = builder.finish();

    let mut functions = 0usize;
    for func in baked.functions() {
        verify(func)?;
        functions += 1;
    }
    tracing::debug!(
        ty = baked.name(),
        fields = baked.fields().len(),
        members = baked.members().count(),
        functions,
        "type baked"
    );
    Ok(baked)
}

pub(crate) struct Synthesizer<'a> {
    registry: &'a TypeRegistry,
    analyzer: &'a SignatureAnalyzer,
    config: &'a BakeryConfig,
    analysis: &'a Analysis,
    baked: BakedTypeBuilder,
    ctor: BodyBuilder,
    /// Identity and description of whatever defined each dispatch key.
    entries: FxHashMap<MemberKey, (MemberIdentity, String)>,
    names: HookNames,
}

impl Synthesizer<'_> {
    fn accessor(&self, plan: &MemberPlan, slot: MethodSlot) -> Result<Accessor, BakeError> {
        let method = MethodRef {
            owner: plan.owner.clone(),
            slot,
        };
        let facts = self.analyzer.analyze(self.registry, &method)?;
        let kind = match slot {
            MethodSlot::Getter(_) => AccessorKind::Get,
            MethodSlot::Setter(_) => AccessorKind::Set,
            MethodSlot::Adder(_) => AccessorKind::Add,
            MethodSlot::Remover(_) => AccessorKind::Remove,
            MethodSlot::Method(_) => AccessorKind::Call,
        };
        let arity = u32::try_from(facts.identity.signature.params.len())
            .map_err(|_| BakeError::internal("too many parameters"))?;
        Ok(Accessor {
            kind,
            key: MemberKey::new(kind, facts.member_name, arity),
            method,
            facts,
        })
    }

    /// Claim the dispatch keys of a member's accessors.
    ///
    /// `false` when an earlier owner already defined them with the same
    /// identity (the member is then skipped); an earlier definition with a
    /// different signature is a collision.
    fn claim(&mut self, accessors: &[Accessor]) -> Result<bool, BakeError> {
        let mut fresh = true;
        for acc in accessors {
            match self.entries.get(&acc.key) {
                Some((identity, _)) if *identity == acc.facts.identity => fresh = false,
                Some((_, first)) => {
                    return Err(BakeError::MemberCollision {
                        member: acc.key.display(self.registry.interner()).to_string(),
                        first: first.clone(),
                        second: describe(&acc.facts),
                    });
                }
                None => {}
            }
        }
        if fresh {
            for acc in accessors {
                self.entries
                    .insert(acc.key, (acc.facts.identity.clone(), describe(&acc.facts)));
            }
        } else {
            tracing::trace!(member = %accessors[0].facts.qualified, "already dispatched");
        }
        Ok(fresh)
    }

    fn define(&mut self, acc: &Accessor, target: MemberTarget) {
        tracing::trace!(
            key = %acc.key.display(self.registry.interner()),
            member = %acc.facts.qualified,
            "dispatch entry"
        );
        self.baked.define(
            acc.key,
            MemberEntry {
                params: acc.params(),
                ret: acc.ret().clone(),
                target,
                qualified: acc.facts.qualified.clone(),
            },
        );
    }

    fn synthesized(&mut self, acc: &Accessor, func: BodyFunction) {
        self.define(acc, MemberTarget::Synthesized(Arc::new(func)));
    }

    fn function_name(&self, acc: &Accessor) -> String {
        format!("{}.{}", self.baked.name(), acc.facts.qualified)
    }

    fn builder_for(&self, acc: &Accessor) -> BodyBuilder {
        BodyBuilder::new(
            self.function_name(acc),
            acc.facts.member_name,
            acc.params(),
            acc.ret().clone(),
        )
    }

    /// The body implementing an accessor: its resolution's, or its own for
    /// sealed members.
    fn body_of(&mut self, acc: &Accessor) -> Result<BodyId, BakeError> {
        let analysis = self.analysis;
        let implementing = analysis
            .map
            .resolve(&acc.method)
            .and_then(|r| r.method())
            .unwrap_or(&acc.method);
        let body = self.registry.method_body(implementing).ok_or_else(|| {
            BakeError::internal(format!(
                "`{}` resolved to a method without a body",
                acc.facts.qualified
            ))
        })?;
        Ok(self.baked.add_body(body))
    }

    fn add_mixin_field(&mut self, mixin: TypeKey) -> Result<FieldId, BakeError> {
        let def = self.registry.type_def(mixin)?;
        Ok(self.baked.add_field(
            self.registry.name_of(mixin),
            FieldKind::Mixin {
                key: mixin,
                layout: def.state_layout(),
            },
        ))
    }

    /// Field of a mix-in, allocating a private one on first demand.
    fn mixin_field(&mut self, mixin: TypeKey) -> Result<FieldId, BakeError> {
        if let Some(field) = self.baked.mixin_field(mixin) {
            return Ok(field);
        }
        tracing::trace!(mixin = self.registry.name_of(mixin), "private mix-in field");
        self.add_mixin_field(mixin)
    }

    /// Close an implementation over `value_type`, give it a field, and
    /// call its `Init` hook from the constructor.
    fn storage(
        &mut self,
        member: Name,
        checked: &CheckedImplementation,
        value_type: &ValueType,
        initial: Value,
    ) -> Result<Storage, BakeError> {
        let closed = Arc::new(checked.close(value_type)?);
        let mixin = closed.mixin.map(|m| self.mixin_field(m)).transpose()?;
        let field = self.baked.add_field(
            format!("<{}>impl", self.registry.interner().lookup(member)),
            FieldKind::Implementation(Arc::clone(&closed)),
        );

        if let Some(init) = closed.hook(self.names.init) {
            let value = if init.roles.iter().any(|(role, _)| role.is_value_like()) {
                let local = self.ctor.declare_value(closed.value_type.clone());
                self.ctor.emit_const(local, initial);
                ValueSource::Local(local)
            } else {
                ValueSource::None
            };
            let args = hook_args(&mut self.ctor, init, value, &closed.value_type, None, mixin)?;
            self.ctor.emit_call_hook(None, field, self.names.init, args);
        }

        Ok(Storage {
            field,
            closed,
            mixin,
        })
    }

    /// Accessor body that calls one hook of a direct implementation.
    fn direct(
        &mut self,
        acc: &Accessor,
        storage: &Storage,
        hook_name: Name,
        value: ValueSource,
    ) -> Result<(), BakeError> {
        let hook = wrapping::required(self, &storage.closed, hook_name)?;
        let mut b = self.builder_for(acc);
        let args = hook_args(&mut b, hook, value, &storage.closed.value_type, None, storage.mixin)?;
        if acc.ret().is_void() {
            b.emit_call_hook(None, storage.field, hook_name, args);
            b.terminate_return(None);
        } else {
            let result = b.declare_value(acc.ret().clone());
            b.emit_call_hook(Some(result), storage.field, hook_name, args);
            b.terminate_return(Some(result));
        }
        let func = b.finish();
        self.synthesized(acc, func);
        Ok(())
    }

    /// Accessor body that forwards to the mix-in body implementing it.
    fn forward(&mut self, acc: &Accessor, field: FieldId) -> Result<(), BakeError> {
        let body = self.body_of(acc)?;
        let mut b = self.builder_for(acc);
        let args = arg_operands(acc.arity())?;
        let target = CallTarget::MixinBody { field, body };
        if acc.ret().is_void() {
            b.emit_call_body(None, target, args);
            b.terminate_return(None);
        } else {
            let result = b.declare_value(acc.ret().clone());
            b.emit_call_body(Some(result), target, args);
            b.terminate_return(Some(result));
        }
        let func = b.finish();
        self.synthesized(acc, func);
        Ok(())
    }

    /// Dispatch entry that runs the default body directly.
    fn default(&mut self, acc: &Accessor) -> Result<(), BakeError> {
        let body = self.body_of(acc)?;
        self.define(acc, MemberTarget::Default(body));
        Ok(())
    }

    /// Starting value for a member's `Init` hook.
    fn initial_value(&self, ty: &ValueType, not_nullable: bool) -> Value {
        if ty.is_reference() && !not_nullable {
            Value::zero(ty)
        } else {
            self.config.defaults().default_for(ty)
        }
    }
}

fn describe(facts: &MemberFacts) -> String {
    format!("{} {}", facts.qualified, facts.identity.signature)
}

/// `Arg(0) .. Arg(arity - 1)`.
fn arg_operands(arity: usize) -> Result<SmallVec<[Operand; 4]>, BakeError> {
    (0..arity)
        .map(|i| {
            u32::try_from(i)
                .map(Operand::Arg)
                .map_err(|_| BakeError::internal("too many parameters"))
        })
        .collect()
}

/// Role arguments of a hook call, in the hook's parameter order.
pub(crate) fn hook_args(
    b: &mut BodyBuilder,
    hook: &ClosedHook,
    value: ValueSource,
    value_type: &ValueType,
    exception: Option<LocalId>,
    mixin: Option<FieldId>,
) -> Result<SmallVec<[HookArg; 4]>, BakeError> {
    let mut args = SmallVec::new();
    for &(role, by_ref) in &hook.roles {
        let arg = match role {
            Role::Value | Role::Return | Role::Handler => match (value, by_ref) {
                (ValueSource::Local(local), true) => HookArg::ValueRef(local),
                (ValueSource::Local(local), false) => HookArg::Value(Operand::Local(local)),
                (ValueSource::Operand(operand), false) => HookArg::Value(operand),
                (ValueSource::Operand(operand), true) => {
                    let local = b.declare_value(value_type.clone());
                    b.emit_move(local, operand);
                    HookArg::ValueRef(local)
                }
                (ValueSource::None, by_ref) => {
                    let local = b.declare_value(value_type.clone());
                    b.emit_zero(local);
                    if by_ref {
                        HookArg::ValueRef(local)
                    } else {
                        HookArg::Value(Operand::Local(local))
                    }
                }
            },
            Role::Mixin => HookArg::Mixin(mixin.ok_or_else(|| {
                BakeError::internal(format!("`{}` has no mix-in field for its hook", b.name()))
            })?),
            Role::Container => HookArg::Container,
            Role::Exception => HookArg::Exception(exception.ok_or_else(|| {
                BakeError::internal(format!("`{}` has no exception to pass", b.name()))
            })?),
        };
        args.push(arg);
    }
    Ok(args)
}

#[cfg(test)]
mod tests;
