//! Instances of baked types.
//!
//! An [`Instance`] is a single-threaded object: a handle to its baked
//! type plus one `RefCell<Record>` per field. Every member call resolves a
//! [`MemberKey`] in the type's dispatch table, checks arguments, and runs
//! the entry through the interpreter. Re-entrant access to a field that an
//! in-flight hook already holds surfaces as a `FieldBusy` fault.

use std::cell::{RefCell, RefMut};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use kiln_emit::{BodyId, FieldId, WrapState};
use kiln_ir::{BodyCx, Fault, Handler, Notification, Receiver, Record, TypeKey, Value};

use crate::interpreter::Interpreter;
use crate::stack::with_call_depth;
use crate::{AccessorKind, BakedType, MemberKey, MemberTarget};

static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Outcome of a traced member call.
#[derive(Clone, Debug)]
pub struct Traced {
    pub result: Result<Value, Fault>,
    /// Last wrapping-protocol state the call reached; `NotStarted` for
    /// members that do not wrap.
    pub state: WrapState,
}

struct InstanceInner {
    ty: Arc<BakedType>,
    fields: Box<[RefCell<Record>]>,
    id: u64,
}

/// An object of a baked type. Cloning shares the object.
#[derive(Clone)]
pub struct Instance(Rc<InstanceInner>);

impl Instance {
    /// Allocate an instance with zeroed fields and run the constructor.
    pub fn construct(ty: Arc<BakedType>) -> Result<Self, Fault> {
        let fields = ty
            .fields()
            .iter()
            .map(|field| RefCell::new(Record::zeroed(Arc::clone(field.layout()))))
            .collect();
        let instance = Instance(Rc::new(InstanceInner {
            fields,
            id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
            ty,
        }));

        let ty = Arc::clone(&instance.0.ty);
        let constructor = ty.constructor();
        with_call_depth(&constructor.name, || {
            Interpreter::new(&instance, constructor, &[]).run().0
        })?;
        tracing::trace!(ty = ty.name(), id = instance.0.id, "instance constructed");
        Ok(instance)
    }

    #[inline]
    pub fn baked_type(&self) -> &Arc<BakedType> {
        &self.0.ty
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.0.id
    }

    /// Whether the instance's type implements `interface`.
    pub fn implements(&self, interface: TypeKey) -> bool {
        self.0.ty.implements(interface)
    }

    /// Whether two handles refer to the same object.
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Snapshot of a field's record.
    pub fn field_state(&self, field: FieldId) -> Result<Record, Fault> {
        let cell = self.cell(field)?;
        let state = cell
            .try_borrow()
            .map_err(|_| Fault::field_busy(self.field_name(field)))?;
        Ok(state.clone())
    }

    /// Snapshot of a mix-in's state block.
    pub fn mixin_state(&self, mixin: TypeKey) -> Result<Record, Fault> {
        let field = self
            .0
            .ty
            .mixin_field(mixin)
            .ok_or_else(|| Fault::internal(format!("`{}` carries no such mix-in", self.0.ty.name())))?;
        self.field_state(field)
    }

    fn cell(&self, field: FieldId) -> Result<&RefCell<Record>, Fault> {
        self.0
            .fields
            .get(field.index())
            .ok_or_else(|| Fault::internal(format!("field {} out of range", field.raw())))
    }

    fn field_name(&self, field: FieldId) -> &str {
        self.0.ty.field(field).map_or("?", |f| f.name.as_str())
    }

    /// Exclusive access to a field's record.
    pub(crate) fn borrow_field(&self, field: FieldId) -> Result<RefMut<'_, Record>, Fault> {
        self.cell(field)?
            .try_borrow_mut()
            .map_err(|_| Fault::field_busy(self.field_name(field)))
    }

    /// Deliver queued notifications with this instance as sender.
    pub(crate) fn deliver(&self, notifications: Vec<Notification>) -> Result<(), Fault> {
        for notification in notifications {
            notification.handler.invoke(self, &notification.arg)?;
        }
        Ok(())
    }

    /// Call a member and report the wrapping state it reached.
    pub fn call_traced(&self, kind: AccessorKind, member: &str, args: &[Value]) -> Traced {
        match self.dispatch(kind, member, args) {
            Ok(traced) => traced,
            Err(fault) => Traced {
                result: Err(fault),
                state: WrapState::NotStarted,
            },
        }
    }

    fn dispatch(&self, kind: AccessorKind, member: &str, args: &[Value]) -> Result<Traced, Fault> {
        let ty = &self.0.ty;
        let unknown = || Fault::unknown_member(ty.name(), &format!("{}{member}", kind.prefix()));
        let name = ty.interner().get(member).ok_or_else(unknown)?;
        let arity = u32::try_from(args.len()).map_err(|_| unknown())?;

        let Some(entry) = ty.member(&MemberKey::new(kind, name, arity)) else {
            // Same member, other arity: report the arity instead.
            let other = ty
                .members()
                .find(|(key, _)| key.kind == kind && key.name == name);
            return Err(match other {
                Some((_, entry)) => Fault::arity(member, entry.params.len(), args.len()),
                None => unknown(),
            });
        };

        for (arg, param) in args.iter().zip(&entry.params) {
            if !arg.conforms_to(param) {
                return Err(Fault::type_mismatch(&param.to_string(), arg.kind_name()));
            }
        }

        let traced = with_call_depth(&entry.qualified, || {
            Ok(match &entry.target {
                MemberTarget::Synthesized(func) => {
                    let (result, state) = Interpreter::new(self, func, args).run();
                    Traced { result, state }
                }
                MemberTarget::Default(body) => Traced {
                    result: self.call_default(*body, args),
                    state: WrapState::NotStarted,
                },
            })
        })?;

        tracing::trace!(
            member = %entry.qualified,
            state = %traced.state,
            ok = traced.result.is_ok(),
            "member call"
        );
        Ok(traced)
    }

    /// Run a declared default body with `this` bound to the instance.
    pub(crate) fn call_default(&self, body: BodyId, args: &[Value]) -> Result<Value, Fault> {
        let body = self
            .0
            .ty
            .body(body)
            .ok_or_else(|| Fault::internal(format!("body {} out of range", body.raw())))?;
        let mut cx = BodyCx::new(self, args);
        let result = body.call(&mut cx);
        let notifications = cx.take_notifications();
        self.deliver(notifications)?;
        result
    }

    /// Run a mix-in's default body against that mix-in's field. The body
    /// borrows the field through `BodyCx::state` as it goes.
    pub(crate) fn call_mixin_body(
        &self,
        field: FieldId,
        body: BodyId,
        args: &[Value],
    ) -> Result<Value, Fault> {
        let body = self
            .0
            .ty
            .body(body)
            .ok_or_else(|| Fault::internal(format!("body {} out of range", body.raw())))?;
        let mut cx = BodyCx::with_state(self, args, self.field_name(field), self.cell(field)?);
        let result = body.call(&mut cx);
        let notifications = cx.take_notifications();
        self.deliver(notifications)?;
        result
    }
}

impl Receiver for Instance {
    fn instance_id(&self) -> u64 {
        self.0.id
    }

    fn type_name(&self) -> &str {
        self.0.ty.name()
    }

    fn get(&self, property: &str) -> Result<Value, Fault> {
        self.call_traced(AccessorKind::Get, property, &[]).result
    }

    fn set(&self, property: &str, value: Value) -> Result<(), Fault> {
        self.call_traced(AccessorKind::Set, property, &[value])
            .result
            .map(drop)
    }

    fn call(&self, method: &str, args: &[Value]) -> Result<Value, Fault> {
        self.call_traced(AccessorKind::Call, method, args).result
    }

    fn subscribe(&self, event: &str, handler: Handler) -> Result<(), Fault> {
        self.call_traced(AccessorKind::Add, event, &[Value::Handler(handler)])
            .result
            .map(drop)
    }

    fn unsubscribe(&self, event: &str, handler: &Handler) -> Result<(), Fault> {
        self.call_traced(AccessorKind::Remove, event, &[Value::Handler(handler.clone())])
            .result
            .map(drop)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.0.ty.name(), self.0.id)
    }
}
