//! Callable member bodies and implementation hooks, with their call contexts.

use std::cell::{RefCell, RefMut};
use std::fmt;
use std::sync::Arc;

use crate::{Fault, Handler, Receiver, Record, Value};

/// A handler invocation queued by a body or hook.
///
/// Notifications are delivered by the runtime after the caller's field
/// borrows are released, with the instance as sender, so handlers may read
/// back any member of the object that raised them.
#[derive(Clone, Debug)]
pub struct Notification {
    pub handler: Handler,
    pub arg: Value,
}

/// A mix-in's state block as seen by one of its bodies.
struct MixinState<'a> {
    name: &'a str,
    cell: &'a RefCell<Record>,
}

/// Call context of a default member body.
pub struct BodyCx<'a> {
    /// The instance the member was called on.
    pub this: &'a dyn Receiver,
    args: &'a [Value],
    state: Option<MixinState<'a>>,
    notifications: Vec<Notification>,
}

impl<'a> BodyCx<'a> {
    /// Context for a body declared on an interface or class.
    pub fn new(this: &'a dyn Receiver, args: &'a [Value]) -> Self {
        BodyCx {
            this,
            args,
            state: None,
            notifications: Vec::new(),
        }
    }

    /// Context for a body declared on a mix-in: `state` is the instance's
    /// state block for that mix-in, named `name` in busy faults.
    pub fn with_state(
        this: &'a dyn Receiver,
        args: &'a [Value],
        name: &'a str,
        state: &'a RefCell<Record>,
    ) -> Self {
        BodyCx {
            this,
            args,
            state: Some(MixinState { name, cell: state }),
            notifications: Vec::new(),
        }
    }

    /// Positional argument.
    pub fn arg(&self, index: usize) -> Result<&Value, Fault> {
        self.args
            .get(index)
            .ok_or_else(|| Fault::internal(format!("body argument {index} out of range")))
    }

    #[inline]
    pub fn args(&self) -> &[Value] {
        self.args
    }

    /// Mix-in state; faults for bodies not declared on a mix-in.
    ///
    /// The block stays borrowed only while the returned guard lives, so a
    /// body can drop it and then reach sibling members through `this`.
    pub fn state(&self) -> Result<RefMut<'a, Record>, Fault> {
        let state = self
            .state
            .as_ref()
            .ok_or_else(|| Fault::internal("body has no mix-in state"))?;
        state
            .cell
            .try_borrow_mut()
            .map_err(|_| Fault::field_busy(state.name))
    }

    /// Queue a handler call, delivered once this body returns.
    pub fn notify(&mut self, handler: Handler, arg: Value) {
        self.notifications.push(Notification { handler, arg });
    }

    /// Drain queued notifications.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }
}

type BodyFn = dyn Fn(&mut BodyCx<'_>) -> Result<Value, Fault> + Send + Sync;

/// A member body supplied with a declaration (a "default implementation").
#[derive(Clone)]
pub struct MemberBody(Arc<BodyFn>);

impl MemberBody {
    pub fn new(f: impl Fn(&mut BodyCx<'_>) -> Result<Value, Fault> + Send + Sync + 'static) -> Self {
        MemberBody(Arc::new(f))
    }

    #[inline]
    pub fn call(&self, cx: &mut BodyCx<'_>) -> Result<Value, Fault> {
        (self.0)(cx)
    }

    pub fn ptr_eq(&self, other: &MemberBody) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.0), Arc::as_ptr(&other.0))
    }
}

impl fmt::Debug for MemberBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemberBody({:p})", Arc::as_ptr(&self.0).cast::<()>())
    }
}

/// Call context of an implementation hook.
///
/// Role arguments the hook did not declare are absent; asking for them
/// faults rather than panics.
pub struct HookCx<'a> {
    /// Name of the property, event, or method the hook serves.
    pub member: &'a str,
    /// The implementation's own state block.
    pub state: &'a mut Record,
    value: Option<&'a mut Value>,
    mixin: Option<&'a mut Record>,
    container: Option<&'a dyn Receiver>,
    exception: Option<&'a Fault>,
    args: &'a [Value],
    notifications: Vec<Notification>,
}

impl<'a> HookCx<'a> {
    pub fn new(member: &'a str, state: &'a mut Record, args: &'a [Value]) -> Self {
        HookCx {
            member,
            state,
            value: None,
            mixin: None,
            container: None,
            exception: None,
            args,
            notifications: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_value(mut self, value: &'a mut Value) -> Self {
        self.value = Some(value);
        self
    }

    #[must_use]
    pub fn with_mixin(mut self, mixin: &'a mut Record) -> Self {
        self.mixin = Some(mixin);
        self
    }

    #[must_use]
    pub fn with_container(mut self, container: &'a dyn Receiver) -> Self {
        self.container = Some(container);
        self
    }

    #[must_use]
    pub fn with_exception(mut self, exception: &'a Fault) -> Self {
        self.exception = Some(exception);
        self
    }

    /// The value-role argument (by reference for wrapping hooks).
    pub fn value(&mut self) -> Result<&mut Value, Fault> {
        self.value
            .as_deref_mut()
            .ok_or_else(|| Fault::internal(format!("hook for `{}` takes no value", self.member)))
    }

    /// The mix-in state block.
    pub fn mixin(&mut self) -> Result<&mut Record, Fault> {
        self.mixin
            .as_deref_mut()
            .ok_or_else(|| Fault::internal(format!("hook for `{}` takes no mix-in", self.member)))
    }

    /// Both the implementation state and the mix-in state.
    pub fn state_and_mixin(&mut self) -> Result<(&mut Record, &mut Record), Fault> {
        let member = self.member;
        match self.mixin.as_deref_mut() {
            Some(mixin) => Ok((&mut *self.state, mixin)),
            None => Err(Fault::internal(format!("hook for `{member}` takes no mix-in"))),
        }
    }

    /// The instance the member was called on.
    pub fn container(&self) -> Result<&'a dyn Receiver, Fault> {
        self.container
            .ok_or_else(|| Fault::internal(format!("hook for `{}` takes no container", self.member)))
    }

    /// The fault caught from the wrapped body.
    pub fn exception(&self) -> Result<&'a Fault, Fault> {
        self.exception
            .ok_or_else(|| Fault::internal(format!("hook for `{}` takes no exception", self.member)))
    }

    /// Arguments of the member call.
    #[inline]
    pub fn args(&self) -> &[Value] {
        self.args
    }

    /// Queue a handler call, delivered with the instance as sender once the
    /// hook returns.
    pub fn notify(&mut self, handler: Handler, arg: Value) {
        self.notifications.push(Notification { handler, arg });
    }

    /// Drain queued notifications.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }
}

type HookBody = dyn Fn(&mut HookCx<'_>) -> Result<Value, Fault> + Send + Sync;

/// Body of an implementation hook (`Get`, `BeforeSet`, `Add`, `Init`, ...).
///
/// Hooks returning `bool` yield `Value::Bool`; void hooks yield `Value::Void`.
#[derive(Clone)]
pub struct HookFn(Arc<HookBody>);

impl HookFn {
    pub fn new(f: impl Fn(&mut HookCx<'_>) -> Result<Value, Fault> + Send + Sync + 'static) -> Self {
        HookFn(Arc::new(f))
    }

    #[inline]
    pub fn call(&self, cx: &mut HookCx<'_>) -> Result<Value, Fault> {
        (self.0)(cx)
    }
}

impl fmt::Debug for HookFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HookFn({:p})", Arc::as_ptr(&self.0).cast::<()>())
    }
}
