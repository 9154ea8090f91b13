//! Standard implementation types and mix-ins.
//!
//! [`StandardLibrary::install`] registers the building blocks the bakery
//! presets wire members to:
//!
//! | Name | Kind | Behavior |
//! |------|------|----------|
//! | `INotifyPropertyChanged` | interface | `PropertyChanged` event, `ListenerCount`, `RaisePropertyChanged` |
//! | `NotifyMixin` | mix-in | handler list backing `INotifyPropertyChanged` |
//! | `ICacheControl` | interface | `Invalidate()` |
//! | `CacheMixin` | mix-in | `IsValid` flag and generation counter |
//! | `BasicProperty` | plain property | stores the value |
//! | `NotifyingProperty` | plain property | stores the value, raises `PropertyChanged` on change |
//! | `CachedProperty` | wrapping property | caches the wrapped getter until invalidated |
//! | `BasicEvent` | event | stores handlers |

use std::sync::Arc;

use kiln_ir::{Fault, HookCx, ImplKey, Name, Record, TypeKey, Value, ValueType};

use crate::{BakeError, HookReturn, Role, Shape, TypeRegistry};

/// Keys of everything [`StandardLibrary::install`] registers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StandardLibrary {
    pub notify_interface: TypeKey,
    pub notify_mixin: TypeKey,
    pub cache_interface: TypeKey,
    pub cache_mixin: TypeKey,
    pub basic_property: ImplKey,
    pub notifying_property: ImplKey,
    pub cached_property: ImplKey,
    pub basic_event: ImplKey,
}

/// Field names shared by the hook bodies.
#[derive(Clone, Copy)]
struct Fields {
    value: Name,
    handlers: Name,
    is_valid: Name,
    generation: Name,
    cached: Name,
    has_value: Name,
}

/// Handler list of a state field; a zeroed (null) list is empty.
fn handlers_of(record: &Record, field: Name) -> Result<Vec<Value>, Fault> {
    match record.get(field)? {
        Value::Null => Ok(Vec::new()),
        value => value
            .as_list()
            .map(<[Value]>::to_vec)
            .ok_or_else(|| Fault::type_mismatch("list<handler>", value.kind_name())),
    }
}

fn add_handler(record: &mut Record, field: Name, handler: Value) -> Result<(), Fault> {
    let mut handlers = handlers_of(record, field)?;
    handlers.push(handler);
    record.set(field, Value::List(Arc::from(handlers)))
}

/// Remove one occurrence of `handler`, compared by identity.
fn remove_handler(record: &mut Record, field: Name, handler: &Value) -> Result<(), Fault> {
    let mut handlers = handlers_of(record, field)?;
    if let Some(index) = handlers.iter().position(|h| h == handler) {
        handlers.remove(index);
        record.set(field, Value::List(Arc::from(handlers)))?;
    }
    Ok(())
}

/// Queue a `PropertyChanged` notification to every handler in the list.
fn notify_all(cx: &mut HookCx<'_>, handlers: Vec<Value>, member: &str) {
    for handler in handlers {
        if let Value::Handler(handler) = handler {
            cx.notify(handler, Value::str(member));
        }
    }
}

impl StandardLibrary {
    /// Register the standard interfaces, mix-ins, and implementation types.
    pub fn install(registry: &mut TypeRegistry) -> Result<Self, BakeError> {
        let interner = registry.interner().clone();
        let f = Fields {
            value: interner.intern("Value"),
            handlers: interner.intern("Handlers"),
            is_valid: interner.intern("IsValid"),
            generation: interner.intern("Generation"),
            cached: interner.intern("Cached"),
            has_value: interner.intern("HasValue"),
        };

        let (notify_interface, notify_mixin) = install_notify(registry, f)?;
        let (cache_interface, cache_mixin) = install_cache(registry, f)?;

        let basic_property = registry
            .implementation("BasicProperty")
            .marker("IImplementation")
            .shape(Shape::PlainProperty)
            .param("T", Role::Value)
            .state("Value", ValueType::Param(0))
            .hook("Get", |h| {
                h.returns(HookReturn::Param(0))
                    .body(move |cx| Ok(cx.state.get(f.value)?.clone()))
            })
            .hook("Set", |h| {
                h.by_value(0).body(move |cx| {
                    let value = cx.value()?.clone();
                    cx.state.set(f.value, value)?;
                    Ok(Value::Void)
                })
            })
            .hook("Init", |h| {
                h.by_value(0).body(move |cx| {
                    let value = cx.value()?.clone();
                    cx.state.set(f.value, value)?;
                    Ok(Value::Void)
                })
            })
            .finish()?;

        let notifying_property = registry
            .implementation("NotifyingProperty")
            .marker("IImplementation")
            .shape(Shape::PlainProperty)
            .param("T", Role::Value)
            .mixin_param("TMixin", notify_mixin)
            .state("Value", ValueType::Param(0))
            .hook("Get", |h| {
                h.returns(HookReturn::Param(0))
                    .body(move |cx| Ok(cx.state.get(f.value)?.clone()))
            })
            .hook("Set", |h| {
                h.by_value(0).by_ref(1).body(move |cx| {
                    let member = cx.member;
                    let value = cx.value()?.clone();
                    let (state, mixin) = cx.state_and_mixin()?;
                    if *state.get(f.value)? == value {
                        return Ok(Value::Void);
                    }
                    state.set(f.value, value)?;
                    let handlers = handlers_of(mixin, f.handlers)?;
                    notify_all(cx, handlers, member);
                    Ok(Value::Void)
                })
            })
            .hook("Init", |h| {
                h.by_value(0).body(move |cx| {
                    let value = cx.value()?.clone();
                    cx.state.set(f.value, value)?;
                    Ok(Value::Void)
                })
            })
            .finish()?;

        let cached_property = install_cached_property(registry, f, cache_mixin)?;

        let basic_event = registry
            .implementation("BasicEvent")
            .marker("IImplementation")
            .shape(Shape::Event)
            .param("T", Role::Handler)
            .state("Handlers", ValueType::List(Box::new(ValueType::Param(0))))
            .hook("Add", |h| {
                h.by_value(0).body(move |cx| {
                    let handler = cx.value()?.clone();
                    add_handler(cx.state, f.handlers, handler)?;
                    Ok(Value::Void)
                })
            })
            .hook("Remove", |h| {
                h.by_value(0).body(move |cx| {
                    let handler = cx.value()?.clone();
                    remove_handler(cx.state, f.handlers, &handler)?;
                    Ok(Value::Void)
                })
            })
            .finish()?;

        tracing::debug!("standard library installed");
        Ok(StandardLibrary {
            notify_interface,
            notify_mixin,
            cache_interface,
            cache_mixin,
            basic_property,
            notifying_property,
            cached_property,
            basic_event,
        })
    }
}

fn install_notify(registry: &mut TypeRegistry, f: Fields) -> Result<(TypeKey, TypeKey), BakeError> {
    let interface = registry
        .interface("INotifyPropertyChanged")
        .event("PropertyChanged", |e| e)
        .property("ListenerCount", ValueType::Int, |p| p.read_only())
        .method("RaisePropertyChanged", [ValueType::Str], ValueType::Void, |m| m)
        .finish()?;

    let mixin = registry
        .mixin("NotifyMixin")
        .extends(interface)
        .state("Handlers", ValueType::List(Box::new(ValueType::Handler)))
        .event("PropertyChanged", |e| {
            e.add(move |cx| {
                let handler = cx.arg(0)?.clone();
                add_handler(&mut *cx.state()?, f.handlers, handler)?;
                Ok(Value::Void)
            })
            .remove(move |cx| {
                let handler = cx.arg(0)?.clone();
                remove_handler(&mut *cx.state()?, f.handlers, &handler)?;
                Ok(Value::Void)
            })
        })
        .property("ListenerCount", ValueType::Int, |p| {
            p.read_only().get(move |cx| {
                let count = handlers_of(&*cx.state()?, f.handlers)?.len();
                Ok(Value::Int(i64::try_from(count).unwrap_or(i64::MAX)))
            })
        })
        .method("RaisePropertyChanged", [ValueType::Str], ValueType::Void, |m| {
            m.body(move |cx| {
                let name = cx.arg(0)?.clone();
                let handlers = handlers_of(&*cx.state()?, f.handlers)?;
                for handler in handlers {
                    if let Value::Handler(handler) = handler {
                        cx.notify(handler, name.clone());
                    }
                }
                Ok(Value::Void)
            })
        })
        .finish()?;

    registry.add_mixin(interface, mixin)?;
    Ok((interface, mixin))
}

fn install_cache(registry: &mut TypeRegistry, f: Fields) -> Result<(TypeKey, TypeKey), BakeError> {
    let interface = registry
        .interface("ICacheControl")
        .method("Invalidate", [], ValueType::Void, |m| m)
        .finish()?;

    let mixin = registry
        .mixin("CacheMixin")
        .extends(interface)
        .state("IsValid", ValueType::Bool)
        .state("Generation", ValueType::Int)
        .method("Invalidate", [], ValueType::Void, |m| {
            m.body(move |cx| {
                let mut state = cx.state()?;
                let generation = state.get(f.generation)?.expect_int()?;
                state.set(f.is_valid, Value::Bool(false))?;
                state.set(f.generation, Value::Int(generation.wrapping_add(1)))?;
                Ok(Value::Void)
            })
        })
        .finish()?;

    registry.add_mixin(interface, mixin)?;
    Ok((interface, mixin))
}

/// Caches the wrapped getter's result per property. A read is served from
/// the cache while the mix-in is valid and its generation has not moved;
/// any write drops this property's cached value.
fn install_cached_property(
    registry: &mut TypeRegistry,
    f: Fields,
    cache_mixin: TypeKey,
) -> Result<ImplKey, BakeError> {
    registry
        .implementation("CachedProperty")
        .marker("IImplementation")
        .shape(Shape::WrappingProperty)
        .param("T", Role::Value)
        .mixin_param("TMixin", cache_mixin)
        .state("Cached", ValueType::Param(0))
        .state("HasValue", ValueType::Bool)
        .state("Generation", ValueType::Int)
        .hook("BeforeGet", |h| {
            h.by_ref(0).by_ref(1).returns_bool().body(move |cx| {
                let (state, mixin) = cx.state_and_mixin()?;
                let hit = mixin.get(f.is_valid)?.expect_bool()?
                    && state.get(f.has_value)?.expect_bool()?
                    && state.get(f.generation)? == mixin.get(f.generation)?;
                if !hit {
                    return Ok(Value::Bool(true));
                }
                let cached = state.get(f.cached)?.clone();
                *cx.value()? = cached;
                Ok(Value::Bool(false))
            })
        })
        .hook("AfterGet", |h| {
            h.by_ref(0).by_ref(1).body(move |cx| {
                let value = cx.value()?.clone();
                let (state, mixin) = cx.state_and_mixin()?;
                let generation = mixin.get(f.generation)?.clone();
                state.set(f.cached, value)?;
                state.set(f.has_value, Value::Bool(true))?;
                state.set(f.generation, generation)?;
                mixin.set(f.is_valid, Value::Bool(true))?;
                Ok(Value::Void)
            })
        })
        .hook("AfterErrorGet", |h| {
            h.by_ref(0).returns_bool().body(|_| Ok(Value::Bool(true)))
        })
        .hook("BeforeSet", |h| {
            h.by_ref(0).returns_bool().body(|_| Ok(Value::Bool(true)))
        })
        .hook("AfterSet", |h| {
            h.by_ref(0).body(move |cx| {
                cx.state.set(f.has_value, Value::Bool(false))?;
                Ok(Value::Void)
            })
        })
        .hook("AfterErrorSet", |h| {
            h.by_ref(0).returns_bool().body(|_| Ok(Value::Bool(true)))
        })
        .finish()
}
