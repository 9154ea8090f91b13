//! The object seam between member bodies and baked instances.

use crate::{Fault, Handler, Value};

/// Member access on a baked object.
///
/// Default bodies and hooks see the instance they run on through this
/// trait (`this` / the container role), which keeps `kiln_ir` free of any
/// dependency on the runtime that implements it.
pub trait Receiver {
    /// Process-unique id of the instance.
    fn instance_id(&self) -> u64;

    /// Name of the baked type (`Baked.<Source>`).
    fn type_name(&self) -> &str;

    /// Read a property.
    fn get(&self, property: &str) -> Result<Value, Fault>;

    /// Write a property.
    fn set(&self, property: &str, value: Value) -> Result<(), Fault>;

    /// Call a method.
    fn call(&self, method: &str, args: &[Value]) -> Result<Value, Fault>;

    /// Add a handler to an event.
    fn subscribe(&self, event: &str, handler: Handler) -> Result<(), Fault>;

    /// Remove a handler (by identity) from an event.
    fn unsubscribe(&self, event: &str, handler: &Handler) -> Result<(), Fault>;
}
