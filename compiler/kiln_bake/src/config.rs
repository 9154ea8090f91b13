//! Bakery configuration.
//!
//! Decides which implementation type a member gets when its declaration
//! does not name one, which wrapper (if any) goes around default bodies,
//! what `Init` hooks receive as a starting value, and how baked types are
//! named.

use std::fmt;
use std::sync::Arc;

use kiln_ir::{ImplKey, Value, ValueType};
use kiln_types::StandardLibrary;

/// Starting values for non-nullable members.
pub trait DefaultValueProvider: Send + Sync {
    fn default_for(&self, ty: &ValueType) -> Value;
}

/// `""` for strings, the empty list for lists, the zero value otherwise.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardDefaults;

impl DefaultValueProvider for StandardDefaults {
    fn default_for(&self, ty: &ValueType) -> Value {
        match ty {
            ValueType::Str => Value::str(""),
            ValueType::List(_) => Value::List(Arc::from(Vec::new())),
            other => Value::zero(other),
        }
    }
}

/// Configuration of a [`Bakery`](crate::Bakery).
#[derive(Clone)]
pub struct BakeryConfig {
    property_implementation: Option<ImplKey>,
    event_implementation: Option<ImplKey>,
    property_wrapper: Option<ImplKey>,
    method_wrapper: Option<ImplKey>,
    defaults: Arc<dyn DefaultValueProvider>,
    name_prefix: String,
}

impl BakeryConfig {
    /// No implementations configured: every member must bring its own.
    pub fn new() -> Self {
        BakeryConfig {
            property_implementation: None,
            event_implementation: None,
            property_wrapper: None,
            method_wrapper: None,
            defaults: Arc::new(StandardDefaults),
            name_prefix: "Baked.".to_owned(),
        }
    }

    /// Plain storage for properties and events.
    pub fn basic(std: &StandardLibrary) -> Self {
        Self::new()
            .property_implementation(std.basic_property)
            .event_implementation(std.basic_event)
    }

    /// Properties raise `PropertyChanged` when their value changes.
    pub fn notifying(std: &StandardLibrary) -> Self {
        Self::new()
            .property_implementation(std.notifying_property)
            .event_implementation(std.basic_event)
    }

    /// Like [`basic`](Self::basic), with computed properties cached until
    /// invalidated.
    pub fn caching(std: &StandardLibrary) -> Self {
        Self::basic(std).wrap_properties(std.cached_property)
    }

    /// Implementation for properties without a body.
    #[must_use]
    pub fn property_implementation(mut self, implementation: ImplKey) -> Self {
        self.property_implementation = Some(implementation);
        self
    }

    /// Implementation for events without bodies.
    #[must_use]
    pub fn event_implementation(mut self, implementation: ImplKey) -> Self {
        self.event_implementation = Some(implementation);
        self
    }

    /// Wrapper around properties that have default bodies.
    #[must_use]
    pub fn wrap_properties(mut self, implementation: ImplKey) -> Self {
        self.property_wrapper = Some(implementation);
        self
    }

    /// Wrapper around methods that have default bodies.
    #[must_use]
    pub fn wrap_methods(mut self, implementation: ImplKey) -> Self {
        self.method_wrapper = Some(implementation);
        self
    }

    #[must_use]
    pub fn default_values(mut self, provider: impl DefaultValueProvider + 'static) -> Self {
        self.defaults = Arc::new(provider);
        self
    }

    /// Prefix of baked type names (`Baked.` unless set).
    #[must_use]
    pub fn name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.name_prefix = prefix.into();
        self
    }

    #[inline]
    pub fn property_impl(&self) -> Option<ImplKey> {
        self.property_implementation
    }

    #[inline]
    pub fn event_impl(&self) -> Option<ImplKey> {
        self.event_implementation
    }

    #[inline]
    pub fn property_wrapper(&self) -> Option<ImplKey> {
        self.property_wrapper
    }

    #[inline]
    pub fn method_wrapper(&self) -> Option<ImplKey> {
        self.method_wrapper
    }

    #[inline]
    pub fn defaults(&self) -> &dyn DefaultValueProvider {
        &*self.defaults
    }

    /// Name of the type baked from `source`.
    pub fn baked_name(&self, source: &str) -> String {
        format!("{}{source}", self.name_prefix)
    }
}

impl Default for BakeryConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BakeryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BakeryConfig")
            .field("property_implementation", &self.property_implementation)
            .field("event_implementation", &self.event_implementation)
            .field("property_wrapper", &self.property_wrapper)
            .field("method_wrapper", &self.method_wrapper)
            .field("name_prefix", &self.name_prefix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_types::TypeRegistry;

    #[test]
    fn standard_defaults() {
        let d = StandardDefaults;
        assert_eq!(d.default_for(&ValueType::Str), Value::str(""));
        assert_eq!(d.default_for(&ValueType::Int), Value::Int(0));
        assert_eq!(d.default_for(&ValueType::Handler), Value::Null);
        assert_eq!(
            d.default_for(&ValueType::List(Box::new(ValueType::Int))).as_list(),
            Some(&[][..])
        );
    }

    #[test]
    fn presets_pick_standard_implementations() {
        let mut registry = TypeRegistry::new();
        let std = StandardLibrary::install(&mut registry).unwrap();

        let caching = BakeryConfig::caching(&std);
        assert_eq!(caching.property_impl(), Some(std.basic_property));
        assert_eq!(caching.property_wrapper(), Some(std.cached_property));
        assert_eq!(caching.method_wrapper(), None);

        let notifying = BakeryConfig::notifying(&std).name_prefix("Gen.");
        assert_eq!(notifying.property_impl(), Some(std.notifying_property));
        assert_eq!(notifying.baked_name("IPerson"), "Gen.IPerson");
    }
}
