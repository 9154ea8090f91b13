//! The bakery: cached, thread-safe access to baked types.
//!
//! Each source type is baked at most once per bakery. The cache holds one
//! slot per key; the first caller to lock a slot bakes while later callers
//! for the same key wait on that slot, so concurrent first requests share a
//! single bake. Bakes of different keys run in parallel. A failed bake
//! leaves its slot empty and the next request tries again.

use std::sync::Arc;

use kiln_eval::{BakedType, Instance};
use kiln_ir::TypeKey;
use kiln_types::{BakeError, SignatureAnalyzer, TypeRegistry};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::analyze::{analyze, Analysis};
use crate::build::build;
use crate::{BakeryConfig, SharedRegistry};

type Slot = Arc<Mutex<Option<Arc<BakedType>>>>;

/// Bakes and caches types from one frozen registry.
pub struct Bakery {
    registry: SharedRegistry<TypeRegistry>,
    config: BakeryConfig,
    analyzer: SignatureAnalyzer,
    cache: Mutex<FxHashMap<TypeKey, Slot>>,
}

impl Bakery {
    pub fn new(registry: impl Into<SharedRegistry<TypeRegistry>>, config: BakeryConfig) -> Self {
        Bakery {
            registry: registry.into(),
            config,
            analyzer: SignatureAnalyzer::new(),
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    #[inline]
    pub fn registry(&self) -> &SharedRegistry<TypeRegistry> {
        &self.registry
    }

    #[inline]
    pub fn config(&self) -> &BakeryConfig {
        &self.config
    }

    /// The baked type for `key`, baking it on first request.
    ///
    /// # Errors
    ///
    /// Any [`BakeError`] the analysis or build raises. Errors are not
    /// cached.
    #[tracing::instrument(level = "debug", skip_all, fields(ty = self.registry.name_of(key)))]
    pub fn resolve(&self, key: TypeKey) -> Result<Arc<BakedType>, BakeError> {
        let slot = Arc::clone(self.cache.lock().entry(key).or_default());
        let mut baked = slot.lock();
        if let Some(ty) = baked.as_ref() {
            tracing::trace!("cache hit");
            return Ok(Arc::clone(ty));
        }

        let analysis = analyze(&self.registry, &self.analyzer, &self.config, key)?;
        let ty = Arc::new(build(&self.registry, &self.analyzer, &self.config, &analysis)?);
        *baked = Some(Arc::clone(&ty));
        Ok(ty)
    }

    /// [`resolve`](Self::resolve) by source type name.
    pub fn resolve_named(&self, name: &str) -> Result<Arc<BakedType>, BakeError> {
        self.resolve(self.registry.resolve_name(name)?)
    }

    /// A new instance of the baked type for `key`.
    ///
    /// # Errors
    ///
    /// Bake errors, or [`BakeError::Construction`] when an `Init` hook
    /// faults.
    pub fn create(&self, key: TypeKey) -> Result<Instance, BakeError> {
        let ty = self.resolve(key)?;
        let type_name = ty.name().to_owned();
        Instance::construct(ty).map_err(|fault| BakeError::Construction { type_name, fault })
    }

    /// [`create`](Self::create) by source type name.
    pub fn create_named(&self, name: &str) -> Result<Instance, BakeError> {
        self.create(self.registry.resolve_name(name)?)
    }

    /// Run the analysis alone, for inspection. Nothing is cached.
    pub fn analyze(&self, key: TypeKey) -> Result<Analysis, BakeError> {
        analyze(&self.registry, &self.analyzer, &self.config, key)
    }

    /// Number of successfully baked types.
    pub fn cached_count(&self) -> usize {
        let slots: Vec<Slot> = self.cache.lock().values().cloned().collect();
        slots.iter().filter(|slot| slot.lock().is_some()).count()
    }
}

impl std::fmt::Debug for Bakery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bakery")
            .field("config", &self.config)
            .field("cached", &self.cache.lock().len())
            .finish_non_exhaustive()
    }
}
