//! Implementation mapping: which declaration implements each member.
//!
//! For a root type the search space is its interface closure, its class
//! chain, and the mix-ins it carries. Every implementable member is matched
//! by [`MemberIdentity`](crate::MemberIdentity) against the declarations in
//! that space that carry a body; declarations superseded by a more derived
//! candidate drop out before ambiguity is judged.

use std::fmt::Write as _;
use std::sync::Arc;

use kiln_ir::TypeKey;
use rustc_hash::FxHashMap;

use crate::{BakeError, MemberFacts, MethodRef, SignatureAnalyzer, TypeRef, TypeRegistry};

/// How a member is implemented.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// No body anywhere in the search space.
    NotImplemented,
    /// A body declared on an interface or class.
    ImplementedDirectly { method: MethodRef },
    /// A body declared on a mix-in; calls forward to its state block.
    ImplementedByMixin { mixin: TypeKey, method: MethodRef },
}

impl Resolution {
    /// The implementing declaration, if any.
    pub fn method(&self) -> Option<&MethodRef> {
        match self {
            Resolution::NotImplemented => None,
            Resolution::ImplementedDirectly { method }
            | Resolution::ImplementedByMixin { method, .. } => Some(method),
        }
    }
}

/// Member → resolution index for one root type.
#[derive(Clone, Debug, Default)]
pub struct ImplementationMap {
    resolutions: FxHashMap<MethodRef, Resolution>,
    /// Qualified names of every method in the search space, for the report.
    names: FxHashMap<MethodRef, String>,
}

impl ImplementationMap {
    /// Resolve every implementable member declared on `types` against the
    /// bodies found on `types` and `mixins`.
    ///
    /// # Errors
    ///
    /// `AmbiguousImplementation` when more than one most-derived body
    /// matches, `MissingImplementation` when an ordinary method has no body
    /// and no implementation type of its own.
    #[tracing::instrument(level = "debug", skip_all, fields(types = types.len(), mixins = mixins.len()))]
    pub fn build(
        registry: &TypeRegistry,
        analyzer: &SignatureAnalyzer,
        types: &[TypeRef],
        mixins: &[TypeKey],
    ) -> Result<Self, BakeError> {
        let mut space: Vec<TypeRef> = types.to_vec();
        for mixin in mixins {
            let mixin = TypeRef::plain(*mixin);
            if !space.contains(&mixin) {
                space.push(mixin);
            }
        }

        let mut all: Vec<(MethodRef, Arc<MemberFacts>)> = Vec::new();
        for owner in &space {
            for method in registry.methods_of(owner)? {
                let facts = analyzer.analyze(registry, &method)?;
                all.push((method, facts));
            }
        }

        let mut map = ImplementationMap::default();
        for (method, facts) in &all {
            map.names.insert(method.clone(), facts.qualified.clone());
        }
        for (method, facts) in &all {
            if !facts.is_implementable() || registry.type_def(method.owner.key)?.is_mixin() {
                continue;
            }

            let candidates: Vec<&(MethodRef, Arc<MemberFacts>)> = all
                .iter()
                .filter(|(_, other)| {
                    other.is_implemented()
                        && other.identity == facts.identity
                        && other
                            .explicit_for
                            .map_or(true, |target| target == facts.declaring)
                })
                .collect();
            let most_derived: Vec<&(MethodRef, Arc<MemberFacts>)> = candidates
                .iter()
                .copied()
                .filter(|(_, c)| {
                    !candidates
                        .iter()
                        .any(|(_, d)| registry.is_ancestor(c.declaring, d.declaring))
                })
                .collect();

            let resolution = match most_derived.as_slice() {
                [] if !facts.is_special() && facts.implementation.is_none() => {
                    return Err(BakeError::MissingImplementation {
                        member: facts.qualified.clone(),
                        search_space: space.iter().map(|t| registry.display_ref(t)).collect(),
                    });
                }
                [] => Resolution::NotImplemented,
                [(found, found_facts)] => {
                    if registry.type_def(found_facts.declaring)?.is_mixin() {
                        Resolution::ImplementedByMixin {
                            mixin: found_facts.declaring,
                            method: found.clone(),
                        }
                    } else {
                        Resolution::ImplementedDirectly {
                            method: found.clone(),
                        }
                    }
                }
                several => {
                    return Err(BakeError::AmbiguousImplementation {
                        member: facts.qualified.clone(),
                        candidates: several.iter().map(|(_, c)| c.qualified.clone()).collect(),
                    });
                }
            };

            tracing::trace!(member = %facts.qualified, ?resolution, "resolved");
            map.resolutions.insert(method.clone(), resolution);
        }

        Ok(map)
    }

    /// Resolution of an implementable member; `None` for members the map
    /// never saw (private, static, sealed, or outside the search space).
    pub fn resolve(&self, method: &MethodRef) -> Option<&Resolution> {
        self.resolutions.get(method)
    }

    pub fn len(&self) -> usize {
        self.resolutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolutions.is_empty()
    }

    /// Human-readable resolution list, one member per line, sorted.
    pub fn report(&self) -> String {
        let mut lines: Vec<String> = self
            .resolutions
            .iter()
            .map(|(method, resolution)| {
                let member = self.names.get(method).map_or("?", String::as_str);
                let target = |m: &MethodRef| {
                    self.names
                        .get(m)
                        .cloned()
                        .unwrap_or_else(|| format!("{:?} {:?}", m.owner.key, m.slot))
                };
                match resolution {
                    Resolution::NotImplemented => format!("{member}: not implemented"),
                    Resolution::ImplementedDirectly { method } => {
                        format!("{member}: directly by {}", target(method))
                    }
                    Resolution::ImplementedByMixin { method, .. } => {
                        format!("{member}: by mix-in {}", target(method))
                    }
                }
            })
            .collect();
        lines.sort();

        let mut out = String::new();
        for line in lines {
            let _ = writeln!(out, "{line}");
        }
        out
    }
}

#[cfg(test)]
mod tests;
