//! Analyzing processor.
//!
//! One traversal of everything a root type pulls in:
//!
//! 1. the class chain (class roots only), root first;
//! 2. the interface closure, in breadth-first discovery order with generic
//!    arguments substituted along the way;
//! 3. every mix-in a visited type declares, whose own base interfaces and
//!    mix-ins are traversed in turn.
//!
//! Re-visits are no-ops, so an interface and the mix-in implementing it may
//! refer to each other. The implementation map is then built over the
//! result and every member is planned. Mix-ins reached through declarations
//! are public: their interfaces are part of the baked type. Mix-ins that
//! only an implementation type asks for are private.

use std::collections::VecDeque;

use kiln_ir::TypeKey;
use kiln_types::{BakeError, ImplementationMap, SignatureAnalyzer, TypeRef, TypeRegistry};
use rustc_hash::FxHashSet;

use crate::plan::{MemberDecl, MemberPlan, Planner};
use crate::BakeryConfig;

/// Everything the building pass needs to know about a root type.
#[derive(Debug)]
pub struct Analysis {
    pub root: TypeRef,
    /// Class chain, most derived first; empty for interface roots.
    pub classes: Vec<TypeRef>,
    /// Implemented interfaces in discovery order.
    pub interfaces: Vec<TypeRef>,
    pub public_mixins: Vec<TypeKey>,
    pub private_mixins: Vec<TypeKey>,
    pub map: ImplementationMap,
    /// One plan per dispatched member, in owner order.
    pub plans: Vec<MemberPlan>,
}

impl Analysis {
    /// Member owners in dispatch order: classes, then interfaces.
    pub fn owners(&self) -> impl Iterator<Item = &TypeRef> {
        self.classes.iter().chain(&self.interfaces)
    }
}

enum Visit {
    Interface(TypeRef),
    Mixin(TypeKey),
}

/// Analyze `root` for baking.
///
/// # Errors
///
/// Mapping errors (missing or ambiguous implementations) and planning
/// errors (unreadable properties, conflicting accessors, shape mismatches,
/// invalid implementation types).
#[tracing::instrument(level = "debug", skip_all, fields(root = registry.name_of(root)))]
pub fn analyze(
    registry: &TypeRegistry,
    analyzer: &SignatureAnalyzer,
    config: &BakeryConfig,
    root: TypeKey,
) -> Result<Analysis, BakeError> {
    let root_def = registry.type_def(root)?;
    if root_def.is_mixin() {
        return Err(BakeError::internal(format!(
            "`{}` is a mix-in and cannot be baked",
            registry.name_of(root)
        )));
    }
    let root = TypeRef::plain(root);

    let mut queue = VecDeque::new();
    let mut classes = Vec::new();
    if root_def.is_class() {
        let mut seen = FxHashSet::default();
        let mut current = Some(root.clone());
        while let Some(class) = current.take() {
            if !seen.insert(class.key) {
                break;
            }
            let def = registry.type_def(class.key)?;
            for base in &def.bases {
                queue.push_back(Visit::Interface(base.substitute(&class.args)));
            }
            for mixin in &def.mixins {
                queue.push_back(Visit::Mixin(*mixin));
            }
            current = def.base_class.as_ref().map(|b| b.substitute(&class.args));
            classes.push(class);
        }
    } else {
        queue.push_back(Visit::Interface(root.clone()));
    }

    let mut interfaces: Vec<TypeRef> = Vec::new();
    let mut public_mixins: Vec<TypeKey> = Vec::new();
    while let Some(visit) = queue.pop_front() {
        match visit {
            Visit::Interface(ty) => {
                if interfaces.contains(&ty) {
                    continue;
                }
                let def = registry.type_def(ty.key)?;
                for base in &def.bases {
                    queue.push_back(Visit::Interface(base.substitute(&ty.args)));
                }
                for mixin in &def.mixins {
                    queue.push_back(Visit::Mixin(*mixin));
                }
                interfaces.push(ty);
            }
            Visit::Mixin(key) => {
                if public_mixins.contains(&key) {
                    continue;
                }
                let def = registry.type_def(key)?;
                for base in &def.bases {
                    queue.push_back(Visit::Interface(base.clone()));
                }
                for mixin in &def.mixins {
                    queue.push_back(Visit::Mixin(*mixin));
                }
                public_mixins.push(key);
            }
        }
    }

    let owners: Vec<TypeRef> = classes.iter().chain(&interfaces).cloned().collect();
    let map = ImplementationMap::build(registry, analyzer, &owners, &public_mixins)?;

    let mut planner = Planner::new(registry, config, &map);
    let mut plans = Vec::new();
    let mut private_mixins = Vec::new();
    for owner in &owners {
        for member in MemberDecl::all_of(registry, owner.key)? {
            let Some(plan) = planner.plan(owner, member)? else {
                continue;
            };
            if let Some(mixin) = plan.generator.mixin() {
                if !public_mixins.contains(&mixin) && !private_mixins.contains(&mixin) {
                    private_mixins.push(mixin);
                }
            }
            plans.push(plan);
        }
    }
    drop(planner);

    tracing::debug!(
        classes = classes.len(),
        interfaces = interfaces.len(),
        public_mixins = public_mixins.len(),
        private_mixins = private_mixins.len(),
        members = plans.len(),
        "analysis complete"
    );
    Ok(Analysis {
        root,
        classes,
        interfaces,
        public_mixins,
        private_mixins,
        map,
        plans,
    })
}
