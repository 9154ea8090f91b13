//! Member signature analysis.
//!
//! Reduces every method of an instantiated type to the facts the mapper
//! and synthesizer need: a comparable identity (name + signature), the
//! qualified name for diagnostics, the declaring type, and the
//! implementable/implemented/special-name flags. Results are memoized per
//! [`MethodRef`], so an analyzer shared by a bakery never looks at the
//! same method twice.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use dashmap::DashMap;
use kiln_ir::{ImplKey, Name, TypeKey, ValueType};
use smallvec::SmallVec;

use crate::{BakeError, MethodRef, MethodSlot, TypeRegistry, Visibility};

bitflags! {
    /// Facts about a member that drive mapping and synthesis.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct MemberFlags: u8 {
        /// Public, instance, overridable, not an explicit implementation.
        const IMPLEMENTABLE = 1 << 0;
        /// Carries a default body.
        const IMPLEMENTED = 1 << 1;
        /// Explicit implementation of another interface's member.
        const PRIVATE_IMPL = 1 << 2;
        /// Accessor or event method (`get_`, `set_`, `add_`, `remove_`).
        const SPECIAL_NAME = 1 << 3;
    }
}

/// Required modifiers that take part in signature identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Modifier {
    /// `init`-only setter.
    InitOnly,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    pub params: SmallVec<[ValueType; 4]>,
    pub ret: ValueType,
    pub modifiers: SmallVec<[Modifier; 1]>,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{param}")?;
        }
        write!(f, ") -> {}", self.ret)?;
        for modifier in &self.modifiers {
            match modifier {
                Modifier::InitOnly => f.write_str(" init")?,
            }
        }
        Ok(())
    }
}

/// The identity two declarations share when one implements the other:
/// unqualified name plus signature.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MemberIdentity {
    pub name: Name,
    pub signature: Signature,
}

/// Analysis result for one method.
#[derive(Clone, Debug)]
pub struct MemberFacts {
    pub identity: MemberIdentity,
    /// `Owner.member` (`Owner.IPerson.get_Name` for explicit ones).
    pub qualified: String,
    pub declaring: TypeKey,
    /// Interface whose member this one explicitly implements.
    pub explicit_for: Option<TypeKey>,
    pub flags: MemberFlags,
    /// Name of the property, event, or method the accessor belongs to,
    /// without any explicit-interface prefix.
    pub member_name: Name,
    /// Implementation type chosen by the declaration.
    pub implementation: Option<ImplKey>,
}

impl MemberFacts {
    #[inline]
    pub fn is_implementable(&self) -> bool {
        self.flags.contains(MemberFlags::IMPLEMENTABLE)
    }

    #[inline]
    pub fn is_implemented(&self) -> bool {
        self.flags.contains(MemberFlags::IMPLEMENTED)
    }

    #[inline]
    pub fn is_special(&self) -> bool {
        self.flags.contains(MemberFlags::SPECIAL_NAME)
    }
}

/// Memoizing member analyzer.
///
/// Safe to share between threads; concurrent analyses of the same method
/// may both compute, and the first to finish wins.
#[derive(Debug, Default)]
pub struct SignatureAnalyzer {
    memo: DashMap<MethodRef, Arc<MemberFacts>>,
}

impl SignatureAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of memoized methods.
    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }

    /// Analyze one method of an instantiated type.
    pub fn analyze(
        &self,
        registry: &TypeRegistry,
        method: &MethodRef,
    ) -> Result<Arc<MemberFacts>, BakeError> {
        if let Some(facts) = self.memo.get(method) {
            return Ok(Arc::clone(facts.value()));
        }
        let facts = Arc::new(compute(registry, method)?);
        Ok(Arc::clone(
            self.memo.entry(method.clone()).or_insert(facts).value(),
        ))
    }
}

fn compute(registry: &TypeRegistry, method: &MethodRef) -> Result<MemberFacts, BakeError> {
    let def = registry.type_def(method.owner.key)?;
    let interner = registry.interner();
    let args = &method.owner.args;
    let missing = || {
        BakeError::internal(format!(
            "`{}` has no member slot {:?}",
            registry.name_of(method.owner.key),
            method.slot
        ))
    };

    let (declared, meta, prefix, params, ret, modifiers, implementation) = match method.slot {
        MethodSlot::Getter(i) | MethodSlot::Setter(i) => {
            let prop = def.properties.get(i as usize).ok_or_else(missing)?;
            let ty = prop.ty.substitute(args);
            if matches!(method.slot, MethodSlot::Getter(_)) {
                (prop.name, &prop.meta, "get_", SmallVec::new(), ty, SmallVec::new(), prop.implementation)
            } else {
                let modifiers = if prop.init_only {
                    SmallVec::from_elem(Modifier::InitOnly, 1)
                } else {
                    SmallVec::new()
                };
                let params = SmallVec::from_elem(ty, 1);
                (prop.name, &prop.meta, "set_", params, ValueType::Void, modifiers, prop.implementation)
            }
        }
        MethodSlot::Adder(i) | MethodSlot::Remover(i) => {
            let event = def.events.get(i as usize).ok_or_else(missing)?;
            let prefix = if matches!(method.slot, MethodSlot::Adder(_)) {
                "add_"
            } else {
                "remove_"
            };
            let params = SmallVec::from_elem(ValueType::Handler, 1);
            (event.name, &event.meta, prefix, params, ValueType::Void, SmallVec::new(), event.implementation)
        }
        MethodSlot::Method(i) => {
            let decl = def.methods.get(i as usize).ok_or_else(missing)?;
            let params = decl.params.iter().map(|p| p.substitute(args)).collect();
            (decl.name, &decl.meta, "", params, decl.ret.substitute(args), SmallVec::new(), decl.implementation)
        }
    };

    let declared = interner.lookup(declared);
    let (explicit_prefix, bare) = match declared.rsplit_once('.') {
        Some((iface, bare)) => (Some(iface), bare),
        None => (None, declared),
    };
    let member_name = interner.intern(bare);
    let name = interner.intern(&format!("{prefix}{bare}"));
    let qualified = match explicit_prefix {
        Some(iface) => format!("{}.{iface}.{prefix}{bare}", registry.name_of(def.key)),
        None => format!("{}.{prefix}{bare}", registry.name_of(def.key)),
    };

    let mut flags = MemberFlags::empty();
    if meta.visibility == Visibility::Public
        && !meta.is_static
        && meta.is_overridable
        && meta.explicit_for.is_none()
    {
        flags |= MemberFlags::IMPLEMENTABLE;
    }
    if registry.method_body(method).is_some() {
        flags |= MemberFlags::IMPLEMENTED;
    }
    if meta.explicit_for.is_some() {
        flags |= MemberFlags::PRIVATE_IMPL;
    }
    if method.slot.is_special() {
        flags |= MemberFlags::SPECIAL_NAME;
    }

    Ok(MemberFacts {
        identity: MemberIdentity {
            name,
            signature: Signature {
                params,
                ret,
                modifiers,
            },
        },
        qualified,
        declaring: def.key,
        explicit_for: meta.explicit_for,
        flags,
        member_name,
        implementation,
    })
}

#[cfg(test)]
mod tests;
