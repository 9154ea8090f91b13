//! Property generation.

use kiln_emit::Operand;
use kiln_eval::{AccessorKind, PropertyInfo};
use kiln_types::{BakeError, MethodSlot};
use smallvec::SmallVec;

use super::{Accessor, Synthesizer, ValueSource};
use crate::plan::{Generator, MemberPlan};

pub(super) fn generate(syn: &mut Synthesizer<'_>, plan: &MemberPlan, index: u32) -> Result<(), BakeError> {
    let registry = syn.registry;
    let names = syn.names;
    let owner = registry.type_def(plan.owner.key)?;
    let prop = owner
        .properties
        .get(index as usize)
        .ok_or_else(|| BakeError::internal(format!("`{}` is not a property", plan.qualified)))?;

    let mut accessors: SmallVec<[Accessor; 2]> = SmallVec::new();
    if prop.getter.is_some() {
        accessors.push(syn.accessor(plan, MethodSlot::Getter(index))?);
    }
    if prop.setter.is_some() {
        accessors.push(syn.accessor(plan, MethodSlot::Setter(index))?);
    }
    if !syn.claim(&accessors)? {
        return Ok(());
    }
    let ty = prop.ty.substitute(&plan.owner.args);
    let nullability = prop.nullability.or_context(owner.nullable_context);

    match &plan.generator {
        Generator::Default => {
            for acc in &accessors {
                syn.default(acc)?;
            }
        }
        Generator::Forward { mixin } => {
            let field = syn.mixin_field(*mixin)?;
            for acc in &accessors {
                syn.forward(acc, field)?;
            }
        }
        Generator::Direct(checked) => {
            let initial = syn.initial_value(&ty, nullability.is_not_nullable());
            let storage = syn.storage(prop.name, checked, &ty, initial)?;
            for acc in &accessors {
                if acc.kind == AccessorKind::Get {
                    syn.direct(acc, &storage, names.get, ValueSource::None)?;
                } else {
                    syn.direct(acc, &storage, names.set, ValueSource::Operand(Operand::Arg(0)))?;
                }
            }
        }
        Generator::Wrapping(checked) => {
            let initial = syn.initial_value(&ty, nullability.is_not_nullable());
            let storage = syn.storage(prop.name, checked, &ty, initial)?;
            for acc in &accessors {
                let body = syn.body_of(acc)?;
                let hooks = if acc.kind == AccessorKind::Get {
                    names.get_hooks
                } else {
                    names.set_hooks
                };
                syn.wrapping(acc, &storage, hooks, body)?;
            }
        }
    }

    syn.baked.add_property(PropertyInfo {
        name: prop.name,
        ty,
        nullability,
        readable: prop.getter.is_some(),
        writable: prop.setter.is_some(),
        init_only: prop.init_only,
        declaring: plan.owner.key,
    });
    Ok(())
}
