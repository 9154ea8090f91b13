//! Event generation.

use kiln_emit::Operand;
use kiln_eval::{AccessorKind, EventInfo};
use kiln_ir::{Value, ValueType};
use kiln_types::{BakeError, MethodSlot};

use super::{Synthesizer, ValueSource};
use crate::plan::{Generator, MemberPlan};

pub(super) fn generate(syn: &mut Synthesizer<'_>, plan: &MemberPlan, index: u32) -> Result<(), BakeError> {
    let registry = syn.registry;
    let names = syn.names;
    let event = registry
        .type_def(plan.owner.key)?
        .events
        .get(index as usize)
        .ok_or_else(|| BakeError::internal(format!("`{}` is not an event", plan.qualified)))?;

    let accessors = [
        syn.accessor(plan, MethodSlot::Adder(index))?,
        syn.accessor(plan, MethodSlot::Remover(index))?,
    ];
    if !syn.claim(&accessors)? {
        return Ok(());
    }

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
            let storage = syn.storage(event.name, checked, &ValueType::Handler, Value::Null)?;
            for acc in &accessors {
                let hook = if acc.kind == AccessorKind::Add {
                    names.add
                } else {
                    names.remove
                };
                syn.direct(acc, &storage, hook, ValueSource::Operand(Operand::Arg(0)))?;
            }
        }
        Generator::Wrapping(_) => {
            return Err(BakeError::internal(format!(
                "event `{}` cannot be wrapped",
                plan.qualified
            )));
        }
    }

    syn.baked.add_event(EventInfo {
        name: event.name,
        declaring: plan.owner.key,
    });
    Ok(())
}
