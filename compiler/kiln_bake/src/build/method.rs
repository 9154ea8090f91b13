//! Method generation.

use kiln_eval::MethodInfo;
use kiln_ir::Value;
use kiln_types::{BakeError, MethodSlot};

use super::{Synthesizer, ValueSource};
use crate::plan::{Generator, MemberPlan};

pub(super) fn generate(syn: &mut Synthesizer<'_>, plan: &MemberPlan, index: u32) -> Result<(), BakeError> {
    let names = syn.names;
    let acc = syn.accessor(plan, MethodSlot::Method(index))?;
    if !syn.claim(std::slice::from_ref(&acc))? {
        return Ok(());
    }

    match &plan.generator {
        Generator::Default => syn.default(&acc)?,
        Generator::Forward { mixin } => {
            let field = syn.mixin_field(*mixin)?;
            syn.forward(&acc, field)?;
        }
        Generator::Direct(checked) => {
            let ret = acc.ret().clone();
            let initial = Value::zero(&ret);
            let storage = syn.storage(acc.facts.member_name, checked, &ret, initial)?;
            syn.direct(&acc, &storage, names.call, ValueSource::None)?;
        }
        Generator::Wrapping(checked) => {
            let ret = acc.ret().clone();
            let initial = Value::zero(&ret);
            let storage = syn.storage(acc.facts.member_name, checked, &ret, initial)?;
            let body = syn.body_of(&acc)?;
            syn.wrapping(&acc, &storage, names.call_hooks, body)?;
        }
    }

    syn.baked.add_method(MethodInfo {
        name: acc.facts.member_name,
        params: acc.params(),
        ret: acc.ret().clone(),
        declaring: plan.owner.key,
    });
    Ok(())
}
