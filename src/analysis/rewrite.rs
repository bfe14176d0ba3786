//! Instruction rewrites applied before analysis.
//!
//! - [`ShortFormNormalizer`] replaces macro and short encodings with their canonical long
//!   form through the node override fields, so that `ldloc.0`, `ldloc.s 0` and `ldloc 0`
//!   all reach the fact generators as `ldloc 0`. The decoded instruction is left intact.
//! - [`NopEliminator`] removes `nop` and `break` through node replacement.
//!
//! Neither rewrite changes block boundaries or stack effects.

use crate::{
    analysis::Pass,
    assembly::{Immediate, OpCode, Operand},
    ir::{Method, NodeRef, Visitor},
    Result,
};

/// Visitor pass rewriting short forms to long forms.
#[derive(Debug, Default)]
pub struct ShortFormNormalizer {
    rewritten: usize,
}

impl ShortFormNormalizer {
    /// Creates a normalizer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of nodes rewritten by the last run.
    #[must_use]
    pub fn rewritten(&self) -> usize {
        self.rewritten
    }
}

/// Returns the long-form operand for a short-form node, or `None` to keep the operand.
fn long_operand(opcode: OpCode, operand: &Operand) -> Option<Operand> {
    let long = opcode.long_form();
    if let Some(value) = opcode.implicit_constant() {
        return Some(Operand::Immediate(Immediate::Int32(value)));
    }
    match long {
        OpCode::LdcI4 => match operand {
            Operand::Immediate(immediate) => immediate
                .as_i64()
                .and_then(|value| i32::try_from(value).ok())
                .map(|value| Operand::Immediate(Immediate::Int32(value))),
            _ => None,
        },
        OpCode::Ldloc | OpCode::Stloc | OpCode::Ldloca => opcode
            .implicit_index()
            .or_else(|| operand.as_index())
            .map(Operand::Local),
        OpCode::Ldarg | OpCode::Starg | OpCode::Ldarga => opcode
            .implicit_index()
            .or_else(|| operand.as_index())
            .map(Operand::Argument),
        _ => None,
    }
}

impl Visitor for ShortFormNormalizer {
    fn visit_node(&mut self, method: &mut Method, at: NodeRef) -> Result<()> {
        let node = method.node_mut(at)?;
        let (Some(opcode), Some(operand)) = (node.opcode(), node.operand()) else {
            return Ok(());
        };
        let long = opcode.long_form();
        if long == opcode {
            return Ok(());
        }

        let operand = long_operand(opcode, operand);
        node.set_override_opcode(long);
        if let Some(operand) = operand {
            node.set_override_operand(operand);
        }
        self.rewritten += 1;
        Ok(())
    }
}

impl Pass for ShortFormNormalizer {
    fn name(&self) -> &'static str {
        "short-form-normalizer"
    }

    fn description(&self) -> &'static str {
        "Rewrites macro and short-form opcodes to their canonical long forms"
    }

    fn run_on_method(&self, method: &mut Method) -> Result<bool> {
        let mut normalizer = ShortFormNormalizer::new();
        normalizer.visit_method(method)?;
        if normalizer.rewritten > 0 {
            log::debug!("{}: normalized {} short forms", method.name(), normalizer.rewritten);
        }
        Ok(normalizer.rewritten > 0)
    }
}

/// Visitor pass removing `nop` and `break`.
///
/// A `nop` that starts an exception handler is kept: the handler entry is keyed by its
/// offset.
#[derive(Debug, Default)]
pub struct NopEliminator {
    removed: usize,
}

impl NopEliminator {
    /// Creates a nop eliminator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of nodes removed by the last run.
    #[must_use]
    pub fn removed(&self) -> usize {
        self.removed
    }
}

impl Visitor for NopEliminator {
    fn visit_node(&mut self, method: &mut Method, at: NodeRef) -> Result<()> {
        let node = method.node(at)?;
        if !matches!(node.opcode(), Some(OpCode::Nop | OpCode::Break)) {
            return Ok(());
        }
        if node
            .offset()
            .is_some_and(|offset| method.handler_entry(offset).is_some())
        {
            return Ok(());
        }

        method.replace(at, Vec::new())?;
        self.removed += 1;
        Ok(())
    }
}

impl Pass for NopEliminator {
    fn name(&self) -> &'static str {
        "nop-eliminator"
    }

    fn description(&self) -> &'static str {
        "Removes nop and break instructions outside handler entries"
    }

    fn run_on_method(&self, method: &mut Method) -> Result<bool> {
        let mut eliminator = NopEliminator::new();
        eliminator.visit_method(method)?;
        Ok(eliminator.removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::MethodBodyBuilder;

    fn effective(method: &Method) -> Vec<(OpCode, Operand)> {
        method
            .nodes()
            .filter_map(|node| Some((node.opcode()?, node.operand()?.clone())))
            .collect()
    }

    #[test]
    fn macro_forms_become_long_forms() {
        let mut b = MethodBodyBuilder::new("M");
        b.with_this()
            .ldarg(1)
            .stloc(2)
            .ldloc(300)
            .ldc_i4(5)
            .ldc_i4(-100)
            .ldc_i4(100_000)
            .br("end")
            .label("end")
            .ret();
        let mut method = Method::build(&b.build().unwrap()).unwrap();
        let mut normalizer = ShortFormNormalizer::new();
        normalizer.visit_method(&mut method).unwrap();

        assert_eq!(
            effective(&method),
            vec![
                (OpCode::Ldarg, Operand::Argument(1)),
                (OpCode::Stloc, Operand::Local(2)),
                (OpCode::Ldloc, Operand::Local(300)),
                (OpCode::LdcI4, Operand::Immediate(Immediate::Int32(5))),
                (OpCode::LdcI4, Operand::Immediate(Immediate::Int32(-100))),
                (OpCode::LdcI4, Operand::Immediate(Immediate::Int32(100_000))),
                (OpCode::Br, Operand::Target(method.blocks()[1].offset())),
                (OpCode::Ret, Operand::None),
            ]
        );
        // ldarg.1, stloc.2, ldc.i4.5, ldc.i4.s
        assert_eq!(normalizer.rewritten(), 4);
        assert!(method.blocks()[0].nodes()[0].is_rewritten());
        assert_eq!(
            method.blocks()[0].nodes()[0].instruction().unwrap().opcode,
            OpCode::Ldarg1
        );
    }

    #[test]
    fn short_branches_keep_their_target() {
        let mut b = MethodBodyBuilder::new("M");
        b.ldarg(0)
            .branch(OpCode::BrtrueS, "end")
            .nop()
            .label("end")
            .ret();
        let body = b.build().unwrap();
        let mut method = Method::build(&body).unwrap();
        assert!(ShortFormNormalizer::new().run_on_method(&mut method).unwrap());

        let branch = &method.blocks()[0].nodes()[1];
        assert_eq!(branch.opcode(), Some(OpCode::Brtrue));
        assert_eq!(branch.operand(), Some(&body.instructions[1].operand));
    }

    #[test]
    fn nops_are_removed() {
        let mut b = MethodBodyBuilder::new("M");
        b.nop().ldc_i4(1).nop().op(OpCode::Break).pop().nop().ret();
        let mut method = Method::build(&b.build().unwrap()).unwrap();
        let mut eliminator = NopEliminator::new();
        eliminator.visit_method(&mut method).unwrap();

        assert_eq!(eliminator.removed(), 4);
        let opcodes: Vec<_> = method.nodes().filter_map(|node| node.opcode()).collect();
        assert_eq!(opcodes, vec![OpCode::LdcI41, OpCode::Pop, OpCode::Ret]);
    }

    #[test]
    fn handler_entry_nop_is_kept() {
        let mut b = MethodBodyBuilder::new("M");
        b.label("try")
            .nop()
            .leave("end")
            .label("finally")
            .nop()
            .endfinally()
            .label("end")
            .ret()
            .handler(
                crate::assembly::ExceptionHandlerFlags::FINALLY,
                ("try", "finally"),
                ("finally", "end"),
            );
        let mut method = Method::build(&b.build().unwrap()).unwrap();
        NopEliminator::new().visit_method(&mut method).unwrap();

        let kept: Vec<_> = method
            .nodes()
            .filter(|node| node.opcode() == Some(OpCode::Nop))
            .filter_map(|node| node.offset())
            .collect();
        assert_eq!(kept.len(), 1);
        assert!(method.handler_entry(kept[0]).is_some());
    }

    #[test]
    fn no_changes_reported_for_long_forms() {
        let mut b = MethodBodyBuilder::new("M");
        b.ldstr("x").pop().ret();
        let mut method = Method::build(&b.build().unwrap()).unwrap();
        assert!(!ShortFormNormalizer::new().run_on_method(&mut method).unwrap());
        assert!(!NopEliminator::new().run_on_method(&mut method).unwrap());
    }
}
