use crate::{
    assembly::{FlowType, OpCode, Operand},
    facts::{
        generators::{label, long_opcode, pop, FactGenerator},
        Fact, FactArg,
    },
    ir::{Method, Node},
};

/// Facts for control transfers.
///
/// Targets are code locations named `<method>#IL_<offset>`. Conditional branches list the
/// tested values deepest first.
#[derive(Debug, Clone, Copy, Default)]
pub struct BranchesGenerator;

impl FactGenerator for BranchesGenerator {
    fn name(&self) -> &'static str {
        "branches"
    }

    fn try_generate(&self, method: &Method, node: &Node) -> Option<Fact> {
        let opcode = long_opcode(node)?;
        match (opcode.flow_type(), node.operand()?) {
            (FlowType::UnconditionalBranch | FlowType::Leave, Operand::Target(target)) => {
                Some(Fact::new("BrStm", vec![label(method, *target)]))
            }
            (FlowType::ConditionalBranch, Operand::Target(target)) => {
                if node.pop_names().is_empty() {
                    return None;
                }
                Some(Fact::new(
                    "CondBrStm",
                    vec![
                        FactArg::symbol(opcode.mnemonic()),
                        FactArg::names(node.pop_names()),
                        label(method, *target),
                    ],
                ))
            }
            (FlowType::Switch, Operand::Switch(targets)) if opcode == OpCode::Switch => {
                Some(Fact::new(
                    "SwitchStm",
                    vec![
                        pop(node, 0)?,
                        FactArg::List(targets.iter().map(|t| label(method, *t)).collect()),
                    ],
                ))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assembly::MethodBodyBuilder, facts::generators::test_support::*};

    #[test]
    fn branch_shapes() {
        let mut b = MethodBodyBuilder::new("M");
        b.ldarg(0)
            .ldarg(1)
            .branch(OpCode::BltS, "low")
            .ldarg(0)
            .switch(&["low", "end"])
            .br("end")
            .label("low")
            .ldarg(1)
            .brfalse("end")
            .label("end")
            .ret();
        let method = analyzed(&b);
        assert_eq!(
            render(&BranchesGenerator, &method),
            vec![
                r#"CondBrStm("blt", ["M#st0", "M#st1"], "M#IL_0017")."#,
                r#"SwitchStm("M#st0", ["M#IL_0017", "M#IL_001d"])."#,
                r#"BrStm("M#IL_001d")."#,
                r#"CondBrStm("brfalse", ["M#st0"], "M#IL_001d")."#,
            ]
        );
    }
}
