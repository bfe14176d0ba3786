use crate::{
    assembly::OpCode,
    facts::{
        generators::{long_opcode, pop, push, FactGenerator},
        Fact, FactArg,
    },
    ir::{Method, Node},
};

/// Facts for stack manipulation and returns.
///
/// `ret` from a `void` method moves no value and produces no fact.
#[derive(Debug, Clone, Copy, Default)]
pub struct StackGenerator;

impl FactGenerator for StackGenerator {
    fn name(&self) -> &'static str {
        "stack"
    }

    fn try_generate(&self, method: &Method, node: &Node) -> Option<Fact> {
        match long_opcode(node)? {
            OpCode::Dup => Some(Fact::new(
                "DupStm",
                vec![push(node, 0)?, push(node, 1)?, pop(node, 0)?],
            )),
            OpCode::Pop => Some(Fact::new("PopStm", vec![pop(node, 0)?])),
            OpCode::Ret => Some(Fact::new(
                "RetStm",
                vec![FactArg::symbol(method.name()), pop(node, 0)?],
            )),
            _ => None,
        }
    }
}
