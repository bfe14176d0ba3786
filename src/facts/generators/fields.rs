use crate::{
    assembly::OpCode,
    facts::{
        generators::{long_opcode, pop, push, storage, FactGenerator},
        Fact,
    },
    ir::{Method, Node},
};

/// Facts for instance and static field access.
///
/// The object reference of an instance access is the deepest popped value; a store's
/// value is on top of it.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldsGenerator;

impl FactGenerator for FieldsGenerator {
    fn name(&self) -> &'static str {
        "fields"
    }

    fn try_generate(&self, method: &Method, node: &Node) -> Option<Fact> {
        let (relation, args) = match long_opcode(node)? {
            OpCode::Ldfld => (
                "LdfldStm",
                vec![push(node, 0)?, pop(node, 0)?, storage(method, node)?],
            ),
            OpCode::Ldflda => (
                "LdfldaStm",
                vec![push(node, 0)?, pop(node, 0)?, storage(method, node)?],
            ),
            OpCode::Stfld => (
                "StfldStm",
                vec![storage(method, node)?, pop(node, 0)?, pop(node, 1)?],
            ),
            OpCode::Ldsfld => ("LdsfldStm", vec![push(node, 0)?, storage(method, node)?]),
            OpCode::Ldsflda => ("LdsfldaStm", vec![push(node, 0)?, storage(method, node)?]),
            OpCode::Stsfld => ("StsfldStm", vec![storage(method, node)?, pop(node, 0)?]),
            _ => return None,
        };
        Some(Fact::new(relation, args))
    }
}
