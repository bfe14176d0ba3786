use crate::{
    assembly::OpCode,
    facts::{
        generators::{long_opcode, pop, push, FactGenerator},
        Fact, FactArg,
    },
    ir::{Method, Node},
};

/// Facts for value-preserving single-operand operations.
///
/// Numeric conversions, boxing, unboxing, casts and `ldlen` all derive one value from
/// another; they share the `ConvStm(result, "op", source)` shape.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConversionsGenerator;

fn is_conversion(opcode: OpCode) -> bool {
    opcode.mnemonic().starts_with("conv.")
        || matches!(
            opcode,
            OpCode::Box
                | OpCode::Unbox
                | OpCode::UnboxAny
                | OpCode::Castclass
                | OpCode::Isinst
                | OpCode::Ldlen
        )
}

impl FactGenerator for ConversionsGenerator {
    fn name(&self) -> &'static str {
        "conversions"
    }

    fn try_generate(&self, _method: &Method, node: &Node) -> Option<Fact> {
        let opcode = long_opcode(node)?;
        if !is_conversion(opcode) {
            return None;
        }
        Some(Fact::new(
            "ConvStm",
            vec![
                push(node, 0)?,
                FactArg::symbol(opcode.mnemonic()),
                pop(node, 0)?,
            ],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assembly::MethodBodyBuilder, facts::generators::test_support::*};

    #[test]
    fn conversions_and_casts() {
        let mut b = MethodBodyBuilder::new("M");
        b.ldarg(0)
            .op(OpCode::ConvOvfI4Un)
            .with_type(OpCode::Box, "System.Int32")
            .with_type(OpCode::Castclass, "System.Object")
            .pop()
            .ret();
        let method = analyzed(&b);
        assert_eq!(
            render(&ConversionsGenerator, &method),
            vec![
                r#"ConvStm("M#st0", "conv.ovf.i4.un", "M#st0")."#,
                r#"ConvStm("M#st0", "box", "M#st0")."#,
                r#"ConvStm("M#st0", "castclass", "M#st0")."#,
            ]
        );
    }
}
