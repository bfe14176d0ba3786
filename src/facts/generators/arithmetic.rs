use crate::{
    assembly::OpCode,
    facts::{
        generators::{long_opcode, pop, push, FactGenerator},
        Fact, FactArg,
    },
    ir::{Method, Node},
};

/// Facts for binary and unary operators.
///
/// Comparisons (`ceq`, `cgt`, `clt` and their unsigned forms) are binary operators.
/// Operands are listed deepest first, so `a - b` renders as `BinopStm(r, "sub", a, b)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArithmeticGenerator;

fn is_binary(opcode: OpCode) -> bool {
    matches!(
        opcode,
        OpCode::Add
            | OpCode::AddOvf
            | OpCode::AddOvfUn
            | OpCode::Sub
            | OpCode::SubOvf
            | OpCode::SubOvfUn
            | OpCode::Mul
            | OpCode::MulOvf
            | OpCode::MulOvfUn
            | OpCode::Div
            | OpCode::DivUn
            | OpCode::Rem
            | OpCode::RemUn
            | OpCode::And
            | OpCode::Or
            | OpCode::Xor
            | OpCode::Shl
            | OpCode::Shr
            | OpCode::ShrUn
            | OpCode::Ceq
            | OpCode::Cgt
            | OpCode::CgtUn
            | OpCode::Clt
            | OpCode::CltUn
    )
}

impl FactGenerator for ArithmeticGenerator {
    fn name(&self) -> &'static str {
        "arithmetic"
    }

    fn try_generate(&self, _method: &Method, node: &Node) -> Option<Fact> {
        let opcode = long_opcode(node)?;
        let op = FactArg::symbol(opcode.mnemonic());
        if is_binary(opcode) {
            return Some(Fact::new(
                "BinopStm",
                vec![push(node, 0)?, op, pop(node, 0)?, pop(node, 1)?],
            ));
        }
        match opcode {
            OpCode::Neg | OpCode::Not => Some(Fact::new(
                "UnopStm",
                vec![push(node, 0)?, op, pop(node, 0)?],
            )),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assembly::MethodBodyBuilder, facts::generators::test_support::*};

    #[test]
    fn binary_and_unary() {
        let mut b = MethodBodyBuilder::new("M");
        b.ldarg(0)
            .ldc_i4(1)
            .op(OpCode::Sub)
            .op(OpCode::Neg)
            .ldc_i4(0)
            .op(OpCode::Clt)
            .pop()
            .ret();
        let method = analyzed(&b);
        assert_eq!(
            render(&ArithmeticGenerator, &method),
            vec![
                r#"BinopStm("M#st0", "sub", "M#st0", "M#st1")."#,
                r#"UnopStm("M#st0", "neg", "M#st0")."#,
                r#"BinopStm("M#st0", "clt", "M#st0", "M#st1")."#,
            ]
        );
    }

    #[test]
    fn other_opcodes_are_declined() {
        let mut b = MethodBodyBuilder::new("M");
        b.ldc_i4(1).op(OpCode::ConvI8).pop().ret();
        let method = analyzed(&b);
        assert!(render(&ArithmeticGenerator, &method).is_empty());
    }
}
