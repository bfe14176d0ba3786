use crate::{
    assembly::{OpCode, Operand},
    facts::{
        generators::{long_opcode, push, FactGenerator},
        Fact, FactArg,
    },
    ir::{Method, Node},
};

/// Facts for string, numeric and null constants.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstantsGenerator;

impl ConstantsGenerator {
    fn literal(node: &Node) -> Option<FactArg> {
        if let Some(value) = node.opcode().and_then(OpCode::implicit_constant) {
            return Some(FactArg::Int(i64::from(value)));
        }
        match node.operand()? {
            Operand::Immediate(immediate) => immediate
                .as_i64()
                .map(FactArg::Int)
                .or_else(|| immediate.as_f64().map(FactArg::Float)),
            _ => None,
        }
    }
}

impl FactGenerator for ConstantsGenerator {
    fn name(&self) -> &'static str {
        "constants"
    }

    fn try_generate(&self, _method: &Method, node: &Node) -> Option<Fact> {
        match long_opcode(node)? {
            OpCode::Ldstr => match node.operand()? {
                Operand::String(text) => Some(Fact::new(
                    "LdstrStm",
                    vec![push(node, 0)?, FactArg::Str(text.clone())],
                )),
                _ => None,
            },
            OpCode::LdcI4 | OpCode::LdcI8 | OpCode::LdcR4 | OpCode::LdcR8 => Some(Fact::new(
                "LdcStm",
                vec![push(node, 0)?, Self::literal(node)?],
            )),
            OpCode::Ldnull => Some(Fact::new("LdnullStm", vec![push(node, 0)?])),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::StackAnalyzer,
        assembly::MethodBodyBuilder,
        facts::generators::test_support::*,
        ir::Visitor,
    };

    #[test]
    fn literals() {
        let mut b = MethodBodyBuilder::new("M");
        b.ldstr("C:\\temp\n")
            .ldc_i4(7)
            .ldc_i4(-200)
            .ldc_i8(1 << 40)
            .ldc_r8(0.5)
            .ldnull()
            .pop()
            .pop()
            .pop()
            .pop()
            .pop()
            .pop()
            .ret();
        let method = analyzed(&b);
        assert_eq!(
            render(&ConstantsGenerator, &method),
            vec![
                r#"LdstrStm("M#st0", "C:\\temp\n")."#,
                r#"LdcStm("M#st1", 7)."#,
                r#"LdcStm("M#st2", -200)."#,
                r#"LdcStm("M#st3", 1099511627776)."#,
                r#"LdcStm("M#st4", 0.5)."#,
                r#"LdnullStm("M#st5")."#,
            ]
        );
    }

    #[test]
    fn macro_constants_without_normalization() {
        let mut b = MethodBodyBuilder::new("M");
        b.ldc_i4(-1).pop().ret();
        let mut method = Method::build(&b.build().unwrap()).unwrap();
        StackAnalyzer::new().visit_method(&mut method).unwrap();
        assert_eq!(
            render(&ConstantsGenerator, &method),
            vec![r#"LdcStm("M#st0", -1)."#]
        );
    }
}
