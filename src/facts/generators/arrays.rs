use crate::{
    assembly::OpCode,
    facts::{
        generators::{long_opcode, pop, push, FactGenerator},
        Fact,
    },
    ir::{Method, Node},
};

/// Facts for array element access and allocation.
///
/// Every `ldelem.<type>` variant maps to `LdelemStm` and every `stelem.<type>` variant to
/// `StelemStm`; the element type does not matter for value flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArraysGenerator;

impl FactGenerator for ArraysGenerator {
    fn name(&self) -> &'static str {
        "arrays"
    }

    fn try_generate(&self, _method: &Method, node: &Node) -> Option<Fact> {
        let opcode = long_opcode(node)?;
        let mnemonic = opcode.mnemonic();
        let (relation, args) = match opcode {
            OpCode::Ldelema => (
                "LdelemaStm",
                vec![push(node, 0)?, pop(node, 0)?, pop(node, 1)?],
            ),
            OpCode::Newarr => ("NewarrStm", vec![push(node, 0)?, pop(node, 0)?]),
            _ if mnemonic == "ldelem" || mnemonic.starts_with("ldelem.") => (
                "LdelemStm",
                vec![push(node, 0)?, pop(node, 0)?, pop(node, 1)?],
            ),
            _ if mnemonic == "stelem" || mnemonic.starts_with("stelem.") => (
                "StelemStm",
                vec![pop(node, 0)?, pop(node, 1)?, pop(node, 2)?],
            ),
            _ => return None,
        };
        Some(Fact::new(relation, args))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{assembly::MethodBodyBuilder, facts::generators::test_support::*};

    #[test]
    fn element_access() {
        let mut b = MethodBodyBuilder::new("M");
        b.local("items")
            .ldc_i4(2)
            .with_type(OpCode::Newarr, "System.String")
            .stloc(0)
            .ldloc(0)
            .ldc_i4(0)
            .ldstr("a")
            .op(OpCode::StelemRef)
            .ldloc(0)
            .ldc_i4(0)
            .op(OpCode::LdelemRef)
            .ldloc(0)
            .ldc_i4(1)
            .with_type(OpCode::Ldelema, "System.String")
            .pop()
            .pop()
            .ret();
        let method = analyzed(&b);
        assert_eq!(
            render(&ArraysGenerator, &method),
            vec![
                r#"NewarrStm("M#st0", "M#st0")."#,
                r#"StelemStm("M#st0", "M#st1", "M#st2")."#,
                r#"LdelemStm("M#st0", "M#st0", "M#st1")."#,
                r#"LdelemaStm("M#st1", "M#st1", "M#st2")."#,
            ]
        );
    }
}
