use crate::{
    assembly::OpCode,
    facts::{
        generators::{long_opcode, pop, push, storage, FactGenerator},
        Fact,
    },
    ir::{Method, Node},
};

/// Facts for local variable loads, stores and address loads.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalsGenerator;

impl FactGenerator for LocalsGenerator {
    fn name(&self) -> &'static str {
        "locals"
    }

    fn try_generate(&self, method: &Method, node: &Node) -> Option<Fact> {
        match long_opcode(node)? {
            OpCode::Ldloc => Some(Fact::new(
                "LdlocStm",
                vec![push(node, 0)?, storage(method, node)?],
            )),
            OpCode::Stloc => Some(Fact::new(
                "StlocStm",
                vec![storage(method, node)?, pop(node, 0)?],
            )),
            OpCode::Ldloca => Some(Fact::new(
                "LdlocaStm",
                vec![push(node, 0)?, storage(method, node)?],
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
    fn loads_and_stores() {
        let mut b = MethodBodyBuilder::new("M");
        b.local("line")
            .ldstr("x")
            .stloc(0)
            .ldloc(0)
            .pop()
            .ldloca(1)
            .pop()
            .ret();
        let method = analyzed(&b);
        assert_eq!(
            render(&LocalsGenerator, &method),
            vec![
                r#"StlocStm("M#line", "M#st0")."#,
                r#"LdlocStm("M#st0", "M#line")."#,
                r#"LdlocaStm("M#st0", "M#loc1")."#,
            ]
        );
    }

    #[test]
    fn unannotated_nodes_are_declined() {
        let mut b = MethodBodyBuilder::new("M");
        b.ldloc(0).pop().ret();
        let method = Method::build(&b.build().unwrap()).unwrap();
        assert!(render(&LocalsGenerator, &method).is_empty());
    }
}
