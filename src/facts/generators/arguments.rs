use crate::{
    assembly::OpCode,
    facts::{
        generators::{long_opcode, pop, push, storage, FactGenerator},
        Fact,
    },
    ir::{Method, Node},
};

/// Facts for argument loads, stores and address loads.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArgumentsGenerator;

impl FactGenerator for ArgumentsGenerator {
    fn name(&self) -> &'static str {
        "arguments"
    }

    fn try_generate(&self, method: &Method, node: &Node) -> Option<Fact> {
        match long_opcode(node)? {
            OpCode::Ldarg => Some(Fact::new(
                "LdargStm",
                vec![push(node, 0)?, storage(method, node)?],
            )),
            OpCode::Starg => Some(Fact::new(
                "StargStm",
                vec![storage(method, node)?, pop(node, 0)?],
            )),
            OpCode::Ldarga => Some(Fact::new(
                "LdargaStm",
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
    fn receiver_and_parameters() {
        let mut b = MethodBodyBuilder::new("C::Set(string)");
        b.with_this()
            .parameter("value")
            .ldarg(0)
            .pop()
            .ldarg(1)
            .starg(1)
            .emit(OpCode::LdargaS, crate::assembly::Operand::Argument(1))
            .pop()
            .ret();
        let method = analyzed(&b);
        assert_eq!(
            render(&ArgumentsGenerator, &method),
            vec![
                r#"LdargStm("C::Set(string)#st0", "C::Set(string)#this")."#,
                r#"LdargStm("C::Set(string)#st0", "C::Set(string)#value")."#,
                r#"StargStm("C::Set(string)#value", "C::Set(string)#st0")."#,
                r#"LdargaStm("C::Set(string)#st0", "C::Set(string)#value")."#,
            ]
        );
    }
}
