use crate::{
    analysis::stack_effect,
    assembly::OpCode,
    facts::{
        generators::{long_opcode, push, FactGenerator},
        Fact, FactArg,
    },
    ir::{Method, Node},
};

/// Facts for calls and object construction.
///
/// The callee is named by its full signature. Arguments are listed deepest first, so the
/// receiver of an instance call comes before the declared parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallsGenerator;

impl FactGenerator for CallsGenerator {
    fn name(&self) -> &'static str {
        "calls"
    }

    fn try_generate(&self, method: &Method, node: &Node) -> Option<Fact> {
        let opcode = long_opcode(node)?;
        if !opcode.is_call() && opcode != OpCode::Newobj {
            return None;
        }
        let operand = node.operand()?;
        let callee = operand.as_method()?;
        let effect = stack_effect(opcode, operand, method.returns_value()).ok()?;
        if node.pop_names().len() != effect.pops || node.push_names().len() != effect.pushes {
            return None;
        }

        let fact = if opcode == OpCode::Newobj {
            Fact::new(
                "NewobjStm",
                vec![
                    FactArg::symbol(callee.name.as_str()),
                    FactArg::names(node.pop_names()),
                    push(node, 0)?,
                ],
            )
        } else {
            Fact::new(
                "CallStm",
                vec![
                    FactArg::symbol(callee.name.as_str()),
                    FactArg::names(node.pop_names()),
                    FactArg::names(node.push_names()),
                ],
            )
        };
        Some(fact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{MethodBodyBuilder, MethodRef},
        facts::generators::test_support::*,
    };

    #[test]
    fn static_and_instance_calls() {
        let mut b = MethodBodyBuilder::new("M");
        b.call(MethodRef::new("System.Console::ReadLine()", 0))
            .ldstr("x")
            .ldc_i4(1)
            .callvirt(MethodRef::new("System.String::Insert(int32,string)", 2).with_this())
            .call(MethodRef::new("System.Console::WriteLine(string)", 1).returning_void())
            .ret();
        let method = analyzed(&b);
        assert_eq!(
            render(&CallsGenerator, &method),
            vec![
                r#"CallStm("System.Console::ReadLine()", [], ["M#st0"])."#,
                r#"CallStm("System.String::Insert(int32,string)", ["M#st0", "M#st1", "M#st2"], ["M#st0"])."#,
                r#"CallStm("System.Console::WriteLine(string)", ["M#st0"], [])."#,
            ]
        );
    }

    #[test]
    fn constructors() {
        let mut b = MethodBodyBuilder::new("M");
        b.ldstr("path")
            .newobj(
                MethodRef::new("System.IO.FileInfo::.ctor(string)", 1)
                    .with_this()
                    .returning_void(),
            )
            .pop()
            .ret();
        let method = analyzed(&b);
        assert_eq!(
            render(&CallsGenerator, &method),
            vec![r#"NewobjStm("System.IO.FileInfo::.ctor(string)", ["M#st0"], "M#st0")."#]
        );
    }
}
