//! Stack-effect classification.
//!
//! Every CIL opcode belongs to one ECMA-335 stack-behaviour category for the values it pops
//! and one for the values it pushes. The fixed-arity categories translate directly into
//! counts; the variable-arity ones are sized from the operand:
//!
//! | Opcode | Pops | Pushes |
//! |--------|------|--------|
//! | `call`, `callvirt`, `calli` | parameters + receiver | 0 if the callee is `void`, else 1 |
//! | `newobj` | parameters | 1 (the new object) |
//! | `ret` | 1 if the analysed method returns a value, else 0 | 0 |
//!
//! `leave` and `leave.s` empty the evaluation stack; they are modelled as popping nothing.
//!
//! Classification is a pure function of the opcode, operand and the analysed method's
//! return flag. It never looks at analysis state.
//!
//! # Examples
//!
//! ```rust
//! use scil::{
//!     analysis::{stack_effect, StackEffect},
//!     assembly::{MethodRef, OpCode, Operand},
//! };
//!
//! let append = MethodRef::new("System.Text.StringBuilder::Insert(System.Int32,System.String)", 2)
//!     .with_this();
//! let effect = stack_effect(OpCode::Callvirt, &Operand::Method(append), false)?;
//! assert_eq!(effect, StackEffect::new(3, 1));
//!
//! assert_eq!(stack_effect(OpCode::StelemRef, &Operand::None, false)?, StackEffect::new(3, 0));
//! # Ok::<(), scil::Error>(())
//! ```

use std::fmt;

use crate::{
    assembly::{OpCode, Operand, StackBehavior},
    ir::Node,
    Error, Result,
};

/// The number of values an instruction pops and pushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StackEffect {
    /// Number of values consumed
    pub pops: usize,
    /// Number of values produced
    pub pushes: usize,
}

impl StackEffect {
    /// No pops, no pushes.
    pub const NONE: StackEffect = StackEffect { pops: 0, pushes: 0 };

    /// Creates a stack effect.
    #[must_use]
    pub const fn new(pops: usize, pushes: usize) -> Self {
        StackEffect { pops, pushes }
    }

    /// Returns the change in stack depth.
    #[must_use]
    pub fn net_effect(&self) -> isize {
        isize::try_from(self.pushes).unwrap_or(isize::MAX)
            - isize::try_from(self.pops).unwrap_or(isize::MAX)
    }
}

impl fmt::Display for StackEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-{} +{}", self.pops, self.pushes)
    }
}

/// Computes the stack effect of `opcode` with `operand`.
///
/// `returns_value` is the return flag of the method being analysed and only matters for
/// `ret`.
///
/// # Errors
///
/// Returns [`Error::Classifier`] when a call-like opcode has no method reference operand,
/// or when a variable-arity category appears on an opcode without a sizing rule. The error
/// carries no method location; callers that know it attach it.
pub fn stack_effect(opcode: OpCode, operand: &Operand, returns_value: bool) -> Result<StackEffect> {
    match opcode {
        OpCode::Call | OpCode::Callvirt | OpCode::Calli => {
            let callee = callee(opcode, operand)?;
            Ok(StackEffect::new(
                callee.argument_count(),
                usize::from(!callee.returns_void),
            ))
        }
        OpCode::Newobj => {
            let constructor = callee(opcode, operand)?;
            Ok(StackEffect::new(constructor.parameter_count, 1))
        }
        OpCode::Ret => Ok(StackEffect::new(usize::from(returns_value), 0)),
        _ => {
            let pops = fixed_count(opcode, opcode.pop_behavior())?;
            let pushes = fixed_count(opcode, opcode.push_behavior())?;
            Ok(StackEffect::new(pops, pushes))
        }
    }
}

/// Computes the stack effect of `node` inside the method `method_name`.
///
/// Phi nodes have no stack effect.
///
/// # Errors
///
/// Returns [`Error::Classifier`] located at the node's offset, see [`stack_effect`].
pub fn classify(method_name: &str, returns_value: bool, node: &Node) -> Result<StackEffect> {
    let (Some(opcode), Some(operand)) = (node.opcode(), node.operand()) else {
        return Ok(StackEffect::NONE);
    };
    stack_effect(opcode, operand, returns_value)
        .map_err(|error| error.located(method_name, node.offset().unwrap_or_default()))
}

fn callee(opcode: OpCode, operand: &Operand) -> Result<&crate::assembly::MethodRef> {
    operand.as_method().ok_or_else(|| Error::Classifier {
        method: String::new(),
        offset: 0,
        mnemonic: opcode.mnemonic(),
        message: format!("expected a method reference operand, found `{operand:?}`"),
    })
}

fn fixed_count(opcode: OpCode, behavior: StackBehavior) -> Result<usize> {
    behavior.count().ok_or_else(|| Error::Classifier {
        method: String::new(),
        offset: 0,
        mnemonic: opcode.mnemonic(),
        message: format!("no sizing rule for {behavior:?}"),
    })
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;
    use crate::{
        assembly::{Immediate, Instruction, MethodRef},
        ir::{NodeId, NodeKind},
    };

    #[test]
    fn fixed_categories() {
        let cases = [
            (OpCode::Nop, 0, 0),
            (OpCode::Ldloc0, 0, 1),
            (OpCode::Stloc, 1, 0),
            (OpCode::Add, 2, 1),
            (OpCode::Dup, 1, 2),
            (OpCode::Stfld, 2, 0),
            (OpCode::Ldfld, 1, 1),
            (OpCode::StelemI8, 3, 0),
            (OpCode::Cpblk, 3, 0),
            (OpCode::Leave, 0, 0),
            (OpCode::Throw, 1, 0),
            (OpCode::Ceq, 2, 1),
            (OpCode::Switch, 1, 0),
            (OpCode::Endfilter, 1, 0),
        ];
        for (opcode, pops, pushes) in cases {
            assert_eq!(
                stack_effect(opcode, &Operand::None, false).unwrap(),
                StackEffect::new(pops, pushes),
                "{opcode}"
            );
        }
    }

    #[test]
    fn operand_does_not_change_fixed_categories() {
        let operands = [
            Operand::None,
            Operand::Immediate(Immediate::Int32(3)),
            Operand::String("x".into()),
            Operand::Local(9),
        ];
        for opcode in OpCode::iter().filter(|op| !op.is_call() && *op != OpCode::Newobj) {
            let first = stack_effect(opcode, &operands[0], true).unwrap();
            for operand in &operands[1..] {
                assert_eq!(stack_effect(opcode, operand, true).unwrap(), first, "{opcode}");
            }
        }
    }

    #[test]
    fn call_family() {
        let instance = Operand::Method(MethodRef::new("A::F(int32,int32)", 2).with_this());
        assert_eq!(stack_effect(OpCode::Call, &instance, false).unwrap(), StackEffect::new(3, 1));

        let void_static = Operand::Method(MethodRef::new("A::G(int32)", 1).returning_void());
        assert_eq!(stack_effect(OpCode::Call, &void_static, false).unwrap(), StackEffect::new(1, 0));

        let ctor = Operand::Method(MethodRef::new("A::.ctor(int32)", 1).with_this().returning_void());
        assert_eq!(stack_effect(OpCode::Newobj, &ctor, false).unwrap(), StackEffect::new(1, 1));
    }

    #[test]
    fn ret_depends_on_method_signature() {
        assert_eq!(stack_effect(OpCode::Ret, &Operand::None, false).unwrap(), StackEffect::NONE);
        assert_eq!(stack_effect(OpCode::Ret, &Operand::None, true).unwrap(), StackEffect::new(1, 0));
    }

    #[test]
    fn malformed_call_operand() {
        let error = stack_effect(OpCode::Callvirt, &Operand::Field("x".into()), false).unwrap_err();
        assert!(matches!(error, Error::Classifier { mnemonic: "callvirt", .. }));
    }

    #[test]
    fn classify_locates_errors() {
        let node = Node::new(
            NodeId::new(0),
            NodeKind::Instruction(Instruction::new(0x12, OpCode::Call, Operand::None)),
        );
        let error = classify("Program::Main()", false, &node).unwrap_err();
        assert!(matches!(
            error,
            Error::Classifier { ref method, offset: 0x12, .. } if method == "Program::Main()"
        ));
    }

    #[test]
    fn net_effect() {
        assert_eq!(StackEffect::new(3, 1).net_effect(), -2);
        assert_eq!(StackEffect::new(1, 2).to_string(), "-1 +2");
    }
}
