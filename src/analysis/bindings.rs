//! Stable names for locals, arguments and fields.
//!
//! Stack slot names identify values; bindings identify storage. [`BindingResolver`] gives
//! every node that reads, writes or takes the address of a storage location the name of
//! that location, so that a store in one block and a load in another meet in the fact
//! output:
//!
//! | Storage | Binding |
//! |---------|---------|
//! | Local `i` | `<method>#<debug name>` or `<method>#loc<i>` |
//! | Argument `i` | `<method>#this`, `<method>#<parameter name>` or `<method>#arg<i>` |
//! | Field | the field's full name |
//!
//! Both macro forms (`ldloc.1`) and explicit forms (`ldloc.s 1`) resolve to the same
//! binding, so the resolver can run before or after short-form normalization.

use crate::{
    analysis::Pass,
    assembly::{OpCode, Operand},
    ir::{Method, NodeRef, Visitor},
    Error, Result,
};

/// Visitor pass assigning storage bindings.
#[derive(Debug, Default)]
pub struct BindingResolver {
    bound: usize,
}

impl BindingResolver {
    /// Creates a binding resolver.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of nodes bound by the last run.
    #[must_use]
    pub fn bound(&self) -> usize {
        self.bound
    }

    fn resolve(method: &Method, at: NodeRef) -> Result<Option<String>> {
        let node = method.node(at)?;
        let Some(opcode) = node.opcode() else {
            return Ok(None);
        };

        let binding = match opcode.long_form() {
            OpCode::Ldloc | OpCode::Stloc | OpCode::Ldloca => {
                let index = node.local_index().ok_or_else(|| missing(method, at, opcode))?;
                format!("{}#{}", method.name(), method.local_name(index))
            }
            OpCode::Ldarg | OpCode::Starg | OpCode::Ldarga => {
                let index = node.argument_index().ok_or_else(|| missing(method, at, opcode))?;
                format!("{}#{}", method.name(), method.argument_name(index))
            }
            OpCode::Ldfld
            | OpCode::Ldflda
            | OpCode::Stfld
            | OpCode::Ldsfld
            | OpCode::Ldsflda
            | OpCode::Stsfld => match node.operand() {
                Some(Operand::Field(name)) => name.clone(),
                _ => return Err(missing(method, at, opcode)),
            },
            _ => return Ok(None),
        };
        Ok(Some(binding))
    }
}

fn missing(method: &Method, at: NodeRef, opcode: OpCode) -> Error {
    let node = method.node(at).ok();
    Error::Classifier {
        method: method.name().to_string(),
        offset: node.and_then(|node| node.offset()).unwrap_or_default(),
        mnemonic: opcode.mnemonic(),
        message: format!(
            "cannot resolve the storage location from operand `{}`",
            node.and_then(|node| node.operand())
                .map(ToString::to_string)
                .unwrap_or_default()
        ),
    }
}

impl Visitor for BindingResolver {
    fn visit_node(&mut self, method: &mut Method, at: NodeRef) -> Result<()> {
        if let Some(binding) = Self::resolve(method, at)? {
            log::trace!("{}: {} bound to {}", method.name(), at, binding);
            method.node_mut(at)?.set_binding(binding);
            self.bound += 1;
        }
        Ok(())
    }
}

impl Pass for BindingResolver {
    fn name(&self) -> &'static str {
        "binding-resolver"
    }

    fn description(&self) -> &'static str {
        "Names the local, argument or field accessed by each storage instruction"
    }

    fn run_on_method(&self, method: &mut Method) -> Result<bool> {
        let mut resolver = BindingResolver::new();
        resolver.visit_method(method)?;
        Ok(resolver.bound > 0)
    }
}
