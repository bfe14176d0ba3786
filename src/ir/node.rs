//! Instruction nodes: decoded instructions plus their mutable analysis state.
//!
//! A [`Node`] wraps either one decoded [`Instruction`] or a synthetic [`PhiNode`]. On top of
//! the immutable instruction it carries:
//!
//! - an optional opcode and operand override, written by rewriting passes,
//! - the ordered symbolic names of the values it pops and pushes, written by the stack
//!   analyzer,
//! - an optional binding, the stable name of the local, argument or field it touches.
//!
//! Nodes are owned by exactly one [`crate::ir::Block`] and are addressed from the outside by
//! their method-unique [`NodeId`].

use std::{fmt, sync::Arc};

use crate::assembly::{Instruction, OpCode, Operand};

/// Identifier of a node, unique within its method.
///
/// Ids of decoded instructions follow instruction order; synthetic nodes (phis, rewriter
/// output) receive fresh ids from [`crate::ir::Method::new_node`] and friends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    /// Creates a node id from a raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        NodeId(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A symbolic evaluation stack slot.
///
/// The slot is the stack depth at which a value lives; the scope is the identity of the
/// method, so rendered names are unique across a whole program.
///
/// # Examples
///
/// ```rust
/// use scil::ir::StackName;
///
/// let name = StackName::new("Program::Main()".into(), 2);
/// assert_eq!(name.slot(), 2);
/// assert_eq!(name.to_string(), "Program::Main()#st2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackName {
    scope: Arc<str>,
    slot: usize,
}

impl StackName {
    /// Creates the name of `slot` within `scope`.
    #[must_use]
    pub fn new(scope: Arc<str>, slot: usize) -> Self {
        StackName { scope, slot }
    }

    /// Returns the stack depth this name refers to.
    #[must_use]
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Returns the method scope of this name.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }
}

impl fmt::Display for StackName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#st{}", self.scope, self.slot)
    }
}

/// A synthetic merge of one stack value reaching a join along several paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhiNode {
    parents: Vec<NodeId>,
}

impl PhiNode {
    /// Creates a phi over the producers `parents`.
    #[must_use]
    pub fn new(parents: Vec<NodeId>) -> Self {
        PhiNode { parents }
    }

    /// Returns the nodes whose last pushed value this phi merges.
    #[must_use]
    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }
}

/// What a node stands for.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// A decoded instruction
    Instruction(Instruction),
    /// A phi merge inserted by analysis
    Phi(PhiNode),
}

/// One node of the analysis IR.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    override_opcode: Option<OpCode>,
    override_operand: Option<Operand>,
    pop_names: Vec<StackName>,
    push_names: Vec<StackName>,
    binding: Option<String>,
}

impl Node {
    pub(crate) fn new(id: NodeId, kind: NodeKind) -> Self {
        Node {
            id,
            kind,
            override_opcode: None,
            override_operand: None,
            pop_names: Vec::new(),
            push_names: Vec::new(),
            binding: None,
        }
    }

    /// Returns the node id.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Returns what this node stands for.
    #[must_use]
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Returns the decoded instruction, `None` for phi nodes.
    #[must_use]
    pub fn instruction(&self) -> Option<&Instruction> {
        match &self.kind {
            NodeKind::Instruction(instruction) => Some(instruction),
            NodeKind::Phi(_) => None,
        }
    }

    /// Returns the phi payload, `None` for instruction nodes.
    #[must_use]
    pub fn phi(&self) -> Option<&PhiNode> {
        match &self.kind {
            NodeKind::Phi(phi) => Some(phi),
            NodeKind::Instruction(_) => None,
        }
    }

    /// Returns `true` for phi nodes.
    #[must_use]
    pub fn is_phi(&self) -> bool {
        matches!(self.kind, NodeKind::Phi(_))
    }

    /// Returns the offset of the decoded instruction.
    #[must_use]
    pub fn offset(&self) -> Option<u32> {
        self.instruction().map(|instruction| instruction.offset)
    }

    /// Returns the effective opcode: the override if one is set, else the decoded opcode.
    #[must_use]
    pub fn opcode(&self) -> Option<OpCode> {
        self.override_opcode
            .or_else(|| self.instruction().map(|instruction| instruction.opcode))
    }

    /// Returns the effective operand: the override if one is set, else the decoded operand.
    #[must_use]
    pub fn operand(&self) -> Option<&Operand> {
        self.override_operand
            .as_ref()
            .or_else(|| self.instruction().map(|instruction| &instruction.operand))
    }

    /// Overrides the opcode seen by later passes and generators.
    pub fn set_override_opcode(&mut self, opcode: OpCode) {
        self.override_opcode = Some(opcode);
    }

    /// Overrides the operand seen by later passes and generators.
    pub fn set_override_operand(&mut self, operand: Operand) {
        self.override_operand = Some(operand);
    }

    /// Returns `true` if a rewrite has overridden the opcode or operand.
    #[must_use]
    pub fn is_rewritten(&self) -> bool {
        self.override_opcode.is_some() || self.override_operand.is_some()
    }

    /// Returns the names of the consumed values, deepest stack slot first.
    #[must_use]
    pub fn pop_names(&self) -> &[StackName] {
        &self.pop_names
    }

    /// Returns the names of the produced values, in push order.
    #[must_use]
    pub fn push_names(&self) -> &[StackName] {
        &self.push_names
    }

    /// Replaces the consumed-value names.
    pub fn set_pop_names(&mut self, names: Vec<StackName>) {
        self.pop_names = names;
    }

    /// Replaces the produced-value names.
    pub fn set_push_names(&mut self, names: Vec<StackName>) {
        self.push_names = names;
    }

    /// Returns the stable name of the local, argument or field this node accesses.
    #[must_use]
    pub fn binding(&self) -> Option<&str> {
        self.binding.as_deref()
    }

    /// Sets the binding.
    pub fn set_binding(&mut self, binding: impl Into<String>) {
        self.binding = Some(binding.into());
    }

    /// Returns the local variable index accessed by an `ldloc`, `stloc` or `ldloca` form.
    #[must_use]
    pub fn local_index(&self) -> Option<u16> {
        let opcode = self.opcode()?;
        if !matches!(
            opcode.long_form(),
            OpCode::Ldloc | OpCode::Stloc | OpCode::Ldloca
        ) {
            return None;
        }
        opcode
            .implicit_index()
            .or_else(|| self.operand().and_then(Operand::as_index))
    }

    /// Returns the argument index accessed by an `ldarg`, `starg` or `ldarga` form.
    #[must_use]
    pub fn argument_index(&self) -> Option<u16> {
        let opcode = self.opcode()?;
        if !matches!(
            opcode.long_form(),
            OpCode::Ldarg | OpCode::Starg | OpCode::Ldarga
        ) {
            return None;
        }
        opcode
            .implicit_index()
            .or_else(|| self.operand().and_then(Operand::as_index))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Phi(phi) => {
                write!(f, "{}: phi(", self.id)?;
                for (i, parent) in phi.parents().iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{parent}")?;
                }
                f.write_str(")")?;
            }
            NodeKind::Instruction(instruction) => {
                write!(f, "{}: IL_{:04x}: ", self.id, instruction.offset)?;
                if let Some(opcode) = self.opcode() {
                    write!(f, "{opcode}")?;
                }
                if let Some(operand) = self.operand().filter(|op| **op != Operand::None) {
                    write!(f, " {operand}")?;
                }
            }
        }

        if !self.pop_names.is_empty() || !self.push_names.is_empty() {
            f.write_str("  [")?;
            write_names(f, &self.pop_names)?;
            f.write_str(" -> ")?;
            write_names(f, &self.push_names)?;
            f.write_str("]")?;
        }
        if let Some(binding) = &self.binding {
            write!(f, "  @{binding}")?;
        }
        Ok(())
    }
}

fn write_names(f: &mut fmt::Formatter<'_>, names: &[StackName]) -> fmt::Result {
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "st{}", name.slot())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::Immediate;

    fn node(opcode: OpCode, operand: Operand) -> Node {
        Node::new(
            NodeId::new(0),
            NodeKind::Instruction(Instruction::new(4, opcode, operand)),
        )
    }

    #[test]
    fn overrides_take_precedence() {
        let mut n = node(OpCode::LdcI4S, Operand::Immediate(Immediate::Int8(9)));
        assert!(!n.is_rewritten());
        n.set_override_opcode(OpCode::LdcI4);
        n.set_override_operand(Operand::Immediate(Immediate::Int32(9)));
        assert_eq!(n.opcode(), Some(OpCode::LdcI4));
        assert_eq!(n.operand(), Some(&Operand::Immediate(Immediate::Int32(9))));
        assert_eq!(n.instruction().map(|i| i.opcode), Some(OpCode::LdcI4S));
        assert!(n.is_rewritten());
    }

    #[test]
    fn local_and_argument_indices() {
        assert_eq!(node(OpCode::Stloc2, Operand::None).local_index(), Some(2));
        assert_eq!(node(OpCode::LdlocaS, Operand::Local(12)).local_index(), Some(12));
        assert_eq!(node(OpCode::Ldarg1, Operand::None).argument_index(), Some(1));
        assert_eq!(node(OpCode::Ldarg1, Operand::None).local_index(), None);
        assert_eq!(node(OpCode::Stloc, Operand::None).local_index(), None);
    }

    #[test]
    fn phi_has_no_opcode() {
        let phi = Node::new(NodeId::new(7), NodeKind::Phi(PhiNode::new(vec![NodeId::new(1)])));
        assert!(phi.is_phi());
        assert_eq!(phi.opcode(), None);
        assert_eq!(phi.offset(), None);
        assert_eq!(phi.to_string(), "n7: phi(n1)");
    }

    #[test]
    fn display_with_annotations() {
        let mut n = node(OpCode::Add, Operand::None);
        let scope: Arc<str> = "M".into();
        n.set_pop_names(vec![StackName::new(scope.clone(), 0), StackName::new(scope.clone(), 1)]);
        n.set_push_names(vec![StackName::new(scope, 0)]);
        assert_eq!(n.to_string(), "n0: IL_0004: add  [st0, st1 -> st0]");
    }
}
