//! Basic blocks of the analysis IR.

use std::fmt;

use crate::{assembly::HandlerKind, ir::Node};

/// Index of a block within its method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(usize);

impl BlockId {
    /// Creates a block id from a raw index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        BlockId(index)
    }

    /// Returns the raw index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// A basic block: a maximal straight-line run of nodes with a single entry and exit.
///
/// Edges are stored as [`BlockId`] lists in both directions. Predecessors are ordered
/// fall-through first, then branch sources in block order. The block keeps a revision
/// counter that every splice bumps, which lets the visitor framework notice that the node
/// list changed under it.
#[derive(Debug, Clone)]
pub struct Block {
    id: BlockId,
    offset: u32,
    nodes: Vec<Node>,
    sources: Vec<BlockId>,
    targets: Vec<BlockId>,
    handler: Option<HandlerKind>,
    revision: u64,
    entry_depth: Option<usize>,
    exit_depth: Option<usize>,
}

impl Block {
    pub(crate) fn new(id: BlockId, offset: u32, nodes: Vec<Node>) -> Self {
        Block {
            id,
            offset,
            nodes,
            sources: Vec::new(),
            targets: Vec::new(),
            handler: None,
            revision: 0,
            entry_depth: None,
            exit_depth: None,
        }
    }

    /// Returns the block id.
    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    /// Returns the offset of the block's first decoded instruction.
    #[must_use]
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Returns the nodes in execution order.
    #[must_use]
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Returns the node at `index`.
    #[must_use]
    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// Returns the node at `index` mutably.
    pub fn node_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.nodes.get_mut(index)
    }

    /// Returns the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if every node was removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the predecessors, fall-through first.
    #[must_use]
    pub fn sources(&self) -> &[BlockId] {
        &self.sources
    }

    /// Returns the successors in branch-operand order, fall-through last.
    #[must_use]
    pub fn targets(&self) -> &[BlockId] {
        &self.targets
    }

    /// Returns the kind of exception handler code that starts this block, if any.
    #[must_use]
    pub fn handler(&self) -> Option<HandlerKind> {
        self.handler
    }

    /// Returns the splice revision.
    #[must_use]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Returns the stack depth on entry, once the stack analyzer has visited the block.
    #[must_use]
    pub fn entry_depth(&self) -> Option<usize> {
        self.entry_depth
    }

    /// Returns the stack depth on exit, once the stack analyzer has visited the block.
    #[must_use]
    pub fn exit_depth(&self) -> Option<usize> {
        self.exit_depth
    }

    pub(crate) fn set_entry_depth(&mut self, depth: Option<usize>) {
        self.entry_depth = depth;
    }

    pub(crate) fn set_exit_depth(&mut self, depth: Option<usize>) {
        self.exit_depth = depth;
    }

    pub(crate) fn set_handler(&mut self, handler: HandlerKind) {
        self.handler = Some(handler);
    }

    pub(crate) fn add_source(&mut self, source: BlockId) {
        if !self.sources.contains(&source) {
            self.sources.push(source);
        }
    }

    pub(crate) fn add_target(&mut self, target: BlockId) {
        if !self.targets.contains(&target) {
            self.targets.push(target);
        }
    }

    /// Replaces `remove` nodes starting at `index` with `nodes` in one splice.
    pub(crate) fn splice(&mut self, index: usize, remove: usize, nodes: Vec<Node>) {
        self.nodes.splice(index..index + remove, nodes);
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{Instruction, OpCode, Operand},
        ir::{NodeId, NodeKind},
    };

    fn nop(id: u32) -> Node {
        Node::new(
            NodeId::new(id),
            NodeKind::Instruction(Instruction::new(id, OpCode::Nop, Operand::None)),
        )
    }

    #[test]
    fn splice_bumps_revision() {
        let mut block = Block::new(BlockId::new(0), 0, vec![nop(0), nop(1), nop(2)]);
        assert_eq!(block.revision(), 0);
        block.splice(1, 1, vec![nop(10), nop(11)]);
        assert_eq!(block.revision(), 1);
        let ids: Vec<u32> = block.nodes().iter().map(|n| n.id().index()).collect();
        assert_eq!(ids, vec![0, 10, 11, 2]);
        block.splice(0, 1, Vec::new());
        assert_eq!(block.len(), 3);
        assert_eq!(block.revision(), 2);
    }

    #[test]
    fn edges_are_deduplicated() {
        let mut block = Block::new(BlockId::new(3), 0, Vec::new());
        block.add_source(BlockId::new(2));
        block.add_source(BlockId::new(0));
        block.add_source(BlockId::new(2));
        assert_eq!(block.sources(), &[BlockId::new(2), BlockId::new(0)]);
        assert!(block.is_empty());
    }
}
