//! Methods of the analysis IR and control flow graph construction.
//!
//! [`Method::build`] turns a decoded [`MethodBody`] into an ordered list of [`Block`]s. The
//! block structure is computed once; later passes may replace nodes inside blocks but never
//! re-segment the method.
//!
//! # Block Boundaries
//!
//! A new block starts at:
//!
//! - the first instruction,
//! - every branch target, including every `switch` and `leave` target,
//! - the instruction after any branch, return, throw, `leave`, `endfinally`, `endfilter`
//!   or `jmp`,
//! - every try start, try end, filter start, handler start and handler end.
//!
//! # Edges
//!
//! Successors are listed in branch-operand order with the fall-through successor last.
//! Predecessors are listed fall-through first, then branch sources in block order. Both
//! lists are free of duplicates.
//!
//! # Examples
//!
//! ```rust
//! use scil::{assembly::MethodBodyBuilder, ir::{BlockId, Method}};
//!
//! let mut builder = MethodBodyBuilder::new("Program::Abs(System.Int32)");
//! builder
//!     .parameter("x")
//!     .returning_value()
//!     .ldarg(0)
//!     .ldc_i4(0)
//!     .branch(scil::assembly::OpCode::Bge, "positive")
//!     .ldarg(0)
//!     .op(scil::assembly::OpCode::Neg)
//!     .ret()
//!     .label("positive")
//!     .ldarg(0)
//!     .ret();
//!
//! let method = Method::build(&builder.build()?)?;
//! assert_eq!(method.block_count(), 3);
//! assert_eq!(method.blocks()[0].targets(), &[BlockId::new(2), BlockId::new(1)]);
//! assert_eq!(method.blocks()[2].sources(), &[BlockId::new(0)]);
//! # Ok::<(), scil::Error>(())
//! ```

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    sync::Arc,
};

use crate::{
    assembly::{
        ExceptionHandler, HandlerKind, Instruction, LocalVariable, MethodBody, OpCode,
        Parameter,
    },
    ir::{Block, BlockId, Node, NodeId, NodeKind, PhiNode},
    Error, Result,
};

/// Position of a node: its block and its index inside the block.
///
/// A reference is only valid until the next splice of its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef {
    /// Containing block
    pub block: BlockId,
    /// Index within the block
    pub index: usize,
}

impl NodeRef {
    /// Creates a node reference.
    #[must_use]
    pub const fn new(block: BlockId, index: usize) -> Self {
        NodeRef { block, index }
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.block, self.index)
    }
}

/// One method of the analysis IR: its control flow graph plus signature information.
#[derive(Debug, Clone)]
pub struct Method {
    name: Arc<str>,
    module: String,
    has_this: bool,
    returns_value: bool,
    parameters: Vec<Parameter>,
    locals: Vec<LocalVariable>,
    handlers: Vec<ExceptionHandler>,
    handler_entries: HashMap<u32, HandlerKind>,
    blocks: Vec<Block>,
    next_id: u32,
}

impl Method {
    /// Builds the control flow graph of `body`.
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyMethod`] if the body has no instructions
    /// - [`Error::Construction`] if offsets are not strictly increasing or a branch has no
    ///   target operand
    /// - [`Error::InvalidBranchTarget`] if a branch targets a non-instruction offset
    /// - [`Error::InvalidHandler`] if a handler boundary is not an instruction offset
    /// - [`Error::FallThroughEnd`] if the last instruction lets control fall through
    pub fn build(body: &MethodBody) -> Result<Self> {
        let name = body.name.as_str();
        let instructions = &body.instructions;
        let Some(last) = instructions.last() else {
            return Err(Error::EmptyMethod(body.name.clone()));
        };

        let mut index_of = HashMap::with_capacity(instructions.len());
        let mut previous: Option<u32> = None;
        for (index, instruction) in instructions.iter().enumerate() {
            if previous.is_some_and(|offset| instruction.offset <= offset) {
                return Err(construction_error!(
                    name,
                    instruction.offset,
                    "instruction offsets are not strictly increasing"
                ));
            }
            previous = Some(instruction.offset);
            index_of.insert(instruction.offset, index);
        }

        let mut leaders = BTreeSet::from([0usize]);
        for (index, instruction) in instructions.iter().enumerate() {
            let targets = instruction.targets();
            if instruction.is_branch()
                && targets.is_empty()
                && instruction.opcode != OpCode::Switch
            {
                return Err(construction_error!(
                    name,
                    instruction.offset,
                    "`{}` has no branch target operand",
                    instruction.opcode
                ));
            }
            for target in targets {
                let Some(&target_index) = index_of.get(&target) else {
                    return Err(Error::InvalidBranchTarget {
                        method: body.name.clone(),
                        offset: instruction.offset,
                        target,
                    });
                };
                leaders.insert(target_index);
            }
            if instruction.flow_type().ends_block() && index + 1 < instructions.len() {
                leaders.insert(index + 1);
            }
        }

        let code_end = body.code_size();
        let mut handler_entries = HashMap::new();
        for handler in &body.exception_handlers {
            for boundary in handler.boundaries() {
                if boundary == code_end {
                    continue;
                }
                let Some(&index) = index_of.get(&boundary) else {
                    return Err(Error::InvalidHandler {
                        method: body.name.clone(),
                        offset: boundary,
                    });
                };
                leaders.insert(index);
            }
            for (offset, kind) in handler.entry_points() {
                handler_entries.insert(offset, kind);
            }
        }

        if last.flow_type().falls_through() {
            return Err(Error::FallThroughEnd {
                method: body.name.clone(),
                offset: last.offset,
            });
        }

        let starts: Vec<usize> = leaders.into_iter().collect();
        let mut next_id = 0u32;
        let mut blocks = Vec::with_capacity(starts.len());
        let mut block_at = HashMap::with_capacity(starts.len());
        for (position, &start) in starts.iter().enumerate() {
            let end = starts.get(position + 1).copied().unwrap_or(instructions.len());
            let nodes = instructions[start..end]
                .iter()
                .map(|instruction| {
                    let node = Node::new(
                        NodeId::new(next_id),
                        NodeKind::Instruction(instruction.clone()),
                    );
                    next_id += 1;
                    node
                })
                .collect();
            let offset = instructions[start].offset;
            let mut block = Block::new(BlockId::new(position), offset, nodes);
            if let Some(kind) = handler_entries.get(&offset) {
                block.set_handler(*kind);
            }
            block_at.insert(offset, BlockId::new(position));
            blocks.push(block);
        }

        let mut falls_into_next = vec![false; blocks.len()];
        for position in 0..starts.len() {
            let end = starts.get(position + 1).copied().unwrap_or(instructions.len());
            let terminator: &Instruction = &instructions[end - 1];
            for target in terminator.targets() {
                if let Some(&target_block) = block_at.get(&target) {
                    blocks[position].add_target(target_block);
                }
            }
            if terminator.flow_type().falls_through() && position + 1 < blocks.len() {
                blocks[position].add_target(BlockId::new(position + 1));
                falls_into_next[position] = true;
            }
        }

        for position in 1..blocks.len() {
            if falls_into_next[position - 1] {
                blocks[position].add_source(BlockId::new(position - 1));
            }
        }
        for position in 0..blocks.len() {
            let targets = blocks[position].targets().to_vec();
            for target in targets {
                blocks[target.index()].add_source(BlockId::new(position));
            }
        }

        log::trace!("{name}: {} instructions in {} blocks", instructions.len(), blocks.len());

        Ok(Method {
            name: Arc::from(name),
            module: body.module.clone(),
            has_this: body.has_this,
            returns_value: body.returns_value,
            parameters: body.parameters.clone(),
            locals: body.locals.clone(),
            handlers: body.exception_handlers.clone(),
            handler_entries,
            blocks,
            next_id,
        })
    }

    /// Returns the method identity.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the shared method identity used as the scope of stack names.
    #[must_use]
    pub fn scope(&self) -> Arc<str> {
        Arc::clone(&self.name)
    }

    /// Returns the containing module name.
    #[must_use]
    pub fn module(&self) -> &str {
        &self.module
    }

    /// Returns `true` if argument 0 is `this`.
    #[must_use]
    pub fn has_this(&self) -> bool {
        self.has_this
    }

    /// Returns `true` if the method returns a value.
    #[must_use]
    pub fn returns_value(&self) -> bool {
        self.returns_value
    }

    /// Returns the declared parameters.
    #[must_use]
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Returns the local variable table.
    #[must_use]
    pub fn locals(&self) -> &[LocalVariable] {
        &self.locals
    }

    /// Returns the exception handler table.
    #[must_use]
    pub fn exception_handlers(&self) -> &[ExceptionHandler] {
        &self.handlers
    }

    /// Returns the handler kind if an exception dispatch enters at `offset`.
    #[must_use]
    pub fn handler_entry(&self, offset: u32) -> Option<HandlerKind> {
        self.handler_entries.get(&offset).copied()
    }

    /// Returns the blocks in order; block 0 is the entry block.
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Returns the number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns the block `id`.
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.index())
    }

    /// Returns the block `id` mutably.
    pub fn block_mut(&mut self, id: BlockId) -> Option<&mut Block> {
        self.blocks.get_mut(id.index())
    }

    /// Returns every node in block order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.blocks.iter().flat_map(Block::nodes)
    }

    /// Returns the number of decoded instructions still present (phi nodes excluded).
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.nodes().filter(|node| !node.is_phi()).count()
    }

    /// Returns the node at `at`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidNodeRef`] if `at` does not resolve.
    pub fn node(&self, at: NodeRef) -> Result<&Node> {
        self.block(at.block)
            .and_then(|block| block.node(at.index))
            .ok_or_else(|| self.invalid_ref(at))
    }

    /// Returns the node at `at` mutably.
    ///
    /// # Errors
    /// Returns [`Error::InvalidNodeRef`] if `at` does not resolve.
    pub fn node_mut(&mut self, at: NodeRef) -> Result<&mut Node> {
        let error = self.invalid_ref(at);
        self.blocks
            .get_mut(at.block.index())
            .and_then(|block| block.node_mut(at.index))
            .ok_or(error)
    }

    /// Finds the current position of the node `id`.
    #[must_use]
    pub fn locate(&self, id: NodeId) -> Option<NodeRef> {
        self.blocks.iter().find_map(|block| {
            block
                .nodes()
                .iter()
                .position(|node| node.id() == id)
                .map(|index| NodeRef::new(block.id(), index))
        })
    }

    /// Finds the node `id`.
    #[must_use]
    pub fn find(&self, id: NodeId) -> Option<&Node> {
        self.nodes().find(|node| node.id() == id)
    }

    /// Creates a detached instruction node with a fresh id.
    pub fn new_node(&mut self, instruction: Instruction) -> Node {
        let id = self.allocate_id();
        Node::new(id, NodeKind::Instruction(instruction))
    }

    /// Creates a detached phi node with a fresh id.
    pub fn new_phi(&mut self, parents: Vec<NodeId>) -> Node {
        let id = self.allocate_id();
        Node::new(id, NodeKind::Phi(PhiNode::new(parents)))
    }

    /// Replaces the node at `at` with `nodes` (zero or more) as one splice.
    ///
    /// Block boundaries and edges are unchanged. A walker currently visiting `at` resumes
    /// at `at.index`, i.e. with the first replacement node.
    ///
    /// # Errors
    /// Returns [`Error::InvalidNodeRef`] if `at` does not resolve.
    pub fn replace(&mut self, at: NodeRef, nodes: Vec<Node>) -> Result<()> {
        let error = self.invalid_ref(at);
        match self.blocks.get_mut(at.block.index()) {
            Some(block) if at.index < block.len() => {
                block.splice(at.index, 1, nodes);
                Ok(())
            }
            _ => Err(error),
        }
    }

    /// Inserts `nodes` before the node at `at`; `at.index` may equal the block length.
    ///
    /// # Errors
    /// Returns [`Error::InvalidNodeRef`] if `at` does not resolve.
    pub fn insert(&mut self, at: NodeRef, nodes: Vec<Node>) -> Result<()> {
        let error = self.invalid_ref(at);
        match self.blocks.get_mut(at.block.index()) {
            Some(block) if at.index <= block.len() => {
                block.splice(at.index, 0, nodes);
                Ok(())
            }
            _ => Err(error),
        }
    }

    /// Returns the display name of local `index`: its debug name or `loc<index>`.
    #[must_use]
    pub fn local_name(&self, index: u16) -> String {
        self.locals
            .iter()
            .find(|local| local.index == index)
            .and_then(|local| local.name.clone())
            .unwrap_or_else(|| format!("loc{index}"))
    }

    /// Returns the display name of argument `index`: `this`, the parameter name or `arg<index>`.
    #[must_use]
    pub fn argument_name(&self, index: u16) -> String {
        if self.has_this && index == 0 {
            return "this".to_string();
        }
        let sequence = index - u16::from(self.has_this);
        self.parameters
            .iter()
            .find(|parameter| parameter.sequence == sequence)
            .and_then(|parameter| parameter.name.clone())
            .unwrap_or_else(|| format!("arg{index}"))
    }

    fn allocate_id(&mut self) -> NodeId {
        let id = NodeId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn invalid_ref(&self, at: NodeRef) -> Error {
        Error::InvalidNodeRef {
            method: self.name.to_string(),
            block: at.block.index(),
            index: at.index,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "method {}", self.name)?;
        for block in &self.blocks {
            write!(f, "{} @ IL_{:04x}", block.id(), block.offset())?;
            if let Some(handler) = block.handler() {
                write!(f, " ({handler:?} handler)")?;
            }
            write!(f, " preds: {}", join(block.sources()))?;
            write!(f, " succs: {}", join(block.targets()))?;
            if let (Some(entry), Some(exit)) = (block.entry_depth(), block.exit_depth()) {
                write!(f, " depth: {entry} -> {exit}")?;
            }
            writeln!(f)?;
            for node in block.nodes() {
                writeln!(f, "    {node}")?;
            }
        }
        Ok(())
    }
}

fn join(ids: &[BlockId]) -> String {
    let names: Vec<String> = ids.iter().map(ToString::to_string).collect();
    format!("[{}]", names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{ExceptionHandlerFlags, MethodBodyBuilder, Operand};

    fn build(builder: &MethodBodyBuilder) -> Result<Method> {
        Method::build(&builder.build()?)
    }

    #[test]
    fn straight_line_is_one_block() {
        let mut b = MethodBodyBuilder::new("M");
        b.ldc_i4(1).pop().ret();
        let method = build(&b).unwrap();
        assert_eq!(method.block_count(), 1);
        assert_eq!(method.blocks()[0].len(), 3);
        assert!(method.blocks()[0].sources().is_empty());
        assert!(method.blocks()[0].targets().is_empty());
    }

    #[test]
    fn calls_do_not_split_blocks() {
        let mut b = MethodBodyBuilder::new("M");
        b.call(crate::assembly::MethodRef::new("A::B()", 0).returning_void())
            .ret();
        assert_eq!(build(&b).unwrap().block_count(), 1);
    }

    #[test]
    fn diamond_edges_and_predecessor_order() {
        let mut b = MethodBodyBuilder::new("M");
        b.ldarg(0)
            .brtrue("else")
            .ldc_i4(1)
            .br("join")
            .label("else")
            .ldc_i4(2)
            .label("join")
            .pop()
            .ret();
        let method = build(&b).unwrap();
        assert_eq!(method.block_count(), 4);
        let ids = |v: &[usize]| v.iter().map(|&i| BlockId::new(i)).collect::<Vec<_>>();
        assert_eq!(method.blocks()[0].targets(), ids(&[2, 1]).as_slice());
        assert_eq!(method.blocks()[1].targets(), ids(&[3]).as_slice());
        assert_eq!(method.blocks()[2].targets(), ids(&[3]).as_slice());
        // fall-through predecessor first
        assert_eq!(method.blocks()[3].sources(), ids(&[2, 1]).as_slice());
    }

    #[test]
    fn backward_branch_creates_loop_edge() {
        let mut b = MethodBodyBuilder::new("M");
        b.label("top").ldarg(0).brtrue("top").ret();
        let method = build(&b).unwrap();
        assert_eq!(method.block_count(), 2);
        assert_eq!(method.blocks()[0].sources(), &[BlockId::new(0)]);
        assert_eq!(method.blocks()[0].targets(), &[BlockId::new(0), BlockId::new(1)]);
    }

    #[test]
    fn switch_targets_split_blocks() {
        let mut b = MethodBodyBuilder::new("M");
        b.ldarg(0)
            .switch(&["a", "b", "a"])
            .ret()
            .label("a")
            .ret()
            .label("b")
            .ret();
        let method = build(&b).unwrap();
        assert_eq!(method.block_count(), 4);
        assert_eq!(
            method.blocks()[0].targets(),
            &[BlockId::new(2), BlockId::new(3), BlockId::new(1)]
        );
    }

    #[test]
    fn handlers_split_blocks_and_mark_entries() {
        let mut b = MethodBodyBuilder::new("M");
        b.label("try")
            .ldc_i4(1)
            .pop()
            .leave("end")
            .label("catch")
            .pop()
            .leave("end")
            .label("end")
            .ret()
            .catch("System.Exception", ("try", "catch"), ("catch", "end"));
        let method = build(&b).unwrap();
        assert_eq!(method.block_count(), 3);
        assert_eq!(method.blocks()[1].handler(), Some(HandlerKind::Catch));
        assert!(method.blocks()[1].sources().is_empty());
        assert_eq!(method.handler_entry(method.blocks()[1].offset()), Some(HandlerKind::Catch));
    }

    #[test]
    fn construction_errors() {
        let body = MethodBody::new("Empty");
        assert!(matches!(Method::build(&body), Err(Error::EmptyMethod(name)) if name == "Empty"));

        let mut bad_target = MethodBody::new("M");
        bad_target.instructions = vec![
            Instruction::new(0, OpCode::Br, Operand::Target(3)),
            Instruction::new(5, OpCode::Ret, Operand::None),
        ];
        assert!(matches!(
            Method::build(&bad_target),
            Err(Error::InvalidBranchTarget { offset: 0, target: 3, .. })
        ));

        let mut b = MethodBodyBuilder::new("M");
        b.nop().nop();
        assert!(matches!(build(&b), Err(Error::FallThroughEnd { offset: 1, .. })));

        let mut b = MethodBodyBuilder::new("M");
        b.label("a").nop().label("b").ret();
        let mut body = b.build().unwrap();
        body.exception_handlers.push(ExceptionHandler {
            flags: ExceptionHandlerFlags::FINALLY,
            try_offset: 0,
            try_length: 1,
            handler_offset: 7,
            handler_length: 1,
            filter_offset: 0,
            catch_type: None,
        });
        assert!(matches!(
            Method::build(&body),
            Err(Error::InvalidHandler { offset: 7, .. })
        ));

        let mut unordered = MethodBody::new("M");
        unordered.instructions = vec![
            Instruction::new(2, OpCode::Nop, Operand::None),
            Instruction::new(1, OpCode::Ret, Operand::None),
        ];
        assert!(matches!(Method::build(&unordered), Err(Error::Construction { offset: 1, .. })));
    }

    #[test]
    fn replace_and_insert() {
        let mut b = MethodBodyBuilder::new("M");
        b.nop().nop().ret();
        let mut method = build(&b).unwrap();
        let block = BlockId::new(0);

        method.replace(NodeRef::new(block, 0), Vec::new()).unwrap();
        assert_eq!(method.blocks()[0].len(), 2);

        let extra = method.new_node(Instruction::new(0, OpCode::Nop, Operand::None));
        let extra_id = extra.id();
        assert_eq!(extra_id, NodeId::new(3));
        method.insert(NodeRef::new(block, 2), vec![extra]).unwrap();
        assert_eq!(method.locate(extra_id), Some(NodeRef::new(block, 2)));

        assert!(matches!(
            method.replace(NodeRef::new(block, 9), Vec::new()),
            Err(Error::InvalidNodeRef { index: 9, .. })
        ));
        assert!(method.insert(NodeRef::new(BlockId::new(4), 0), Vec::new()).is_err());
    }

    #[test]
    fn local_and_argument_names() {
        let mut b = MethodBodyBuilder::new("M");
        b.with_this().parameter("input").local("buffer").ret();
        let method = build(&b).unwrap();
        assert_eq!(method.argument_name(0), "this");
        assert_eq!(method.argument_name(1), "input");
        assert_eq!(method.argument_name(2), "arg2");
        assert_eq!(method.local_name(0), "buffer");
        assert_eq!(method.local_name(5), "loc5");
    }
}
