//! Visitor framework for traversing and rewriting methods.
//!
//! A [`Visitor`] sees a method, each of its blocks in order, and each node of a block in
//! order. Traversal is index based: the walkers re-read the number of blocks and the length
//! of the current block at every step, so a visitor may freely replace nodes through
//! [`Method::replace`] while it is being walked.
//!
//! # Replacement Semantics
//!
//! When `visit_node` splices the block it is visiting (detected through the block's
//! revision counter), [`walk_block`] does not advance. The next node visited is whatever
//! now sits at the same index: the first replacement node, or the node after the removed
//! one for an empty replacement. Nodes before the replacement point are never revisited
//! and no node after it is skipped.
//!
//! # Examples
//!
//! ```rust
//! use scil::{
//!     assembly::{MethodBodyBuilder, OpCode},
//!     ir::{walk_method, Method, NodeRef, Visitor},
//!     Result,
//! };
//!
//! struct DropPops;
//!
//! impl Visitor for DropPops {
//!     fn visit_node(&mut self, method: &mut Method, at: NodeRef) -> Result<()> {
//!         if method.node(at)?.opcode() == Some(OpCode::Pop) {
//!             method.replace(at, Vec::new())?;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut builder = MethodBodyBuilder::new("M");
//! builder.ldc_i4(1).pop().ldc_i4(2).pop().ret();
//! let mut method = Method::build(&builder.build()?)?;
//!
//! DropPops.visit_method(&mut method)?;
//! assert_eq!(method.instruction_count(), 3);
//! # Ok::<(), scil::Error>(())
//! ```

use crate::{
    ir::{BlockId, Method, NodeRef},
    Result,
};

/// A traversal over the blocks and nodes of a [`Method`].
///
/// Every hook has a default: `visit_method` walks the blocks, `visit_block` walks the
/// nodes, and `visit_node` does nothing. Overriding `visit_method` or `visit_block` and
/// calling the matching `walk_*` function keeps the default traversal while adding work
/// before or after it.
pub trait Visitor {
    /// Visits a whole method.
    ///
    /// # Errors
    /// Propagates the first error returned by a nested hook.
    fn visit_method(&mut self, method: &mut Method) -> Result<()> {
        walk_method(self, method)
    }

    /// Visits one block.
    ///
    /// # Errors
    /// Propagates the first error returned by `visit_node`.
    fn visit_block(&mut self, method: &mut Method, block: BlockId) -> Result<()> {
        walk_block(self, method, block)
    }

    /// Visits one node.
    ///
    /// # Errors
    /// Implementations return an error to abort the traversal.
    fn visit_node(&mut self, method: &mut Method, at: NodeRef) -> Result<()> {
        let _ = (method, at);
        Ok(())
    }
}

/// Visits every block of `method` in order.
///
/// # Errors
/// Propagates the first error returned by `visit_block`.
pub fn walk_method<V: Visitor + ?Sized>(visitor: &mut V, method: &mut Method) -> Result<()> {
    let mut index = 0;
    while index < method.block_count() {
        visitor.visit_block(method, BlockId::new(index))?;
        index += 1;
    }
    Ok(())
}

/// Visits every node of `block` in order, tolerating replacement of the visited node.
///
/// # Errors
/// Propagates the first error returned by `visit_node`.
pub fn walk_block<V: Visitor + ?Sized>(
    visitor: &mut V,
    method: &mut Method,
    block: BlockId,
) -> Result<()> {
    let mut index = 0;
    loop {
        let Some(current) = method.block(block) else {
            return Ok(());
        };
        if index >= current.len() {
            return Ok(());
        }
        let revision = current.revision();

        visitor.visit_node(method, NodeRef::new(block, index))?;

        let spliced = method
            .block(block)
            .is_some_and(|after| after.revision() != revision);
        if !spliced {
            index += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{Instruction, MethodBodyBuilder, OpCode, Operand},
        ir::NodeId,
    };

    /// Records every visited node id and applies a scripted replacement once.
    struct Scripted {
        visited: Vec<NodeId>,
        target: OpCode,
        replacement: usize,
        done: bool,
    }

    impl Visitor for Scripted {
        fn visit_node(&mut self, method: &mut Method, at: NodeRef) -> Result<()> {
            let node = method.node(at)?;
            self.visited.push(node.id());
            if !self.done && node.opcode() == Some(self.target) {
                self.done = true;
                let nodes = (0..self.replacement)
                    .map(|_| method.new_node(Instruction::new(0, OpCode::Nop, Operand::None)))
                    .collect();
                method.replace(at, nodes)?;
            }
            Ok(())
        }
    }

    fn method() -> Method {
        let mut b = MethodBodyBuilder::new("M");
        b.ldc_i4(1).op(OpCode::Neg).pop().ret();
        Method::build(&b.build().unwrap()).unwrap()
    }

    fn run(replacement: usize) -> Vec<u32> {
        let mut m = method();
        let mut visitor = Scripted {
            visited: Vec::new(),
            target: OpCode::Neg,
            replacement,
            done: false,
        };
        visitor.visit_method(&mut m).unwrap();
        visitor.visited.iter().map(|id| id.index()).collect()
    }

    #[test]
    fn zero_node_replacement_visits_the_rest_once() {
        // ldc(0) neg(1) pop(2) ret(3); neg removed
        assert_eq!(run(0), vec![0, 1, 2, 3]);
    }

    #[test]
    fn one_node_replacement_visits_the_new_node() {
        // neg replaced by n4
        assert_eq!(run(1), vec![0, 1, 4, 2, 3]);
    }

    #[test]
    fn many_node_replacement_visits_every_new_node() {
        assert_eq!(run(3), vec![0, 1, 4, 5, 6, 2, 3]);
    }

    #[test]
    fn default_walk_visits_blocks_in_order() {
        struct Blocks(Vec<usize>);
        impl Visitor for Blocks {
            fn visit_block(&mut self, method: &mut Method, block: BlockId) -> Result<()> {
                self.0.push(block.index());
                walk_block(self, method, block)
            }
        }

        let mut b = MethodBodyBuilder::new("M");
        b.ldarg(0).brtrue("x").ret().label("x").ret();
        let mut m = Method::build(&b.build().unwrap()).unwrap();
        let mut visitor = Blocks(Vec::new());
        visitor.visit_method(&mut m).unwrap();
        assert_eq!(visitor.0, vec![0, 1, 2]);
    }

    #[test]
    fn errors_abort_traversal() {
        struct Fail(usize);
        impl Visitor for Fail {
            fn visit_node(&mut self, method: &mut Method, at: NodeRef) -> Result<()> {
                self.0 += 1;
                method.node(NodeRef::new(at.block, at.index + 100)).map(|_| ())
            }
        }
        let mut m = method();
        let mut visitor = Fail(0);
        assert!(visitor.visit_method(&mut m).is_err());
        assert_eq!(visitor.0, 1);
    }
}
