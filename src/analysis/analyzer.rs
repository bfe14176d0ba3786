//! Symbolic evaluation stack analysis.
//!
//! The [`StackAnalyzer`] annotates every node with the symbolic names of the values it pops
//! and pushes. A value is named after the stack depth it occupies: a push at depth `d` is
//! named `d` and raises the depth to `d + 1`; a pop lowers the depth from `d + 1` to `d`
//! and names the consumed value `d`. A value therefore carries the same name at its
//! producer and at every consumer, which is what lets the fact solver follow it.
//!
//! # Algorithm
//!
//! Blocks are analysed once, in block order:
//!
//! 1. The entry depth is the exit depth of the first already-analysed predecessor, or 0
//!    if there is none (a block reached only through backward branches, ECMA-335
//!    III.1.7.5). Every analysed predecessor must agree on it.
//! 2. Nodes are annotated in order. An exception handler entry first forces the depth to
//!    the handler's dispatch depth (1 for catch and filter code, 0 for finally and fault
//!    code). Phi nodes take over the name of the current top slot after checking that all
//!    their parents pushed exactly that name.
//! 3. The exit depth is recorded and checked against every already-analysed successor.
//!
//! Finally the entry block must start empty and every block without successors must
//! leave the stack empty.
//!
//! # Errors
//!
//! All inconsistencies are fatal for the method: [`crate::Error::StackUnderflow`],
//! [`crate::Error::MergeConflict`] and [`crate::Error::StackImbalance`], plus classifier
//! errors for instructions that cannot be sized.

use std::sync::Arc;

use crate::{
    analysis::{classify, Pass},
    ir::{walk_block, walk_method, Block, BlockId, Method, NodeRef, StackName, Visitor},
    Error, Result,
};

/// Visitor pass assigning pop and push names to every node.
#[derive(Debug, Default)]
pub struct StackAnalyzer {
    depth: usize,
}

impl StackAnalyzer {
    /// Creates a stack analyzer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entry_depth(method: &Method, block: BlockId) -> Result<usize> {
        let Some(current) = method.block(block) else {
            return Ok(0);
        };
        if let Some(kind) = current.handler() {
            return Ok(kind.dispatch_depth());
        }
        let mut visited = current.sources().iter().filter_map(|source| {
            method
                .block(*source)
                .and_then(Block::exit_depth)
                .map(|depth| (*source, depth))
        });

        let Some((first, depth)) = visited.next() else {
            return Ok(0);
        };
        for (source, other) in visited {
            if other != depth {
                return Err(merge_error!(
                    method.name(),
                    block.index(),
                    "predecessor {} exits with depth {} but {} exits with depth {}",
                    first,
                    depth,
                    source,
                    other
                ));
            }
        }
        Ok(depth)
    }

    fn check_successors(method: &Method, block: BlockId, exit: usize) -> Result<()> {
        let Some(current) = method.block(block) else {
            return Ok(());
        };
        for target in current.targets() {
            if let Some(entry) = method.block(*target).and_then(Block::entry_depth) {
                if entry != exit {
                    return Err(merge_error!(
                        method.name(),
                        target.index(),
                        "entered with depth {} but predecessor {} exits with depth {}",
                        entry,
                        block,
                        exit
                    ));
                }
            }
        }
        Ok(())
    }

    fn check_balance(method: &Method) -> Result<()> {
        for block in method.blocks() {
            let checks = [
                (block.id().index() == 0, block.entry_depth()),
                (block.targets().is_empty(), block.exit_depth()),
            ];
            for (applies, depth) in checks {
                if let Some(depth) = depth.filter(|depth| applies && *depth != 0) {
                    return Err(Error::StackImbalance {
                        method: method.name().to_string(),
                        block: block.id().index(),
                        depth,
                    });
                }
            }
        }
        Ok(())
    }

    fn resolve_phi(&mut self, method: &mut Method, at: NodeRef) -> Result<()> {
        let node = method.node(at)?;
        let parents = node.phi().map(|phi| phi.parents().to_vec()).unwrap_or_default();

        let mut names: Vec<StackName> = Vec::new();
        for parent in parents {
            let pushed = method
                .find(parent)
                .and_then(|producer| producer.push_names().last().cloned());
            if let Some(name) = pushed {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        let top = self.depth.checked_sub(1);
        match (names.as_slice(), top) {
            ([name], Some(top)) if name.slot() == top => {
                let name = name.clone();
                let node = method.node_mut(at)?;
                node.set_pop_names(Vec::new());
                node.set_push_names(vec![name]);
                Ok(())
            }
            ([name], _) => Err(merge_error!(
                method.name(),
                at.block.index(),
                "phi merges {} but the stack depth is {}",
                name,
                self.depth
            )),
            (names, _) => Err(merge_error!(
                method.name(),
                at.block.index(),
                "phi parents push {} distinct names",
                names.len()
            )),
        }
    }
}

impl Visitor for StackAnalyzer {
    fn visit_method(&mut self, method: &mut Method) -> Result<()> {
        self.depth = 0;
        for index in 0..method.block_count() {
            if let Some(block) = method.block_mut(BlockId::new(index)) {
                block.set_entry_depth(None);
                block.set_exit_depth(None);
            }
        }

        walk_method(self, method)?;
        Self::check_balance(method)?;
        log::debug!("{}: stack analysis complete", method.name());
        Ok(())
    }

    fn visit_block(&mut self, method: &mut Method, block: BlockId) -> Result<()> {
        let entry = Self::entry_depth(method, block)?;
        self.depth = entry;
        if let Some(current) = method.block_mut(block) {
            current.set_entry_depth(Some(entry));
        }

        walk_block(self, method, block)?;

        let exit = self.depth;
        if let Some(current) = method.block_mut(block) {
            current.set_exit_depth(Some(exit));
        }
        Self::check_successors(method, block, exit)
    }

    fn visit_node(&mut self, method: &mut Method, at: NodeRef) -> Result<()> {
        let node = method.node(at)?;
        if node.is_phi() {
            return self.resolve_phi(method, at);
        }

        if let Some(kind) = node.offset().and_then(|offset| method.handler_entry(offset)) {
            self.depth = kind.dispatch_depth();
        }

        let effect = classify(method.name(), method.returns_value(), node)?;
        let scope = method.scope();

        let mut pops = Vec::with_capacity(effect.pops);
        for _ in 0..effect.pops {
            let Some(depth) = self.depth.checked_sub(1) else {
                return Err(Error::StackUnderflow {
                    method: method.name().to_string(),
                    offset: node.offset().unwrap_or_default(),
                });
            };
            self.depth = depth;
            pops.push(StackName::new(Arc::clone(&scope), depth));
        }
        pops.reverse();

        let mut pushes = Vec::with_capacity(effect.pushes);
        for _ in 0..effect.pushes {
            pushes.push(StackName::new(Arc::clone(&scope), self.depth));
            self.depth += 1;
        }

        log::trace!("{}: {} pops {:?} pushes {:?}", method.name(), at, pops, pushes);

        let node = method.node_mut(at)?;
        node.set_pop_names(pops);
        node.set_push_names(pushes);
        Ok(())
    }
}

impl Pass for StackAnalyzer {
    fn name(&self) -> &'static str {
        "stack-analyzer"
    }

    fn description(&self) -> &'static str {
        "Assigns symbolic stack names to every popped and pushed value"
    }

    fn run_on_method(&self, method: &mut Method) -> Result<bool> {
        StackAnalyzer::new().visit_method(method)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{ExceptionHandlerFlags, HandlerKind, MethodBodyBuilder, MethodRef, OpCode};

    fn analyze(builder: &MethodBodyBuilder) -> Result<Method> {
        let mut method = Method::build(&builder.build()?)?;
        StackAnalyzer::new().visit_method(&mut method)?;
        Ok(method)
    }

    fn slots(names: &[StackName]) -> Vec<usize> {
        names.iter().map(StackName::slot).collect()
    }

    #[test]
    fn straight_line_names() {
        let mut b = MethodBodyBuilder::new("M");
        b.returning_value().ldarg(0).ldarg(1).add().ret();
        let method = analyze(&b).unwrap();
        let nodes = method.blocks()[0].nodes();
        assert_eq!(slots(nodes[0].push_names()), vec![0]);
        assert_eq!(slots(nodes[1].push_names()), vec![1]);
        assert_eq!(slots(nodes[2].pop_names()), vec![0, 1]);
        assert_eq!(slots(nodes[2].push_names()), vec![0]);
        assert_eq!(slots(nodes[3].pop_names()), vec![0]);
        assert_eq!(nodes[0].push_names()[0].to_string(), "M#st0");
    }

    #[test]
    fn instance_call_pops_receiver_and_arguments() {
        let mut b = MethodBodyBuilder::new("M");
        b.ldnull()
            .ldc_i4(1)
            .ldstr("x")
            .callvirt(MethodRef::new("T::F(int32,string)", 2).with_this())
            .pop()
            .ret();
        let method = analyze(&b).unwrap();
        let call = &method.blocks()[0].nodes()[3];
        assert_eq!(slots(call.pop_names()), vec![0, 1, 2]);
        assert_eq!(slots(call.push_names()), vec![0]);
    }

    #[test]
    fn depths_flow_across_blocks() {
        let mut b = MethodBodyBuilder::new("M");
        b.ldc_i4(1)
            .ldarg(0)
            .brtrue("join")
            .label("join")
            .pop()
            .ret();
        let method = analyze(&b).unwrap();
        assert_eq!(method.blocks()[0].exit_depth(), Some(1));
        assert_eq!(method.blocks()[1].entry_depth(), Some(1));
        assert_eq!(method.blocks()[1].exit_depth(), Some(0));
    }

    #[test]
    fn backward_only_block_starts_empty() {
        let mut b = MethodBodyBuilder::new("M");
        b.br("check")
            .label("body")
            .nop()
            .label("check")
            .ldarg(0)
            .brtrue("body")
            .ret();
        let method = analyze(&b).unwrap();
        // B1 (body) is reached only from B2 (check), which comes later
        assert_eq!(method.blocks()[1].entry_depth(), Some(0));
    }

    #[test]
    fn underflow() {
        let mut b = MethodBodyBuilder::new("M");
        b.nop().pop().ret();
        assert!(matches!(analyze(&b), Err(Error::StackUnderflow { offset: 1, .. })));
    }

    #[test]
    fn imbalance_at_exit() {
        let mut b = MethodBodyBuilder::new("M");
        b.ldc_i4(1).ret();
        assert!(matches!(analyze(&b), Err(Error::StackImbalance { block: 0, depth: 1, .. })));
    }

    #[test]
    fn disagreeing_predecessors() {
        let mut b = MethodBodyBuilder::new("M");
        b.ldarg(0)
            .brtrue("push")
            .br("join")
            .label("push")
            .ldc_i4(1)
            .label("join")
            .ret();
        assert!(matches!(analyze(&b), Err(Error::MergeConflict { .. })));
    }

    #[test]
    fn handler_entry_depths() {
        let mut b = MethodBodyBuilder::new("M");
        b.label("try")
            .nop()
            .leave("end")
            .label("catch")
            .pop()
            .leave("end")
            .label("finally_try")
            .nop()
            .leave("end")
            .label("finally")
            .endfinally()
            .label("end")
            .ret()
            .catch("System.Exception", ("try", "catch"), ("catch", "finally_try"))
            .handler(
                ExceptionHandlerFlags::FINALLY,
                ("finally_try", "finally"),
                ("finally", "end"),
            );
        let method = analyze(&b).unwrap();
        let catch = method
            .blocks()
            .iter()
            .find(|block| block.handler().is_some())
            .unwrap();
        // the exception object is popped at the catch entry
        assert_eq!(slots(catch.nodes()[0].pop_names()), vec![0]);
        assert!(method.blocks().iter().all(|block| block.exit_depth().is_some()));
    }

    #[test]
    fn filter_and_filtered_handler_receive_the_exception() {
        let mut b = MethodBodyBuilder::new("M");
        b.label("try")
            .nop()
            .leave("end")
            .label("filter")
            .pop()
            .ldc_i4(1)
            .op(OpCode::Endfilter)
            .label("handler")
            .pop()
            .leave("end")
            .label("end")
            .ret()
            .filter(("try", "filter"), "filter", ("handler", "end"));
        let method = analyze(&b).unwrap();

        let entries: Vec<_> = method
            .blocks()
            .iter()
            .filter(|block| block.handler() == Some(HandlerKind::Filter))
            .collect();
        assert_eq!(entries.len(), 2);
        for entry in entries {
            assert_eq!(entry.entry_depth(), Some(1));
            assert_eq!(entry.nodes()[0].pop_names()[0].to_string(), "M#st0");
        }
        assert!(method.blocks().iter().all(|block| block.exit_depth() == Some(0)));
    }

    #[test]
    fn rerun_is_stable() {
        let mut b = MethodBodyBuilder::new("M");
        b.ldc_i4(1).ldarg(0).brtrue("join").label("join").pop().ret();
        let mut method = Method::build(&b.build().unwrap()).unwrap();
        StackAnalyzer::new().visit_method(&mut method).unwrap();
        let first = method.to_string();
        StackAnalyzer::new().visit_method(&mut method).unwrap();
        assert_eq!(method.to_string(), first);
    }
}
