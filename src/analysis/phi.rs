//! Phi node insertion at stack-carrying join points.
//!
//! When control reaches a block from several predecessors while values are live on the
//! evaluation stack, the value in the top slot may have been produced by a different node
//! on each path. [`PhiInserter`] places a phi node at the start of every such block, whose
//! parents are the producers of the top slot at the end of each predecessor. The
//! [`crate::analysis::StackAnalyzer`] later checks that all parents agree on the slot name.
//!
//! Producers are found with a lightweight simulation that follows the same entry-depth
//! rules as the stack analyzer but records, per slot, which node pushed the value. Blocks
//! are handled in order and the simulation is repeated after every insertion, so a phi at
//! an inner join is the producer seen by any outer join it flows into.

use crate::{
    analysis::{classify, Pass},
    ir::{BlockId, Method, NodeId, NodeRef, Visitor},
    Error, Result,
};

/// The node that pushed a slot's value, and whether it was that node's last push.
type Producer = Option<(NodeId, bool)>;

/// Visitor pass inserting phi nodes at joins that carry stack values.
#[derive(Debug, Default)]
pub struct PhiInserter {
    inserted: usize,
}

impl PhiInserter {
    /// Creates a phi inserter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of phis inserted by the last run.
    #[must_use]
    pub fn inserted(&self) -> usize {
        self.inserted
    }

    /// Simulates the method, returning each block's entry and exit producer stacks.
    fn simulate(method: &Method) -> Result<Vec<Option<(Vec<Producer>, Vec<Producer>)>>> {
        let mut states: Vec<Option<(Vec<Producer>, Vec<Producer>)>> =
            vec![None; method.block_count()];

        for block in method.blocks() {
            let entry: Vec<Producer> = block
                .sources()
                .iter()
                .find_map(|source| {
                    states
                        .get(source.index())
                        .and_then(Option::as_ref)
                        .map(|(_, exit)| exit.clone())
                })
                .unwrap_or_default();

            let mut stack = entry.clone();
            for node in block.nodes() {
                if node.is_phi() {
                    if let Some(top) = stack.last_mut() {
                        *top = Some((node.id(), true));
                    }
                    continue;
                }
                if let Some(kind) = node.offset().and_then(|offset| method.handler_entry(offset)) {
                    stack = vec![None; kind.dispatch_depth()];
                }

                let effect = classify(method.name(), method.returns_value(), node)?;
                let Some(remaining) = stack.len().checked_sub(effect.pops) else {
                    return Err(Error::StackUnderflow {
                        method: method.name().to_string(),
                        offset: node.offset().unwrap_or_default(),
                    });
                };
                stack.truncate(remaining);
                for push in 0..effect.pushes {
                    stack.push(Some((node.id(), push + 1 == effect.pushes)));
                }
            }

            states[block.id().index()] = Some((entry, stack));
        }

        Ok(states)
    }

    fn parents(
        method: &Method,
        block: BlockId,
        states: &[Option<(Vec<Producer>, Vec<Producer>)>],
    ) -> Vec<NodeId> {
        let Some(current) = method.block(block) else {
            return Vec::new();
        };
        let mut parents = Vec::new();
        for source in current.sources() {
            let top = states
                .get(source.index())
                .and_then(Option::as_ref)
                .and_then(|(_, exit)| exit.last().copied().flatten());
            if let Some((producer, true)) = top {
                if !parents.contains(&producer) {
                    parents.push(producer);
                }
            }
        }
        parents
    }
}

impl Visitor for PhiInserter {
    fn visit_method(&mut self, method: &mut Method) -> Result<()> {
        self.inserted = 0;
        let mut states = Self::simulate(method)?;

        for index in 0..method.block_count() {
            let block = BlockId::new(index);
            let Some(current) = method.block(block) else {
                continue;
            };
            let entry_depth = states
                .get(index)
                .and_then(Option::as_ref)
                .map_or(0, |(entry, _)| entry.len());
            let already_merged = current.node(0).is_some_and(|node| node.is_phi());
            if current.sources().len() < 2 || entry_depth == 0 || already_merged {
                continue;
            }

            let parents = Self::parents(method, block, &states);
            if parents.is_empty() {
                continue;
            }
            log::trace!("{}: phi at {} over {:?}", method.name(), block, parents);
            let phi = method.new_phi(parents);
            method.insert(NodeRef::new(block, 0), vec![phi])?;
            self.inserted += 1;
            // the phi now produces the top slot for every later join it reaches
            states = Self::simulate(method)?;
        }

        if self.inserted > 0 {
            log::debug!("{}: inserted {} phi nodes", method.name(), self.inserted);
        }
        Ok(())
    }
}

impl Pass for PhiInserter {
    fn name(&self) -> &'static str {
        "phi-inserter"
    }

    fn description(&self) -> &'static str {
        "Inserts phi nodes at joins where predecessors leave values on the stack"
    }

    fn run_on_method(&self, method: &mut Method) -> Result<bool> {
        let mut inserter = PhiInserter::new();
        inserter.visit_method(method)?;
        Ok(inserter.inserted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        analysis::StackAnalyzer,
        assembly::{MethodBodyBuilder, MethodRef},
    };

    fn diamond() -> MethodBodyBuilder {
        let mut b = MethodBodyBuilder::new("M");
        b.ldarg(0)
            .brtrue("else")
            .ldstr("a")
            .br("join")
            .label("else")
            .ldstr("b")
            .label("join")
            .call(MethodRef::new("Sink::Log(string)", 1).returning_void())
            .ret();
        b
    }

    #[test]
    fn diamond_gets_one_phi_shared_by_both_arms() {
        let mut method = Method::build(&diamond().build().unwrap()).unwrap();
        let mut inserter = PhiInserter::new();
        inserter.visit_method(&mut method).unwrap();
        assert_eq!(inserter.inserted(), 1);

        let phi = method.blocks()[3].nodes()[0].phi().unwrap().clone();
        assert_eq!(phi.parents().len(), 2);

        StackAnalyzer::new().visit_method(&mut method).unwrap();
        let join = &method.blocks()[3];
        let merged = join.nodes()[0].push_names().to_vec();
        assert_eq!(merged.len(), 1);
        for parent in phi.parents() {
            assert_eq!(method.find(*parent).unwrap().push_names(), merged.as_slice());
        }
        assert_eq!(join.nodes()[1].pop_names(), merged.as_slice());
    }

    #[test]
    fn no_phi_without_stack_values() {
        let mut b = MethodBodyBuilder::new("M");
        b.ldarg(0).brtrue("join").nop().label("join").ret();
        let mut method = Method::build(&b.build().unwrap()).unwrap();
        assert!(!PhiInserter::new().run_on_method(&mut method).unwrap());
    }

    #[test]
    fn insertion_is_not_repeated() {
        let mut method = Method::build(&diamond().build().unwrap()).unwrap();
        assert!(PhiInserter::new().run_on_method(&mut method).unwrap());
        assert!(!PhiInserter::new().run_on_method(&mut method).unwrap());
        assert_eq!(method.nodes().filter(|node| node.is_phi()).count(), 1);
    }

    #[test]
    fn shared_producer_collapses_to_one_parent() {
        let mut b = MethodBodyBuilder::new("M");
        b.ldc_i4(7)
            .ldarg(0)
            .brtrue("join")
            .nop()
            .label("join")
            .pop()
            .ret();
        let mut method = Method::build(&b.build().unwrap()).unwrap();
        PhiInserter::new().visit_method(&mut method).unwrap();
        let phi = method.blocks()[2].nodes()[0].phi().unwrap().clone();
        assert_eq!(phi.parents(), &[NodeId::new(0)]);
        StackAnalyzer::new().visit_method(&mut method).unwrap();
    }

    #[test]
    fn nested_join_feeds_its_phi_to_the_outer_join() {
        let mut b = MethodBodyBuilder::new("M");
        b.ldarg(0)
            .brtrue("outer_else")
            .ldarg(1)
            .brtrue("inner_else")
            .ldstr("a")
            .br("inner_join")
            .label("inner_else")
            .ldstr("b")
            .label("inner_join")
            .br("outer_join")
            .label("outer_else")
            .ldstr("c")
            .label("outer_join")
            .call(MethodRef::new("Sink::Log(string)", 1).returning_void())
            .ret();
        let mut method = Method::build(&b.build().unwrap()).unwrap();
        let mut inserter = PhiInserter::new();
        inserter.visit_method(&mut method).unwrap();
        assert_eq!(inserter.inserted(), 2);

        let inner = method.blocks()[4].nodes()[0].clone();
        let outer = method.blocks()[6].nodes()[0].phi().unwrap().clone();
        let inner_parents = inner.phi().unwrap().parents().to_vec();
        assert!(inner_parents.contains(&method.blocks()[2].nodes()[0].id()));
        assert!(inner_parents.contains(&method.blocks()[3].nodes()[0].id()));
        assert!(outer.parents().contains(&inner.id()));
        assert!(outer.parents().contains(&method.blocks()[5].nodes()[0].id()));
        assert_eq!(outer.parents().len(), 2);

        StackAnalyzer::new().visit_method(&mut method).unwrap();
        let merged = method.blocks()[6].nodes()[0].push_names().to_vec();
        assert_eq!(method.blocks()[4].nodes()[0].push_names(), merged.as_slice());
        assert_eq!(method.blocks()[6].nodes()[1].pop_names(), merged.as_slice());
    }
}
