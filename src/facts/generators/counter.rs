//! Per-module instruction counting.
//!
//! [`InstructionCounter`] is the only state shared across methods. It is installed into a
//! registry through [`CounterGenerator`], which runs before every fact producing generator,
//! counts the node and then declines it.

use std::{collections::BTreeMap, sync::Arc};

use dashmap::DashMap;

use crate::{
    facts::{generators::FactGenerator, Fact},
    ir::{Method, Node},
};

/// Thread-safe instruction counts keyed by module name.
///
/// # Thread Safety
///
/// Counts live in a [`DashMap`], so workers analysing different methods of the same
/// module increment the same entry without a global lock.
#[derive(Debug, Default)]
pub struct InstructionCounter {
    counts: DashMap<String, u64>,
}

impl InstructionCounter {
    /// Creates an empty counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `count` instructions to `module`.
    pub fn record(&self, module: &str, count: u64) {
        if let Some(mut entry) = self.counts.get_mut(module) {
            *entry += count;
            return;
        }
        *self.counts.entry(module.to_string()).or_insert(0) += count;
    }

    /// Returns the count for `module`.
    #[must_use]
    pub fn get(&self, module: &str) -> u64 {
        self.counts.get(module).map_or(0, |entry| *entry)
    }

    /// Returns the sum over all modules.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|entry| *entry.value()).sum()
    }

    /// Returns every count, ordered by module name.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counts
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }

    /// Forgets every count.
    pub fn reset(&self) {
        self.counts.clear();
    }
}

/// Registry adapter that feeds an [`InstructionCounter`].
#[derive(Debug, Clone)]
pub struct CounterGenerator {
    counter: Arc<InstructionCounter>,
}

impl CounterGenerator {
    /// Creates a generator recording into `counter`.
    #[must_use]
    pub fn new(counter: Arc<InstructionCounter>) -> Self {
        CounterGenerator { counter }
    }

    /// Returns the shared counter.
    #[must_use]
    pub fn counter(&self) -> &Arc<InstructionCounter> {
        &self.counter
    }
}

impl FactGenerator for CounterGenerator {
    fn name(&self) -> &'static str {
        "counter"
    }

    fn order(&self) -> u32 {
        0
    }

    fn try_generate(&self, method: &Method, node: &Node) -> Option<Fact> {
        if !node.is_phi() {
            self.counter.record(method.module(), 1);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use rayon::prelude::*;

    use super::*;
    use crate::assembly::MethodBodyBuilder;

    #[test]
    fn counts_per_module_and_resets() {
        let counter = InstructionCounter::new();
        counter.record("a.dll", 3);
        counter.record("b.dll", 1);
        counter.record("a.dll", 2);
        assert_eq!(counter.get("a.dll"), 5);
        assert_eq!(counter.total(), 6);
        assert_eq!(
            counter.snapshot().into_iter().collect::<Vec<_>>(),
            vec![("a.dll".to_string(), 5), ("b.dll".to_string(), 1)]
        );

        counter.reset();
        assert_eq!(counter.get("a.dll"), 0);
        assert!(counter.snapshot().is_empty());
    }

    #[test]
    fn concurrent_records() {
        let counter = InstructionCounter::new();
        (0..1000).into_par_iter().for_each(|_| counter.record("m", 1));
        assert_eq!(counter.get("m"), 1000);
    }

    #[test]
    fn generator_counts_and_declines() {
        let mut b = MethodBodyBuilder::new("M");
        b.module("app.dll").ldc_i4(1).pop().ret();
        let method = Method::build(&b.build().unwrap()).unwrap();

        let counter = Arc::new(InstructionCounter::new());
        let generator = CounterGenerator::new(Arc::clone(&counter));
        for node in method.nodes() {
            assert!(generator.try_generate(&method, node).is_none());
        }
        assert_eq!(counter.get("app.dll"), 3);
    }
}
