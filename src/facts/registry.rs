//! Ordered generator lookup.
//!
//! The [`GeneratorRegistry`] keeps its generators sorted by `(order, name)` and asks them
//! in turn for every node; the first one that produces a fact wins. Registering a
//! generator with a lower order than [`crate::facts::generators::BUILTIN_ORDER`] therefore overrides the built-in
//! fact for the nodes it accepts.
//!
//! # Examples
//!
//! ```rust
//! use scil::{
//!     assembly::{MethodBodyBuilder, MethodRef, OpCode},
//!     facts::{Fact, FactArg, FactGenerator, GeneratorRegistry},
//!     ir::{Method, Node},
//!     Analyzer,
//! };
//!
//! /// Marks every call to `Console.ReadLine` as a taint source.
//! struct Sources;
//!
//! impl FactGenerator for Sources {
//!     fn name(&self) -> &'static str {
//!         "sources"
//!     }
//!
//!     fn order(&self) -> u32 {
//!         10
//!     }
//!
//!     fn try_generate(&self, _method: &Method, node: &Node) -> Option<Fact> {
//!         let callee = node.operand()?.as_method()?;
//!         if callee.name != "System.Console::ReadLine()" {
//!             return None;
//!         }
//!         Some(Fact::new("Source", vec![FactArg::name(node.push_names().first()?)]))
//!     }
//! }
//!
//! let mut registry = GeneratorRegistry::default();
//! registry.register(Sources);
//!
//! let mut builder = MethodBodyBuilder::new("M");
//! builder
//!     .call(MethodRef::new("System.Console::ReadLine()", 0))
//!     .op(OpCode::Pop)
//!     .ret();
//! let analyzer = Analyzer::default().with_registry(registry);
//! let facts = analyzer.analyze_method(&builder.build()?)?;
//! assert_eq!(facts[0].to_string(), r#"Source("M#st0")."#);
//! # Ok::<(), scil::Error>(())
//! ```

use std::{fmt, sync::Arc};

use crate::{
    facts::{
        generators::{builtins, CounterGenerator, FactGenerator, InstructionCounter},
        Fact,
    },
    ir::{Method, Node},
};

/// Generators sorted by `(order, name)`.
pub struct GeneratorRegistry {
    generators: Vec<Box<dyn FactGenerator>>,
}

impl GeneratorRegistry {
    /// Creates a registry without any generator.
    #[must_use]
    pub fn new() -> Self {
        GeneratorRegistry {
            generators: Vec::new(),
        }
    }

    /// Adds `generator`, keeping the registry sorted.
    ///
    /// Generators with equal order and name keep their registration order.
    pub fn register<G: FactGenerator + 'static>(&mut self, generator: G) -> &mut Self {
        self.insert(Box::new(generator));
        self
    }

    /// Installs a [`CounterGenerator`] recording into `counter`.
    pub fn install_counter(&mut self, counter: Arc<InstructionCounter>) -> &mut Self {
        self.register(CounterGenerator::new(counter))
    }

    fn insert(&mut self, generator: Box<dyn FactGenerator>) {
        let key = (generator.order(), generator.name());
        let position = self
            .generators
            .partition_point(|existing| (existing.order(), existing.name()) <= key);
        self.generators.insert(position, generator);
    }

    /// Returns the generator names in lookup order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.generators.iter().map(|generator| generator.name()).collect()
    }

    /// Returns the number of registered generators.
    #[must_use]
    pub fn len(&self) -> usize {
        self.generators.len()
    }

    /// Returns `true` if no generator is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.generators.is_empty()
    }

    /// Returns the fact of the first generator that accepts `node`.
    #[must_use]
    pub fn generate(&self, method: &Method, node: &Node) -> Option<Fact> {
        self.generators
            .iter()
            .find_map(|generator| generator.try_generate(method, node))
    }

    /// Emits the facts of every node of `method`, in block and node order.
    #[must_use]
    pub fn emit(&self, method: &Method) -> Vec<Fact> {
        let facts: Vec<Fact> = method
            .nodes()
            .filter_map(|node| self.generate(method, node))
            .collect();
        log::debug!("{}: emitted {} facts", method.name(), facts.len());
        facts
    }

    /// Emits the facts of `method` as solver text, one fact per line.
    #[must_use]
    pub fn emit_text(&self, method: &Method) -> String {
        self.emit(method)
            .iter()
            .map(|fact| format!("{fact}\n"))
            .collect()
    }
}

impl Default for GeneratorRegistry {
    /// Creates a registry with every built-in fact producing generator.
    fn default() -> Self {
        let mut registry = GeneratorRegistry::new();
        for generator in builtins() {
            registry.insert(generator);
        }
        registry
    }
}

impl fmt::Debug for GeneratorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{MethodBodyBuilder, MethodRef, OpCode},
        facts::{generators::test_support::analyzed, FactArg},
    };

    struct Fixed(&'static str, u32);

    impl FactGenerator for Fixed {
        fn name(&self) -> &'static str {
            self.0
        }
        fn order(&self) -> u32 {
            self.1
        }
        fn try_generate(&self, _method: &Method, node: &Node) -> Option<Fact> {
            (node.opcode() == Some(OpCode::Pop))
                .then(|| Fact::new("Seen", vec![FactArg::symbol(self.0)]))
        }
    }

    fn method() -> Method {
        let mut b = MethodBodyBuilder::new("M");
        b.call(MethodRef::new("System.Console::ReadLine()", 0))
            .pop()
            .ret();
        analyzed(&b)
    }

    #[test]
    fn sorted_by_order_then_name() {
        let mut registry = GeneratorRegistry::new();
        registry
            .register(Fixed("b", 5))
            .register(Fixed("a", 5))
            .register(Fixed("z", 1));
        assert_eq!(registry.names(), vec!["z", "a", "b"]);
    }

    #[test]
    fn first_match_wins() {
        let mut registry = GeneratorRegistry::default();
        registry.register(Fixed("override", 1));
        let facts: Vec<String> = registry.emit(&method()).iter().map(ToString::to_string).collect();
        assert_eq!(
            facts,
            vec![
                r#"CallStm("System.Console::ReadLine()", [], ["M#st0"])."#,
                r#"Seen("override")."#,
            ]
        );
    }

    #[test]
    fn empty_registry_emits_nothing() {
        assert!(GeneratorRegistry::new().emit(&method()).is_empty());
    }

    #[test]
    fn emission_is_repeatable() {
        let registry = GeneratorRegistry::default();
        let method = method();
        let first = registry.emit_text(&method);
        assert_eq!(first, registry.emit_text(&method));
        assert_eq!(first.lines().count(), 2);
        assert!(first.ends_with(".\n"));
    }

    #[test]
    fn counter_runs_first_and_never_blocks() {
        let counter = Arc::new(InstructionCounter::new());
        let mut registry = GeneratorRegistry::default();
        registry.install_counter(Arc::clone(&counter));
        assert_eq!(registry.names()[0], "counter");

        let facts = registry.emit(&method());
        assert_eq!(facts.len(), 2);
        assert_eq!(counter.get(""), 3);
    }
}
