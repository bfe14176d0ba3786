//! The analysis driver.
//!
//! [`Analyzer`] ties the stages together for one method body (build the CFG, run the
//! configured passes, emit facts) and for whole modules, whose methods are independent and
//! analysed in parallel on the rayon pool.
//!
//! # Failure Policy
//!
//! Every error is fatal for the method it occurs in and for nothing else. A method that
//! fails produces no facts at all; [`Analyzer::analyze_module`] records the error in the
//! method's [`MethodReport`], logs a warning, and carries on with the other methods.

use std::sync::Arc;

use rayon::prelude::*;

use crate::{
    analysis::PassPipeline,
    assembly::{MethodBody, ModuleBody},
    facts::{Fact, GeneratorRegistry, InstructionCounter},
    ir::Method,
    AnalysisConfig, Error, Result,
};

/// Outcome of analysing one method.
#[derive(Debug)]
pub struct MethodReport {
    /// Identity of the method
    pub method: String,
    /// The emitted facts, or the error that aborted the method
    pub outcome: Result<Vec<Fact>>,
}

impl MethodReport {
    /// Returns `true` if the method was analysed successfully.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Returns the emitted facts, or an empty slice for a failed method.
    #[must_use]
    pub fn facts(&self) -> &[Fact] {
        self.outcome.as_deref().unwrap_or_default()
    }

    /// Returns the error of a failed method.
    #[must_use]
    pub fn error(&self) -> Option<&Error> {
        self.outcome.as_ref().err()
    }
}

/// Outcome of analysing a module, one report per method in input order.
#[derive(Debug)]
pub struct ModuleReport {
    /// Name of the module
    pub name: String,
    /// Per-method reports, in the order of the module's methods
    pub methods: Vec<MethodReport>,
}

impl ModuleReport {
    /// Returns every fact of every successful method, in method order.
    pub fn facts(&self) -> impl Iterator<Item = &Fact> {
        self.methods.iter().flat_map(MethodReport::facts)
    }

    /// Returns the reports of the methods that failed.
    pub fn failures(&self) -> impl Iterator<Item = &MethodReport> {
        self.methods.iter().filter(|report| !report.is_ok())
    }

    /// Returns the number of successfully analysed methods.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.methods.iter().filter(|report| report.is_ok()).count()
    }

    /// Renders every fact as solver text, one fact per line.
    #[must_use]
    pub fn to_text(&self) -> String {
        self.facts().map(|fact| format!("{fact}\n")).collect()
    }
}

/// Runs CFG construction, the pass pipeline and fact emission.
///
/// An `Analyzer` is immutable once built and can be shared across threads.
///
/// # Examples
///
/// ```rust
/// use scil::{assembly::ModuleBody, AnalysisConfig, Analyzer};
///
/// let module = ModuleBody::from_json(r#"{
///     "name": "app.dll",
///     "methods": [
///         { "name": "A::Ok()", "instructions": [
///             { "offset": 0, "opcode": "ldstr", "operand": { "string": "hi" } },
///             { "offset": 5, "opcode": "pop" },
///             { "offset": 6, "opcode": "ret" }
///         ]},
///         { "name": "A::Broken()", "instructions": [
///             { "offset": 0, "opcode": "pop" },
///             { "offset": 1, "opcode": "ret" }
///         ]}
///     ]
/// }"#)?;
///
/// let analyzer = Analyzer::new(AnalysisConfig::default().with_count_instructions(true));
/// let report = analyzer.analyze_module(&module);
/// assert_eq!(report.succeeded(), 1);
/// assert_eq!(report.facts().count(), 2);
/// assert_eq!(analyzer.counter().get("app.dll"), 3);
/// # Ok::<(), scil::Error>(())
/// ```
#[derive(Debug)]
pub struct Analyzer {
    config: AnalysisConfig,
    passes: PassPipeline,
    registry: GeneratorRegistry,
    counter: Arc<InstructionCounter>,
}

impl Analyzer {
    /// Creates an analyzer with the built-in generators.
    #[must_use]
    pub fn new(config: AnalysisConfig) -> Self {
        let mut analyzer = Analyzer {
            config,
            passes: PassPipeline::from_config(&config),
            registry: GeneratorRegistry::default(),
            counter: Arc::new(InstructionCounter::new()),
        };
        analyzer.install_counter();
        analyzer
    }

    /// Replaces the generator registry.
    ///
    /// The instruction counter is installed into `registry` when counting is enabled.
    #[must_use]
    pub fn with_registry(mut self, registry: GeneratorRegistry) -> Self {
        self.registry = registry;
        self.install_counter();
        self
    }

    fn install_counter(&mut self) {
        if self.config.count_instructions {
            self.registry.install_counter(Arc::clone(&self.counter));
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Returns the pass pipeline.
    #[must_use]
    pub fn passes(&self) -> &PassPipeline {
        &self.passes
    }

    /// Returns the generator registry.
    #[must_use]
    pub fn registry(&self) -> &GeneratorRegistry {
        &self.registry
    }

    /// Returns the instruction counter.
    ///
    /// It only receives counts when [`AnalysisConfig::count_instructions`] is set.
    #[must_use]
    pub fn counter(&self) -> &Arc<InstructionCounter> {
        &self.counter
    }

    /// Builds `body` and runs the pass pipeline on it, without emitting facts.
    ///
    /// # Errors
    /// Returns construction, classifier and merge errors for the method.
    pub fn prepare(&self, body: &MethodBody) -> Result<Method> {
        let mut method = Method::build(body)?;
        self.passes.run(&mut method)?;
        Ok(method)
    }

    /// Analyses one method body and returns its facts in CFG order.
    ///
    /// # Errors
    /// Returns construction, classifier and merge errors for the method.
    pub fn analyze_method(&self, body: &MethodBody) -> Result<Vec<Fact>> {
        let method = self.prepare(body)?;
        Ok(self.registry.emit(&method))
    }

    /// Analyses every method of `module`.
    ///
    /// Methods run in parallel unless [`AnalysisConfig::parallel`] is off; the reports are
    /// in input order either way.
    #[must_use]
    pub fn analyze_module(&self, module: &ModuleBody) -> ModuleReport {
        let analyze = |body: &MethodBody| {
            let outcome = self.analyze_method(body);
            if let Err(error) = &outcome {
                log::warn!("skipping {}: {}", body.name, error);
            }
            MethodReport {
                method: body.name.clone(),
                outcome,
            }
        };

        let methods: Vec<MethodReport> = if self.config.parallel {
            module.methods.par_iter().map(analyze).collect()
        } else {
            module.methods.iter().map(analyze).collect()
        };

        log::debug!(
            "{}: analysed {} of {} methods",
            module.name,
            methods.iter().filter(|report| report.is_ok()).count(),
            methods.len()
        );
        ModuleReport {
            name: module.name.clone(),
            methods,
        }
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Analyzer::new(AnalysisConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::{MethodBodyBuilder, MethodRef};

    fn module(count: usize) -> ModuleBody {
        let methods = (0..count)
            .map(|i| {
                let mut b = MethodBodyBuilder::new(format!("C::M{i}()"));
                b.module("lib.dll");
                if i % 3 == 2 {
                    b.pop().ret();
                } else {
                    b.call(MethodRef::new("System.Console::ReadLine()", 0))
                        .stloc(0)
                        .ret();
                }
                b.build().unwrap()
            })
            .collect();
        ModuleBody {
            name: "lib.dll".to_string(),
            methods,
        }
    }

    #[test]
    fn reports_keep_input_order_and_isolate_failures() {
        let module = module(12);
        let report = Analyzer::default().analyze_module(&module);
        assert_eq!(report.methods.len(), 12);
        for (i, method) in report.methods.iter().enumerate() {
            assert_eq!(method.method, format!("C::M{i}()"));
            assert_eq!(method.is_ok(), i % 3 != 2);
        }
        assert_eq!(report.failures().count(), 4);
        assert!(matches!(
            report.methods[2].error(),
            Some(Error::StackUnderflow { .. })
        ));
        assert_eq!(report.facts().count(), 8 * 2);
    }

    #[test]
    fn parallel_and_sequential_agree() {
        let module = module(30);
        let parallel = Analyzer::default().analyze_module(&module).to_text();
        let sequential = Analyzer::new(AnalysisConfig::default().with_parallel(false))
            .analyze_module(&module)
            .to_text();
        assert_eq!(parallel, sequential);
    }

    #[test]
    fn counting_is_opt_in() {
        let module = module(3);
        let silent = Analyzer::default();
        silent.analyze_module(&module);
        assert_eq!(silent.counter().total(), 0);

        let counting = Analyzer::new(AnalysisConfig::default().with_count_instructions(true));
        counting.analyze_module(&module);
        // two methods of three instructions; the failed method emits nothing
        assert_eq!(counting.counter().get("lib.dll"), 6);

        counting.counter().reset();
        assert_eq!(counting.counter().total(), 0);
    }

    #[test]
    fn custom_registry_keeps_the_counter() {
        let analyzer = Analyzer::new(AnalysisConfig::default().with_count_instructions(true))
            .with_registry(GeneratorRegistry::new());
        assert_eq!(analyzer.registry().names(), vec!["counter"]);
    }
}
