//! Pass trait and the ordered per-method pipeline.
//!
//! Every transformation of a [`Method`] after construction is a [`Pass`]. A
//! [`PassPipeline`] runs its passes in insertion order, once each, and stops at the first
//! error: a method that fails any pass produces no facts.
//!
//! # Pipeline Order
//!
//! [`PassPipeline::from_config`] builds the canonical order:
//!
//! 1. **Normalize**: [`ShortFormNormalizer`] (optional)
//! 2. **Cleanup**: [`NopEliminator`] (optional)
//! 3. **Bindings**: [`BindingResolver`]
//! 4. **Merge**: [`PhiInserter`] (optional)
//! 5. **Stack**: [`StackAnalyzer`]
//!
//! Rewrites run first so that later passes and the fact generators only see long forms;
//! the stack analyzer runs last so that the names it assigns cover every node that
//! survives.

use std::fmt;

use crate::{
    analysis::{BindingResolver, NopEliminator, PhiInserter, ShortFormNormalizer, StackAnalyzer},
    ir::Method,
    AnalysisConfig, Result,
};

/// A transformation or analysis that operates on one method.
///
/// All passes must be thread-safe (Send + Sync) so that one pipeline can be shared by
/// every worker of a parallel module analysis. Per-run state lives in the visitor a pass
/// creates inside `run_on_method`, never in the pass itself.
pub trait Pass: Send + Sync {
    /// Unique name for logging and debugging.
    fn name(&self) -> &'static str;

    /// Get a description of what this pass does.
    fn description(&self) -> &'static str {
        "No description available"
    }

    /// Run the pass on a single method.
    ///
    /// Returns `true` if the pass changed the method, `false` otherwise.
    ///
    /// # Errors
    ///
    /// Returns an error if the pass fails to process the method. The method must then be
    /// discarded.
    fn run_on_method(&self, method: &mut Method) -> Result<bool>;
}

/// An ordered list of passes.
#[derive(Default)]
pub struct PassPipeline {
    passes: Vec<Box<dyn Pass>>,
}

impl PassPipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the canonical pipeline for `config`.
    #[must_use]
    pub fn from_config(config: &AnalysisConfig) -> Self {
        let mut pipeline = Self::new();
        if config.normalize_short_forms {
            pipeline.add(ShortFormNormalizer::new());
        }
        if config.eliminate_nops {
            pipeline.add(NopEliminator::new());
        }
        pipeline.add(BindingResolver::new());
        if config.insert_phis {
            pipeline.add(PhiInserter::new());
        }
        pipeline.add(StackAnalyzer::new());
        pipeline
    }

    /// Appends `pass` to the pipeline.
    pub fn add<P: Pass + 'static>(&mut self, pass: P) -> &mut Self {
        self.passes.push(Box::new(pass));
        self
    }

    /// Returns the pass names in execution order.
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Returns the number of passes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.passes.len()
    }

    /// Returns `true` if the pipeline has no passes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Runs every pass on `method` in order.
    ///
    /// Returns the number of passes that reported a change.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a pass; later passes do not run.
    pub fn run(&self, method: &mut Method) -> Result<usize> {
        let mut changed = 0;
        for pass in &self.passes {
            let modified = pass.run_on_method(method)?;
            log::debug!(
                "{}: pass {} {}",
                method.name(),
                pass.name(),
                if modified { "changed the method" } else { "made no changes" }
            );
            changed += usize::from(modified);
        }
        Ok(changed)
    }
}

impl fmt::Debug for PassPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::MethodBodyBuilder;

    #[test]
    fn canonical_order() {
        let pipeline = PassPipeline::from_config(&AnalysisConfig::default());
        assert_eq!(
            pipeline.names(),
            vec![
                "short-form-normalizer",
                "nop-eliminator",
                "binding-resolver",
                "phi-inserter",
                "stack-analyzer"
            ]
        );

        let minimal = PassPipeline::from_config(&AnalysisConfig::minimal());
        assert_eq!(minimal.names(), vec!["binding-resolver", "stack-analyzer"]);
    }

    #[test]
    fn first_error_stops_the_pipeline() {
        struct Fails;
        impl Pass for Fails {
            fn name(&self) -> &'static str {
                "fails"
            }
            fn run_on_method(&self, method: &mut Method) -> Result<bool> {
                Err(crate::Error::EmptyMethod(method.name().to_string()))
            }
        }

        let mut b = MethodBodyBuilder::new("M");
        b.ldc_i4(1).pop().ret();
        let mut method = Method::build(&b.build().unwrap()).unwrap();

        let mut pipeline = PassPipeline::new();
        pipeline.add(Fails).add(StackAnalyzer::new());
        assert!(pipeline.run(&mut method).is_err());
        assert!(method.nodes().all(|node| node.push_names().is_empty()));
    }

    #[test]
    fn counts_changing_passes() {
        let mut b = MethodBodyBuilder::new("M");
        b.nop().ldc_i4(1).pop().ret();
        let mut method = Method::build(&b.build().unwrap()).unwrap();
        let pipeline = PassPipeline::from_config(&AnalysisConfig::default());
        // normalizer (ldc.i4.1), nop eliminator, stack analyzer
        assert_eq!(pipeline.run(&mut method).unwrap(), 3);
    }
}
