//! Analysis passes over the [`crate::ir`].
//!
//! This module holds everything that runs on a built [`crate::ir::Method`] before facts
//! are emitted: the stack-effect classifier, the symbolic stack analyzer and the passes
//! that prepare a method for it.
//!
//! # Architecture
//!
//! - [`stack_effect`] / [`classify`] - Pure `(pops, pushes)` classification per opcode
//! - [`StackAnalyzer`] - Symbolic stack simulation assigning slot names to every node
//! - [`PhiInserter`] - Phi nodes at joins that carry stack values
//! - [`BindingResolver`] - Stable names for locals, arguments and fields
//! - [`ShortFormNormalizer`], [`NopEliminator`] - Rewrites run before everything else
//! - [`Pass`], [`PassPipeline`] - The pass abstraction and the ordered pipeline
//!
//! Every pass is also a [`crate::ir::Visitor`], so it can be run directly or composed
//! through a [`PassPipeline`].
//!
//! # Usage
//!
//! ```rust
//! use scil::{
//!     analysis::PassPipeline,
//!     assembly::{MethodBodyBuilder, MethodRef},
//!     ir::Method,
//!     AnalysisConfig,
//! };
//!
//! let mut builder = MethodBodyBuilder::new("Program::Main()");
//! builder
//!     .call(MethodRef::new("System.Console::ReadLine()", 0))
//!     .call(MethodRef::new("System.Console::WriteLine(string)", 1).returning_void())
//!     .ret();
//! let mut method = Method::build(&builder.build()?)?;
//!
//! PassPipeline::from_config(&AnalysisConfig::default()).run(&mut method)?;
//! let read = &method.blocks()[0].nodes()[0];
//! let write = &method.blocks()[0].nodes()[1];
//! assert_eq!(read.push_names(), write.pop_names());
//! # Ok::<(), scil::Error>(())
//! ```

mod analyzer;
mod bindings;
mod pass;
mod phi;
mod rewrite;
mod stack;

pub use analyzer::StackAnalyzer;
pub use bindings::BindingResolver;
pub use pass::{Pass, PassPipeline};
pub use phi::PhiInserter;
pub use rewrite::{NopEliminator, ShortFormNormalizer};
pub use stack::{classify, stack_effect, StackEffect};
