//! Fact emission.
//!
//! After analysis every node carries its pop and push names and its binding. This module
//! lowers those annotated nodes into relational [`Fact`]s for an external datalog-style
//! solver:
//!
//! - [`Fact`] / [`FactArg`] - The fact model and its `Relation(arg, ...).` text form
//! - [`FactGenerator`] - One rule turning a node into at most one fact
//! - [`GeneratorRegistry`] - Ordered, first-match-wins lookup over generators
//! - [`InstructionCounter`] - Optional per-module instruction counts
//!
//! The built-in generators are listed in [`generators`].

mod fact;
pub mod generators;
mod registry;

pub use fact::{Fact, FactArg};
pub use generators::{CounterGenerator, FactGenerator, InstructionCounter};
pub use registry::GeneratorRegistry;
