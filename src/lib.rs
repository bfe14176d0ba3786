// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![deny(unsafe_code)]

//! # scil
//!
//! A static taint-analysis front-end for CIL bytecode. `scil` takes decoded .NET method
//! bodies, reconstructs their control flow, simulates the evaluation stack symbolically, and
//! lowers every instruction into a relational fact for a datalog-style solver that computes
//! flows from sources (user input) to sinks (logging, SQL, process execution).
//!
//! ## Features
//!
//! - **Control flow reconstruction** - Basic blocks split at branch targets, terminators and
//!   exception handler boundaries, with deterministic predecessor order
//! - **Symbolic stack naming** - Every pushed and popped value gets a stable depth-based name,
//!   with phi nodes reconciling values that reach a join along different paths
//! - **Rewriting framework** - A visitor whose traversal stays correct while nodes are replaced
//! - **Pluggable fact generators** - An ordered registry of instruction-to-fact lowerings
//! - **Parallel module analysis** - Methods are analysed independently on the rayon pool
//!
//! ## Quick Start
//!
//! ```rust
//! use scil::prelude::*;
//!
//! let mut builder = MethodBodyBuilder::new("Program::Main()");
//! builder
//!     .local("line")
//!     .call(MethodRef::new("System.Console::ReadLine()", 0))
//!     .stloc(0)
//!     .ldloc(0)
//!     .call(MethodRef::new("System.Console::WriteLine(System.String)", 1).returning_void())
//!     .ret();
//!
//! let facts = Analyzer::default().analyze_method(&builder.build()?)?;
//! for fact in &facts {
//!     println!("{fact}");
//! }
//! // CallStm("System.Console::ReadLine()", [], ["Program::Main()#st0"]).
//! // StlocStm("Program::Main()#line", "Program::Main()#st0").
//! // LdlocStm("Program::Main()#st0", "Program::Main()#line").
//! // CallStm("System.Console::WriteLine(System.String)", ["Program::Main()#st0"], []).
//! assert_eq!(facts.len(), 4);
//! # Ok::<(), scil::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`assembly`] - Decoded input: opcodes, operands, method bodies, handler tables
//! - [`ir`] - The mutable analysis IR: nodes, blocks, methods and the visitor framework
//! - [`analysis`] - Stack-effect classification and the passes that annotate the IR
//! - [`facts`] - Fact model, generators and the generator registry
//! - [`Analyzer`] - Driver tying CFG construction, passes and emission together
//! - [`Error`] and [`Result`] - Error handling
//!
//! ### Pipeline
//!
//! ```text
//! MethodBody ──▶ Method::build ──▶ ShortFormNormalizer ──▶ NopEliminator
//!            ──▶ BindingResolver ──▶ PhiInserter ──▶ StackAnalyzer ──▶ GeneratorRegistry ──▶ facts
//! ```
//!
//! Each stage is fatal for the method it runs on: a malformed body or an inconsistent stack
//! aborts that method without partial output, while [`Analyzer::analyze_module`] continues
//! with the remaining methods.

#[macro_use]
pub(crate) mod error;

pub mod analysis;
pub mod assembly;
pub mod facts;
pub mod ir;
pub mod prelude;

mod config;
mod pipeline;

/// `scil` Result type.
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`Error`]. Used consistently throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// `scil` Error type.
///
/// The main error type for all operations in this crate. See the [`Error`] documentation
/// for the error categories and the method-level failure policy.
pub use error::Error;

pub use config::AnalysisConfig;
pub use pipeline::{Analyzer, MethodReport, ModuleReport};
