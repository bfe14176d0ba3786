//! # scil Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the scil library. Import this module to get quick access to everything needed to
//! build, analyse and lower method bodies.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all scil operations
pub use crate::Error;

/// The result type used throughout scil
pub use crate::Result;

/// Pass and scheduling switches
pub use crate::AnalysisConfig;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Driver and its per-method and per-module reports
pub use crate::{Analyzer, MethodReport, ModuleReport};

// ================================================================================================
// Decoded Input
// ================================================================================================

/// Opcodes, operands and instructions
pub use crate::assembly::{
    FlowType, Immediate, Instruction, MethodRef, OpCode, Operand, StackBehavior,
};

/// Method bodies, modules and exception handlers
pub use crate::assembly::{
    ExceptionHandler, ExceptionHandlerFlags, HandlerKind, LocalVariable, MethodBody,
    MethodBodyBuilder, ModuleBody, Parameter,
};

// ================================================================================================
// Analysis IR
// ================================================================================================

/// Methods, blocks and nodes
pub use crate::ir::{Block, BlockId, Method, Node, NodeId, NodeKind, NodeRef, PhiNode, StackName};

/// Traversal
pub use crate::ir::{walk_block, walk_method, Visitor};

// ================================================================================================
// Passes
// ================================================================================================

/// Classification
pub use crate::analysis::{classify, stack_effect, StackEffect};

/// Passes and the pipeline
pub use crate::analysis::{
    BindingResolver, NopEliminator, Pass, PassPipeline, PhiInserter, ShortFormNormalizer,
    StackAnalyzer,
};

// ================================================================================================
// Facts
// ================================================================================================

/// Fact model, generators and the registry
pub use crate::facts::{
    CounterGenerator, Fact, FactArg, FactGenerator, GeneratorRegistry, InstructionCounter,
};
