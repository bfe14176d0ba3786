//! Decoded CIL input model.
//!
//! The analyzer does not parse PE files or metadata tables itself; it consumes method bodies
//! whose instructions have already been decoded and whose tokens have been resolved. This
//! module defines that input: the full ECMA-335 opcode table with flow and stack-behaviour
//! metadata, typed operands, method bodies with their exception handler tables, and a fluent
//! builder for assembling bodies by hand.
//!
//! # Key Components
//!
//! - [`OpCode`] - Every CIL opcode with value, mnemonic, flow type and stack behaviour
//! - [`Instruction`] / [`Operand`] - One decoded instruction and its resolved operand
//! - [`MethodBody`] / [`ModuleBody`] - Units of analysis, deserializable from JSON
//! - [`ExceptionHandler`] - Protected regions and handler entry points
//! - [`MethodBodyBuilder`] - Label-resolving assembler for tests and tooling

mod body;
mod builder;
mod instruction;
mod opcodes;

pub use body::{
    ExceptionHandler, ExceptionHandlerFlags, HandlerKind, LocalVariable, MethodBody, ModuleBody,
    Parameter,
};
pub use builder::MethodBodyBuilder;
pub use instruction::{
    FlowType, Immediate, Instruction, MethodRef, Operand, OperandType, StackBehavior,
};
pub use opcodes::OpCode;
