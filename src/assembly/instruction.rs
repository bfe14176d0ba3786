//! Decoded CIL instruction representation, operand types, and flow metadata.
//!
//! This module defines the immutable input model the analyzer consumes: one
//! [`crate::assembly::Instruction`] per decoded CIL operation, with its byte offset, opcode and a
//! typed operand whose metadata references are already resolved into names and signatures.
//!
//! # Key Components
//!
//! - [`crate::assembly::Instruction`] - Complete decoded instruction
//! - [`crate::assembly::Operand`] - Type-safe, metadata-resolved operand
//! - [`crate::assembly::Immediate`] - Immediate constant values
//! - [`crate::assembly::MethodRef`] - Callee signature summary carried by call operands
//! - [`crate::assembly::FlowType`] - Control flow behavior classification
//! - [`crate::assembly::StackBehavior`] - ECMA-335 stack-behaviour categories
//!
//! # Usage Examples
//!
//! ```rust
//! use scil::assembly::{FlowType, Immediate, Instruction, OpCode, Operand};
//!
//! let branch = Instruction::new(0x10, OpCode::BrtrueS, Operand::Target(0x20));
//! assert_eq!(branch.flow_type(), FlowType::ConditionalBranch);
//! assert_eq!(branch.targets(), vec![0x20]);
//! assert_eq!(branch.size(), 2);
//!
//! let constant = Instruction::new(0x12, OpCode::LdcI4, Operand::Immediate(Immediate::Int32(7)));
//! assert!(!constant.is_terminal());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::assembly::OpCode;

/// Types of inline operands for CIL instructions.
///
/// Each variant corresponds to a specific encoded size in the instruction stream. Branch
/// instructions use [`OperandType::Int8`] (short form) or [`OperandType::Int32`] (long form)
/// for their relative displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    /// No operand present
    None,
    /// Signed 8-bit integer
    Int8,
    /// Unsigned 8-bit integer
    UInt8,
    /// Unsigned 16-bit integer
    UInt16,
    /// Signed 32-bit integer
    Int32,
    /// Signed 64-bit integer
    Int64,
    /// 32-bit floating point
    Float32,
    /// 64-bit floating point
    Float64,
    /// Metadata token reference
    Token,
    /// Switch table operand
    Switch,
}

impl OperandType {
    /// Returns the size in bytes of this operand type.
    ///
    /// Returns `Some(size)` for fixed-size operands, or `None` for variable-size
    /// operands (`Switch`, which encodes `4 + count * 4` bytes).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use scil::assembly::OperandType;
    ///
    /// assert_eq!(OperandType::None.size(), Some(0));
    /// assert_eq!(OperandType::Int8.size(), Some(1));
    /// assert_eq!(OperandType::Token.size(), Some(4));
    /// assert_eq!(OperandType::Switch.size(), None);
    /// ```
    #[must_use]
    pub const fn size(&self) -> Option<usize> {
        match self {
            OperandType::None => Some(0),
            OperandType::Int8 | OperandType::UInt8 => Some(1),
            OperandType::UInt16 => Some(2),
            OperandType::Int32 | OperandType::Float32 | OperandType::Token => Some(4),
            OperandType::Int64 | OperandType::Float64 => Some(8),
            OperandType::Switch => None,
        }
    }
}

/// Represents an immediate value embedded in a CIL instruction.
///
/// # Examples
///
/// ```rust
/// use scil::assembly::Immediate;
///
/// assert_eq!(Immediate::Int8(-3).as_i64(), Some(-3));
/// assert_eq!(Immediate::Float64(1.5).as_i64(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Immediate {
    /// Signed 8-bit immediate value
    Int8(i8),
    /// Unsigned 8-bit immediate value
    UInt8(u8),
    /// Unsigned 16-bit immediate value
    UInt16(u16),
    /// Signed 32-bit immediate value
    Int32(i32),
    /// Signed 64-bit immediate value
    Int64(i64),
    /// 32-bit floating point immediate value
    Float32(f32),
    /// 64-bit floating point immediate value
    Float64(f64),
}

impl Immediate {
    /// Returns the value as a signed integer, or `None` for floating point immediates.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Immediate::Int8(value) => Some(i64::from(value)),
            Immediate::UInt8(value) => Some(i64::from(value)),
            Immediate::UInt16(value) => Some(i64::from(value)),
            Immediate::Int32(value) => Some(i64::from(value)),
            Immediate::Int64(value) => Some(value),
            Immediate::Float32(_) | Immediate::Float64(_) => None,
        }
    }

    /// Returns the value as a float, or `None` for integer immediates.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Immediate::Float32(value) => Some(f64::from(value)),
            Immediate::Float64(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for Immediate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Immediate::Int8(value) => write!(f, "{value}"),
            Immediate::UInt8(value) => write!(f, "{value}"),
            Immediate::UInt16(value) => write!(f, "{value}"),
            Immediate::Int32(value) => write!(f, "{value}"),
            Immediate::Int64(value) => write!(f, "{value}"),
            Immediate::Float32(value) => write!(f, "{value:?}"),
            Immediate::Float64(value) => write!(f, "{value:?}"),
        }
    }
}

/// Summary of a callee signature, as carried by `call`, `callvirt`, `calli` and `newobj`.
///
/// This is everything the stack-effect classifier needs to size a call: the number of
/// declared parameters, whether a receiver is passed, and whether a value is returned.
///
/// # Examples
///
/// ```rust
/// use scil::assembly::MethodRef;
///
/// let write_line = MethodRef::new("System.Console::WriteLine(System.String)", 1)
///     .returning_void();
/// assert_eq!(write_line.argument_count(), 1);
///
/// let append = MethodRef::new("System.Text.StringBuilder::Append(System.String)", 1)
///     .with_this();
/// assert_eq!(append.argument_count(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodRef {
    /// Fully qualified callee name, including the parameter list
    pub name: String,
    /// Number of declared parameters (excluding an implicit `this`)
    pub parameter_count: usize,
    /// The call passes a receiver (`HASTHIS` calling convention)
    #[serde(default)]
    pub has_this: bool,
    /// The receiver is already declared as the first parameter (`EXPLICITTHIS`)
    #[serde(default)]
    pub explicit_this: bool,
    /// The callee returns `void`
    #[serde(default)]
    pub returns_void: bool,
}

impl MethodRef {
    /// Creates a static, value-returning method reference.
    pub fn new(name: impl Into<String>, parameter_count: usize) -> Self {
        MethodRef {
            name: name.into(),
            parameter_count,
            has_this: false,
            explicit_this: false,
            returns_void: false,
        }
    }

    /// Marks the callee as an instance method.
    #[must_use]
    pub fn with_this(mut self) -> Self {
        self.has_this = true;
        self
    }

    /// Marks the callee as returning `void`.
    #[must_use]
    pub fn returning_void(mut self) -> Self {
        self.returns_void = true;
        self
    }

    /// Returns the number of stack values a call consumes: parameters plus the receiver.
    ///
    /// An `EXPLICITTHIS` receiver is already counted among the parameters.
    #[must_use]
    pub fn argument_count(&self) -> usize {
        let receiver = usize::from(self.has_this && !self.explicit_this);
        self.parameter_count + receiver
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A metadata-resolved instruction operand.
///
/// Tokens are resolved before analysis: strings carry their text, members carry their
/// full names, and call operands carry a [`MethodRef`] signature summary.
///
/// In JSON the operand is externally tagged, e.g. `"none"`, `{"local": 0}`,
/// `{"target": 24}` or `{"method": {"name": "...", "parameter_count": 1}}`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operand {
    /// No operand present
    #[default]
    None,
    /// Immediate value (constant embedded in instruction)
    Immediate(Immediate),
    /// Absolute branch target offset
    Target(u32),
    /// Switch table of absolute target offsets
    Switch(Vec<u32>),
    /// Local variable index
    Local(u16),
    /// Method argument index
    Argument(u16),
    /// String literal (`ldstr`)
    String(String),
    /// Method reference (`call`, `newobj`, `ldftn`, ...)
    Method(MethodRef),
    /// Field full name (`ldfld`, `stsfld`, ...)
    Field(String),
    /// Type full name (`box`, `newarr`, `castclass`, ...)
    Type(String),
}

impl Operand {
    /// Returns the callee signature for call-like operands.
    #[must_use]
    pub fn as_method(&self) -> Option<&MethodRef> {
        match self {
            Operand::Method(method) => Some(method),
            _ => None,
        }
    }

    /// Returns a local or argument index, also accepting a raw unsigned immediate.
    #[must_use]
    pub fn as_index(&self) -> Option<u16> {
        match self {
            Operand::Local(index) | Operand::Argument(index) => Some(*index),
            Operand::Immediate(Immediate::UInt8(index)) => Some(u16::from(*index)),
            Operand::Immediate(Immediate::UInt16(index)) => Some(*index),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::Immediate(imm) => write!(f, "{imm}"),
            Operand::Target(target) => write!(f, "IL_{target:04x}"),
            Operand::Switch(targets) => {
                f.write_str("(")?;
                for (i, target) in targets.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "IL_{target:04x}")?;
                }
                f.write_str(")")
            }
            Operand::Local(index) => write!(f, "V_{index}"),
            Operand::Argument(index) => write!(f, "A_{index}"),
            Operand::String(text) => write!(f, "{text:?}"),
            Operand::Method(method) => write!(f, "{method}"),
            Operand::Field(name) | Operand::Type(name) => f.write_str(name),
        }
    }
}

/// How an instruction affects control flow.
///
/// `endfilter` is classified as [`FlowType::EndFinally`], `jmp` as [`FlowType::Return`],
/// and `break` plus all prefix opcodes as [`FlowType::Sequential`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowType {
    /// Normal execution continues to next instruction
    Sequential,
    /// Conditional branch to another location
    ConditionalBranch,
    /// Always branches to another location (unconditional jump)
    UnconditionalBranch,
    /// Call to another method
    Call,
    /// Returns from current method
    Return,
    /// Multi-way branch (switch statement)
    Switch,
    /// Exception throwing
    Throw,
    /// End of finally or filter block
    EndFinally,
    /// Leave protected region (try/catch/finally)
    Leave,
}

impl FlowType {
    /// Returns `true` if execution can continue with the next instruction in the stream.
    #[must_use]
    pub const fn falls_through(self) -> bool {
        matches!(
            self,
            FlowType::Sequential | FlowType::Call | FlowType::ConditionalBranch | FlowType::Switch
        )
    }

    /// Returns `true` if the following instruction must start a new basic block.
    #[must_use]
    pub const fn ends_block(self) -> bool {
        !matches!(self, FlowType::Sequential | FlowType::Call)
    }
}

/// ECMA-335 stack-behaviour category of an opcode's pops or pushes.
///
/// The category names follow Partition VI (`Pop1_pop1`, `Popref_popi_popi8`, ...). The
/// fixed-arity categories have a known count; [`StackBehavior::Varpop`] and
/// [`StackBehavior::Varpush`] depend on the operand and are sized by the classifier.
///
/// # Examples
///
/// ```rust
/// use scil::assembly::StackBehavior;
///
/// assert_eq!(StackBehavior::PoprefPopiPopr8.count(), Some(3));
/// assert_eq!(StackBehavior::Push1Push1.count(), Some(2));
/// assert_eq!(StackBehavior::PopAll.count(), Some(0));
/// assert_eq!(StackBehavior::Varpop.count(), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackBehavior {
    /// Pops nothing
    Pop0,
    /// Pops one value
    Pop1,
    /// Pops one value and another value
    Pop1Pop1,
    /// Pops a native int
    Popi,
    /// Pops a native int and a value
    PopiPop1,
    /// Pops two native ints
    PopiPopi,
    /// Pops a native int and an int64
    PopiPopi8,
    /// Pops three native ints
    PopiPopiPopi,
    /// Pops a native int and a float32
    PopiPopr4,
    /// Pops a native int and a float64
    PopiPopr8,
    /// Pops an object reference
    Popref,
    /// Pops an object reference and a value
    PoprefPop1,
    /// Pops an object reference and a native int
    PoprefPopi,
    /// Pops an object reference and two native ints
    PoprefPopiPopi,
    /// Pops an object reference, a native int and an int64
    PoprefPopiPopi8,
    /// Pops an object reference, a native int and a float32
    PoprefPopiPopr4,
    /// Pops an object reference, a native int and a float64
    PoprefPopiPopr8,
    /// Pops an object reference, a native int and another reference
    PoprefPopiPopref,
    /// Empties the evaluation stack (`leave`); modelled as no pops
    PopAll,
    /// Operand-dependent number of pops
    Varpop,
    /// Pushes nothing
    Push0,
    /// Pushes one value
    Push1,
    /// Pushes two values (`dup`)
    Push1Push1,
    /// Pushes a native int
    Pushi,
    /// Pushes an int64
    Pushi8,
    /// Pushes a float32
    Pushr4,
    /// Pushes a float64
    Pushr8,
    /// Pushes an object reference
    Pushref,
    /// Operand-dependent number of pushes
    Varpush,
}

impl StackBehavior {
    /// Returns the fixed number of values for this category, `None` for variable arity.
    #[must_use]
    pub const fn count(self) -> Option<usize> {
        match self {
            StackBehavior::Pop0 | StackBehavior::PopAll | StackBehavior::Push0 => Some(0),
            StackBehavior::Pop1
            | StackBehavior::Popi
            | StackBehavior::Popref
            | StackBehavior::Push1
            | StackBehavior::Pushi
            | StackBehavior::Pushi8
            | StackBehavior::Pushr4
            | StackBehavior::Pushr8
            | StackBehavior::Pushref => Some(1),
            StackBehavior::Pop1Pop1
            | StackBehavior::PopiPop1
            | StackBehavior::PopiPopi
            | StackBehavior::PopiPopi8
            | StackBehavior::PopiPopr4
            | StackBehavior::PopiPopr8
            | StackBehavior::PoprefPop1
            | StackBehavior::PoprefPopi
            | StackBehavior::Push1Push1 => Some(2),
            StackBehavior::PopiPopiPopi
            | StackBehavior::PoprefPopiPopi
            | StackBehavior::PoprefPopiPopi8
            | StackBehavior::PoprefPopiPopr4
            | StackBehavior::PoprefPopiPopr8
            | StackBehavior::PoprefPopiPopref => Some(3),
            StackBehavior::Varpop | StackBehavior::Varpush => None,
        }
    }
}

/// A decoded CIL instruction.
///
/// Instructions are immutable once decoded. The analyzer wraps each of them in an
/// [`crate::ir::Node`], which carries the mutable rewrite and annotation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// Byte offset of the instruction within the method body
    pub offset: u32,
    /// The opcode
    pub opcode: OpCode,
    /// The resolved operand
    #[serde(default)]
    pub operand: Operand,
}

impl Instruction {
    /// Creates a new instruction.
    pub fn new(offset: u32, opcode: OpCode, operand: Operand) -> Self {
        Instruction {
            offset,
            opcode,
            operand,
        }
    }

    /// Returns the control flow behavior of the opcode.
    #[must_use]
    pub const fn flow_type(&self) -> FlowType {
        self.opcode.flow_type()
    }

    /// Returns `true` if the instruction transfers control to explicit targets.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        matches!(
            self.flow_type(),
            FlowType::ConditionalBranch
                | FlowType::UnconditionalBranch
                | FlowType::Switch
                | FlowType::Leave
        )
    }

    /// Returns `true` if control never continues with the next instruction.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !self.flow_type().falls_through()
    }

    /// Returns the absolute branch targets of the instruction, in operand order.
    #[must_use]
    pub fn targets(&self) -> Vec<u32> {
        match &self.operand {
            Operand::Target(target) if self.is_branch() => vec![*target],
            Operand::Switch(targets) => targets.clone(),
            _ => Vec::new(),
        }
    }

    /// Returns the encoded size of the instruction in bytes.
    #[must_use]
    pub fn size(&self) -> u32 {
        let operand = match (self.opcode.operand_type().size(), &self.operand) {
            (Some(size), _) => size,
            (None, Operand::Switch(targets)) => 4 + targets.len() * 4,
            (None, _) => 4,
        };
        u32::try_from(self.opcode.size() + operand).unwrap_or(u32::MAX)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04x}: {}", self.offset, self.opcode)?;
        if self.operand != Operand::None {
            write!(f, " {}", self.operand)?;
        }
        Ok(())
    }
}
