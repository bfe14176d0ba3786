//! Fluent CIL assembler for constructing [`MethodBody`] values.
//!
//! The builder lays out instructions at their encoded offsets, resolves branch labels when
//! the body is finished, and records locals, parameters and exception handlers. It picks the
//! shortest encoding for local, argument and constant loads the way a compiler would, and the
//! long form for branches.
//!
//! # Examples
//!
//! ```rust
//! use scil::assembly::{MethodBodyBuilder, MethodRef, OpCode};
//!
//! let mut builder = MethodBodyBuilder::new("Program::Main()");
//! builder
//!     .local("line")
//!     .call(MethodRef::new("System.Console::ReadLine()", 0))
//!     .stloc(0)
//!     .ldloc(0)
//!     .brfalse("done")
//!     .ldloc(0)
//!     .call(MethodRef::new("System.Console::WriteLine(System.String)", 1).returning_void())
//!     .label("done")
//!     .ret();
//!
//! let body = builder.build()?;
//! assert_eq!(body.instructions[1].opcode, OpCode::Stloc0);
//! assert_eq!(body.instructions.len(), 7);
//! # Ok::<(), scil::Error>(())
//! ```

use std::collections::HashMap;

use crate::{
    assembly::{
        ExceptionHandler, ExceptionHandlerFlags, Immediate, Instruction, LocalVariable,
        MethodBody, MethodRef, OpCode, Operand, Parameter,
    },
    Error, Result,
};

enum Fixup {
    Target(String),
    Switch(Vec<String>),
}

struct PendingHandler {
    flags: ExceptionHandlerFlags,
    try_start: String,
    try_end: String,
    filter_start: Option<String>,
    handler_start: String,
    handler_end: String,
    catch_type: Option<String>,
}

/// Fluent assembler for [`MethodBody`] values.
///
/// All emitting methods return `&mut Self`; label problems (duplicates, unknown names) are
/// reported by [`MethodBodyBuilder::build`].
pub struct MethodBodyBuilder {
    body: MethodBody,
    offset: u32,
    labels: HashMap<String, u32>,
    duplicate_labels: Vec<String>,
    fixups: Vec<(usize, Fixup)>,
    handlers: Vec<PendingHandler>,
}

impl MethodBodyBuilder {
    /// Creates a builder for a static `void` method named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        MethodBodyBuilder {
            body: MethodBody::new(name),
            offset: 0,
            labels: HashMap::new(),
            duplicate_labels: Vec::new(),
            fixups: Vec::new(),
            handlers: Vec::new(),
        }
    }

    /// Sets the containing module name.
    pub fn module(&mut self, name: impl Into<String>) -> &mut Self {
        self.body.module = name.into();
        self
    }

    /// Marks the method as an instance method (argument 0 is `this`).
    pub fn with_this(&mut self) -> &mut Self {
        self.body.has_this = true;
        self
    }

    /// Marks the method as returning a value.
    pub fn returning_value(&mut self) -> &mut Self {
        self.body.returns_value = true;
        self
    }

    /// Declares the next local variable slot.
    pub fn local(&mut self, name: impl Into<String>) -> &mut Self {
        let index = u16::try_from(self.body.locals.len()).unwrap_or(u16::MAX);
        self.body.locals.push(LocalVariable {
            index,
            name: Some(name.into()),
            var_type: None,
        });
        self
    }

    /// Declares the next parameter.
    pub fn parameter(&mut self, name: impl Into<String>) -> &mut Self {
        let sequence = u16::try_from(self.body.parameters.len()).unwrap_or(u16::MAX);
        self.body.parameters.push(Parameter {
            sequence,
            name: Some(name.into()),
            param_type: None,
        });
        self
    }

    /// Binds `name` to the offset of the next emitted instruction.
    pub fn label(&mut self, name: &str) -> &mut Self {
        if self.labels.insert(name.to_string(), self.offset).is_some() {
            self.duplicate_labels.push(name.to_string());
        }
        self
    }

    /// Emits an instruction with an explicit operand.
    pub fn emit(&mut self, opcode: OpCode, operand: Operand) -> &mut Self {
        let instruction = Instruction::new(self.offset, opcode, operand);
        self.offset = self.offset.saturating_add(instruction.size());
        self.body.instructions.push(instruction);
        self
    }

    /// Emits an instruction without an operand.
    pub fn op(&mut self, opcode: OpCode) -> &mut Self {
        self.emit(opcode, Operand::None)
    }

    /// Emits a branch-like instruction to `label`.
    pub fn branch(&mut self, opcode: OpCode, label: &str) -> &mut Self {
        self.fixups
            .push((self.body.instructions.len(), Fixup::Target(label.to_string())));
        self.emit(opcode, Operand::Target(0))
    }

    /// Emits `switch` over `labels`.
    pub fn switch(&mut self, labels: &[&str]) -> &mut Self {
        let names = labels.iter().map(ToString::to_string).collect();
        self.fixups
            .push((self.body.instructions.len(), Fixup::Switch(names)));
        self.emit(OpCode::Switch, Operand::Switch(vec![0; labels.len()]))
    }

    /// Emits `nop`.
    pub fn nop(&mut self) -> &mut Self {
        self.op(OpCode::Nop)
    }

    /// Emits `dup`.
    pub fn dup(&mut self) -> &mut Self {
        self.op(OpCode::Dup)
    }

    /// Emits `pop`.
    pub fn pop(&mut self) -> &mut Self {
        self.op(OpCode::Pop)
    }

    /// Emits `add`.
    pub fn add(&mut self) -> &mut Self {
        self.op(OpCode::Add)
    }

    /// Emits `ret`.
    pub fn ret(&mut self) -> &mut Self {
        self.op(OpCode::Ret)
    }

    /// Emits `throw`.
    pub fn throw(&mut self) -> &mut Self {
        self.op(OpCode::Throw)
    }

    /// Emits `endfinally`.
    pub fn endfinally(&mut self) -> &mut Self {
        self.op(OpCode::Endfinally)
    }

    /// Emits `ldloc` in its shortest encoding.
    pub fn ldloc(&mut self, index: u16) -> &mut Self {
        match index {
            0 => self.op(OpCode::Ldloc0),
            1 => self.op(OpCode::Ldloc1),
            2 => self.op(OpCode::Ldloc2),
            3 => self.op(OpCode::Ldloc3),
            i if i <= 0xFF => self.emit(OpCode::LdlocS, Operand::Local(i)),
            i => self.emit(OpCode::Ldloc, Operand::Local(i)),
        }
    }

    /// Emits `stloc` in its shortest encoding.
    pub fn stloc(&mut self, index: u16) -> &mut Self {
        match index {
            0 => self.op(OpCode::Stloc0),
            1 => self.op(OpCode::Stloc1),
            2 => self.op(OpCode::Stloc2),
            3 => self.op(OpCode::Stloc3),
            i if i <= 0xFF => self.emit(OpCode::StlocS, Operand::Local(i)),
            i => self.emit(OpCode::Stloc, Operand::Local(i)),
        }
    }

    /// Emits `ldloca` in its shortest encoding.
    pub fn ldloca(&mut self, index: u16) -> &mut Self {
        if index <= 0xFF {
            self.emit(OpCode::LdlocaS, Operand::Local(index))
        } else {
            self.emit(OpCode::Ldloca, Operand::Local(index))
        }
    }

    /// Emits `ldarg` in its shortest encoding.
    pub fn ldarg(&mut self, index: u16) -> &mut Self {
        match index {
            0 => self.op(OpCode::Ldarg0),
            1 => self.op(OpCode::Ldarg1),
            2 => self.op(OpCode::Ldarg2),
            3 => self.op(OpCode::Ldarg3),
            i if i <= 0xFF => self.emit(OpCode::LdargS, Operand::Argument(i)),
            i => self.emit(OpCode::Ldarg, Operand::Argument(i)),
        }
    }

    /// Emits `starg` in its shortest encoding.
    pub fn starg(&mut self, index: u16) -> &mut Self {
        if index <= 0xFF {
            self.emit(OpCode::StargS, Operand::Argument(index))
        } else {
            self.emit(OpCode::Starg, Operand::Argument(index))
        }
    }

    /// Emits `ldc.i4` in its shortest encoding.
    pub fn ldc_i4(&mut self, value: i32) -> &mut Self {
        match value {
            -1 => self.op(OpCode::LdcI4M1),
            0 => self.op(OpCode::LdcI40),
            1 => self.op(OpCode::LdcI41),
            2 => self.op(OpCode::LdcI42),
            3 => self.op(OpCode::LdcI43),
            4 => self.op(OpCode::LdcI44),
            5 => self.op(OpCode::LdcI45),
            6 => self.op(OpCode::LdcI46),
            7 => self.op(OpCode::LdcI47),
            8 => self.op(OpCode::LdcI48),
            v => match i8::try_from(v) {
                Ok(short) => self.emit(OpCode::LdcI4S, Operand::Immediate(Immediate::Int8(short))),
                Err(_) => self.emit(OpCode::LdcI4, Operand::Immediate(Immediate::Int32(v))),
            },
        }
    }

    /// Emits `ldc.i8`.
    pub fn ldc_i8(&mut self, value: i64) -> &mut Self {
        self.emit(OpCode::LdcI8, Operand::Immediate(Immediate::Int64(value)))
    }

    /// Emits `ldc.r8`.
    pub fn ldc_r8(&mut self, value: f64) -> &mut Self {
        self.emit(OpCode::LdcR8, Operand::Immediate(Immediate::Float64(value)))
    }

    /// Emits `ldstr`.
    pub fn ldstr(&mut self, text: impl Into<String>) -> &mut Self {
        self.emit(OpCode::Ldstr, Operand::String(text.into()))
    }

    /// Emits `ldnull`.
    pub fn ldnull(&mut self) -> &mut Self {
        self.op(OpCode::Ldnull)
    }

    /// Emits `call`.
    pub fn call(&mut self, method: MethodRef) -> &mut Self {
        self.emit(OpCode::Call, Operand::Method(method))
    }

    /// Emits `callvirt`.
    pub fn callvirt(&mut self, method: MethodRef) -> &mut Self {
        self.emit(OpCode::Callvirt, Operand::Method(method))
    }

    /// Emits `newobj`.
    pub fn newobj(&mut self, constructor: MethodRef) -> &mut Self {
        self.emit(OpCode::Newobj, Operand::Method(constructor))
    }

    /// Emits a field access (`ldfld`, `stfld`, `ldsfld`, ...).
    pub fn field(&mut self, opcode: OpCode, name: impl Into<String>) -> &mut Self {
        self.emit(opcode, Operand::Field(name.into()))
    }

    /// Emits a type-token instruction (`box`, `newarr`, `castclass`, ...).
    pub fn with_type(&mut self, opcode: OpCode, name: impl Into<String>) -> &mut Self {
        self.emit(opcode, Operand::Type(name.into()))
    }

    /// Emits `br`.
    pub fn br(&mut self, label: &str) -> &mut Self {
        self.branch(OpCode::Br, label)
    }

    /// Emits `brtrue`.
    pub fn brtrue(&mut self, label: &str) -> &mut Self {
        self.branch(OpCode::Brtrue, label)
    }

    /// Emits `brfalse`.
    pub fn brfalse(&mut self, label: &str) -> &mut Self {
        self.branch(OpCode::Brfalse, label)
    }

    /// Emits `leave`.
    pub fn leave(&mut self, label: &str) -> &mut Self {
        self.branch(OpCode::Leave, label)
    }

    /// Registers an exception handler whose regions are delimited by labels.
    ///
    /// `try_end` and `handler_end` name the first instruction after the region; a label
    /// bound after the last instruction marks the end of the body.
    pub fn handler(
        &mut self,
        flags: ExceptionHandlerFlags,
        try_region: (&str, &str),
        handler_region: (&str, &str),
    ) -> &mut Self {
        self.handlers.push(PendingHandler {
            flags,
            try_start: try_region.0.to_string(),
            try_end: try_region.1.to_string(),
            filter_start: None,
            handler_start: handler_region.0.to_string(),
            handler_end: handler_region.1.to_string(),
            catch_type: None,
        });
        self
    }

    /// Registers a typed catch handler.
    pub fn catch(
        &mut self,
        catch_type: impl Into<String>,
        try_region: (&str, &str),
        handler_region: (&str, &str),
    ) -> &mut Self {
        self.handler(ExceptionHandlerFlags::EXCEPTION, try_region, handler_region);
        if let Some(handler) = self.handlers.last_mut() {
            handler.catch_type = Some(catch_type.into());
        }
        self
    }

    /// Registers a filter clause; the filter expression starts at `filter_start`.
    pub fn filter(
        &mut self,
        try_region: (&str, &str),
        filter_start: &str,
        handler_region: (&str, &str),
    ) -> &mut Self {
        self.handler(ExceptionHandlerFlags::FILTER, try_region, handler_region);
        if let Some(handler) = self.handlers.last_mut() {
            handler.filter_start = Some(filter_start.to_string());
        }
        self
    }

    /// Resolves labels and returns the finished body.
    ///
    /// # Errors
    /// Returns [`Error::Input`] for duplicate or unknown labels.
    pub fn build(&self) -> Result<MethodBody> {
        if let Some(label) = self.duplicate_labels.first() {
            return Err(self.label_error("duplicate", label));
        }

        let mut body = self.body.clone();
        for (index, fixup) in &self.fixups {
            let Some(instruction) = body.instructions.get_mut(*index) else {
                continue;
            };
            instruction.operand = match fixup {
                Fixup::Target(label) => Operand::Target(self.resolve(label)?),
                Fixup::Switch(labels) => Operand::Switch(
                    labels
                        .iter()
                        .map(|label| self.resolve(label))
                        .collect::<Result<Vec<_>>>()?,
                ),
            };
        }

        for pending in &self.handlers {
            let try_offset = self.resolve(&pending.try_start)?;
            let handler_offset = self.resolve(&pending.handler_start)?;
            body.exception_handlers.push(ExceptionHandler {
                flags: pending.flags,
                try_offset,
                try_length: self.resolve(&pending.try_end)?.saturating_sub(try_offset),
                handler_offset,
                handler_length: self
                    .resolve(&pending.handler_end)?
                    .saturating_sub(handler_offset),
                filter_offset: match &pending.filter_start {
                    Some(label) => self.resolve(label)?,
                    None => 0,
                },
                catch_type: pending.catch_type.clone(),
            });
        }

        Ok(body)
    }

    fn resolve(&self, label: &str) -> Result<u32> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| self.label_error("unknown", label))
    }

    fn label_error(&self, problem: &str, label: &str) -> Error {
        Error::Input(format!("{}: {problem} label `{label}`", self.body.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::HandlerKind;

    #[test]
    fn offsets_follow_encoded_sizes() {
        let mut builder = MethodBodyBuilder::new("M");
        builder.ldc_i4(1000).ldc_i4(-5).stloc(7).ret();
        let body = builder.build().unwrap();
        let offsets: Vec<u32> = body.instructions.iter().map(|i| i.offset).collect();
        assert_eq!(offsets, vec![0, 5, 7, 9]);
        assert_eq!(body.instructions[1].opcode, OpCode::LdcI4S);
        assert_eq!(body.instructions[2].opcode, OpCode::StlocS);
    }

    #[test]
    fn labels_resolve_forward_and_backward() {
        let mut builder = MethodBodyBuilder::new("M");
        builder
            .label("top")
            .ldc_i4(0)
            .brtrue("end")
            .br("top")
            .label("end")
            .ret();
        let body = builder.build().unwrap();
        assert_eq!(body.instructions[1].operand, Operand::Target(11));
        assert_eq!(body.instructions[2].operand, Operand::Target(0));
    }

    #[test]
    fn switch_table() {
        let mut builder = MethodBodyBuilder::new("M");
        builder
            .ldarg(0)
            .switch(&["a", "b"])
            .label("a")
            .ret()
            .label("b")
            .ret();
        let body = builder.build().unwrap();
        // ldarg.0 (1) + switch (1 + 4 + 8)
        assert_eq!(body.instructions[1].operand, Operand::Switch(vec![14, 15]));
    }

    #[test]
    fn unknown_and_duplicate_labels() {
        let mut builder = MethodBodyBuilder::new("M");
        builder.br("nowhere");
        assert!(matches!(builder.build(), Err(Error::Input(_))));

        let mut builder = MethodBodyBuilder::new("M");
        builder.label("x").nop().label("x").ret();
        assert!(matches!(builder.build(), Err(Error::Input(_))));
    }

    #[test]
    fn handler_regions() {
        let mut builder = MethodBodyBuilder::new("M");
        builder
            .label("try")
            .nop()
            .leave("after")
            .label("finally")
            .endfinally()
            .label("after")
            .ret()
            .handler(ExceptionHandlerFlags::FINALLY, ("try", "finally"), ("finally", "after"));
        let body = builder.build().unwrap();
        let handler = &body.exception_handlers[0];
        assert_eq!(handler.kind(), HandlerKind::Finally);
        assert_eq!((handler.try_offset, handler.try_length), (0, 6));
        assert_eq!((handler.handler_offset, handler.handler_length), (6, 1));
    }
}
