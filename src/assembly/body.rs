//! Decoded method bodies, exception handler tables and the JSON interchange format.
//!
//! A [`MethodBody`] is everything the analyzer needs about one method: its identity, the
//! ordered instruction stream, the locals and parameter tables, the exception handler
//! table, and the bits of its signature that size `ret`. Bodies are grouped per module in a
//! [`ModuleBody`], which is the unit read from disk by the command line tool.
//!
//! # JSON Layout
//!
//! ```json
//! {
//!   "name": "HelloWorld.dll",
//!   "methods": [{
//!     "name": "Program::Main()",
//!     "returns_value": false,
//!     "locals": [{ "index": 0, "name": "line" }],
//!     "instructions": [
//!       { "offset": 0, "opcode": "call",
//!         "operand": { "method": { "name": "System.Console::ReadLine()", "parameter_count": 0 } } },
//!       { "offset": 5, "opcode": "stloc.0" },
//!       { "offset": 6, "opcode": "ret" }
//!     ]
//!   }]
//! }
//! ```

use std::io::Read;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::{assembly::Instruction, Result};

bitflags! {
    /// Exception handler flags defining the type of exception handling clause.
    ///
    /// Serialized in the `bitflags` text format (`"FINALLY"`, `"FILTER"`); an absent or
    /// empty value is a typed catch clause.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct ExceptionHandlerFlags: u16 {
        /// A typed exception clause.
        const EXCEPTION = 0x0000;
        /// An exception filter and handler clause.
        const FILTER = 0x0001;
        /// A finally clause.
        const FINALLY = 0x0002;
        /// A fault clause (finally that executes only on exception).
        const FAULT = 0x0004;
    }
}

/// The kind of code that starts at a handler entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    /// Typed catch handler
    Catch,
    /// Filter expression or the handler guarded by it
    Filter,
    /// Finally handler
    Finally,
    /// Fault handler
    Fault,
}

impl HandlerKind {
    /// Returns the evaluation stack depth on entry to code of this kind.
    ///
    /// Catch handlers and filters receive the exception object. Finally and fault
    /// handlers use 0: the runtime pushes nothing for them, and `endfinally` must leave an
    /// empty stack.
    #[must_use]
    pub const fn dispatch_depth(self) -> usize {
        match self {
            HandlerKind::Catch | HandlerKind::Filter => 1,
            HandlerKind::Finally | HandlerKind::Fault => 0,
        }
    }
}

/// Exception handler defining a protected region and its handler within a method.
///
/// # Layout in IL
///
/// ```text
/// try {
///     // try_offset -> try_offset + try_length
/// }
/// filter {
///     // filter_offset -> handler_offset (FILTER only)
/// }
/// catch / finally / fault {
///     // handler_offset -> handler_offset + handler_length
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExceptionHandler {
    /// Flags describing the type of exception handler (catch, filter, finally, fault).
    #[serde(default)]
    pub flags: ExceptionHandlerFlags,
    /// Offset in bytes of try block from start of method body.
    pub try_offset: u32,
    /// Length in bytes of the try block.
    pub try_length: u32,
    /// Location of the handler for this try block.
    pub handler_offset: u32,
    /// Size of the handler code in bytes.
    pub handler_length: u32,
    /// Offset of the filter expression, meaningful only for `FILTER` clauses.
    #[serde(default)]
    pub filter_offset: u32,
    /// Full name of the caught exception type for typed catch clauses.
    #[serde(default)]
    pub catch_type: Option<String>,
}

impl ExceptionHandler {
    /// Returns the kind of code at [`ExceptionHandler::handler_offset`].
    #[must_use]
    pub fn kind(&self) -> HandlerKind {
        if self.flags.contains(ExceptionHandlerFlags::FILTER) {
            HandlerKind::Filter
        } else if self.flags.contains(ExceptionHandlerFlags::FINALLY) {
            HandlerKind::Finally
        } else if self.flags.contains(ExceptionHandlerFlags::FAULT) {
            HandlerKind::Fault
        } else {
            HandlerKind::Catch
        }
    }

    /// Returns every code offset at which an exception dispatch enters, with its kind.
    ///
    /// Filter clauses contribute both the filter expression and the guarded handler.
    #[must_use]
    pub fn entry_points(&self) -> Vec<(u32, HandlerKind)> {
        let kind = self.kind();
        let mut entries = Vec::with_capacity(2);
        if kind == HandlerKind::Filter {
            entries.push((self.filter_offset, kind));
        }
        entries.push((self.handler_offset, kind));
        entries
    }

    /// Returns the offsets that delimit the try region and the handler.
    #[must_use]
    pub fn boundaries(&self) -> Vec<u32> {
        let mut offsets = vec![
            self.try_offset,
            self.try_offset.saturating_add(self.try_length),
            self.handler_offset,
            self.handler_offset.saturating_add(self.handler_length),
        ];
        if self.kind() == HandlerKind::Filter {
            offsets.push(self.filter_offset);
        }
        offsets
    }
}

/// A local variable slot of a method body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalVariable {
    /// Slot index
    pub index: u16,
    /// Debug name, when symbols are available
    #[serde(default)]
    pub name: Option<String>,
    /// Full name of the declared type
    #[serde(default, rename = "type")]
    pub var_type: Option<String>,
}

/// A declared parameter of a method (never the implicit `this`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    /// Zero-based position in the declared parameter list
    pub sequence: u16,
    /// Parameter name
    #[serde(default)]
    pub name: Option<String>,
    /// Full name of the declared type
    #[serde(default, rename = "type")]
    pub param_type: Option<String>,
}

/// A decoded method body, the analyzer's unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodBody {
    /// Fully qualified method identity, e.g. `Program::Main(System.String[])`
    pub name: String,
    /// Name of the containing module
    #[serde(default)]
    pub module: String,
    /// The method receives `this` as argument 0
    #[serde(default)]
    pub has_this: bool,
    /// The method returns a value (`ret` pops one value)
    #[serde(default)]
    pub returns_value: bool,
    /// Declared parameters
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Local variable slots
    #[serde(default)]
    pub locals: Vec<LocalVariable>,
    /// Instruction stream in offset order
    pub instructions: Vec<Instruction>,
    /// Exception handler table
    #[serde(default)]
    pub exception_handlers: Vec<ExceptionHandler>,
}

impl MethodBody {
    /// Creates an empty body for the method `name`.
    pub fn new(name: impl Into<String>) -> Self {
        MethodBody {
            name: name.into(),
            module: String::new(),
            has_this: false,
            returns_value: false,
            parameters: Vec::new(),
            locals: Vec::new(),
            instructions: Vec::new(),
            exception_handlers: Vec::new(),
        }
    }

    /// Parses a single method body from JSON.
    ///
    /// # Errors
    /// Returns [`crate::Error::Input`] for malformed JSON or unknown mnemonics.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Returns the size of the code in bytes (end of the last instruction).
    #[must_use]
    pub fn code_size(&self) -> u32 {
        self.instructions
            .last()
            .map_or(0, |last| last.offset.saturating_add(last.size()))
    }
}

/// A module's worth of decoded method bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleBody {
    /// Module name
    pub name: String,
    /// Method bodies in declaration order
    #[serde(default)]
    pub methods: Vec<MethodBody>,
}

impl ModuleBody {
    /// Parses a module from JSON. Methods without a module name inherit the module's.
    ///
    /// # Errors
    /// Returns [`crate::Error::Input`] for malformed JSON or unknown mnemonics.
    pub fn from_json(json: &str) -> Result<Self> {
        let module: ModuleBody = serde_json::from_str(json)?;
        Ok(module.with_inherited_names())
    }

    /// Reads a module from any reader producing JSON.
    ///
    /// # Errors
    /// Returns [`crate::Error::Input`] for I/O failures, malformed JSON or unknown mnemonics.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let module: ModuleBody = serde_json::from_reader(reader)?;
        Ok(module.with_inherited_names())
    }

    /// Finds a method by its full identity.
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodBody> {
        self.methods.iter().find(|method| method.name == name)
    }

    fn with_inherited_names(mut self) -> Self {
        for method in &mut self.methods {
            if method.module.is_empty() {
                method.module.clone_from(&self.name);
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembly::OpCode;

    #[test]
    fn handler_kinds() {
        let mut handler = ExceptionHandler {
            flags: ExceptionHandlerFlags::EXCEPTION,
            try_offset: 0,
            try_length: 10,
            handler_offset: 10,
            handler_length: 6,
            filter_offset: 0,
            catch_type: Some("System.Exception".into()),
        };
        assert_eq!(handler.kind(), HandlerKind::Catch);
        assert_eq!(handler.entry_points(), vec![(10, HandlerKind::Catch)]);

        handler.flags = ExceptionHandlerFlags::FILTER;
        handler.filter_offset = 10;
        handler.handler_offset = 14;
        assert_eq!(handler.kind(), HandlerKind::Filter);
        assert_eq!(handler.entry_points().len(), 2);

        handler.flags = ExceptionHandlerFlags::FINALLY;
        assert_eq!(handler.kind().dispatch_depth(), 0);
    }

    #[test]
    fn module_json_inherits_module_name() {
        let json = r#"{
            "name": "App.dll",
            "methods": [{
                "name": "App::Run()",
                "locals": [{ "index": 0, "name": "x", "type": "System.Int32" }],
                "instructions": [
                    { "offset": 0, "opcode": "ldc.i4.1" },
                    { "offset": 1, "opcode": "stloc.0" },
                    { "offset": 2, "opcode": "ret" }
                ],
                "exception_handlers": [{
                    "flags": "FINALLY",
                    "try_offset": 0, "try_length": 2,
                    "handler_offset": 2, "handler_length": 1
                }]
            }]
        }"#;
        let module = ModuleBody::from_json(json).unwrap();
        let method = module.method("App::Run()").unwrap();
        assert_eq!(method.module, "App.dll");
        assert_eq!(method.instructions[1].opcode, OpCode::Stloc0);
        assert_eq!(method.locals[0].var_type.as_deref(), Some("System.Int32"));
        assert_eq!(method.exception_handlers[0].kind(), HandlerKind::Finally);
        assert_eq!(method.code_size(), 3);
    }

    #[test]
    fn unknown_opcode_is_an_input_error() {
        let json = r#"{ "name": "M", "instructions": [{ "offset": 0, "opcode": "frobnicate" }] }"#;
        assert!(matches!(MethodBody::from_json(json), Err(crate::Error::Input(_))));
    }
}
