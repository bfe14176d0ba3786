//! The relational fact model and its text encoding.
//!
//! A [`Fact`] is a relation name applied to an ordered list of [`FactArg`]s and renders as
//! one line of solver input:
//!
//! ```text
//! StlocStm("Program::Main()#line", "Program::Main()#st0").
//! CallStm("System.Console::WriteLine(string)", ["Program::Main()#st0"], []).
//! LdcStm("Program::Main()#st1", 42).
//! ```
//!
//! Symbols and strings are both double-quoted with `\`, `"`, newline, carriage return and
//! tab escaped. Integers render in decimal, finite floats always carry a fractional part,
//! non-finite floats render as the quoted names `"NaN"`, `"+inf"` and `"-inf"`, and lists
//! are bracketed and comma separated.

use std::fmt;

use serde::Serialize;

use crate::ir::StackName;

/// One argument of a [`Fact`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FactArg {
    /// A symbolic name: a stack slot, a binding, a method or a branch target
    Symbol(String),
    /// A string literal taken from the program
    Str(String),
    /// An integer literal
    Int(i64),
    /// A floating point literal
    Float(f64),
    /// A bracketed list of arguments
    List(Vec<FactArg>),
}

impl FactArg {
    /// Creates a symbol argument.
    pub fn symbol(name: impl Into<String>) -> Self {
        FactArg::Symbol(name.into())
    }

    /// Creates a symbol argument from a stack slot name.
    #[must_use]
    pub fn name(name: &StackName) -> Self {
        FactArg::Symbol(name.to_string())
    }

    /// Creates a list of symbols from stack slot names.
    #[must_use]
    pub fn names(names: &[StackName]) -> Self {
        FactArg::List(names.iter().map(FactArg::name).collect())
    }
}

impl fmt::Display for FactArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactArg::Symbol(text) | FactArg::Str(text) => write_quoted(f, text),
            FactArg::Int(value) => write!(f, "{value}"),
            FactArg::Float(value) if value.is_finite() => write!(f, "{value:?}"),
            FactArg::Float(value) if value.is_nan() => write_quoted(f, "NaN"),
            FactArg::Float(value) if *value > 0.0 => write_quoted(f, "+inf"),
            FactArg::Float(_) => write_quoted(f, "-inf"),
            FactArg::List(items) => {
                f.write_str("[")?;
                write_separated(f, items)?;
                f.write_str("]")
            }
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in text.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

fn write_separated(f: &mut fmt::Formatter<'_>, args: &[FactArg]) -> fmt::Result {
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{arg}")?;
    }
    Ok(())
}

/// A relation over symbolic names and literals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fact {
    relation: &'static str,
    args: Vec<FactArg>,
}

impl Fact {
    /// Creates a fact.
    #[must_use]
    pub fn new(relation: &'static str, args: Vec<FactArg>) -> Self {
        Fact { relation, args }
    }

    /// Returns the relation name.
    #[must_use]
    pub fn relation(&self) -> &'static str {
        self.relation
    }

    /// Returns the arguments in order.
    #[must_use]
    pub fn args(&self) -> &[FactArg] {
        &self.args
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.relation)?;
        write_separated(f, &self.args)?;
        f.write_str(").")
    }
}
