//! Instruction-to-fact generators.
//!
//! A [`FactGenerator`] looks at one annotated node and either produces the fact for it or
//! declines with `None`. Declining is never an error: the registry simply asks the next
//! generator. Generators are referentially transparent; the same node in the same method
//! always yields the same fact.
//!
//! # Built-in Generators
//!
//! | Generator | Opcodes | Facts |
//! |-----------|---------|-------|
//! | [`CounterGenerator`] | all | none; counts instructions per module |
//! | [`LocalsGenerator`] | `ldloc`, `stloc`, `ldloca` | `LdlocStm`, `StlocStm`, `LdlocaStm` |
//! | [`ArgumentsGenerator`] | `ldarg`, `starg`, `ldarga` | `LdargStm`, `StargStm`, `LdargaStm` |
//! | [`FieldsGenerator`] | `ldfld`, `ldflda`, `stfld`, `ldsfld`, `ldsflda`, `stsfld` | `LdfldStm`, `LdfldaStm`, `StfldStm`, `LdsfldStm`, `LdsfldaStm`, `StsfldStm` |
//! | [`CallsGenerator`] | `call`, `callvirt`, `calli`, `newobj` | `CallStm`, `NewobjStm` |
//! | [`ConstantsGenerator`] | `ldstr`, `ldc.*`, `ldnull` | `LdstrStm`, `LdcStm`, `LdnullStm` |
//! | [`ArithmeticGenerator`] | arithmetic, bitwise, shifts, comparisons, `neg`, `not` | `BinopStm`, `UnopStm` |
//! | [`ConversionsGenerator`] | `conv.*`, `box`, `unbox*`, `castclass`, `isinst`, `ldlen` | `ConvStm` |
//! | [`ArraysGenerator`] | `ldelem*`, `ldelema`, `stelem*`, `newarr` | `LdelemStm`, `LdelemaStm`, `StelemStm`, `NewarrStm` |
//! | [`StackGenerator`] | `dup`, `pop`, `ret` | `DupStm`, `PopStm`, `RetStm` |
//! | [`BranchesGenerator`] | `br`, `leave`, conditional branches, `switch` | `BrStm`, `CondBrStm`, `SwitchStm` |
//!
//! Generators match on [`OpCode::long_form`], so they work whether or not short-form
//! normalization ran. They read the pop and push names assigned by the stack analyzer and
//! decline nodes that have not been annotated.

mod arguments;
mod arithmetic;
mod arrays;
mod branches;
mod calls;
mod constants;
mod conversions;
mod counter;
mod fields;
mod locals;
mod stack;

pub use arguments::ArgumentsGenerator;
pub use arithmetic::ArithmeticGenerator;
pub use arrays::ArraysGenerator;
pub use branches::BranchesGenerator;
pub use calls::CallsGenerator;
pub use constants::ConstantsGenerator;
pub use conversions::ConversionsGenerator;
pub use counter::{CounterGenerator, InstructionCounter};
pub use fields::FieldsGenerator;
pub use locals::LocalsGenerator;
pub use stack::StackGenerator;

use crate::{
    assembly::{OpCode, Operand},
    facts::{Fact, FactArg},
    ir::{Method, Node},
};

/// The order shared by every built-in fact producing generator.
pub const BUILTIN_ORDER: u32 = 100;

/// Produces at most one fact per node.
///
/// Generators must be thread-safe (Send + Sync): one registry serves every worker of a
/// parallel module analysis.
pub trait FactGenerator: Send + Sync {
    /// Unique name, used for ordering ties and diagnostics.
    fn name(&self) -> &'static str;

    /// Position in the registry; lower orders are asked first.
    fn order(&self) -> u32 {
        BUILTIN_ORDER
    }

    /// Returns the fact for `node`, or `None` if this generator does not apply.
    ///
    /// `method` is the method that contains `node`.
    fn try_generate(&self, method: &Method, node: &Node) -> Option<Fact>;
}

/// Returns the canonical opcode of an instruction node.
pub(crate) fn long_opcode(node: &Node) -> Option<OpCode> {
    node.opcode().map(OpCode::long_form)
}

/// Returns push `index` of `node` as a symbol.
pub(crate) fn push(node: &Node, index: usize) -> Option<FactArg> {
    node.push_names().get(index).map(FactArg::name)
}

/// Returns pop `index` of `node` (deepest first) as a symbol.
pub(crate) fn pop(node: &Node, index: usize) -> Option<FactArg> {
    node.pop_names().get(index).map(FactArg::name)
}

/// Returns the binding of `node`, resolving it on the fly if no pass assigned one.
pub(crate) fn storage(method: &Method, node: &Node) -> Option<FactArg> {
    if let Some(binding) = node.binding() {
        return Some(FactArg::symbol(binding));
    }
    if let Some(index) = node.local_index() {
        return Some(FactArg::symbol(format!(
            "{}#{}",
            method.name(),
            method.local_name(index)
        )));
    }
    if let Some(index) = node.argument_index() {
        return Some(FactArg::symbol(format!(
            "{}#{}",
            method.name(),
            method.argument_name(index)
        )));
    }
    match node.operand()? {
        Operand::Field(name) => Some(FactArg::symbol(name.as_str())),
        _ => None,
    }
}

/// Returns the symbol for the code location `offset` inside `method`.
pub(crate) fn label(method: &Method, offset: u32) -> FactArg {
    FactArg::symbol(format!("{}#IL_{offset:04x}", method.name()))
}

/// Returns every built-in fact producing generator (the counter is not included).
#[must_use]
pub fn builtins() -> Vec<Box<dyn FactGenerator>> {
    vec![
        Box::new(LocalsGenerator),
        Box::new(ArgumentsGenerator),
        Box::new(FieldsGenerator),
        Box::new(CallsGenerator),
        Box::new(ConstantsGenerator),
        Box::new(ArithmeticGenerator),
        Box::new(ConversionsGenerator),
        Box::new(ArraysGenerator),
        Box::new(StackGenerator),
        Box::new(BranchesGenerator),
    ]
}
