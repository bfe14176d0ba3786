use thiserror::Error;

macro_rules! construction_error {
    ($method:expr, $offset:expr, $fmt:expr) => {
        crate::Error::Construction {
            method: $method.to_string(),
            offset: $offset,
            message: $fmt.to_string(),
        }
    };

    ($method:expr, $offset:expr, $fmt:expr, $($arg:tt)*) => {
        crate::Error::Construction {
            method: $method.to_string(),
            offset: $offset,
            message: format!($fmt, $($arg)*),
        }
    };
}

macro_rules! merge_error {
    ($method:expr, $block:expr, $fmt:expr) => {
        crate::Error::MergeConflict {
            method: $method.to_string(),
            block: $block,
            message: $fmt.to_string(),
        }
    };

    ($method:expr, $block:expr, $fmt:expr, $($arg:tt)*) => {
        crate::Error::MergeConflict {
            method: $method.to_string(),
            block: $block,
            message: format!($fmt, $($arg)*),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// Every variant that is raised while processing a single method carries the identity of that
/// method, so a caller analysing a whole module can report the failure and continue with the
/// remaining methods.
///
/// # Error Categories
///
/// ## Construction Errors
/// - [`Error::EmptyMethod`] - The method body contains no instructions
/// - [`Error::InvalidBranchTarget`] - A branch points into the middle of an instruction or outside the body
/// - [`Error::InvalidHandler`] - An exception handler boundary is not at an instruction
/// - [`Error::FallThroughEnd`] - Control falls off the end of the method body
/// - [`Error::Construction`] - Any other malformed control-flow structure
///
/// ## Classifier Errors
/// - [`Error::Classifier`] - Unhandled opcode or malformed call operand
///
/// ## Internal Consistency Errors
/// - [`Error::MergeConflict`] - Predecessors disagree on the stack shape at a join
/// - [`Error::StackImbalance`] - The evaluation stack is not empty where the method is left
/// - [`Error::StackUnderflow`] - An instruction pops more values than the stack holds
/// - [`Error::InvalidNodeRef`] - A node reference does not point into the method
///
/// ## Input Errors
/// - [`Error::Input`] - The decoded method body could not be read
///
/// # Examples
///
/// ```rust
/// use scil::{assembly::MethodBodyBuilder, Analyzer, Error};
///
/// let mut builder = MethodBodyBuilder::new("Program::Broken()");
/// builder.pop().ret();
/// let body = builder.build()?;
///
/// match Analyzer::default().analyze_method(&body) {
///     Ok(facts) => println!("{} facts", facts.len()),
///     Err(Error::StackUnderflow { method, offset }) => {
///         eprintln!("{method}: stack underflow at IL_{offset:04x}");
///     }
///     Err(e) => eprintln!("{e}"),
/// }
/// # Ok::<(), Error>(())
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The method body contains no instructions.
    ///
    /// A CFG needs at least one block, so an empty body is rejected before any
    /// block is created.
    #[error("{0}: method body has no instructions")]
    EmptyMethod(String),

    /// A branch instruction targets an offset that is not the start of an instruction.
    ///
    /// Blocks are split at every branch target, so a target that does not coincide
    /// with an instruction boundary can never be the start of a block.
    ///
    /// # Fields
    ///
    /// * `method` - Identity of the method being built
    /// * `offset` - Offset of the offending branch instruction
    /// * `target` - The branch target that could not be resolved
    #[error("{method}: branch at IL_{offset:04x} targets IL_{target:04x} which is not an instruction boundary")]
    InvalidBranchTarget {
        /// Identity of the method being built
        method: String,
        /// Offset of the offending branch instruction
        offset: u32,
        /// The unresolved branch target
        target: u32,
    },

    /// An exception handler boundary does not coincide with an instruction.
    #[error("{method}: exception handler boundary IL_{offset:04x} is not an instruction boundary")]
    InvalidHandler {
        /// Identity of the method being built
        method: String,
        /// The handler, filter or try offset that could not be resolved
        offset: u32,
    },

    /// The last instruction of the method does not transfer control.
    ///
    /// Execution would fall off the end of the body, which ECMA-335 forbids.
    #[error("{method}: control falls through the end of the method at IL_{offset:04x}")]
    FallThroughEnd {
        /// Identity of the method being built
        method: String,
        /// Offset of the last instruction
        offset: u32,
    },

    /// Generic control-flow construction failure.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `method` - Identity of the method being built
    /// * `offset` - Offset of the offending instruction
    #[error("{method}: malformed control flow at IL_{offset:04x}: {message}")]
    Construction {
        /// Identity of the method being built
        method: String,
        /// Offset of the offending instruction
        offset: u32,
        /// The message to be printed for the construction error
        message: String,
    },

    /// The stack-effect classifier cannot size an instruction.
    ///
    /// This signals missing opcode support or a call-like instruction without a
    /// usable callee signature; it is never a recoverable data issue.
    #[error("{method}: cannot classify `{mnemonic}` at IL_{offset:04x}: {message}")]
    Classifier {
        /// Identity of the analysed method
        method: String,
        /// Offset of the instruction
        offset: u32,
        /// Mnemonic of the effective opcode
        mnemonic: &'static str,
        /// What is missing
        message: String,
    },

    /// Control-flow paths disagree on the evaluation stack at a join point.
    ///
    /// Raised for predecessors with different exit depths and for phi nodes whose
    /// parents do not collapse to exactly one symbolic name.
    #[error("{method}: merge conflict at block {block}: {message}")]
    MergeConflict {
        /// Identity of the analysed method
        method: String,
        /// Index of the join block
        block: usize,
        /// Description of the disagreement
        message: String,
    },

    /// The evaluation stack is not balanced where control leaves the method.
    #[error("{method}: block {block} leaves the method with stack depth {depth}")]
    StackImbalance {
        /// Identity of the analysed method
        method: String,
        /// Index of the exit block
        block: usize,
        /// Depth at the end of the block
        depth: usize,
    },

    /// An instruction pops a value from an empty evaluation stack.
    #[error("{method}: stack underflow at IL_{offset:04x}")]
    StackUnderflow {
        /// Identity of the analysed method
        method: String,
        /// Offset of the popping instruction
        offset: u32,
    },

    /// A node reference does not resolve inside the method.
    #[error("{method}: no node at block {block}, index {index}")]
    InvalidNodeRef {
        /// Identity of the method
        method: String,
        /// Referenced block index
        block: usize,
        /// Referenced node index
        index: usize,
    },

    /// The decoded input could not be read.
    ///
    /// Wraps JSON decoding failures and unknown mnemonics.
    #[error("{0}")]
    Input(String),
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Input(error.to_string())
    }
}

impl Error {
    /// Attaches the method identity and instruction offset to a classifier error.
    ///
    /// The classifier is a pure function of the opcode and operand, so it cannot know where
    /// the instruction lives; callers that do know use this to complete the error.
    #[must_use]
    pub(crate) fn located(self, method_name: &str, instruction_offset: u32) -> Self {
        match self {
            Error::Classifier {
                mnemonic, message, ..
            } => Error::Classifier {
                method: method_name.to_string(),
                offset: instruction_offset,
                mnemonic,
                message,
            },
            other => other,
        }
    }

    /// Returns the identity of the method this error belongs to, if any.
    #[must_use]
    pub fn method(&self) -> Option<&str> {
        match self {
            Error::EmptyMethod(method)
            | Error::InvalidBranchTarget { method, .. }
            | Error::InvalidHandler { method, .. }
            | Error::FallThroughEnd { method, .. }
            | Error::Construction { method, .. }
            | Error::Classifier { method, .. }
            | Error::MergeConflict { method, .. }
            | Error::StackImbalance { method, .. }
            | Error::StackUnderflow { method, .. }
            | Error::InvalidNodeRef { method, .. } => Some(method),
            Error::Input(_) => None,
        }
    }
}
