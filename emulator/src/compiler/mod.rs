use std::collections::BTreeMap;

use miette::Diagnostic;
use thiserror::Error;
use tracing::debug;

use crate::runtime::{Address, Instruction, NativeNumber};

pub(crate) mod layout;
pub(crate) mod memory;

/// Holds informations about the compilation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DebugInfo {
    /// Map of labels to addresses
    pub labels: BTreeMap<String, Address>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompilationErrorKind {
    #[error("invalid syntax")]
    InvalidSyntax,

    #[error("unknown instruction {0}")]
    UnknownInstruction(String),

    #[error("{instruction} takes {expected} operand(s), got {got}")]
    ArgumentCount {
        instruction: Instruction,
        expected: usize,
        got: usize,
    },

    #[error("undefined label {0}")]
    UndefinedLabel(String),

    #[error("label {0} is already defined")]
    DuplicateLabel(String),

    #[error("value {0} does not fit in a word")]
    OutOfRange(i64),

    #[error("cannot move to offset {offset}, already at {current}")]
    InvalidOffset { offset: i64, current: usize },

    #[error("program does not fit in the address space")]
    ProgramTooLarge,
}

/// An assembler error, with the line it happened on
#[derive(Debug, Error, Diagnostic, Clone, PartialEq, Eq)]
#[error("line {line}: {kind}: `{text}`")]
#[diagnostic(code(vm16::compile))]
pub struct CompilationError {
    /// Line number, starting at 1
    pub line: usize,

    /// The offending line, as written
    pub text: String,

    pub kind: CompilationErrorKind,
}

impl CompilationError {
    pub(crate) fn new(line: usize, text: &str, kind: CompilationErrorKind) -> Self {
        Self {
            line,
            text: text.to_owned(),
            kind,
        }
    }
}

/// Compile a program source into a flat memory image
///
/// The image is meant to be loaded at address 0, and only depends on the
/// instruction encoding.
///
/// # Errors
///
/// This function will return an error if any line is invalid, an operand
/// cannot be resolved or the program does not fit in the address space.
#[tracing::instrument(skip(source))]
pub fn compile(source: &str) -> Result<(Vec<NativeNumber>, DebugInfo), CompilationError> {
    let layout = self::layout::layout_memory(source)?;
    let memory = self::memory::fill_memory(&layout)?;

    let debug_info = DebugInfo {
        labels: layout
            .labels
            .iter()
            .map(|(key, value)| ((*key).to_owned(), *value))
            .collect(),
    };
    debug!(
        words = memory.len(),
        labels = debug_info.labels.len(),
        "Compiled program"
    );

    Ok((memory, debug_info))
}
