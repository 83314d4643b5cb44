//! First pass: lex every line, check it and assign it an address

use std::collections::HashMap;

use nom::Finish;
use tracing::trace;

use crate::constants as C;
use crate::parser::{parse_line, LineContent, Operand};
use crate::runtime::{Address, Instruction};

use super::{CompilationError, CompilationErrorKind};

pub(crate) type Labels<'a> = HashMap<&'a str, Address>;

/// What a line emits once its operands are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Placement<'a> {
    /// A raw value, one word
    Value(Operand<'a>),

    /// An opcode, followed by its operand if it takes one
    Instruction(Instruction, Option<Operand<'a>>),
}

/// A line that emits something, at its starting address
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Node<'a> {
    pub line: usize,
    pub text: &'a str,
    pub address: usize,
    pub placement: Placement<'a>,
}

impl Node<'_> {
    /// Wraps an error with the line this node comes from
    pub(crate) fn error(&self, kind: CompilationErrorKind) -> CompilationError {
        CompilationError::new(self.line, self.text, kind)
    }
}

#[derive(Debug, Default)]
pub(crate) struct Layout<'a> {
    pub labels: Labels<'a>,
    pub nodes: Vec<Node<'a>>,

    /// Number of words the program spans, gaps included
    pub size: usize,
}

impl<'a> Layout<'a> {
    fn insert_label(&mut self, label: &'a str) -> Result<(), CompilationErrorKind> {
        let address = self.current_address()?;
        if self.labels.insert(label, address).is_some() {
            return Err(CompilationErrorKind::DuplicateLabel(label.to_owned()));
        }

        trace!(label, %address, "Placed label");
        Ok(())
    }

    /// Moves forward to the given address, leaving a gap
    fn skip_to(&mut self, offset: i64) -> Result<(), CompilationErrorKind> {
        let target = usize::try_from(offset)
            .ok()
            .filter(|&target| target >= self.size)
            .ok_or(CompilationErrorKind::InvalidOffset {
                offset,
                current: self.size,
            })?;

        if target >= C::ADDRESS_SPACE {
            return Err(CompilationErrorKind::OutOfRange(offset));
        }

        self.size = target;
        Ok(())
    }

    fn place(&mut self, node: Node<'a>, size: u16) -> Result<(), CompilationErrorKind> {
        let end = self.size + usize::from(size);
        if end > C::ADDRESS_SPACE {
            return Err(CompilationErrorKind::ProgramTooLarge);
        }

        self.nodes.push(node);
        self.size = end;
        Ok(())
    }

    /// The address the next word would be emitted at
    fn current_address(&self) -> Result<Address, CompilationErrorKind> {
        u16::try_from(self.size)
            .map(Address::from)
            .map_err(|_| CompilationErrorKind::ProgramTooLarge)
    }
}

/// Look up an instruction and check its operand count
fn check_instruction<'a>(
    mnemonic: &str,
    operands: &[Operand<'a>],
) -> Result<(Instruction, Option<Operand<'a>>), CompilationErrorKind> {
    let instruction: Instruction = mnemonic
        .to_ascii_uppercase()
        .parse()
        .map_err(|_| CompilationErrorKind::UnknownInstruction(mnemonic.to_owned()))?;

    let expected = usize::from(instruction.arg_type().arg_count());
    if operands.len() != expected {
        return Err(CompilationErrorKind::ArgumentCount {
            instruction,
            expected,
            got: operands.len(),
        });
    }

    Ok((instruction, operands.first().copied()))
}

/// Lays out the program
///
/// It places the labels and lists the lines to be emitted, with their address.
pub(crate) fn layout_memory(source: &str) -> Result<Layout, CompilationError> {
    let mut layout = Layout::default();

    for (index, text) in source.lines().enumerate() {
        let line = index + 1;
        let error = |kind| CompilationError::new(line, text, kind);

        let (_, content) = parse_line(text)
            .finish()
            .map_err(|_| error(CompilationErrorKind::InvalidSyntax))?;

        let placement = match content {
            LineContent::Empty => continue,
            LineContent::Label(label) => {
                layout.insert_label(label).map_err(error)?;
                continue;
            }
            LineContent::Offset(offset) => {
                layout.skip_to(offset).map_err(error)?;
                continue;
            }
            LineContent::Value(operand) => Placement::Value(operand),
            LineContent::Instruction { mnemonic, operands } => {
                let (instruction, operand) =
                    check_instruction(mnemonic, &operands).map_err(error)?;
                Placement::Instruction(instruction, operand)
            }
        };

        let size = match placement {
            Placement::Value(_) => 1,
            Placement::Instruction(instruction, _) => instruction.size(),
        };

        let node = Node {
            line,
            text,
            address: layout.size,
            placement,
        };
        layout.place(node, size).map_err(error)?;
    }

    Ok(layout)
}
