//! Second pass: resolve the operands and fill the memory image

use tracing::{debug, trace};

use crate::constants as C;
use crate::parser::Operand;
use crate::runtime::NativeNumber;

use super::layout::{Labels, Layout, Placement};
use super::{CompilationError, CompilationErrorKind};

/// Turn an operand into the word to emit
///
/// Literals must fit in a word, either as a value or as an address. Unlike
/// runtime arithmetic, nothing wraps here.
fn resolve(operand: Operand, labels: &Labels) -> Result<NativeNumber, CompilationErrorKind> {
    match operand {
        Operand::Literal(value) if (C::MIN_LITERAL..=C::MAX_LITERAL).contains(&value) => {
            Ok(NativeNumber::new(value))
        }
        Operand::Literal(value) => Err(CompilationErrorKind::OutOfRange(value)),
        Operand::Label(label) => labels
            .get(label)
            .map(|&address| NativeNumber::from(address))
            .ok_or_else(|| CompilationErrorKind::UndefinedLabel(label.to_owned())),
    }
}

/// Fill the memory image from the layout
///
/// Cells no line emits into are left to zero.
pub(crate) fn fill_memory(layout: &Layout) -> Result<Vec<NativeNumber>, CompilationError> {
    let mut memory = vec![NativeNumber::ZERO; layout.size];

    for node in &layout.nodes {
        let words = match node.placement {
            Placement::Value(operand) => {
                vec![resolve(operand, &layout.labels).map_err(|kind| node.error(kind))?]
            }
            Placement::Instruction(instruction, operand) => {
                let mut words = vec![NativeNumber::from(instruction)];
                if let Some(operand) = operand {
                    words.push(resolve(operand, &layout.labels).map_err(|kind| node.error(kind))?);
                }
                words
            }
        };

        trace!(address = node.address, ?words, line = node.line, "Emitting");
        memory[node.address..node.address + words.len()].copy_from_slice(&words);
    }

    debug!(size = memory.len(), "Filled memory");
    Ok(memory)
}
