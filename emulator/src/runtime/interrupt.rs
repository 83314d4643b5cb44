use parse_display::Display;

use super::number::NativeNumber;

/// A software interrupt raised while executing an instruction
///
/// This is not an error: the CPU dispatches it to a handler when one is
/// installed, and only hands it back to the caller otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SoftwareInterrupt {
    /// Stop the machine
    #[display("halt")]
    Halt,

    /// An opcode that does not decode to any instruction
    #[display("invalid instruction")]
    InvalidInstruction,

    /// Dump the machine state and resume
    #[display("breakpoint")]
    Breakpoint,

    /// Division by zero or square root of a negative number
    #[display("arithmetic fault")]
    ArithmeticFault,

    /// Any other code raised by an `INT` instruction
    #[display("software interrupt {0}")]
    Other(NativeNumber),
}

impl SoftwareInterrupt {
    #[must_use]
    pub fn code(self) -> NativeNumber {
        match self {
            Self::Halt => NativeNumber::new(0),
            Self::InvalidInstruction => NativeNumber::new(1),
            Self::Breakpoint => NativeNumber::new(2),
            Self::ArithmeticFault => NativeNumber::new(3),
            Self::Other(code) => code,
        }
    }

    #[must_use]
    pub fn from_code(code: NativeNumber) -> Self {
        match code.value() {
            0 => Self::Halt,
            1 => Self::InvalidInstruction,
            2 => Self::Breakpoint,
            3 => Self::ArithmeticFault,
            _ => Self::Other(code),
        }
    }
}
