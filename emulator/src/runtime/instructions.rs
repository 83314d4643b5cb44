use parse_display::{Display, FromStr};

use super::number::NativeNumber;

/// How the operand of an instruction is fetched and resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    /// No operand
    NoArg,

    /// The operand is a literal, never dereferenced
    Value,

    /// The operand is a value, read from memory unless it is a literal
    ValueAddress,

    /// The operand is a destination address
    Address,
}

impl ArgType {
    /// Number of words the operand takes after the opcode
    #[must_use]
    pub const fn arg_count(self) -> u16 {
        match self {
            Self::NoArg => 0,
            Self::Value | Self::ValueAddress | Self::Address => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromStr)]
#[display(style = "UPPERCASE")]
#[repr(u8)]
pub enum Instruction {
    /// Do nothing
    Noop = 0x00,

    /// `AC = A0`
    Ld = 0x01,

    /// `mem[A0] = AC`
    St = 0x02,

    /// `AC = AC + A0`
    Add = 0x03,

    /// `AC = -AC`
    Neg = 0x04,

    /// `AC = AC * A0`
    Mul = 0x05,

    /// `AC = AC / A0`, truncated
    Div = 0x06,

    /// `AC = sqrt(AC)`, truncated
    Sqrt = 0x07,

    /// `AC = AC > A0`
    Gt = 0x08,

    /// Boolean negation of `AC`
    Not = 0x09,

    /// Boolean `and` of `AC` and `A0`
    And = 0x0a,

    /// Boolean `or` of `AC` and `A0`
    Or = 0x0b,

    /// Unconditional jump
    Jmp = 0x10,

    /// Jump if `AC` is not zero
    Jif = 0x11,

    /// Next operands are addresses
    A0A = 0x20,

    /// Next operands are literals
    A0L = 0x21,

    /// Next operands are direct values
    A0V = 0x22,

    /// Next operands are pointers
    A0P = 0x23,

    /// Next operands are absolute RAM addresses
    A0R = 0x24,

    /// Next operands are offsets from the top of the stack
    A0S = 0x25,

    /// Set the hardware interrupt vector table
    Hih = 0x30,

    /// Set the software interrupt vector table
    Sih = 0x31,

    /// Set the stack pointer
    Stk = 0x32,

    /// Push `AC` on the stack
    Push = 0x33,

    /// Discard `A0` words from the stack
    Pop = 0x34,

    /// Raise a software interrupt
    Int = 0x40,

    /// Return from an interrupt handler
    Ihr = 0x41,
}

/// Opcode to instruction lookup, built at compile time
const DECODE_TABLE: [Option<Instruction>; 256] = {
    let mut table = [None; 256];
    let mut i = 0;
    while i < Instruction::ALL.len() {
        let instruction = Instruction::ALL[i];
        table[instruction.opcode() as usize] = Some(instruction);
        i += 1;
    }
    table
};

impl Instruction {
    pub const ALL: [Instruction; 27] = [
        Self::Noop,
        Self::Ld,
        Self::St,
        Self::Add,
        Self::Neg,
        Self::Mul,
        Self::Div,
        Self::Sqrt,
        Self::Gt,
        Self::Not,
        Self::And,
        Self::Or,
        Self::Jmp,
        Self::Jif,
        Self::A0A,
        Self::A0L,
        Self::A0V,
        Self::A0P,
        Self::A0R,
        Self::A0S,
        Self::Hih,
        Self::Sih,
        Self::Stk,
        Self::Push,
        Self::Pop,
        Self::Int,
        Self::Ihr,
    ];

    #[must_use]
    pub const fn opcode(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn arg_type(self) -> ArgType {
        use Instruction::*;

        match self {
            Noop | Neg | Sqrt | Not | A0A | A0L | A0V | A0P | A0R | A0S | Push | Ihr => {
                ArgType::NoArg
            }
            Ld | Add | Mul | Div | Gt | And | Or => ArgType::ValueAddress,
            St | Jmp | Jif => ArgType::Address,
            Hih | Sih | Stk | Pop | Int => ArgType::Value,
        }
    }

    /// Number of words taken in memory by this instruction
    #[must_use]
    pub const fn size(self) -> u16 {
        1 + self.arg_type().arg_count()
    }

    /// Find the instruction for an opcode fetched from memory
    #[must_use]
    pub fn decode(opcode: NativeNumber) -> Option<Self> {
        let index = usize::try_from(opcode.value()).ok()?;
        DECODE_TABLE.get(index).copied().flatten()
    }
}

impl From<Instruction> for NativeNumber {
    fn from(instruction: Instruction) -> Self {
        Self::from(u16::from(instruction.opcode()))
    }
}
