/// Mask applied to every value stored in a register or a memory cell
pub const WORD_MASK: i64 = 0xffff;

/// Masked values strictly above this threshold are read back as negative
pub const NEGATIVE_THRESHOLD: i64 = 0xefff;

/// Default number of cells in RAM
pub const DEFAULT_RAM_SIZE: u16 = 0x1000;

/// Default number of hardware interrupt levels
pub const DEFAULT_IRQ_LEVELS: u16 = 4;

/// Default number of entries in the software interrupt vector table
pub const DEFAULT_SOFTWARE_INTERRUPTS: u16 = 16;

/// Number of words in the context frame pushed on interrupt entry
pub const CONTEXT_FRAME_SIZE: usize = 4;

/// Number of addressable words
pub const ADDRESS_SPACE: usize = 0x1_0000;

/// Smallest literal accepted by the assembler, `0xf000` once stored
pub const MIN_LITERAL: i64 = NEGATIVE_THRESHOLD - WORD_MASK;

/// Largest literal accepted by the assembler, `-1` once stored
pub const MAX_LITERAL: i64 = WORD_MASK;
