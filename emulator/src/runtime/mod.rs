//! The machine itself: value types, bus, memory and CPU

use thiserror::Error;

mod bus;
mod cpu;
mod instructions;
mod interrupt;
mod memory;
mod number;
mod registers;

pub use self::bus::{AddressRange, AddressingError, Bus, Device};
pub use self::cpu::{Cpu, Stage};
pub use self::instructions::{ArgType, Instruction};
pub use self::interrupt::SoftwareInterrupt;
pub use self::memory::Ram;
pub use self::number::{Address, NativeNumber};
pub use self::registers::{OperandMode, Reg, Registers};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorError {
    #[error("addressing error: {0}")]
    Addressing(#[from] AddressingError),
}
