use bitflags::bitflags;
use parse_display::{Display, FromStr};

use super::number::{Address, NativeNumber};

bitflags! {
    /// How the current operand (`A0`) should be interpreted
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct OperandMode: u16 {
        /// Cleared: `A0` is an address. Set: `A0` is a literal.
        const LITERAL = 0b001;
        /// Set: one more level of pointer indirection
        const POINTER = 0b010;
        /// Set: `A0` is an offset from the top of the stack
        const STACK   = 0b100;
    }
}

impl std::fmt::Debug for OperandMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#05b}", self.bits())
    }
}

impl From<OperandMode> for NativeNumber {
    fn from(mode: OperandMode) -> Self {
        Self::from(mode.bits())
    }
}

impl From<NativeNumber> for OperandMode {
    fn from(value: NativeNumber) -> Self {
        Self::from_bits_truncate(value.to_bits())
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Registers {
    /// Instruction address
    pub ia: Address,

    /// Fetched opcode
    pub oc: NativeNumber,

    /// Operand mode
    pub om: OperandMode,

    /// Current operand
    pub a0: NativeNumber,

    /// Accumulator
    pub ac: NativeNumber,

    /// Stack pointer, grows upward
    pub sp: Address,

    /// Hardware interrupt vector table, 0 when disabled
    pub hi: Address,

    /// Software interrupt vector table, 0 when disabled
    pub si: Address,

    /// Current interrupt level + 1, 0 outside of any handler
    pub il: NativeNumber,
}

impl Registers {
    #[must_use]
    pub fn get(&self, reg: Reg) -> NativeNumber {
        match reg {
            Reg::IA => self.ia.into(),
            Reg::OC => self.oc,
            Reg::OM => self.om.into(),
            Reg::A0 => self.a0,
            Reg::AC => self.ac,
            Reg::SP => self.sp.into(),
            Reg::HI => self.hi.into(),
            Reg::SI => self.si.into(),
            Reg::IL => self.il,
        }
    }

    pub fn set(&mut self, reg: Reg, value: NativeNumber) {
        match reg {
            Reg::IA => self.ia = value.into(),
            Reg::OC => self.oc = value,
            Reg::OM => self.om = value.into(),
            Reg::A0 => self.a0 = value,
            Reg::AC => self.ac = value,
            Reg::SP => self.sp = value.into(),
            Reg::HI => self.hi = value.into(),
            Reg::SI => self.si = value.into(),
            Reg::IL => self.il = value,
        }
    }
}

impl std::fmt::Display for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "IA = {} | OC = {} | OM = {:?} | A0 = {} | AC = {} | SP = {} | HI = {} | SI = {} | IL = {}",
            self.ia, self.oc, self.om, self.a0, self.ac, self.sp, self.hi, self.si, self.il
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, FromStr)]
#[display(style = "UPPERCASE")]
pub enum Reg {
    IA,
    OC,
    OM,
    A0,
    AC,
    SP,
    HI,
    SI,
    IL,
}

impl Reg {
    pub const ALL: [Reg; 9] = [
        Reg::IA,
        Reg::OC,
        Reg::OM,
        Reg::A0,
        Reg::AC,
        Reg::SP,
        Reg::HI,
        Reg::SI,
        Reg::IL,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operand_mode_roundtrip_test() {
        let mode = OperandMode::LITERAL | OperandMode::STACK;
        let value = NativeNumber::from(mode);
        assert_eq!(value, NativeNumber::new(0b101));
        assert_eq!(OperandMode::from(value), mode);
        // Unknown bits are dropped
        assert_eq!(OperandMode::from(NativeNumber::new(0b1010)), OperandMode::POINTER);
    }

    #[test]
    fn get_set_test() {
        let mut registers = Registers::default();
        for (i, reg) in Reg::ALL.into_iter().enumerate() {
            let value = NativeNumber::new(i64::try_from(i).unwrap() + 1);
            registers.set(reg, value);
        }

        assert_eq!(registers.ia, Address::new(1));
        assert_eq!(registers.om, OperandMode::POINTER | OperandMode::LITERAL);
        assert_eq!(registers.il, NativeNumber::new(9));
        assert_eq!(registers.get(Reg::SP), NativeNumber::new(6));
    }

    #[test]
    fn reg_display_parse_test() {
        assert_eq!(Reg::A0.to_string(), "A0");
        assert_eq!("SP".parse::<Reg>().unwrap(), Reg::SP);
        assert!("XX".parse::<Reg>().is_err());
    }
}
