//! Fixed-width value types
//!
//! Every value manipulated by the machine is 16 bits wide. [`NativeNumber`]
//! is what registers and memory cells hold, [`Address`] is only used to pick a
//! cell on the bus.

use crate::constants as C;

/// A 16-bit signed value with the machine's wraparound rule
///
/// The input is masked to 16 bits and any masked value above `0xefff` is read
/// back as negative. This is not standard two's complement: the negative range
/// is only `-0x1000..=-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NativeNumber(i32);

impl NativeNumber {
    pub const ZERO: Self = Self(0);
    pub const ONE: Self = Self(1);

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(value: i64) -> Self {
        let masked = value & C::WORD_MASK;
        if masked > C::NEGATIVE_THRESHOLD {
            Self((masked - (C::WORD_MASK + 1)) as i32)
        } else {
            Self(masked as i32)
        }
    }

    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn value(self) -> i64 {
        self.0 as i64
    }

    /// The 16-bit pattern stored in a cell
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub const fn to_bits(self) -> u16 {
        (self.value() & C::WORD_MASK) as u16
    }

    #[must_use]
    pub fn to_f64(self) -> f64 {
        f64::from(self.0)
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[must_use]
    pub const fn from_bool(value: bool) -> Self {
        if value {
            Self::ONE
        } else {
            Self::ZERO
        }
    }

    /// Wrap the result of a float computation, truncating toward zero
    ///
    /// Returns `None` when the result is not a finite number.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_float(value: f64) -> Option<Self> {
        value.is_finite().then(|| Self::new(value.trunc() as i64))
    }
}

impl std::fmt::Display for NativeNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::fmt::LowerHex for NativeNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::LowerHex::fmt(&self.to_bits(), f)
    }
}

impl From<i64> for NativeNumber {
    fn from(value: i64) -> Self {
        Self::new(value)
    }
}

impl From<u16> for NativeNumber {
    fn from(value: u16) -> Self {
        Self::new(value.into())
    }
}

impl From<bool> for NativeNumber {
    fn from(value: bool) -> Self {
        Self::from_bool(value)
    }
}

impl From<Address> for NativeNumber {
    fn from(address: Address) -> Self {
        Self::from(address.0)
    }
}

/// A 16-bit unsigned offset on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u16);

impl Address {
    pub const ZERO: Self = Self(0);

    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub const fn new(value: i64) -> Self {
        Self((value & C::WORD_MASK) as u16)
    }

    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Move the address by `delta` cells, wrapping around the address space
    #[must_use]
    #[allow(clippy::cast_lossless)]
    pub const fn offset(self, delta: i64) -> Self {
        Self::new(self.0 as i64 + delta)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

impl From<u16> for Address {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl From<NativeNumber> for Address {
    fn from(value: NativeNumber) -> Self {
        Self(value.to_bits())
    }
}
