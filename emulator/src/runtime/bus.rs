//! Address-range routing between the CPU and the attached devices

use thiserror::Error;
use tracing::trace;

use super::number::{Address, NativeNumber};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AddressingError {
    /// No device is attached at this global address
    #[error("no device attached at address {0}")]
    Unmapped(Address),

    /// A device got a local address outside of its storage
    #[error("local address {address} is out of bounds (device size is {size})")]
    OutOfBounds { address: Address, size: usize },
}

/// A half-open interval `[start, end)` of global addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    start: u32,
    end: u32,
}

impl AddressRange {
    /// Create a new range
    ///
    /// `end` is a `u32` so that a range can cover the very last address.
    ///
    /// # Panics
    ///
    /// Panics if `start > end`.
    #[must_use]
    pub fn new(start: u16, end: u32) -> Self {
        let start = u32::from(start);
        assert!(start <= end, "invalid address range {start}..{end}");
        Self { start, end }
    }

    #[must_use]
    pub const fn start(&self) -> u32 {
        self.start
    }

    #[must_use]
    pub const fn end(&self) -> u32 {
        self.end
    }

    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[must_use]
    pub fn contains(&self, address: Address) -> bool {
        let address = u32::from(address.value());
        self.start <= address && address < self.end
    }

    /// Translate a global address to an address local to this range
    fn local(&self, address: Address) -> Address {
        Address::new(i64::from(address.value()) - i64::from(self.start))
    }
}

impl std::fmt::Display for AddressRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:#06x}, {:#06x})", self.start, self.end)
    }
}

/// Something that can be attached to the [`Bus`]
///
/// Addresses given to a device are always local to the range it was attached
/// to.
pub trait Device: std::fmt::Debug {
    /// Number of cells the device exposes
    fn size(&self) -> usize;

    /// Read the cell at a local address
    ///
    /// # Errors
    ///
    /// Fails if the address is not backed by the device.
    fn read(&self, address: Address) -> Result<NativeNumber, AddressingError>;

    /// Write the cell at a local address
    ///
    /// # Errors
    ///
    /// Fails if the address is not backed by the device.
    fn write(&mut self, address: Address, value: NativeNumber) -> Result<(), AddressingError>;

    /// Bring the device back to its power-on state
    fn clear(&mut self) {}

    /// Human-readable rendering of the device state, if it has one worth showing
    fn dump(&self) -> Option<String> {
        None
    }
}

/// Routes reads and writes to the first attached device whose range matches
#[derive(Debug, Default)]
pub struct Bus {
    attachments: Vec<(AddressRange, Box<dyn Device>)>,
}

impl Bus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a device to a range of addresses
    ///
    /// Overlapping ranges are not rejected: the device attached first wins.
    pub fn attach(&mut self, range: AddressRange, device: Box<dyn Device>) {
        tracing::debug!(%range, ?device, "Attaching device");
        self.attachments.push((range, device));
    }

    pub fn attachments(&self) -> impl Iterator<Item = (&AddressRange, &dyn Device)> {
        self.attachments
            .iter()
            .map(|(range, device)| (range, &**device))
    }

    /// Read a value at a global address
    ///
    /// # Errors
    ///
    /// Fails if no device is attached at this address or if the device rejects
    /// the translated address.
    pub fn read(&self, address: Address) -> Result<NativeNumber, AddressingError> {
        let (range, device) = self
            .attachments
            .iter()
            .find(|(range, _)| range.contains(address))
            .ok_or(AddressingError::Unmapped(address))?;

        let value = device.read(range.local(address))?;
        trace!(%address, %value, "Bus read");
        Ok(value)
    }

    /// Write a value at a global address
    ///
    /// # Errors
    ///
    /// Fails if no device is attached at this address or if the device rejects
    /// the translated address.
    pub fn write(&mut self, address: Address, value: NativeNumber) -> Result<(), AddressingError> {
        let (range, device) = self
            .attachments
            .iter_mut()
            .find(|(range, _)| range.contains(address))
            .ok_or(AddressingError::Unmapped(address))?;

        trace!(%address, %value, "Bus write");
        device.write(range.local(address), value)
    }

    /// Clear every attached device
    pub fn clear(&mut self) {
        for (_, device) in &mut self.attachments {
            device.clear();
        }
    }
}
