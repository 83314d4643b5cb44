//! A one-cell output device

use std::io::Write;

use vm16_emulator::runtime::{Address, AddressingError, Device, NativeNumber};

/// Prints every value written to it as a character on the standard output
///
/// Reading it gives back the last value written.
#[derive(Debug, Default)]
pub struct Console {
    last: NativeNumber,
}

impl Console {
    fn check(&self, address: Address) -> Result<(), AddressingError> {
        if address.index() < self.size() {
            Ok(())
        } else {
            Err(AddressingError::OutOfBounds {
                address,
                size: self.size(),
            })
        }
    }
}

impl Device for Console {
    fn size(&self) -> usize {
        1
    }

    fn read(&self, address: Address) -> Result<NativeNumber, AddressingError> {
        self.check(address)?;
        Ok(self.last)
    }

    fn write(&mut self, address: Address, value: NativeNumber) -> Result<(), AddressingError> {
        self.check(address)?;
        self.last = value;

        let c = char::from_u32(u32::from(value.to_bits())).unwrap_or(char::REPLACEMENT_CHARACTER);
        let mut stdout = std::io::stdout().lock();
        if let Err(e) = write!(stdout, "{c}").and_then(|()| stdout.flush()) {
            tracing::warn!(error = %e, "Could not write to the console");
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.last = NativeNumber::ZERO;
    }
}
