use super::bus::{AddressingError, Device};
use super::number::{Address, NativeNumber};

/// Number of cells shown on each line of the hex dump
const DUMP_COLUMNS: usize = 8;

/// Flat random access memory
#[derive(Clone, PartialEq, Eq)]
pub struct Ram {
    cells: Box<[NativeNumber]>,
}

impl std::fmt::Debug for Ram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ram {{ capacity: {}, cells: [...] }}", self.capacity())
    }
}

impl Ram {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: vec![NativeNumber::ZERO; capacity].into_boxed_slice(),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn cells(&self) -> &[NativeNumber] {
        &self.cells
    }

    /// Get the value of a cell
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn get(&self, address: Address) -> Result<NativeNumber, AddressingError> {
        self.cells
            .get(address.index())
            .copied()
            .ok_or(AddressingError::OutOfBounds {
                address,
                size: self.capacity(),
            })
    }

    /// Get a mutable reference to a cell
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn get_mut(&mut self, address: Address) -> Result<&mut NativeNumber, AddressingError> {
        let size = self.capacity();
        self.cells
            .get_mut(address.index())
            .ok_or(AddressingError::OutOfBounds { address, size })
    }

    /// Zero-fill every cell
    pub fn clear(&mut self) {
        self.cells.fill(NativeNumber::ZERO);
    }
}

impl Device for Ram {
    fn size(&self) -> usize {
        self.capacity()
    }

    fn read(&self, address: Address) -> Result<NativeNumber, AddressingError> {
        self.get(address)
    }

    fn write(&mut self, address: Address, value: NativeNumber) -> Result<(), AddressingError> {
        *self.get_mut(address)? = value;
        Ok(())
    }

    fn clear(&mut self) {
        Ram::clear(self);
    }

    fn dump(&self) -> Option<String> {
        Some(self.to_string())
    }
}

/// Renders the memory as a hex grid
///
/// Lines full of zeroes are collapsed into a single `*`.
impl std::fmt::Display for Ram {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "       |")?;
        for column in 0..DUMP_COLUMNS {
            write!(f, " {:>4}", format!("+{column:x}"))?;
        }

        let mut skipping = false;
        for (row, chunk) in self.cells.chunks(DUMP_COLUMNS).enumerate() {
            if chunk.iter().all(|cell| cell.is_zero()) {
                if !skipping {
                    write!(f, "\n*")?;
                    skipping = true;
                }
                continue;
            }

            skipping = false;
            write!(f, "\n{:#06x} |", row * DUMP_COLUMNS)?;
            for cell in chunk {
                write!(f, " {cell:04x}")?;
            }
        }

        Ok(())
    }
}
