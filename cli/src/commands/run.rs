use camino::Utf8PathBuf;
use clap::{ArgAction, Parser, ValueHint};
use tracing::{debug, info};
use vm16_emulator::constants as C;
use vm16_emulator::runtime::Device;
use vm16_emulator::{Vm, VmConfig};

use crate::console::Console;

/// Parse a decimal or `0x`-prefixed hexadecimal number
fn parse_u16(input: &str) -> Result<u16, std::num::ParseIntError> {
    match input.strip_prefix("0x") {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => input.parse(),
    }
}

#[derive(Parser, Debug)]
pub struct RunOpt {
    /// Input file
    #[arg(value_hint = ValueHint::FilePath)]
    input: Utf8PathBuf,

    /// Instructions per second. Runs as fast as possible if not set
    #[arg(short, long)]
    frequency: Option<f64>,

    /// Number of RAM cells
    #[arg(long, value_parser = parse_u16, default_value_t = C::DEFAULT_RAM_SIZE)]
    ram_size: u16,

    /// Number of hardware interrupt levels
    #[arg(long, default_value_t = C::DEFAULT_IRQ_LEVELS)]
    irq_levels: u16,

    /// Attach a console right after RAM
    #[arg(long, action = ArgAction::SetTrue)]
    console: bool,
}

impl RunOpt {
    pub fn exec(self) -> anyhow::Result<()> {
        let (program, debug_info) = super::assemble(&self.input)?;
        debug!(labels = ?debug_info.labels, "Assembled program");

        let config = VmConfig {
            ram_size: self.ram_size,
            irq_levels: self.irq_levels,
            ..VmConfig::default()
        };

        let mut peripherals: Vec<Box<dyn Device>> = Vec::new();
        if self.console {
            peripherals.push(Box::<Console>::default());
        }

        debug!(?config, "Building machine");
        let mut vm = Vm::new(config, peripherals)?;
        for (range, device) in vm.bus().attachments() {
            debug!(%range, ?device, "Attached");
        }

        vm.load_program(&program)?;
        vm.run(self.frequency)?;

        info!(registers = %vm.cpu.registers, cycles = vm.cpu.cycles, "End of program");

        Ok(())
    }
}
