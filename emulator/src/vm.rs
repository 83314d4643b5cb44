//! The virtual machine: RAM, peripherals and CPU wired on a bus

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::constants as C;
use crate::runtime::{
    Address, AddressRange, Bus, Cpu, Device, NativeNumber, ProcessorError, Ram, SoftwareInterrupt,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error(transparent)]
    Processor(#[from] ProcessorError),

    #[error("program of {size} words does not fit in {capacity} cells of RAM")]
    ProgramTooLarge { size: usize, capacity: usize },

    #[error("devices need {needed} cells, more than the 65536 addressable ones")]
    AddressSpaceExhausted { needed: usize },

    #[error("uncaught {0}")]
    UncaughtInterrupt(SoftwareInterrupt),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmConfig {
    /// Number of RAM cells, mapped from address 0
    pub ram_size: u16,

    /// Number of hardware interrupt levels
    pub irq_levels: u16,

    /// Number of entries in the software interrupt vector table
    pub software_interrupts: u16,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            ram_size: C::DEFAULT_RAM_SIZE,
            irq_levels: C::DEFAULT_IRQ_LEVELS,
            software_interrupts: C::DEFAULT_SOFTWARE_INTERRUPTS,
        }
    }
}

/// Outcome of a single instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    Halted,
}

#[derive(Debug)]
pub struct Vm {
    pub cpu: Cpu,
    bus: Bus,
    ram_size: usize,
    last_tick: Option<Instant>,
}

impl Default for Vm {
    fn default() -> Self {
        Self::build(VmConfig::default())
    }
}

impl Vm {
    /// Create a machine with RAM at address 0, followed by the peripherals
    ///
    /// # Errors
    ///
    /// Fails if RAM and peripherals do not fit in the address space.
    pub fn new(config: VmConfig, peripherals: Vec<Box<dyn Device>>) -> Result<Self, VmError> {
        let mut vm = Self::build(config);

        let mut next = vm.ram_size;
        for device in peripherals {
            let end = next + device.size();
            let start = u16::try_from(next)
                .ok()
                .filter(|_| end <= C::ADDRESS_SPACE)
                .ok_or(VmError::AddressSpaceExhausted { needed: end })?;
            vm.bus.attach(AddressRange::new(start, end_u32(end)), device);
            next = end;
        }

        Ok(vm)
    }

    fn build(config: VmConfig) -> Self {
        let ram_size = usize::from(config.ram_size);
        let mut bus = Bus::new();
        bus.attach(
            AddressRange::new(0, end_u32(ram_size)),
            Box::new(Ram::new(ram_size)),
        );

        Self {
            cpu: Cpu::new(config.irq_levels, config.software_interrupts),
            bus,
            ram_size,
            last_tick: None,
        }
    }

    #[must_use]
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    #[must_use]
    pub fn ram_size(&self) -> usize {
        self.ram_size
    }

    /// Zero the registers and clear RAM and peripherals
    pub fn reset(&mut self) {
        debug!("Resetting machine");
        self.cpu.reset();
        self.bus.clear();
        self.last_tick = None;
    }

    /// Write a program in RAM, starting at address 0
    ///
    /// # Errors
    ///
    /// Fails if the program is bigger than RAM.
    pub fn load_program(&mut self, program: &[NativeNumber]) -> Result<(), VmError> {
        if program.len() > self.ram_size {
            return Err(VmError::ProgramTooLarge {
                size: program.len(),
                capacity: self.ram_size,
            });
        }

        for (address, word) in (0..).zip(program) {
            self.bus
                .write(Address::new(address), *word)
                .map_err(ProcessorError::from)?;
        }

        info!(size = program.len(), "Loaded program");
        Ok(())
    }

    /// Raise a hardware interrupt request
    pub fn request_irq(&mut self, level: u16) -> bool {
        self.cpu.request_irq(level)
    }

    /// Execute a whole instruction
    ///
    /// # Errors
    ///
    /// Fails on addressing errors and uncaught software interrupts.
    pub fn step(&mut self) -> Result<Status, VmError> {
        match self.cpu.run_to_completion(&mut self.bus)? {
            Some(signal) => self.handle(signal),
            None => Ok(Status::Running),
        }
    }

    /// Run until the program halts
    ///
    /// With a frequency, every instruction is paced to take about
    /// `1 / frequency` seconds.
    ///
    /// # Errors
    ///
    /// Fails on addressing errors and uncaught software interrupts.
    #[tracing::instrument(skip(self))]
    pub fn run(&mut self, frequency: Option<f64>) -> Result<(), VmError> {
        let period = frequency.and_then(|f| {
            let period = Some(f)
                .filter(|f| f.is_finite() && *f > 0.0)
                .and_then(|f| Duration::try_from_secs_f64(1.0 / f).ok());
            if period.is_none() {
                warn!(frequency = f, "Unusable frequency, running unpaced");
            }
            period
        });
        let mut pacer = period.map(Pacer::new);
        self.last_tick = Some(Instant::now());

        info!("Running program");
        loop {
            if let Some(signal) = self.cpu.step(&mut self.bus)? {
                if self.handle(signal)? == Status::Halted {
                    info!(cycles = self.cpu.cycles, "Program halted");
                    return Ok(());
                }
            }

            if !self.cpu.is_complete() {
                continue;
            }

            self.tick(Instant::now());
            if let Some(pacer) = &mut pacer {
                pacer.wait();
            }
        }
    }

    /// Raise the lowest IRQ level once for every second elapsed since the
    /// last tick
    fn tick(&mut self, now: Instant) {
        let Some(last) = self.last_tick else {
            self.last_tick = Some(now);
            return;
        };

        let seconds = now.saturating_duration_since(last).as_secs();
        if seconds == 0 {
            return;
        }

        for _ in 0..seconds {
            self.cpu.request_irq(0);
        }
        self.last_tick = Some(last + Duration::from_secs(seconds));
    }

    fn handle(&self, signal: SoftwareInterrupt) -> Result<Status, VmError> {
        match signal {
            SoftwareInterrupt::Halt => Ok(Status::Halted),
            SoftwareInterrupt::Breakpoint => {
                info!("Breakpoint\n{}", self.dump());
                Ok(Status::Running)
            }
            signal => Err(VmError::UncaughtInterrupt(signal)),
        }
    }

    /// Render the registers and the state of every device
    #[must_use]
    pub fn dump(&self) -> String {
        let mut out = format!("{}", self.cpu.registers);
        for (range, device) in self.bus.attachments() {
            if let Some(dump) = device.dump() {
                out.push_str(&format!("\n{range}\n{dump}"));
            }
        }
        out
    }
}

/// `usize` to the exclusive end of an [`AddressRange`]
fn end_u32(end: usize) -> u32 {
    u32::try_from(end).unwrap_or(u32::MAX)
}

/// Spaces instructions evenly in time
struct Pacer {
    period: Duration,
    deadline: Instant,
    behind: bool,
}

impl Pacer {
    fn new(period: Duration) -> Self {
        Self {
            period,
            deadline: Instant::now(),
            behind: false,
        }
    }

    fn wait(&mut self) {
        self.deadline += self.period;
        let now = Instant::now();
        if let Some(remaining) = self.deadline.checked_duration_since(now) {
            self.behind = false;
            std::thread::sleep(remaining);
        } else {
            if !self.behind {
                warn!(
                    late = ?now.duration_since(self.deadline),
                    "Running behind the requested frequency"
                );
                self.behind = true;
            }
            self.deadline = now;
        }
    }
}
