//! The instruction cycle
//!
//! An instruction is executed as a sequence of micro-steps, each of them doing
//! at most one bus transaction. [`Cpu::step`] advances the sequence by one
//! micro-step, [`Cpu::run_to_completion`] drains it.

use tracing::{debug, trace, warn};

use super::bus::Bus;
use super::instructions::{ArgType, Instruction};
use super::interrupt::SoftwareInterrupt;
use super::number::{Address, NativeNumber};
use super::registers::{OperandMode, Registers};
use super::ProcessorError;
use crate::constants as C;

type Result<T> = std::result::Result<T, ProcessorError>;

/// The next micro-step of the instruction cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Arbitrate hardware interrupts, then fetch and decode the opcode
    FetchOpcode,

    /// Read the operand following the opcode
    FetchOperand(Instruction),

    /// Read the value at the operand address
    ResolveOperand(Instruction),

    /// Follow the operand as a pointer
    Dereference(Instruction),

    /// Apply the instruction semantics
    Execute(Instruction),

    /// Look up the handler of a software interrupt
    Dispatch(SoftwareInterrupt),

    /// Push the context frame, one word per step
    EnterInterrupt {
        vector: Address,
        level: u16,
        pushed: usize,
    },

    /// Pop the context frame, one word per step
    ReturnFromInterrupt { popped: usize },

    /// The instruction is done, the next step starts a new one
    Complete,
}

#[derive(Debug, Clone)]
pub struct Cpu {
    pub registers: Registers,
    irq_levels: u16,
    software_interrupts: u16,
    pending: Vec<bool>,
    stage: Stage,

    /// Number of micro-steps executed since the last reset
    pub cycles: u64,
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new(C::DEFAULT_IRQ_LEVELS, C::DEFAULT_SOFTWARE_INTERRUPTS)
    }
}

impl Cpu {
    #[must_use]
    pub fn new(irq_levels: u16, software_interrupts: u16) -> Self {
        Self {
            registers: Registers::default(),
            irq_levels,
            software_interrupts,
            pending: vec![false; usize::from(irq_levels)],
            stage: Stage::Complete,
            cycles: 0,
        }
    }

    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub const fn irq_levels(&self) -> u16 {
        self.irq_levels
    }

    /// Whether the last instruction cycle is over
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.stage == Stage::Complete
    }

    /// Zero every register and drop pending interrupt requests
    pub fn reset(&mut self) {
        self.registers = Registers::default();
        self.pending.fill(false);
        self.stage = Stage::Complete;
        self.cycles = 0;
    }

    /// Mark a hardware interrupt level as pending
    ///
    /// Returns `false` if the level does not exist.
    pub fn request_irq(&mut self, level: u16) -> bool {
        if let Some(pending) = self.pending.get_mut(usize::from(level)) {
            *pending = true;
            true
        } else {
            warn!(level, irq_levels = self.irq_levels, "Ignoring request for unknown IRQ level");
            false
        }
    }

    #[must_use]
    pub fn is_pending(&self, level: u16) -> bool {
        self.pending.get(usize::from(level)).copied().unwrap_or(false)
    }

    /// Execute the next micro-step
    ///
    /// Returns a software interrupt when one was raised and no handler is
    /// installed for it. The instruction is then complete.
    ///
    /// # Errors
    ///
    /// Fails on any addressing error. The instruction is aborted, registers
    /// changed by the previous micro-steps stay changed.
    pub fn step(&mut self, bus: &mut Bus) -> Result<Option<SoftwareInterrupt>> {
        if self.stage == Stage::Complete {
            self.stage = Stage::FetchOpcode;
        }

        self.cycles += 1;
        let result = self.advance(bus);
        if result.is_err() {
            self.stage = Stage::Complete;
        }
        result
    }

    /// Execute micro-steps until the current instruction is done
    ///
    /// # Errors
    ///
    /// Fails on any addressing error.
    pub fn run_to_completion(&mut self, bus: &mut Bus) -> Result<Option<SoftwareInterrupt>> {
        loop {
            let signal = self.step(bus)?;
            if signal.is_some() || self.is_complete() {
                return Ok(signal);
            }
        }
    }

    fn advance(&mut self, bus: &mut Bus) -> Result<Option<SoftwareInterrupt>> {
        match self.stage {
            Stage::FetchOpcode => {
                if let Some(level) = self.arbitrate() {
                    self.pending[usize::from(level)] = false;
                    if self.enter_hardware_interrupt(bus, level)? {
                        return Ok(None);
                    }
                    // The vector lookup used up this step's bus transaction
                    if !self.registers.hi.is_zero() {
                        return Ok(None);
                    }
                }

                self.fetch_opcode(bus)
            }

            Stage::FetchOperand(instruction) => {
                self.registers.a0 = self.fetch(bus)?;
                self.stage = self.resolve_operand(instruction);
                Ok(None)
            }

            Stage::ResolveOperand(instruction) => {
                self.registers.a0 = bus.read(self.registers.a0.into())?;
                self.stage = if self.registers.om.contains(OperandMode::POINTER) {
                    Stage::Dereference(instruction)
                } else {
                    Stage::Execute(instruction)
                };
                Ok(None)
            }

            Stage::Dereference(instruction) => {
                self.registers.a0 = bus.read(self.registers.a0.into())?;
                self.stage = Stage::Execute(instruction);
                Ok(None)
            }

            Stage::Execute(instruction) => {
                self.stage = Stage::Complete;
                self.execute(bus, instruction)?;
                Ok(None)
            }

            Stage::Dispatch(signal) => self.dispatch(bus, signal),

            Stage::EnterInterrupt {
                vector,
                level,
                pushed,
            } => {
                let value = match pushed {
                    0 => self.registers.ia.into(),
                    1 => self.registers.il,
                    2 => self.registers.ac,
                    _ => self.registers.om.into(),
                };
                self.push(bus, value)?;

                let pushed = pushed + 1;
                if pushed == C::CONTEXT_FRAME_SIZE {
                    debug!(%vector, level, "Entering interrupt handler");
                    self.registers.ia = vector;
                    self.registers.il = NativeNumber::from(level + 1);
                    self.stage = Stage::Complete;
                } else {
                    self.stage = Stage::EnterInterrupt {
                        vector,
                        level,
                        pushed,
                    };
                }
                Ok(None)
            }

            Stage::ReturnFromInterrupt { popped } => {
                let value = self.pop(bus)?;
                match popped {
                    0 => self.registers.om = value.into(),
                    1 => self.registers.ac = value,
                    2 => self.registers.il = value,
                    _ => self.registers.ia = value.into(),
                }

                let popped = popped + 1;
                if popped == C::CONTEXT_FRAME_SIZE {
                    debug!(ia = %self.registers.ia, il = %self.registers.il, "Returned from interrupt handler");
                    self.stage = Stage::Complete;
                } else {
                    self.stage = Stage::ReturnFromInterrupt { popped };
                }
                Ok(None)
            }

            Stage::Complete => unreachable!("a complete cycle is restarted before advancing"),
        }
    }

    /// Find the highest pending level allowed to preempt the current handler
    fn arbitrate(&self) -> Option<u16> {
        // A handler running at level L has IL = L + 1 and can only be
        // preempted by levels strictly above L
        let lowest = u16::try_from(self.registers.il.value()).unwrap_or(0);
        (lowest..self.irq_levels)
            .rev()
            .find(|&level| self.pending[usize::from(level)])
    }

    /// Prepare the hardware interrupt entry
    ///
    /// Returns `false` if the request was dropped because no handler is
    /// installed.
    fn enter_hardware_interrupt(&mut self, bus: &Bus, level: u16) -> Result<bool> {
        if self.registers.hi.is_zero() {
            debug!(level, "Dropping hardware interrupt, no vector table");
            return Ok(false);
        }

        let vector: Address = bus
            .read(self.registers.hi.offset(level.into()))?
            .into();
        if vector.is_zero() {
            debug!(level, "Dropping hardware interrupt, no handler");
            return Ok(false);
        }

        debug!(level, %vector, "Dispatching hardware interrupt");
        self.stage = Stage::EnterInterrupt {
            vector,
            level,
            pushed: 0,
        };
        Ok(true)
    }

    fn fetch_opcode(&mut self, bus: &mut Bus) -> Result<Option<SoftwareInterrupt>> {
        self.registers.oc = self.fetch(bus)?;

        self.stage = match Instruction::decode(self.registers.oc) {
            Some(instruction) => {
                trace!(%instruction, "Decoded instruction");
                if instruction.arg_type() == ArgType::NoArg {
                    Stage::Execute(instruction)
                } else {
                    Stage::FetchOperand(instruction)
                }
            }
            None => {
                debug!(opcode = %self.registers.oc, "Invalid opcode");
                Stage::Dispatch(SoftwareInterrupt::InvalidInstruction)
            }
        };
        Ok(None)
    }

    /// Decide what to do with a freshly fetched operand
    fn resolve_operand(&mut self, instruction: Instruction) -> Stage {
        let mode = self.registers.om;
        match instruction.arg_type() {
            ArgType::NoArg | ArgType::Value => Stage::Execute(instruction),

            ArgType::ValueAddress if mode.contains(OperandMode::LITERAL) => {
                if mode.contains(OperandMode::POINTER) {
                    Stage::Dereference(instruction)
                } else {
                    Stage::Execute(instruction)
                }
            }

            ArgType::ValueAddress => {
                self.translate_stack_relative();
                Stage::ResolveOperand(instruction)
            }

            ArgType::Address => {
                self.translate_stack_relative();
                if mode.contains(OperandMode::POINTER) {
                    Stage::Dereference(instruction)
                } else {
                    Stage::Execute(instruction)
                }
            }
        }
    }

    /// `A0 = SP - A0 - 1` when the operand is relative to the stack
    fn translate_stack_relative(&mut self) {
        if self.registers.om.contains(OperandMode::STACK) {
            let sp = i64::from(self.registers.sp.value());
            self.registers.a0 = NativeNumber::new(sp - self.registers.a0.value() - 1);
        }
    }

    #[tracing::instrument(skip(self, bus), level = "debug")]
    fn execute(&mut self, bus: &mut Bus, instruction: Instruction) -> Result<()> {
        use Instruction::*;

        let r = &mut self.registers;
        let (ac, a0) = (r.ac, r.a0);

        match instruction {
            Noop => {}

            Ld => r.ac = a0,

            St => bus.write(a0.into(), ac)?,

            Add => r.ac = NativeNumber::new(ac.value() + a0.value()),

            Neg => r.ac = NativeNumber::new(-ac.value()),

            Mul => r.ac = NativeNumber::new(ac.value() * a0.value()),

            Div if a0.is_zero() => self.fault(instruction),
            Div => match NativeNumber::from_float(ac.to_f64() / a0.to_f64()) {
                Some(res) => r.ac = res,
                None => self.fault(instruction),
            },

            Sqrt => match NativeNumber::from_float(ac.to_f64().sqrt()) {
                Some(res) if ac.value() >= 0 => r.ac = res,
                _ => self.fault(instruction),
            },

            Gt => r.ac = NativeNumber::from(ac > a0),

            Not => r.ac = NativeNumber::from(ac.is_zero()),

            And => r.ac = NativeNumber::from(!ac.is_zero() && !a0.is_zero()),

            Or => r.ac = NativeNumber::from(!ac.is_zero() || !a0.is_zero()),

            Jmp => {
                debug!("Jumping to address {}", Address::from(a0));
                r.ia = a0.into();
            }

            Jif => {
                if !ac.is_zero() {
                    debug!("Jumping to address {}", Address::from(a0));
                    r.ia = a0.into();
                }
            }

            A0A => r.om.remove(OperandMode::LITERAL),
            A0L => r.om.insert(OperandMode::LITERAL),
            A0V => r.om.remove(OperandMode::POINTER),
            A0P => r.om.insert(OperandMode::POINTER),
            A0R => r.om.remove(OperandMode::STACK),
            A0S => r.om.insert(OperandMode::STACK),

            Hih => r.hi = a0.into(),

            Sih => r.si = a0.into(),

            Stk => r.sp = a0.into(),

            Push => {
                let sp = r.sp;
                bus.write(sp, ac)?;
                self.registers.sp = sp.offset(1);
            }

            Pop => {
                // Popping past the bottom of the stack leaves it empty
                let sp = i64::from(r.sp.value()) - a0.value();
                r.sp = Address::new(sp.clamp(0, i64::from(u16::MAX)));
            }

            Int => self.stage = Stage::Dispatch(SoftwareInterrupt::from_code(a0)),

            Ihr => self.stage = Stage::ReturnFromInterrupt { popped: 0 },
        }

        debug!(registers = %self.registers, "Executed {}", instruction);
        Ok(())
    }

    fn fault(&mut self, instruction: Instruction) {
        debug!(%instruction, ac = %self.registers.ac, a0 = %self.registers.a0, "Arithmetic fault");
        self.stage = Stage::Dispatch(SoftwareInterrupt::ArithmeticFault);
    }

    /// Hand a software interrupt to its handler, or back to the caller
    fn dispatch(
        &mut self,
        bus: &Bus,
        signal: SoftwareInterrupt,
    ) -> Result<Option<SoftwareInterrupt>> {
        self.stage = Stage::Complete;

        let code = signal.code();
        let in_range = u16::try_from(code.value())
            .is_ok_and(|code| code < self.software_interrupts);
        if self.registers.si.is_zero() || !in_range {
            debug!(%signal, "Uncaught software interrupt");
            return Ok(Some(signal));
        }

        let vector: Address = bus.read(self.registers.si.offset(code.value()))?.into();
        if vector.is_zero() {
            debug!(%signal, "Uncaught software interrupt, no handler");
            return Ok(Some(signal));
        }

        debug!(%signal, %vector, "Dispatching software interrupt");
        self.stage = Stage::EnterInterrupt {
            vector,
            level: self.irq_levels,
            pushed: 0,
        };
        Ok(None)
    }

    /// Read the word at `IA` and move past it
    fn fetch(&mut self, bus: &Bus) -> Result<NativeNumber> {
        let value = bus.read(self.registers.ia)?;
        self.registers.ia = self.registers.ia.offset(1);
        Ok(value)
    }

    fn push(&mut self, bus: &mut Bus, value: NativeNumber) -> Result<()> {
        bus.write(self.registers.sp, value)?;
        self.registers.sp = self.registers.sp.offset(1);
        Ok(())
    }

    fn pop(&mut self, bus: &Bus) -> Result<NativeNumber> {
        self.registers.sp = self.registers.sp.offset(-1);
        Ok(bus.read(self.registers.sp)?)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::super::bus::{AddressRange, AddressingError};
    use super::super::instructions::Instruction::*;
    use super::super::memory::Ram;
    use super::*;

    fn n(value: i64) -> NativeNumber {
        NativeNumber::new(value)
    }

    fn machine(program: &[NativeNumber]) -> (Cpu, Bus) {
        let mut bus = Bus::new();
        bus.attach(AddressRange::new(0, 0x100), Box::new(Ram::new(0x100)));
        for (address, word) in (0..).zip(program) {
            bus.write(Address::new(address), *word).unwrap();
        }
        (Cpu::default(), bus)
    }

    fn poke(bus: &mut Bus, address: i64, value: i64) {
        bus.write(Address::new(address), n(value)).unwrap();
    }

    fn peek(bus: &Bus, address: i64) -> NativeNumber {
        bus.read(Address::new(address)).unwrap()
    }

    /// Run an instruction and count its micro-steps
    fn count_steps(cpu: &mut Cpu, bus: &mut Bus) -> usize {
        let mut steps = 0;
        loop {
            assert_eq!(cpu.step(bus).unwrap(), None);
            steps += 1;
            if cpu.is_complete() {
                return steps;
            }
        }
    }

    #[test]
    fn stage_sequence_test() {
        let (mut cpu, mut bus) = machine(&[Ld.into(), n(0x80)]);
        poke(&mut bus, 0x80, 42);

        assert_eq!(cpu.stage(), Stage::Complete);
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.stage(), Stage::FetchOperand(Ld));
        assert_eq!(cpu.registers.oc, Ld.into());
        assert_eq!(cpu.registers.ia, Address::new(1));
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.stage(), Stage::ResolveOperand(Ld));
        assert_eq!(cpu.registers.a0, n(0x80));
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.stage(), Stage::Execute(Ld));
        assert_eq!(cpu.registers.a0, n(42));
        assert_eq!(cpu.registers.ac, n(0));
        cpu.step(&mut bus).unwrap();
        assert_eq!(cpu.stage(), Stage::Complete);
        assert_eq!(cpu.registers.ac, n(42));
        assert_eq!(cpu.registers.ia, Address::new(2));
        assert_eq!(cpu.cycles, 4);
    }

    #[test]
    fn operand_modes_test() {
        let (mut cpu, mut bus) = machine(&[
            // Literal
            A0L.into(),
            Ld.into(),
            n(0x80),
            // Pointer to a literal: a single dereference
            A0P.into(),
            Ld.into(),
            n(0x80),
            // Pointer in memory: two reads
            A0A.into(),
            Ld.into(),
            n(0x81),
        ]);
        poke(&mut bus, 0x80, 42);
        poke(&mut bus, 0x81, 0x82);
        poke(&mut bus, 0x82, 0x80);

        assert_eq!(count_steps(&mut cpu, &mut bus), 2);
        assert_eq!(count_steps(&mut cpu, &mut bus), 3);
        assert_eq!(cpu.registers.ac, n(0x80));

        assert_eq!(count_steps(&mut cpu, &mut bus), 2);
        assert_eq!(count_steps(&mut cpu, &mut bus), 4);
        assert_eq!(cpu.registers.ac, n(42));

        assert_eq!(count_steps(&mut cpu, &mut bus), 2);
        assert_eq!(count_steps(&mut cpu, &mut bus), 5);
        assert_eq!(cpu.registers.ac, n(0x80));
    }

    #[test]
    fn value_arg_is_never_dereferenced_test() {
        // STK takes a literal even in address mode
        let (mut cpu, mut bus) = machine(&[A0P.into(), Stk.into(), n(0x80)]);
        poke(&mut bus, 0x80, 42);

        cpu.run_to_completion(&mut bus).unwrap();
        assert_eq!(count_steps(&mut cpu, &mut bus), 3);
        assert_eq!(cpu.registers.sp, Address::new(0x80));
    }

    #[test]
    fn stack_relative_test() {
        let (mut cpu, mut bus) = machine(&[
            A0L.into(),
            Stk.into(),
            n(0x90),
            Ld.into(),
            n(11),
            Push.into(),
            Ld.into(),
            n(22),
            Push.into(),
            A0A.into(),
            A0S.into(),
            // Second word from the top of the stack
            Ld.into(),
            n(1),
            // Overwrite the top of the stack
            St.into(),
            n(0),
        ]);

        for _ in 0..10 {
            cpu.run_to_completion(&mut bus).unwrap();
        }
        assert_eq!(cpu.registers.sp, Address::new(0x92));
        assert_eq!(cpu.registers.ac, n(11));
        assert_eq!(peek(&bus, 0x90), n(11));
        assert_eq!(peek(&bus, 0x91), n(11));
    }

    #[test]
    fn store_through_pointer_test() {
        let (mut cpu, mut bus) = machine(&[
            A0L.into(),
            Ld.into(),
            n(7),
            A0A.into(),
            A0P.into(),
            St.into(),
            n(0x80),
        ]);
        poke(&mut bus, 0x80, 0x88);

        for _ in 0..4 {
            cpu.run_to_completion(&mut bus).unwrap();
        }
        // Destination: fetch operand, dereference once, write
        assert_eq!(count_steps(&mut cpu, &mut bus), 4);
        assert_eq!(peek(&bus, 0x80), n(0x88));
        assert_eq!(peek(&bus, 0x88), n(7));
    }

    #[test]
    fn push_pop_test() {
        let (mut cpu, mut bus) = machine(&[
            A0L.into(),
            Ld.into(),
            n(5),
            Push.into(),
            Stk.into(),
            n(0),
            Pop.into(),
            n(1),
        ]);

        for _ in 0..5 {
            assert_eq!(cpu.run_to_completion(&mut bus).unwrap(), None);
        }
        assert_eq!(cpu.registers.ac, n(5));
        assert_eq!(cpu.registers.sp, Address::new(0));
        // PUSH wrote over the first opcode
        assert_eq!(peek(&bus, 0), n(5));
    }

    #[test]
    fn pop_discards_words_test() {
        let (mut cpu, mut bus) = machine(&[Stk.into(), n(0x90), Pop.into(), n(3)]);
        cpu.run_to_completion(&mut bus).unwrap();
        cpu.run_to_completion(&mut bus).unwrap();
        assert_eq!(cpu.registers.sp, Address::new(0x8d));
        assert_eq!(cpu.registers.ac, n(0));

        // Popping more words than the stack holds leaves it empty
        let (mut cpu, mut bus) = machine(&[Stk.into(), n(1), Pop.into(), n(3)]);
        cpu.run_to_completion(&mut bus).unwrap();
        cpu.run_to_completion(&mut bus).unwrap();
        assert_eq!(cpu.registers.sp, Address::new(0));
    }

    fn compute(setup: i64, instruction: Instruction, operand: Option<i64>) -> Option<NativeNumber> {
        let mut program = vec![A0L.into(), Ld.into(), n(setup), instruction.into()];
        program.extend(operand.map(n));
        let (mut cpu, mut bus) = machine(&program);

        cpu.run_to_completion(&mut bus).unwrap();
        cpu.run_to_completion(&mut bus).unwrap();
        match cpu.run_to_completion(&mut bus).unwrap() {
            None => Some(cpu.registers.ac),
            Some(signal) => {
                assert_eq!(signal, SoftwareInterrupt::ArithmeticFault);
                None
            }
        }
    }

    #[test]
    fn arithmetic_test() {
        assert_eq!(compute(5, Add, Some(7)), Some(n(12)));
        assert_eq!(compute(0xefff, Add, Some(1)), Some(n(-0x1000)));
        assert_eq!(compute(-1, Add, Some(1)), Some(n(0)));
        assert_eq!(compute(5, Neg, None), Some(n(-5)));
        assert_eq!(compute(300, Mul, Some(300)), Some(n(90000)));
        assert_eq!(compute(7, Div, Some(2)), Some(n(3)));
        assert_eq!(compute(-7, Div, Some(2)), Some(n(-3)));
        assert_eq!(compute(7, Div, Some(0)), None);
        assert_eq!(compute(17, Sqrt, None), Some(n(4)));
        assert_eq!(compute(-4, Sqrt, None), None);
    }

    #[test]
    fn logic_test() {
        assert_eq!(compute(5, Gt, Some(3)), Some(n(1)));
        assert_eq!(compute(3, Gt, Some(3)), Some(n(0)));
        assert_eq!(compute(-1, Gt, Some(0)), Some(n(0)));
        assert_eq!(compute(0, Not, None), Some(n(1)));
        assert_eq!(compute(42, Not, None), Some(n(0)));
        assert_eq!(compute(42, And, Some(3)), Some(n(1)));
        assert_eq!(compute(42, And, Some(0)), Some(n(0)));
        assert_eq!(compute(0, Or, Some(0)), Some(n(0)));
        assert_eq!(compute(0, Or, Some(-3)), Some(n(1)));
    }

    #[test]
    fn jumps_test() {
        let (mut cpu, mut bus) = machine(&[
            Jif.into(),
            n(0x40),
            Jmp.into(),
            n(0x20),
        ]);

        cpu.run_to_completion(&mut bus).unwrap();
        assert_eq!(cpu.registers.ia, Address::new(2));
        cpu.run_to_completion(&mut bus).unwrap();
        assert_eq!(cpu.registers.ia, Address::new(0x20));

        cpu.registers.ac = n(1);
        cpu.registers.ia = Address::new(0);
        cpu.run_to_completion(&mut bus).unwrap();
        assert_eq!(cpu.registers.ia, Address::new(0x40));
    }

    #[test]
    fn invalid_opcode_test() {
        let (mut cpu, mut bus) = machine(&[n(0xff)]);
        assert_eq!(
            cpu.run_to_completion(&mut bus).unwrap(),
            Some(SoftwareInterrupt::InvalidInstruction)
        );
        assert!(cpu.is_complete());
        assert_eq!(cpu.registers.ia, Address::new(1));
    }

    #[test]
    fn uncaught_software_interrupt_test() {
        let (mut cpu, mut bus) = machine(&[Int.into(), n(7)]);
        assert_eq!(
            cpu.run_to_completion(&mut bus).unwrap(),
            Some(SoftwareInterrupt::Other(n(7)))
        );

        // A table without an entry for this code does not catch it either
        let (mut cpu, mut bus) = machine(&[Sih.into(), n(0x40), Int.into(), n(7)]);
        cpu.run_to_completion(&mut bus).unwrap();
        assert_eq!(
            cpu.run_to_completion(&mut bus).unwrap(),
            Some(SoftwareInterrupt::Other(n(7)))
        );

        // Codes outside of the table are never looked up
        let (mut cpu, mut bus) = machine(&[Sih.into(), n(0x40), Int.into(), n(16)]);
        poke(&mut bus, 0x50, 0x20);
        cpu.run_to_completion(&mut bus).unwrap();
        assert_eq!(
            cpu.run_to_completion(&mut bus).unwrap(),
            Some(SoftwareInterrupt::Other(n(16)))
        );
    }

    #[test]
    fn software_interrupt_roundtrip_test() {
        let (mut cpu, mut bus) = machine(&[
            Sih.into(),
            n(0x40),
            Stk.into(),
            n(0x60),
            A0L.into(),
            Ld.into(),
            n(7),
            Int.into(),
            n(5),
            Noop.into(),
        ]);
        poke(&mut bus, 0x45, 0x20);
        poke(&mut bus, 0x20, Ld.opcode().into());
        poke(&mut bus, 0x21, 9);
        poke(&mut bus, 0x22, Ihr.opcode().into());

        for _ in 0..4 {
            cpu.run_to_completion(&mut bus).unwrap();
        }

        // INT: opcode, operand, execute, vector lookup, four pushes
        assert_eq!(count_steps(&mut cpu, &mut bus), 8);
        assert_eq!(cpu.registers.ia, Address::new(0x20));
        assert_eq!(cpu.registers.il, n(5));
        assert_eq!(cpu.registers.sp, Address::new(0x64));
        assert_eq!(peek(&bus, 0x60), n(9));
        assert_eq!(peek(&bus, 0x61), n(0));
        assert_eq!(peek(&bus, 0x62), n(7));
        assert_eq!(peek(&bus, 0x63), n(1));

        cpu.run_to_completion(&mut bus).unwrap();
        assert_eq!(cpu.registers.ac, n(9));

        // IHR: opcode, execute, four pops
        assert_eq!(count_steps(&mut cpu, &mut bus), 6);
        assert_eq!(cpu.registers.ia, Address::new(9));
        assert_eq!(cpu.registers.il, n(0));
        assert_eq!(cpu.registers.ac, n(7));
        assert_eq!(cpu.registers.om, OperandMode::LITERAL);
        assert_eq!(cpu.registers.sp, Address::new(0x60));
    }

    #[test]
    fn invalid_opcode_handler_test() {
        let (mut cpu, mut bus) = machine(&[Sih.into(), n(0x40), Stk.into(), n(0x60), n(0xee)]);
        poke(&mut bus, 0x41, 0x20);

        cpu.run_to_completion(&mut bus).unwrap();
        cpu.run_to_completion(&mut bus).unwrap();
        assert_eq!(cpu.run_to_completion(&mut bus).unwrap(), None);
        assert_eq!(cpu.registers.ia, Address::new(0x20));
        assert_eq!(cpu.registers.oc, n(0xee));
        assert_eq!(peek(&bus, 0x60), n(5));
    }

    fn interrupt_machine() -> (Cpu, Bus) {
        let mut program = vec![Hih.into(), n(0x40), Stk.into(), n(0x60)];
        program.resize(0x40, Noop.into());
        let (mut cpu, mut bus) = machine(&program);
        // Level 1 has no handler
        poke(&mut bus, 0x40, 0x10);
        poke(&mut bus, 0x42, 0x20);
        poke(&mut bus, 0x43, 0x30);
        cpu.run_to_completion(&mut bus).unwrap();
        cpu.run_to_completion(&mut bus).unwrap();
        (cpu, bus)
    }

    #[test]
    fn irq_priority_test() {
        let (mut cpu, mut bus) = interrupt_machine();

        assert!(cpu.request_irq(0));
        assert!(cpu.request_irq(2));
        // Vector lookup and four pushes
        assert_eq!(count_steps(&mut cpu, &mut bus), 5);
        assert_eq!(cpu.registers.ia, Address::new(0x20));
        assert_eq!(cpu.registers.il, n(3));
        assert!(!cpu.is_pending(2));
        assert!(cpu.is_pending(0));

        // Same level and lower levels wait
        cpu.request_irq(2);
        cpu.run_to_completion(&mut bus).unwrap();
        assert_eq!(cpu.registers.ia, Address::new(0x21));
        assert!(cpu.is_pending(2));

        // A higher level preempts
        cpu.request_irq(3);
        cpu.run_to_completion(&mut bus).unwrap();
        assert_eq!(cpu.registers.ia, Address::new(0x30));
        assert_eq!(cpu.registers.il, n(4));
        assert_eq!(peek(&bus, 0x64), n(0x21));
        assert_eq!(peek(&bus, 0x65), n(3));
    }

    #[test]
    fn irq_without_handler_test() {
        let (mut cpu, mut bus) = interrupt_machine();

        cpu.request_irq(1);
        cpu.run_to_completion(&mut bus).unwrap();
        assert!(!cpu.is_pending(1));
        assert_eq!(cpu.registers.il, n(0));
        assert_eq!(cpu.registers.sp, Address::new(0x60));
        // The instruction still ran in the same cycle
        assert_eq!(cpu.registers.ia, Address::new(5));

        let (mut cpu, mut bus) = machine(&[Noop.into(), Noop.into()]);
        cpu.request_irq(3);
        assert_eq!(count_steps(&mut cpu, &mut bus), 2);
        assert!(!cpu.is_pending(3));
        assert_eq!(cpu.registers.ia, Address::new(1));

        assert!(!cpu.request_irq(4));
    }

    #[test]
    fn software_handler_blocks_hardware_test() {
        let (mut cpu, mut bus) = interrupt_machine();
        cpu.registers.il = n(5);

        cpu.request_irq(3);
        cpu.run_to_completion(&mut bus).unwrap();
        assert!(cpu.is_pending(3));
        assert_eq!(cpu.registers.ia, Address::new(5));
    }

    #[test]
    fn addressing_error_test() {
        let (mut cpu, mut bus) = machine(&[Ld.into(), n(0x200)]);
        assert_eq!(
            cpu.run_to_completion(&mut bus),
            Err(ProcessorError::Addressing(AddressingError::Unmapped(
                Address::new(0x200)
            )))
        );
        assert!(cpu.is_complete());
        // Registers changed before the failure stay changed
        assert_eq!(cpu.registers.a0, n(0x200));
        assert_eq!(cpu.registers.ia, Address::new(2));
    }

    #[test]
    fn reset_test() {
        let (mut cpu, mut bus) = interrupt_machine();
        cpu.request_irq(2);
        cpu.step(&mut bus).unwrap();
        cpu.reset();

        assert_eq!(cpu.registers, Registers::default());
        assert!(cpu.is_complete());
        assert!(!cpu.is_pending(2));
        assert_eq!(cpu.cycles, 0);
    }
}
