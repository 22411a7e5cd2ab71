//! CPU execution engine for the LS-8.
//!
//! Implements the fetch-decode-execute cycle and all non-ALU instruction
//! behaviors. Stack and interrupt bookkeeping live in their own modules
//! but operate on the same [`Cpu`].

use std::io::Write;

use crate::cpu::{alu, Devices, Memory, Registers};
use crate::cpu::alu::AluError;
use crate::cpu::decode::{self, InstructionDescriptor, Opcode};
use crate::cpu::memory::MemoryError;
use crate::cpu::registers::RegisterError;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (executed HLT instruction).
    Halted,
    /// CPU hit a fatal error and must not continue.
    Error,
}

/// What a single cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cycle {
    /// An instruction was fetched and executed.
    Executed(InstructionDescriptor),
    /// An interrupt on the given line was entered instead.
    Interrupted(u8),
}

/// The LS-8 CPU.
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// Current execution state.
    pub state: CpuState,
    /// Completed cycles.
    pub cycles: u64,
    /// Last executed instruction (for debugging).
    last_instr: Option<InstructionDescriptor>,
    pub(crate) timer_primed: bool,
    pub(crate) devices: Devices,
}

/// Serializable copy of the architectural state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub regs: Registers,
    pub mem: Memory,
    pub state: CpuState,
    pub cycles: u64,
}

impl Cpu {
    /// Create a CPU wired to stdout, the system clock and no keyboard.
    pub fn new() -> Self {
        Self::with_devices(Devices::console())
    }

    /// Create a CPU wired to the given peripherals.
    pub fn with_devices(devices: Devices) -> Self {
        Self {
            regs: Registers::new(),
            mem: Memory::new(),
            state: CpuState::Running,
            cycles: 0,
            last_instr: None,
            timer_primed: false,
            devices,
        }
    }

    /// Reset the CPU to its power-on state. Peripherals are kept.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.state = CpuState::Running;
        self.cycles = 0;
        self.last_instr = None;
        self.timer_primed = false;
    }

    /// Load a program image at address 0.
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), MemoryError> {
        self.mem.load_program(0, program)
    }

    /// Write a single byte, as a loader would.
    pub fn write_memory(&mut self, address: usize, value: u8) -> Result<(), MemoryError> {
        self.mem.write(address, value)
    }

    /// Run one cycle: service interrupts, or fetch and execute one
    /// instruction.
    ///
    /// Any error is fatal: the CPU moves to [`CpuState::Error`] and every
    /// later call fails with [`CpuError::NotRunning`].
    pub fn step(&mut self) -> Result<Cycle, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        match self.cycle() {
            Ok(cycle) => {
                self.cycles += 1;
                Ok(cycle)
            }
            Err(e) => {
                log::error!("fault at PC={:#04x}: {}", self.regs.pc, e);
                self.state = CpuState::Error;
                Err(e)
            }
        }
    }

    /// Run until halt or error.
    ///
    /// Returns the number of cycles executed.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` cycles.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles.saturating_add(max_cycles);

        while self.state == CpuState::Running && self.cycles < limit {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    fn cycle(&mut self) -> Result<Cycle, CpuError> {
        if let Some(line) = self.poll_interrupts()? {
            return Ok(Cycle::Interrupted(line));
        }

        // Fetch
        let pc = self.regs.pc;
        let opcode = self.mem.read(pc)?;

        // Decode
        let instr = decode::decode(opcode)
            .map_err(|_| CpuError::IllegalInstruction { pc, opcode })?;

        let mut operands = [0u8; 2];
        for (i, operand) in operands.iter_mut().take(instr.operand_count as usize).enumerate() {
            *operand = self.mem.read(pc + 1 + i)?;
        }
        let next = pc + instr.len();

        log::trace!(
            "{:#04x}: {} {:?}",
            pc,
            instr.opcode,
            &operands[..instr.operand_count as usize]
        );

        // Execute
        if instr.opcode == Opcode::Hlt {
            self.regs.pc = next;
            self.state = CpuState::Halted;
        } else if instr.is_alu {
            let src = (instr.operand_count == 2).then_some(operands[1]);
            alu::apply(&mut self.regs, instr.opcode, operands[0], src)
                .map_err(|source| CpuError::Alu { pc, opcode: instr.opcode, source })?;
        } else {
            self.execute(instr.opcode, operands, next)
                .map_err(|source| CpuError::Instruction {
                    pc,
                    opcode: instr.opcode,
                    source: Box::new(source),
                })?;
        }

        if !instr.sets_pc {
            self.regs.pc = next;
        }

        self.last_instr = Some(instr);
        Ok(Cycle::Executed(instr))
    }

    /// Execute a decoded non-ALU instruction.
    ///
    /// `next` is the address of the following instruction, for handlers
    /// that set the PC themselves.
    fn execute(&mut self, opcode: Opcode, [a, b]: [u8; 2], next: usize) -> Result<(), CpuError> {
        match opcode {
            // ==================== Data Transfer ====================

            Opcode::Ldi => {
                self.regs.set(a, b)?;
            }

            Opcode::Addi => {
                let value = self.regs.get(a)?.wrapping_add(b);
                self.regs.set(a, value)?;
            }

            Opcode::Ld => {
                let addr = self.regs.get(b)?;
                let value = self.mem.read(addr as usize)?;
                self.regs.set(a, value)?;
            }

            Opcode::St => {
                let addr = self.regs.get(a)?;
                let value = self.regs.get(b)?;
                self.mem.write(addr as usize, value)?;
            }

            // ==================== Stack ====================

            Opcode::Push => self.push_register(a)?,
            Opcode::Pop => self.pop_register(a)?,

            // ==================== Control Flow ====================

            Opcode::Call => self.call(a, next)?,
            Opcode::Ret => self.ret()?,

            Opcode::Jmp => self.jump_if(true, a, next)?,
            Opcode::Jeq => self.jump_if(self.regs.fl.equal(), a, next)?,
            Opcode::Jne => self.jump_if(!self.regs.fl.equal(), a, next)?,
            Opcode::Jgt => self.jump_if(self.regs.fl.greater(), a, next)?,
            Opcode::Jlt => self.jump_if(self.regs.fl.less(), a, next)?,
            Opcode::Jge => {
                let fl = self.regs.fl;
                self.jump_if(fl.equal() || fl.greater(), a, next)?
            }
            Opcode::Jle => {
                let fl = self.regs.fl;
                self.jump_if(fl.equal() || fl.less(), a, next)?
            }

            // ==================== Interrupts ====================

            Opcode::Int => {
                let lines = self.regs.get(a)?;
                let status = self.regs.interrupt_status() | lines;
                self.regs.set_interrupt_status(status);
                self.regs.pc = next;
            }

            Opcode::Iret => self.iret()?,

            // ==================== Output ====================

            Opcode::Prn => {
                let value = self.regs.get(a)?;
                self.print(&format!("{}\n", value))?;
            }

            Opcode::Pra => {
                let value = self.regs.get(a)?;
                self.print(&char::from(value).to_string())?;
            }

            Opcode::Nop => {}

            other => {
                return Err(CpuError::Alu {
                    pc: self.regs.pc,
                    opcode: other,
                    source: AluError::UnsupportedOperation(other),
                });
            }
        }

        Ok(())
    }

    fn jump_if(&mut self, condition: bool, reg: u8, next: usize) -> Result<(), CpuError> {
        self.regs.pc = if condition {
            self.regs.get(reg)? as usize
        } else {
            next
        };
        Ok(())
    }

    /// Write to the console and flush, so PRA and PRN interleave in order.
    fn print(&mut self, text: &str) -> Result<(), CpuError> {
        let out = &mut self.devices.output;
        out.write_all(text.as_bytes())
            .and_then(|_| out.flush())
            .map_err(|e| CpuError::Output(e.to_string()))
    }

    /// Copy the architectural state.
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            regs: self.regs.clone(),
            mem: self.mem.clone(),
            state: self.state,
            cycles: self.cycles,
        }
    }

    /// One line of CPU state: PC, FL, the three bytes at PC, then R0-R7.
    pub fn trace_line(&self) -> String {
        let pc = self.regs.pc;
        let mut line = format!(
            "TRACE: {:02X} {:02X} | {:02X} {:02X} {:02X} |",
            pc,
            self.regs.fl.bits(),
            self.mem.peek(pc),
            self.mem.peek(pc + 1),
            self.mem.peek(pc + 2)
        );
        for r in self.regs.all() {
            line.push_str(&format!(" {:02X}", r));
        }
        line
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<InstructionDescriptor> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("illegal instruction {opcode:#010b} at PC={pc:#04x}")]
    IllegalInstruction { pc: usize, opcode: u8 },

    #[error("{opcode} at PC={pc:#04x}: {source}")]
    Alu {
        pc: usize,
        opcode: Opcode,
        #[source]
        source: AluError,
    },

    /// A handler failed; `source` is the underlying fault.
    #[error("{opcode} at PC={pc:#04x}: {source}")]
    Instruction {
        pc: usize,
        opcode: Opcode,
        #[source]
        source: Box<CpuError>,
    },

    #[error("memory error: {0}")]
    Memory(#[from] MemoryError),

    #[error("register error: {0}")]
    Register(#[from] RegisterError),

    #[error("output error: {0}")]
    Output(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::devices::SharedOutput;

    const LDI: u8 = 0b1000_0010;
    const PRN: u8 = 0b0100_0111;
    const PRA: u8 = 0b0100_1000;
    const HLT: u8 = 0b0000_0001;
    const NOP: u8 = 0b0000_0000;
    const CMP: u8 = 0b1010_0111;
    const JEQ: u8 = 0b0101_0101;
    const JNE: u8 = 0b0101_0110;
    const JMP: u8 = 0b0101_0100;
    const DIV: u8 = 0b1010_0011;
    const LD: u8 = 0b1000_0011;
    const ST: u8 = 0b1000_0100;
    const ADDI: u8 = 0b1000_0101;

    fn cpu_with(program: &[u8]) -> (Cpu, SharedOutput) {
        let (devices, _keys, _clock, out) = Devices::scripted();
        let mut cpu = Cpu::with_devices(devices);
        cpu.load_program(program).unwrap();
        (cpu, out)
    }

    #[test]
    fn test_cpu_halt() {
        let (mut cpu, _) = cpu_with(&[HLT]);

        let executed = cpu.run().unwrap();

        assert_eq!(executed, 1);
        assert!(cpu.is_halted());
        assert_eq!(cpu.regs.pc, 1);
    }

    #[test]
    fn test_cpu_nop_then_halt() {
        let (mut cpu, _) = cpu_with(&[NOP, NOP, NOP, HLT]);

        let executed = cpu.run().unwrap();

        assert_eq!(executed, 4);
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_print8() {
        let (mut cpu, out) = cpu_with(&[LDI, 0, 8, PRN, 0, HLT]);

        cpu.run().unwrap();

        assert_eq!(out.contents(), "8\n");
        assert_eq!(cpu.regs.pc, 6);
        assert_eq!(cpu.last_instruction().map(|i| i.opcode), Some(Opcode::Hlt));
    }

    #[test]
    fn test_pra_interleaves_with_prn() {
        let (mut cpu, out) = cpu_with(&[
            LDI, 0, b'H',
            PRA, 0,
            LDI, 1, 42,
            PRN, 1,
            PRA, 0,
            HLT,
        ]);

        cpu.run().unwrap();

        assert_eq!(out.contents(), "H42\nH");
    }

    #[test]
    fn test_load_store() {
        let (mut cpu, _) = cpu_with(&[
            LDI, 0, 0x80,   // address
            LDI, 1, 99,     // value
            ST, 0, 1,
            LD, 2, 0,
            HLT,
        ]);

        cpu.run().unwrap();

        assert_eq!(cpu.mem.read(0x80).unwrap(), 99);
        assert_eq!(cpu.regs.get(2).unwrap(), 99);
    }

    #[test]
    fn test_addi_wraps() {
        let (mut cpu, _) = cpu_with(&[LDI, 3, 250, ADDI, 3, 10, HLT]);

        cpu.run().unwrap();

        assert_eq!(cpu.regs.get(3).unwrap(), 4);
    }

    #[test]
    fn test_conditional_jumps() {
        // R0 = R1 = 5; JEQ skips the first PRN, JNE falls through.
        let (mut cpu, out) = cpu_with(&[
            LDI, 0, 5,       // 0
            LDI, 1, 5,       // 3
            LDI, 2, 16,      // 6
            CMP, 0, 1,       // 9
            JEQ, 2,          // 12
            PRN, 0,          // 14 (skipped)
            JNE, 2,          // 16 (not taken)
            PRN, 1,          // 18
            HLT,             // 20
        ]);

        let executed = cpu.run().unwrap();

        assert_eq!(out.contents(), "5\n");
        assert_eq!(executed, 8);
    }

    #[test]
    fn test_comparison_jumps() {
        const JGT: u8 = 0b0101_0111;
        const JLT: u8 = 0b0101_1000;
        const JGE: u8 = 0b0101_1010;
        const JLE: u8 = 0b0101_1001;

        // (jump, taken when a<b, a==b, a>b)
        let table = [
            (JEQ, [false, true, false]),
            (JNE, [true, false, true]),
            (JGT, [false, false, true]),
            (JLT, [true, false, false]),
            (JGE, [false, true, true]),
            (JLE, [true, true, false]),
        ];

        for (jump, taken) in table {
            for (outcome, (a, b)) in [(1, 2), (2, 2), (3, 2)].into_iter().enumerate() {
                let (mut cpu, _) = cpu_with(&[
                    LDI, 0, a,       // 0
                    LDI, 1, b,       // 3
                    LDI, 2, 20,      // 6
                    CMP, 0, 1,       // 9
                    jump, 2,         // 12
                    HLT,             // 14
                ]);
                cpu.mem.write(20, HLT).unwrap();

                cpu.run_limited(5).unwrap();

                let expected = if taken[outcome] { 20 } else { 14 };
                assert_eq!(cpu.regs.pc, expected, "{:#010b} with {} vs {}", jump, a, b);
            }
        }
    }

    #[test]
    fn test_unconditional_jump() {
        let (mut cpu, out) = cpu_with(&[
            LDI, 0, 7,
            JMP, 0,
            PRN, 0,
            HLT,
        ]);

        cpu.run().unwrap();

        assert_eq!(out.contents(), "");
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_illegal_instruction_is_fatal() {
        let (mut cpu, _) = cpu_with(&[NOP, 0b1111_1111]);

        let err = cpu.run().unwrap_err();

        assert_eq!(err, CpuError::IllegalInstruction { pc: 1, opcode: 0xff });
        assert_eq!(cpu.state, CpuState::Error);
        assert_eq!(cpu.step(), Err(CpuError::NotRunning(CpuState::Error)));
    }

    #[test]
    fn test_division_by_zero_is_fatal() {
        let (mut cpu, _) = cpu_with(&[LDI, 0, 10, DIV, 0, 1, HLT]);

        let err = cpu.run().unwrap_err();

        assert_eq!(
            err,
            CpuError::Alu { pc: 3, opcode: Opcode::Div, source: AluError::DivisionByZero(Opcode::Div) }
        );
    }

    #[test]
    fn test_invalid_register_operand() {
        let (mut cpu, _) = cpu_with(&[LDI, 8, 1, HLT]);

        let err = cpu.run().unwrap_err();

        assert_eq!(
            err,
            CpuError::Instruction {
                pc: 0,
                opcode: Opcode::Ldi,
                source: Box::new(CpuError::Register(RegisterError::InvalidRegister(8))),
            }
        );
    }

    #[test]
    fn test_handler_fault_names_location() {
        let (mut cpu, _) = cpu_with(&[NOP, NOP, PRN, 9, HLT]);

        let err = cpu.run().unwrap_err();

        assert_eq!(
            err.to_string(),
            "PRN at PC=0x02: register error: invalid register R9 (valid: R0-R7)"
        );
        assert_eq!(cpu.state, CpuState::Error);
    }

    #[test]
    fn test_memory_fault_in_handler_names_location() {
        // CALL in the last two cells: the return address 0x100 has no cell.
        let (mut cpu, _) = cpu_with(&[]);
        cpu.mem.write(0xfe, 0b0101_0000).unwrap();
        cpu.regs.pc = 0xfe;

        let err = cpu.step().unwrap_err();

        assert_eq!(
            err,
            CpuError::Instruction {
                pc: 0xfe,
                opcode: Opcode::Call,
                source: Box::new(CpuError::Memory(MemoryError::OutOfBounds(0x100))),
            }
        );
    }

    #[test]
    fn test_running_off_the_end() {
        let (mut cpu, _) = cpu_with(&[]);
        cpu.regs.pc = 0xfe;
        cpu.mem.write(0xfe, LDI).unwrap();

        let err = cpu.step().unwrap_err();

        assert_eq!(err, CpuError::Memory(MemoryError::OutOfBounds(0x100)));
    }

    #[test]
    fn test_run_limited() {
        let (mut cpu, _) = cpu_with(&[LDI, 0, 0, JMP, 0]);

        let executed = cpu.run_limited(10).unwrap();

        assert_eq!(executed, 10);
        assert!(cpu.is_running());
    }

    #[test]
    fn test_run_limited_saturates() {
        let (mut cpu, _) = cpu_with(&[LDI, 0, 0, JMP, 0]);
        cpu.step().unwrap();

        cpu.regs.pc = 0;
        cpu.mem.write(0, HLT).unwrap();
        let executed = cpu.run_limited(u64::MAX).unwrap();

        assert_eq!(executed, 1);
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_trace_line() {
        let (mut cpu, _) = cpu_with(&[LDI, 0, 8, HLT]);
        assert_eq!(
            cpu.trace_line(),
            "TRACE: 00 00 | 82 00 08 | 00 00 00 00 00 00 00 F4"
        );
        cpu.step().unwrap();
        assert!(cpu.trace_line().starts_with("TRACE: 03 00 | 01 00 00 | 08"));
    }

    #[test]
    fn test_reset_and_snapshot() {
        let (mut cpu, _) = cpu_with(&[LDI, 0, 8, HLT]);
        cpu.run().unwrap();

        let snap = cpu.snapshot();
        assert_eq!(snap.state, CpuState::Halted);
        assert_eq!(snap.regs.get(0).unwrap(), 8);

        cpu.reset();
        assert!(cpu.is_running());
        assert_eq!(cpu.regs, Registers::new());
        assert_eq!(cpu.mem.read(0).unwrap(), 0);
    }
}
