//! Stack discipline.
//!
//! The stack grows down from [`STACK_TOP`](crate::cpu::memory::STACK_TOP).
//! R7 points at the most recently pushed byte. The stack pointer wraps
//! through 8-bit arithmetic like any other register; keeping pushes and
//! pops balanced is the program's job.

use crate::cpu::memory::MemoryError;
use crate::cpu::registers::SP;
use crate::cpu::{Cpu, CpuError};

/// Narrow an address to the byte that gets stored on the stack.
fn address_byte(addr: usize) -> Result<u8, CpuError> {
    u8::try_from(addr).map_err(|_| CpuError::Memory(MemoryError::OutOfBounds(addr)))
}

impl Cpu {
    /// Decrement SP, then store `value` at the new top.
    pub fn push(&mut self, value: u8) -> Result<(), CpuError> {
        let sp = self.regs.sp().wrapping_sub(1);
        self.regs.set_sp(sp);
        self.mem.write(sp as usize, value)?;
        Ok(())
    }

    /// Read the top of the stack, then increment SP.
    pub fn pop(&mut self) -> Result<u8, CpuError> {
        let sp = self.regs.sp();
        let value = self.mem.read(sp as usize)?;
        self.regs.set_sp(sp.wrapping_add(1));
        Ok(value)
    }

    /// PUSH: the register is read after SP moves, so `PUSH R7` stores the
    /// decremented pointer.
    pub(crate) fn push_register(&mut self, reg: u8) -> Result<(), CpuError> {
        self.regs.get(reg)?;
        let sp = self.regs.sp().wrapping_sub(1);
        self.regs.set_sp(sp);
        let value = self.regs.get(reg)?;
        self.mem.write(sp as usize, value)?;
        Ok(())
    }

    /// POP: the register is written before SP moves, so `POP R7` leaves
    /// SP one past the popped value.
    pub(crate) fn pop_register(&mut self, reg: u8) -> Result<(), CpuError> {
        self.regs.get(reg)?;
        let value = self.mem.read(self.regs.sp() as usize)?;
        self.regs.set(reg, value)?;
        let sp = self.regs.get(SP)?.wrapping_add(1);
        self.regs.set_sp(sp);
        Ok(())
    }

    /// CALL: push the return address and jump to the address in `reg`.
    pub(crate) fn call(&mut self, reg: u8, return_addr: usize) -> Result<(), CpuError> {
        let target = self.regs.get(reg)?;
        self.push(address_byte(return_addr)?)?;
        self.regs.pc = target as usize;
        Ok(())
    }

    /// RET: pop the return address into the PC.
    pub(crate) fn ret(&mut self) -> Result<(), CpuError> {
        self.regs.pc = self.pop()? as usize;
        Ok(())
    }

    /// Push the current PC.
    pub(crate) fn push_pc(&mut self) -> Result<(), CpuError> {
        let pc = address_byte(self.regs.pc)?;
        self.push(pc)
    }
}
