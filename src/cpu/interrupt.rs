//! Interrupts.
//!
//! Eight lines share the IS register (R6); IM (R5) masks them. Line 0 is
//! the one-second timer, line 1 the keyboard. Interrupts are only
//! serviced between instructions, and only the lowest active line fires
//! per cycle.
//!
//! Entry saves the machine on the stack as PC, FL, R0..R6 and clears IM,
//! which disables further interrupts. IRET pops everything back in
//! reverse; restoring R5 re-enables them.

use crate::cpu::memory::{KEY_PRESSED, LAST_SECOND, VECTOR_TABLE};
use crate::cpu::registers::{Flags, IS};
use crate::cpu::{Cpu, CpuError};

/// Timer line, raised once per elapsed second.
pub const TIMER_LINE: u8 = 0;

/// Keyboard line, raised when a key arrives.
pub const KEYBOARD_LINE: u8 = 1;

/// Number of interrupt lines.
pub const INTERRUPT_LINES: u8 = 8;

/// Lowest line that is both enabled and pending.
pub fn active_line(mask: u8, status: u8) -> Option<u8> {
    let active = mask & status;
    (active != 0).then(|| active.trailing_zeros() as u8)
}

/// Address of the vector slot for `line`.
pub fn vector_address(line: u8) -> usize {
    VECTOR_TABLE + (line % INTERRUPT_LINES) as usize
}

impl Cpu {
    /// Mark `line` pending.
    pub fn raise_interrupt(&mut self, line: u8) {
        let status = self.regs.interrupt_status() | 1 << (line % INTERRUPT_LINES);
        self.regs.set_interrupt_status(status);
    }

    /// True while at least one line is unmasked.
    pub fn interrupts_enabled(&self) -> bool {
        self.regs.interrupt_mask() != 0
    }

    /// Poll the keyboard and timer, then enter the highest-priority
    /// interrupt if one is ready. Returns the line that was entered.
    pub(crate) fn poll_interrupts(&mut self) -> Result<Option<u8>, CpuError> {
        if let Some(key) = self.devices.input.poll_key() {
            log::debug!("key {:#04x} pressed", key);
            self.mem.write(KEY_PRESSED, key)?;
            self.raise_interrupt(KEYBOARD_LINE);
            if let Some(line) = self.service_interrupts()? {
                return Ok(Some(line));
            }
        }

        self.tick_timer()?;
        self.service_interrupts()
    }

    /// Raise the timer line if the clock has moved on to a new second.
    fn tick_timer(&mut self) -> Result<(), CpuError> {
        let now = (self.devices.clock.seconds() & 0xff) as u8;

        if !self.timer_primed {
            self.mem.write(LAST_SECOND, now)?;
            self.timer_primed = true;
            return Ok(());
        }

        if self.mem.read(LAST_SECOND)? != now {
            self.mem.write(LAST_SECOND, now)?;
            log::debug!("timer tick at second {}", now);
            self.raise_interrupt(TIMER_LINE);
        }
        Ok(())
    }

    /// Enter the lowest enabled pending interrupt, if any.
    pub fn service_interrupts(&mut self) -> Result<Option<u8>, CpuError> {
        let Some(line) = active_line(self.regs.interrupt_mask(), self.regs.interrupt_status()) else {
            return Ok(None);
        };

        let status = self.regs.interrupt_status() & !(1 << line);
        self.regs.set_interrupt_status(status);

        self.push_pc()?;
        self.push(self.regs.fl.bits())?;
        for reg in 0..IS + 1 {
            self.push(self.regs.get(reg)?)?;
        }

        let handler = self.mem.read(vector_address(line))?;
        log::debug!(
            "interrupt {} from PC={:#04x}, handler at {:#04x}",
            line,
            self.regs.pc,
            handler
        );
        self.regs.pc = handler as usize;
        self.regs.set_interrupt_mask(0);

        Ok(Some(line))
    }

    /// IRET: restore R6..R0, FL and PC from the stack.
    pub(crate) fn iret(&mut self) -> Result<(), CpuError> {
        for reg in (0..IS + 1).rev() {
            let value = self.pop()?;
            self.regs.set(reg, value)?;
        }
        self.regs.fl = Flags::from_bits(self.pop()?);
        self.regs.pc = self.pop()? as usize;

        log::debug!("return from interrupt to PC={:#04x}", self.regs.pc);
        Ok(())
    }
}
