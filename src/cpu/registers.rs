//! LS-8 CPU registers.
//!
//! - R0-R7: eight byte-sized general purpose registers
//! - R5 doubles as the interrupt mask (IM)
//! - R6 doubles as the interrupt status (IS)
//! - R7 is the stack pointer (SP)
//! - PC: program counter
//! - FL: comparison flags

use std::cmp::Ordering;

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::cpu::memory::STACK_TOP;

/// Number of general purpose registers.
pub const REGISTER_COUNT: usize = 8;

/// Interrupt mask register.
pub const IM: u8 = 5;

/// Interrupt status register.
pub const IS: u8 = 6;

/// Stack pointer register.
pub const SP: u8 = 7;

/// The FL register.
///
/// Only the low three bits are defined; CMP sets exactly one of them and
/// leaves the upper bits alone.
#[derive(Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Flags(u8);

impl Flags {
    pub const EQUAL: u8 = 0b0000_0001;
    pub const GREATER: u8 = 0b0000_0010;
    pub const LESS: u8 = 0b0000_0100;
    const COMPARISON: u8 = Self::EQUAL | Self::GREATER | Self::LESS;

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Record the result of comparing destination against source.
    pub fn set_comparison(&mut self, ordering: Ordering) {
        let bit = match ordering {
            Ordering::Equal => Self::EQUAL,
            Ordering::Greater => Self::GREATER,
            Ordering::Less => Self::LESS,
        };
        self.0 = (self.0 & !Self::COMPARISON) | bit;
    }

    pub fn equal(self) -> bool {
        self.0 & Self::EQUAL != 0
    }

    pub fn greater(self) -> bool {
        self.0 & Self::GREATER != 0
    }

    pub fn less(self) -> bool {
        self.0 & Self::LESS != 0
    }
}

impl std::fmt::Debug for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let bit = |set: bool, c: char| if set { c } else { '-' };
        write!(
            f,
            "FL={}{}{} ({:#010b})",
            bit(self.less(), 'L'),
            bit(self.greater(), 'G'),
            bit(self.equal(), 'E'),
            self.0
        )
    }
}

/// The LS-8 register file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// R0-R7.
    r: [u8; REGISTER_COUNT],

    /// Program counter. Wider than a byte so that running off the end of
    /// memory surfaces as an out-of-bounds fetch instead of wrapping.
    pub pc: usize,

    /// Comparison flags.
    pub fl: Flags,
}

impl Registers {
    /// Create a register file in its power-on state.
    pub fn new() -> Self {
        let mut r = [0; REGISTER_COUNT];
        r[SP as usize] = STACK_TOP;
        Self {
            r,
            pc: 0,
            fl: Flags::default(),
        }
    }

    /// Reset to the power-on state.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Read a general purpose register.
    pub fn get(&self, index: u8) -> Result<u8, RegisterError> {
        self.r
            .get(index as usize)
            .copied()
            .ok_or(RegisterError::InvalidRegister(index))
    }

    /// Write a general purpose register.
    pub fn set(&mut self, index: u8, value: u8) -> Result<(), RegisterError> {
        let slot = self.r
            .get_mut(index as usize)
            .ok_or(RegisterError::InvalidRegister(index))?;
        *slot = value;
        Ok(())
    }

    /// All eight general purpose registers.
    pub fn all(&self) -> &[u8; REGISTER_COUNT] {
        &self.r
    }

    pub fn sp(&self) -> u8 {
        self.r[SP as usize]
    }

    pub fn set_sp(&mut self, value: u8) {
        self.r[SP as usize] = value;
    }

    pub fn interrupt_mask(&self) -> u8 {
        self.r[IM as usize]
    }

    pub fn set_interrupt_mask(&mut self, value: u8) {
        self.r[IM as usize] = value;
    }

    pub fn interrupt_status(&self) -> u8 {
        self.r[IS as usize]
    }

    pub fn set_interrupt_status(&mut self, value: u8) {
        self.r[IS as usize] = value;
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors raised by register access.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error("invalid register R{0} (valid: R0-R7)")]
    InvalidRegister(u8),
}
