//! LS-8 memory subsystem.
//!
//! 256 byte-sized cells. The top of the address space is reserved:
//!
//! | address     | use                                  |
//! |-------------|--------------------------------------|
//! | `..=0xf3`   | program, data, stack (grows down)    |
//! | `0xf4`      | last key pressed                     |
//! | `0xf5`      | saved-register scratch               |
//! | `0xf6`      | saved-flags scratch                  |
//! | `0xf7`      | previous-second timestamp            |
//! | `0xf8-0xff` | interrupt vector table               |

use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The number of memory cells in the LS-8.
pub const MEMORY_SIZE: usize = 256;

/// First address of the reserved system region.
pub const RESERVED_START: usize = 0xf4;

/// Initial stack pointer; the first push lands just below it.
pub const STACK_TOP: u8 = 0xf4;

/// Keyboard input slot.
pub const KEY_PRESSED: usize = 0xf4;

/// Previous-second timestamp used by the timer.
pub const LAST_SECOND: usize = 0xf7;

/// Base of the interrupt vector table (one slot per line).
pub const VECTOR_TABLE: usize = 0xf8;

/// LS-8 memory: 256 byte cells.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<u8>,
}

impl Memory {
    /// Create a new memory with all cells zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEMORY_SIZE],
        }
    }

    /// Read the byte at `addr`.
    #[inline]
    pub fn read(&self, addr: usize) -> Result<u8, MemoryError> {
        self.cells
            .get(addr)
            .copied()
            .ok_or(MemoryError::OutOfBounds(addr))
    }

    /// Write `value` at `addr`.
    #[inline]
    pub fn write(&mut self, addr: usize, value: u8) -> Result<(), MemoryError> {
        let cell = self.cells
            .get_mut(addr)
            .ok_or(MemoryError::OutOfBounds(addr))?;
        *cell = value;
        Ok(())
    }

    /// Read without failing; out-of-range addresses read as zero.
    ///
    /// Only meant for inspection (trace output, debugger views).
    pub fn peek(&self, addr: usize) -> u8 {
        self.cells.get(addr).copied().unwrap_or(0)
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Load a program into memory starting at the given address.
    pub fn load_program(&mut self, start_addr: usize, program: &[u8]) -> Result<(), MemoryError> {
        if start_addr > MEMORY_SIZE {
            return Err(MemoryError::OutOfBounds(start_addr));
        }

        let available = MEMORY_SIZE.saturating_sub(start_addr);
        if program.len() > available {
            return Err(MemoryError::ProgramTooLarge {
                size: program.len(),
                available,
            });
        }

        self.cells[start_addr..start_addr + program.len()].copy_from_slice(program);
        Ok(())
    }

    /// Raw view of every cell.
    pub fn as_slice(&self) -> &[u8] {
        &self.cells
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|&&b| b != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &MEMORY_SIZE)
            .finish()
    }
}

/// Errors that can occur during memory operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// Address is outside valid memory range.
    #[error("memory address {0:#04x} out of range (0x00-0xff)")]
    OutOfBounds(usize),
    /// Program is too large to fit in memory.
    #[error("program size {size} exceeds available space {available}")]
    ProgramTooLarge { size: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new();
        mem.write(10, 42).unwrap();
        assert_eq!(mem.read(10).unwrap(), 42);
    }

    #[test]
    fn test_memory_bounds() {
        let mut mem = Memory::new();

        assert!(mem.read(0).is_ok());
        assert!(mem.read(0xff).is_ok());

        assert_eq!(mem.read(0x100), Err(MemoryError::OutOfBounds(0x100)));
        assert_eq!(mem.write(300, 1), Err(MemoryError::OutOfBounds(300)));
        assert_eq!(mem.peek(300), 0);
    }

    #[test]
    fn test_load_program() {
        let mut mem = Memory::new();
        mem.load_program(0, &[0b1000_0010, 0, 8]).unwrap();

        assert_eq!(mem.read(0).unwrap(), 0b1000_0010);
        assert_eq!(mem.read(1).unwrap(), 0);
        assert_eq!(mem.read(2).unwrap(), 8);
    }

    #[test]
    fn test_load_program_too_large() {
        let mut mem = Memory::new();
        let program = vec![0u8; MEMORY_SIZE + 1];

        assert_eq!(
            mem.load_program(0, &program),
            Err(MemoryError::ProgramTooLarge { size: 257, available: 256 })
        );
        assert_eq!(
            mem.load_program(250, &[0; 7]),
            Err(MemoryError::ProgramTooLarge { size: 7, available: 6 })
        );
    }

    #[test]
    fn test_load_program_start_past_end() {
        let mut mem = Memory::new();

        assert_eq!(mem.load_program(300, &[]), Err(MemoryError::OutOfBounds(300)));
        assert_eq!(mem.load_program(MEMORY_SIZE, &[]), Ok(()));
        assert_eq!(
            mem.load_program(MEMORY_SIZE, &[1]),
            Err(MemoryError::ProgramTooLarge { size: 1, available: 0 })
        );
    }

    #[test]
    fn test_reserved_layout() {
        assert_eq!(RESERVED_START, KEY_PRESSED);
        assert_eq!(VECTOR_TABLE + 8, MEMORY_SIZE);
    }
}
