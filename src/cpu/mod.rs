//! CPU emulation for the LS-8.
//!
//! This module implements the complete LS-8 architecture:
//! - 256 byte-addressable memory cells, top twelve reserved
//! - 8 general purpose registers (R5 = IM, R6 = IS, R7 = SP), PC and FL
//! - 35-instruction set whose opcodes encode their own operand count
//! - Timer and keyboard interrupts serviced between instructions

pub mod memory;
pub mod registers;
pub mod decode;
pub mod alu;
pub mod devices;
pub mod execute;
pub mod interrupt;
mod stack;

pub use memory::{Memory, MemoryError};
pub use registers::{Flags, Registers};
pub use decode::{decode, DecodeError, InstructionDescriptor, Opcode};
pub use devices::{Clock, Devices, InputSource};
pub use execute::{Cpu, CpuError, CpuSnapshot, CpuState, Cycle};
