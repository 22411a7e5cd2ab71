//! # LS-8 Emulator
//!
//! An emulator for the LS-8, a small fictional 8-bit computer with 256
//! bytes of memory, eight registers and a timer/keyboard interrupt system.
//!
//! Programs arrive as pre-encoded bytes; see [`image`] for the text format
//! and [`cpu`] for the machine itself.

pub mod cpu;
pub mod image;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types
pub use cpu::{Cpu, CpuError, CpuSnapshot, CpuState, Cycle, Devices, Memory, Registers, Opcode};
pub use image::{disassemble, load_program, parse_program, ProgramImage, ProgramLoadError};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
