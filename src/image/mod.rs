//! Program images: loading them and reading them back.
//!
//! This module provides:
//! - A loader for the text `.ls8` format (one binary byte per line)
//! - A disassembler (bytes → readable text)

pub mod disasm;
pub mod program;

pub use disasm::{disassemble, disassemble_at};
pub use program::{load_program, parse_program, ProgramImage, ProgramLoadError};
