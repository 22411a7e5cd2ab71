//! LS-8 program images.
//!
//! A program is a text file with one byte per line written as a binary
//! literal:
//!
//! ```text
//! # print8.ls8
//! 10000010 # LDI R0,8
//! 00000000
//! 00001000
//! 01000111 # PRN R0
//! 00000000
//! 00000001 # HLT
//! ```
//!
//! `#` starts a comment; blank lines are ignored.

use std::path::Path;

use thiserror::Error;

use crate::cpu::memory::{MEMORY_SIZE, RESERVED_START};

/// A parsed program image.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramImage {
    /// The bytes to place at address 0 onward.
    pub bytes: Vec<u8>,
    /// 1-based source line of each byte.
    pub source_lines: Vec<usize>,
}

impl ProgramImage {
    /// Create a new empty image.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a byte parsed from `line`.
    pub fn push(&mut self, byte: u8, line: usize) {
        self.bytes.push(byte);
        self.source_lines.push(line);
    }

    /// Get the number of bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Parse program text.
pub fn parse_program(source: &str) -> Result<ProgramImage, ProgramLoadError> {
    let mut image = ProgramImage::new();

    for (line_num, line) in source.lines().enumerate() {
        let code = line.split('#').next().unwrap_or("").trim();

        if code.is_empty() {
            continue;
        }

        let digits: String = code.chars().filter(|c| !c.is_whitespace()).collect();
        let digits = digits.strip_prefix("0b").unwrap_or(&digits);

        if digits.len() > 8 || !digits.chars().all(|c| c == '0' || c == '1') {
            return Err(ProgramLoadError::Parse {
                line: line_num + 1,
                message: format!("expected an 8-bit binary literal, found {:?}", code),
            });
        }

        let byte = u8::from_str_radix(digits, 2).map_err(|e| ProgramLoadError::Parse {
            line: line_num + 1,
            message: e.to_string(),
        })?;

        image.push(byte, line_num + 1);
    }

    if image.len() > MEMORY_SIZE {
        return Err(ProgramLoadError::TooLarge {
            size: image.len(),
            available: MEMORY_SIZE,
        });
    }

    if image.len() > RESERVED_START {
        log::warn!(
            "program is {} bytes and overlaps the reserved region at {:#04x}",
            image.len(),
            RESERVED_START
        );
    }

    Ok(image)
}

/// Load a program image from disk.
pub fn load_program<P: AsRef<Path>>(path: P) -> Result<ProgramImage, ProgramLoadError> {
    let source = std::fs::read_to_string(path.as_ref())
        .map_err(|e| ProgramLoadError::Io(format!("{}: {}", path.as_ref().display(), e)))?;
    parse_program(&source)
}

/// Errors that can occur while loading a program image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgramLoadError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("program size {size} exceeds memory size {available}")]
    TooLarge { size: usize, available: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRINT8: &str = "\
# print8.ls8
10000010 # LDI R0,8
00000000
00001000
01000111 # PRN R0

00000000
00000001 # HLT
";

    #[test]
    fn test_parse_print8() {
        let image = parse_program(PRINT8).unwrap();
        assert_eq!(image.bytes, vec![0b1000_0010, 0, 8, 0b0100_0111, 0, 1]);
        assert_eq!(image.source_lines, vec![2, 3, 4, 5, 7, 8]);
    }

    #[test]
    fn test_whitespace_and_prefix() {
        let image = parse_program("  0b1010 0000  \n\t11#x\n").unwrap();
        assert_eq!(image.bytes, vec![0b1010_0000, 0b11]);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_program("10000010\n1234\n"),
            Err(ProgramLoadError::Parse { line: 2, .. })
        ));
        assert!(matches!(
            parse_program("100000000\n"),
            Err(ProgramLoadError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_too_large() {
        let source = "00000000\n".repeat(MEMORY_SIZE + 1);
        assert_eq!(
            parse_program(&source),
            Err(ProgramLoadError::TooLarge { size: 257, available: 256 })
        );
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_program("/nonexistent/program.ls8"),
            Err(ProgramLoadError::Io(_))
        ));
    }
}
