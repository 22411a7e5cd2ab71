//! Disassembler for LS-8 programs.
//!
//! Converts raw instruction bytes back to readable assembly.

use crate::cpu::decode::{decode, Opcode};

/// Disassemble the instruction at `addr`.
///
/// Returns the text and the instruction length in bytes. Illegal opcodes
/// render as `???` and count as one byte.
pub fn disassemble_at(mem: &[u8], addr: usize) -> (String, usize) {
    let byte = mem.get(addr).copied().unwrap_or(0);
    let instr = match decode(byte) {
        Ok(instr) => instr,
        Err(_) => return (format!("??? {:#010b}", byte), 1),
    };

    let operand = |i: usize| mem.get(addr + 1 + i).copied().unwrap_or(0);
    let text = match instr.operand_count {
        0 => instr.opcode.to_string(),
        1 => format!("{} R{}", instr.opcode, operand(0)),
        _ => format_binary(instr.opcode, operand(0), operand(1)),
    };

    (text, instr.len())
}

fn format_binary(op: Opcode, a: u8, b: u8) -> String {
    match op {
        // Second operand is an immediate, not a register.
        Opcode::Ldi | Opcode::Addi => format!("{} R{},{}", op, a, b),
        _ => format!("{} R{},R{}", op, a, b),
    }
}

/// Disassemble a whole image into a listing.
pub fn disassemble(bytes: &[u8]) -> String {
    let mut output = String::new();
    output.push_str("; LS-8 Disassembly\n");
    output.push_str("; ----------------\n\n");

    let mut addr = 0;
    while addr < bytes.len() {
        let (line, len) = disassemble_at(bytes, addr);
        let raw: Vec<String> = bytes[addr..(addr + len).min(bytes.len())]
            .iter()
            .map(|b| format!("{:08b}", b))
            .collect();
        output.push_str(&format!("{:02X}: {:<12} ; {}\n", addr, line, raw.join(" ")));
        addr += len;
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disassemble_instructions() {
        let mem = [0b1000_0010, 0, 8, 0b0100_0111, 0, 0b0000_0001, 0b1010_0010, 1, 2];
        assert_eq!(disassemble_at(&mem, 0), ("LDI R0,8".to_string(), 3));
        assert_eq!(disassemble_at(&mem, 3), ("PRN R0".to_string(), 2));
        assert_eq!(disassemble_at(&mem, 5), ("HLT".to_string(), 1));
        assert_eq!(disassemble_at(&mem, 6), ("MUL R1,R2".to_string(), 3));
    }

    #[test]
    fn test_disassemble_illegal() {
        let (text, len) = disassemble_at(&[0xff], 0);
        assert!(text.starts_with("???"));
        assert_eq!(len, 1);
    }

    #[test]
    fn test_listing() {
        let listing = disassemble(&[0b1000_0010, 0, 8, 0b0000_0001]);
        assert!(listing.contains("00: LDI R0,8"));
        assert!(listing.contains("03: HLT"));
    }

    #[test]
    fn test_truncated_operands() {
        let listing = disassemble(&[0b1000_0010, 0]);
        assert!(listing.contains("LDI R0,0"));
    }
}
