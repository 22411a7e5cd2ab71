//! Instruction decoder for the LS-8.
//!
//! Opcodes are a single byte laid out as `AABCDDDD`:
//!
//! - `AA`: number of operand bytes that follow (0-2)
//! - `B`: 1 if the instruction is handled by the ALU
//! - `C`: 1 if the instruction sets the PC itself
//! - `DDDD`: instruction identifier
//!
//! The execution engine relies on these bits, not on a per-mnemonic table,
//! to fetch operands and advance the PC.

use serde::{Serialize, Deserialize};
use thiserror::Error;

macro_rules! opcodes {
    ($($name:ident = $byte:literal => $mnemonic:literal,)*) => {
        /// Every LS-8 instruction.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum Opcode {
            $($name = $byte,)*
        }

        impl Opcode {
            /// Every opcode, in mnemonic order.
            pub const ALL: &'static [Opcode] = &[$(Opcode::$name,)*];

            /// Look up the opcode for a raw byte.
            pub fn from_byte(byte: u8) -> Option<Self> {
                match byte {
                    $($byte => Some(Opcode::$name),)*
                    _ => None,
                }
            }

            /// The assembly mnemonic.
            pub fn mnemonic(self) -> &'static str {
                match self {
                    $(Opcode::$name => $mnemonic,)*
                }
            }
        }
    };
}

opcodes! {
    Add  = 0b1010_0000 => "ADD",
    Addi = 0b1000_0101 => "ADDI",
    And  = 0b1010_1000 => "AND",
    Call = 0b0101_0000 => "CALL",
    Cmp  = 0b1010_0111 => "CMP",
    Dec  = 0b0110_0110 => "DEC",
    Div  = 0b1010_0011 => "DIV",
    Hlt  = 0b0000_0001 => "HLT",
    Inc  = 0b0110_0101 => "INC",
    Int  = 0b0101_0010 => "INT",
    Iret = 0b0001_0011 => "IRET",
    Jeq  = 0b0101_0101 => "JEQ",
    Jge  = 0b0101_1010 => "JGE",
    Jgt  = 0b0101_0111 => "JGT",
    Jle  = 0b0101_1001 => "JLE",
    Jlt  = 0b0101_1000 => "JLT",
    Jmp  = 0b0101_0100 => "JMP",
    Jne  = 0b0101_0110 => "JNE",
    Ld   = 0b1000_0011 => "LD",
    Ldi  = 0b1000_0010 => "LDI",
    Mod  = 0b1010_0100 => "MOD",
    Mul  = 0b1010_0010 => "MUL",
    Nop  = 0b0000_0000 => "NOP",
    Not  = 0b0110_1001 => "NOT",
    Or   = 0b1010_1010 => "OR",
    Pop  = 0b0100_0110 => "POP",
    Pra  = 0b0100_1000 => "PRA",
    Prn  = 0b0100_0111 => "PRN",
    Push = 0b0100_0101 => "PUSH",
    Ret  = 0b0001_0001 => "RET",
    Shl  = 0b1010_1100 => "SHL",
    Shr  = 0b1010_1101 => "SHR",
    St   = 0b1000_0100 => "ST",
    Sub  = 0b1010_0001 => "SUB",
    Xor  = 0b1010_1011 => "XOR",
}

impl Opcode {
    /// The encoded byte.
    pub fn byte(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Everything the engine needs to know about an instruction before it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionDescriptor {
    pub opcode: Opcode,
    /// Operand bytes following the opcode (0-2).
    pub operand_count: u8,
    /// Dispatched to the ALU.
    pub is_alu: bool,
    /// The handler is responsible for the PC.
    pub sets_pc: bool,
}

impl InstructionDescriptor {
    /// Total size in bytes, opcode included.
    pub fn len(&self) -> usize {
        1 + self.operand_count as usize
    }
}

/// Number of operands encoded in bits 6-7.
#[inline]
pub fn operand_count(byte: u8) -> u8 {
    (byte >> 6) & 0b11
}

/// ALU flag in bit 5.
#[inline]
pub fn is_alu(byte: u8) -> bool {
    (byte >> 5) & 1 == 1
}

/// Sets-PC flag in bit 4.
#[inline]
pub fn sets_pc(byte: u8) -> bool {
    (byte >> 4) & 1 == 1
}

/// Decode an opcode byte.
pub fn decode(byte: u8) -> Result<InstructionDescriptor, DecodeError> {
    let opcode = Opcode::from_byte(byte).ok_or(DecodeError::IllegalInstruction(byte))?;

    Ok(InstructionDescriptor {
        opcode,
        operand_count: operand_count(byte),
        is_alu: is_alu(byte),
        sets_pc: sets_pc(byte),
    })
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("illegal instruction: {0:#010b}")]
    IllegalInstruction(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_hlt() {
        let hlt = decode(0b0000_0001).unwrap();
        assert_eq!(hlt.opcode, Opcode::Hlt);
        assert_eq!(hlt.operand_count, 0);
        assert!(!hlt.is_alu);
        assert!(!hlt.sets_pc);
    }

    #[test]
    fn test_decode_classification() {
        // (opcode, operands, alu, sets pc)
        let table = [
            (Opcode::Add, 2, true, false),
            (Opcode::Addi, 2, false, false),
            (Opcode::And, 2, true, false),
            (Opcode::Call, 1, false, true),
            (Opcode::Cmp, 2, true, false),
            (Opcode::Dec, 1, true, false),
            (Opcode::Div, 2, true, false),
            (Opcode::Hlt, 0, false, false),
            (Opcode::Inc, 1, true, false),
            (Opcode::Int, 1, false, true),
            (Opcode::Iret, 0, false, true),
            (Opcode::Jeq, 1, false, true),
            (Opcode::Jge, 1, false, true),
            (Opcode::Jgt, 1, false, true),
            (Opcode::Jle, 1, false, true),
            (Opcode::Jlt, 1, false, true),
            (Opcode::Jmp, 1, false, true),
            (Opcode::Jne, 1, false, true),
            (Opcode::Ld, 2, false, false),
            (Opcode::Ldi, 2, false, false),
            (Opcode::Mod, 2, true, false),
            (Opcode::Mul, 2, true, false),
            (Opcode::Nop, 0, false, false),
            (Opcode::Not, 1, true, false),
            (Opcode::Or, 2, true, false),
            (Opcode::Pop, 1, false, false),
            (Opcode::Pra, 1, false, false),
            (Opcode::Prn, 1, false, false),
            (Opcode::Push, 1, false, false),
            (Opcode::Ret, 0, false, true),
            (Opcode::Shl, 2, true, false),
            (Opcode::Shr, 2, true, false),
            (Opcode::St, 2, false, false),
            (Opcode::Sub, 2, true, false),
            (Opcode::Xor, 2, true, false),
        ];
        assert_eq!(table.len(), Opcode::ALL.len());

        for (op, count, alu, pc) in table {
            let d = decode(op.byte()).unwrap();
            assert_eq!(d.opcode, op);
            assert_eq!(d.operand_count, count, "{op}");
            assert_eq!(d.len(), 1 + count as usize, "{op}");
            assert_eq!(d.is_alu, alu, "{op}");
            assert_eq!(d.sets_pc, pc, "{op}");
        }
    }

    #[test]
    fn test_every_opcode_decodes_to_itself() {
        for &op in Opcode::ALL {
            let d = decode(op.byte()).unwrap();
            assert_eq!(d.opcode, op);
            assert!(d.operand_count <= 2);
        }
        assert_eq!(Opcode::ALL.len(), 35);
    }

    #[test]
    fn test_illegal_instruction() {
        assert_eq!(decode(0b1111_1111), Err(DecodeError::IllegalInstruction(0xff)));
        assert_eq!(decode(0b0000_0010), Err(DecodeError::IllegalInstruction(2)));
    }

    #[test]
    fn test_mnemonics_are_unique() {
        for (i, a) in Opcode::ALL.iter().enumerate() {
            for b in &Opcode::ALL[i + 1..] {
                assert_ne!(a.mnemonic(), b.mnemonic());
                assert_ne!(a.byte(), b.byte());
            }
        }
    }
}
