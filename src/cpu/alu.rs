//! Arithmetic logic unit.
//!
//! Register-to-register operations on 8-bit values. Every result is
//! truncated to a byte, so 255 + 1 = 0 and 0 - 1 = 255.

use thiserror::Error;

use crate::cpu::decode::Opcode;
use crate::cpu::registers::{Registers, RegisterError};

/// Apply `op` to register `dst` (and `src` for binary operations).
///
/// CMP updates the flags and leaves both registers untouched.
pub fn apply(regs: &mut Registers, op: Opcode, dst: u8, src: Option<u8>) -> Result<(), AluError> {
    let a = regs.get(dst)?;
    let b = || -> Result<u8, AluError> {
        let src = src.ok_or(AluError::MissingOperand(op))?;
        Ok(regs.get(src)?)
    };

    let result = match op {
        Opcode::Add => a.wrapping_add(b()?),
        Opcode::Sub => a.wrapping_sub(b()?),
        Opcode::Mul => a.wrapping_mul(b()?),
        Opcode::Div => a.checked_div(b()?).ok_or(AluError::DivisionByZero(op))?,
        Opcode::Mod => a.checked_rem(b()?).ok_or(AluError::DivisionByZero(op))?,
        Opcode::And => a & b()?,
        Opcode::Or => a | b()?,
        Opcode::Xor => a ^ b()?,
        Opcode::Not => !a,
        // Shifting by the full width or more clears the register.
        Opcode::Shl => a.checked_shl(b()? as u32).unwrap_or(0),
        Opcode::Shr => a.checked_shr(b()? as u32).unwrap_or(0),
        Opcode::Inc => a.wrapping_add(1),
        Opcode::Dec => a.wrapping_sub(1),
        Opcode::Cmp => {
            let b = b()?;
            regs.fl.set_comparison(a.cmp(&b));
            return Ok(());
        }
        other => return Err(AluError::UnsupportedOperation(other)),
    };

    regs.set(dst, result)?;
    Ok(())
}

/// Errors raised by the ALU.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AluError {
    #[error("unsupported ALU operation: {0}")]
    UnsupportedOperation(Opcode),

    #[error("division by zero in {0}")]
    DivisionByZero(Opcode),

    #[error("{0} requires a source register")]
    MissingOperand(Opcode),

    #[error(transparent)]
    Register(#[from] RegisterError),
}
