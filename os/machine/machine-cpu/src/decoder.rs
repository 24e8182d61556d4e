//! # Instruction Decoder
//!
//! Turns the bytes of one instruction into an [`Instruction`]. The CPU
//! fetches the opcode first, looks up the length with
//! [`instruction_length`], fetches the rest and then calls [`decode`].

use crate::instruction::Instruction;
use crate::isa::{Opcode, SYSCALL_SECOND_BYTE};
use kernel_registers::Register;

/// Why a byte sequence is not a valid instruction.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid opcode {0:#04x}")]
    InvalidOpcode(u8),
    #[error("invalid register operand {0:#04x}")]
    InvalidRegister(u8),
    #[error("truncated instruction: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
}

/// Length of the instruction whose first byte is `opcode`.
///
/// # Errors
/// [`DecodeError::InvalidOpcode`] if no instruction starts with `opcode`.
pub fn instruction_length(opcode: u8) -> Result<usize, DecodeError> {
    Opcode::try_from(opcode)
        .map(Opcode::length)
        .map_err(DecodeError::InvalidOpcode)
}

/// Decode the instruction at the start of `bytes`.
///
/// # Errors
/// See [`DecodeError`].
pub fn decode(bytes: &[u8]) -> Result<Instruction, DecodeError> {
    let Some(&first) = bytes.first() else {
        return Err(DecodeError::Truncated {
            needed: 1,
            available: 0,
        });
    };
    let op = Opcode::try_from(first).map_err(DecodeError::InvalidOpcode)?;
    if bytes.len() < op.length() {
        return Err(DecodeError::Truncated {
            needed: op.length(),
            available: bytes.len(),
        });
    }
    let ops = Operands(&bytes[1..op.length()]);

    Ok(match op {
        Opcode::Nop => Instruction::Nop,
        Opcode::Ret => Instruction::Ret,
        Opcode::Int3 => Instruction::Int3,
        Opcode::Hlt => Instruction::Hlt,
        Opcode::TwoByte => {
            if ops.0[0] != SYSCALL_SECOND_BYTE {
                return Err(DecodeError::InvalidOpcode(first));
            }
            Instruction::Syscall
        }
        Opcode::MovImm => Instruction::MovImm {
            dst: ops.reg(0)?,
            imm: ops.u64_at(1),
        },
        Opcode::Mov => Instruction::Mov {
            dst: ops.reg(0)?,
            src: ops.reg(1)?,
        },
        Opcode::Add => Instruction::Add {
            dst: ops.reg(0)?,
            src: ops.reg(1)?,
        },
        Opcode::Sub => Instruction::Sub {
            dst: ops.reg(0)?,
            src: ops.reg(1)?,
        },
        Opcode::LoadByte => Instruction::LoadByte {
            dst: ops.reg(0)?,
            base: ops.reg(1)?,
            disp: ops.i32_at(2),
        },
        Opcode::LoadQuad => Instruction::LoadQuad {
            dst: ops.reg(0)?,
            base: ops.reg(1)?,
            disp: ops.i32_at(2),
        },
        Opcode::StoreByte => Instruction::StoreByte {
            base: ops.reg(0)?,
            src: ops.reg(1)?,
            disp: ops.i32_at(2),
        },
        Opcode::StoreQuad => Instruction::StoreQuad {
            base: ops.reg(0)?,
            src: ops.reg(1)?,
            disp: ops.i32_at(2),
        },
        Opcode::AddImm => Instruction::AddImm {
            dst: ops.reg(0)?,
            imm: ops.i32_at(1),
        },
        Opcode::Jump => Instruction::Jump { rel: ops.i32_at(0) },
        Opcode::Call => Instruction::Call { rel: ops.i32_at(0) },
        Opcode::JumpZero => Instruction::JumpZero {
            reg: ops.reg(0)?,
            rel: ops.i32_at(1),
        },
        Opcode::JumpNotZero => Instruction::JumpNotZero {
            reg: ops.reg(0)?,
            rel: ops.i32_at(1),
        },
        Opcode::JumpEqual => Instruction::JumpEqual {
            a: ops.reg(0)?,
            b: ops.reg(1)?,
            rel: ops.i32_at(2),
        },
        Opcode::JumpNotEqual => Instruction::JumpNotEqual {
            a: ops.reg(0)?,
            b: ops.reg(1)?,
            rel: ops.i32_at(2),
        },
        Opcode::JumpBelow => Instruction::JumpBelow {
            a: ops.reg(0)?,
            b: ops.reg(1)?,
            rel: ops.i32_at(2),
        },
        Opcode::Push => Instruction::Push(ops.reg(0)?),
        Opcode::Pop => Instruction::Pop(ops.reg(0)?),
    })
}

/// Operand bytes following the opcode; lengths are checked by [`decode`].
struct Operands<'a>(&'a [u8]);

impl Operands<'_> {
    fn reg(&self, at: usize) -> Result<Register, DecodeError> {
        Register::try_from(self.0[at]).map_err(DecodeError::InvalidRegister)
    }

    fn i32_at(&self, at: usize) -> i32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.0[at..at + 4]);
        i32::from_le_bytes(raw)
    }

    fn u64_at(&self, at: usize) -> u64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.0[at..at + 8]);
        u64::from_le_bytes(raw)
    }
}
