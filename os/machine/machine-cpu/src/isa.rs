//! # Opcodes
//!
//! Every instruction starts with a one-byte opcode that fixes its length.
//! Register operands are one byte each (the x86 register number, `0..16`);
//! displacements, immediates and branch offsets are little-endian. Branch
//! offsets are relative to the end of the branch instruction and always come
//! last.
//!
//! | Opcode | Mnemonic | Operands | Length |
//! |--------|----------|----------|--------|
//! | `01` | `movi` | `dst, imm64` | 10 |
//! | `02` | `mov` | `dst, src` | 3 |
//! | `03` | `ldb` | `dst, base, disp32` | 7 |
//! | `04` | `stb` | `base, src, disp32` | 7 |
//! | `05` | `ldq` | `dst, base, disp32` | 7 |
//! | `06` | `stq` | `base, src, disp32` | 7 |
//! | `07` | `add` | `dst, src` | 3 |
//! | `08` | `sub` | `dst, src` | 3 |
//! | `09` | `addi` | `dst, imm32` | 6 |
//! | `0F 05` | `syscall` | | 2 |
//! | `10` | `jmp` | `rel32` | 5 |
//! | `11` | `jz` | `reg, rel32` | 6 |
//! | `12` | `jnz` | `reg, rel32` | 6 |
//! | `13` | `jeq` | `a, b, rel32` | 7 |
//! | `14` | `jne` | `a, b, rel32` | 7 |
//! | `15` | `jb` | `a, b, rel32` (unsigned `a < b`) | 7 |
//! | `20` | `push` | `reg` | 2 |
//! | `21` | `pop` | `reg` | 2 |
//! | `22` | `call` | `rel32` | 5 |
//! | `23` | `ret` | | 1 |
//! | `90` | `nop` | | 1 |
//! | `CC` | `int3` | | 1 |
//! | `F4` | `hlt` | | 1 |
//!
//! Any other first byte, including `00`, is an invalid opcode.

/// Second byte of the two-byte `syscall` encoding `0F 05`.
pub const SYSCALL_SECOND_BYTE: u8 = 0x05;

/// Longest instruction, in bytes.
pub const MAX_INSTRUCTION_LEN: usize = 10;

#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Opcode {
    MovImm = 0x01,
    Mov = 0x02,
    LoadByte = 0x03,
    StoreByte = 0x04,
    LoadQuad = 0x05,
    StoreQuad = 0x06,
    Add = 0x07,
    Sub = 0x08,
    AddImm = 0x09,
    /// Escape byte; `0F 05` is `syscall`.
    TwoByte = 0x0F,
    Jump = 0x10,
    JumpZero = 0x11,
    JumpNotZero = 0x12,
    JumpEqual = 0x13,
    JumpNotEqual = 0x14,
    JumpBelow = 0x15,
    Push = 0x20,
    Pop = 0x21,
    Call = 0x22,
    Ret = 0x23,
    Nop = 0x90,
    Int3 = 0xCC,
    Hlt = 0xF4,
}

impl Opcode {
    /// Total length in bytes of an instruction starting with this opcode.
    #[must_use]
    pub const fn length(self) -> usize {
        match self {
            Self::MovImm => 10,
            Self::LoadByte
            | Self::StoreByte
            | Self::LoadQuad
            | Self::StoreQuad
            | Self::JumpEqual
            | Self::JumpNotEqual
            | Self::JumpBelow => 7,
            Self::AddImm | Self::JumpZero | Self::JumpNotZero => 6,
            Self::Jump | Self::Call => 5,
            Self::Mov | Self::Add | Self::Sub => 3,
            Self::TwoByte | Self::Push | Self::Pop => 2,
            Self::Ret | Self::Nop | Self::Int3 | Self::Hlt => 1,
        }
    }
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        Ok(match value {
            0x01 => Self::MovImm,
            0x02 => Self::Mov,
            0x03 => Self::LoadByte,
            0x04 => Self::StoreByte,
            0x05 => Self::LoadQuad,
            0x06 => Self::StoreQuad,
            0x07 => Self::Add,
            0x08 => Self::Sub,
            0x09 => Self::AddImm,
            0x0F => Self::TwoByte,
            0x10 => Self::Jump,
            0x11 => Self::JumpZero,
            0x12 => Self::JumpNotZero,
            0x13 => Self::JumpEqual,
            0x14 => Self::JumpNotEqual,
            0x15 => Self::JumpBelow,
            0x20 => Self::Push,
            0x21 => Self::Pop,
            0x22 => Self::Call,
            0x23 => Self::Ret,
            0x90 => Self::Nop,
            0xCC => Self::Int3,
            0xF4 => Self::Hlt,
            other => return Err(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_byte_roundtrip() {
        for byte in 0..=u8::MAX {
            if let Ok(op) = Opcode::try_from(byte) {
                assert_eq!(op as u8, byte);
                assert!(op.length() <= MAX_INSTRUCTION_LEN);
            }
        }
    }

    #[test]
    fn zero_and_poison_bytes() {
        assert_eq!(Opcode::try_from(0x00), Err(0x00));
        assert_eq!(Opcode::try_from(0xCC), Ok(Opcode::Int3));
    }
}
