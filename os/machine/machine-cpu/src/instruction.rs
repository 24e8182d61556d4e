use crate::isa::{Opcode, SYSCALL_SECOND_BYTE};
use alloc::vec::Vec;
use core::fmt;
use kernel_registers::Register;

/// A decoded instruction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Instruction {
    Nop,
    /// `dst = imm`
    MovImm { dst: Register, imm: u64 },
    /// `dst = src`
    Mov { dst: Register, src: Register },
    /// `dst = zero_extend(*(u8*)(base + disp))`
    LoadByte { dst: Register, base: Register, disp: i32 },
    /// `*(u8*)(base + disp) = src`
    StoreByte { base: Register, src: Register, disp: i32 },
    /// `dst = *(u64*)(base + disp)`
    LoadQuad { dst: Register, base: Register, disp: i32 },
    /// `*(u64*)(base + disp) = src`
    StoreQuad { base: Register, src: Register, disp: i32 },
    /// `dst += src`, wrapping
    Add { dst: Register, src: Register },
    /// `dst -= src`, wrapping
    Sub { dst: Register, src: Register },
    /// `dst += imm`, wrapping, sign-extended
    AddImm { dst: Register, imm: i32 },
    Jump { rel: i32 },
    JumpZero { reg: Register, rel: i32 },
    JumpNotZero { reg: Register, rel: i32 },
    JumpEqual { a: Register, b: Register, rel: i32 },
    JumpNotEqual { a: Register, b: Register, rel: i32 },
    /// Unsigned `a < b`.
    JumpBelow { a: Register, b: Register, rel: i32 },
    Push(Register),
    Pop(Register),
    Call { rel: i32 },
    Ret,
    Syscall,
    Int3,
    Hlt,
}

impl Instruction {
    #[must_use]
    pub const fn opcode(&self) -> Opcode {
        match self {
            Self::Nop => Opcode::Nop,
            Self::MovImm { .. } => Opcode::MovImm,
            Self::Mov { .. } => Opcode::Mov,
            Self::LoadByte { .. } => Opcode::LoadByte,
            Self::StoreByte { .. } => Opcode::StoreByte,
            Self::LoadQuad { .. } => Opcode::LoadQuad,
            Self::StoreQuad { .. } => Opcode::StoreQuad,
            Self::Add { .. } => Opcode::Add,
            Self::Sub { .. } => Opcode::Sub,
            Self::AddImm { .. } => Opcode::AddImm,
            Self::Jump { .. } => Opcode::Jump,
            Self::JumpZero { .. } => Opcode::JumpZero,
            Self::JumpNotZero { .. } => Opcode::JumpNotZero,
            Self::JumpEqual { .. } => Opcode::JumpEqual,
            Self::JumpNotEqual { .. } => Opcode::JumpNotEqual,
            Self::JumpBelow { .. } => Opcode::JumpBelow,
            Self::Push(_) => Opcode::Push,
            Self::Pop(_) => Opcode::Pop,
            Self::Call { .. } => Opcode::Call,
            Self::Ret => Opcode::Ret,
            Self::Syscall => Opcode::TwoByte,
            Self::Int3 => Opcode::Int3,
            Self::Hlt => Opcode::Hlt,
        }
    }

    /// Encoded length in bytes.
    #[inline]
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        self.opcode().length()
    }

    /// Whether the instruction ends in a `rel32` branch offset.
    #[must_use]
    pub const fn is_branch(&self) -> bool {
        matches!(
            self,
            Self::Jump { .. }
                | Self::JumpZero { .. }
                | Self::JumpNotZero { .. }
                | Self::JumpEqual { .. }
                | Self::JumpNotEqual { .. }
                | Self::JumpBelow { .. }
                | Self::Call { .. }
        )
    }

    /// Append the encoding to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.opcode() as u8);
        match *self {
            Self::Nop | Self::Ret | Self::Int3 | Self::Hlt => {}
            Self::Syscall => out.push(SYSCALL_SECOND_BYTE),
            Self::MovImm { dst, imm } => {
                out.push(dst.encoding());
                out.extend_from_slice(&imm.to_le_bytes());
            }
            Self::Mov { dst, src } | Self::Add { dst, src } | Self::Sub { dst, src } => {
                out.extend_from_slice(&[dst.encoding(), src.encoding()]);
            }
            Self::LoadByte { dst, base, disp } | Self::LoadQuad { dst, base, disp } => {
                out.extend_from_slice(&[dst.encoding(), base.encoding()]);
                out.extend_from_slice(&disp.to_le_bytes());
            }
            Self::StoreByte { base, src, disp } | Self::StoreQuad { base, src, disp } => {
                out.extend_from_slice(&[base.encoding(), src.encoding()]);
                out.extend_from_slice(&disp.to_le_bytes());
            }
            Self::AddImm { dst, imm } => {
                out.push(dst.encoding());
                out.extend_from_slice(&imm.to_le_bytes());
            }
            Self::Jump { rel } | Self::Call { rel } => out.extend_from_slice(&rel.to_le_bytes()),
            Self::JumpZero { reg, rel } | Self::JumpNotZero { reg, rel } => {
                out.push(reg.encoding());
                out.extend_from_slice(&rel.to_le_bytes());
            }
            Self::JumpEqual { a, b, rel }
            | Self::JumpNotEqual { a, b, rel }
            | Self::JumpBelow { a, b, rel } => {
                out.extend_from_slice(&[a.encoding(), b.encoding()]);
                out.extend_from_slice(&rel.to_le_bytes());
            }
            Self::Push(reg) | Self::Pop(reg) => out.push(reg.encoding()),
        }
    }
}

/// Lower-case x86 register name.
#[must_use]
pub const fn register_name(reg: Register) -> &'static str {
    match reg {
        Register::Rax => "rax",
        Register::Rcx => "rcx",
        Register::Rdx => "rdx",
        Register::Rbx => "rbx",
        Register::Rsp => "rsp",
        Register::Rbp => "rbp",
        Register::Rsi => "rsi",
        Register::Rdi => "rdi",
        Register::R8 => "r8",
        Register::R9 => "r9",
        Register::R10 => "r10",
        Register::R11 => "r11",
        Register::R12 => "r12",
        Register::R13 => "r13",
        Register::R14 => "r14",
        Register::R15 => "r15",
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = register_name;
        match *self {
            Self::Nop => f.write_str("nop"),
            Self::MovImm { dst, imm } => write!(f, "movi {}, {imm:#x}", r(dst)),
            Self::Mov { dst, src } => write!(f, "mov {}, {}", r(dst), r(src)),
            Self::LoadByte { dst, base, disp } => write!(f, "ldb {}, [{}{disp:+}]", r(dst), r(base)),
            Self::StoreByte { base, src, disp } => write!(f, "stb [{}{disp:+}], {}", r(base), r(src)),
            Self::LoadQuad { dst, base, disp } => write!(f, "ldq {}, [{}{disp:+}]", r(dst), r(base)),
            Self::StoreQuad { base, src, disp } => write!(f, "stq [{}{disp:+}], {}", r(base), r(src)),
            Self::Add { dst, src } => write!(f, "add {}, {}", r(dst), r(src)),
            Self::Sub { dst, src } => write!(f, "sub {}, {}", r(dst), r(src)),
            Self::AddImm { dst, imm } => write!(f, "addi {}, {imm}", r(dst)),
            Self::Jump { rel } => write!(f, "jmp {rel:+}"),
            Self::JumpZero { reg, rel } => write!(f, "jz {}, {rel:+}", r(reg)),
            Self::JumpNotZero { reg, rel } => write!(f, "jnz {}, {rel:+}", r(reg)),
            Self::JumpEqual { a, b, rel } => write!(f, "jeq {}, {}, {rel:+}", r(a), r(b)),
            Self::JumpNotEqual { a, b, rel } => write!(f, "jne {}, {}, {rel:+}", r(a), r(b)),
            Self::JumpBelow { a, b, rel } => write!(f, "jb {}, {}, {rel:+}", r(a), r(b)),
            Self::Push(reg) => write!(f, "push {}", r(reg)),
            Self::Pop(reg) => write!(f, "pop {}", r(reg)),
            Self::Call { rel } => write!(f, "call {rel:+}"),
            Self::Ret => f.write_str("ret"),
            Self::Syscall => f.write_str("syscall"),
            Self::Int3 => f.write_str("int3"),
            Self::Hlt => f.write_str("hlt"),
        }
    }
}
