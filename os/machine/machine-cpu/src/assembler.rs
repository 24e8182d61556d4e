//! # Assembler
//!
//! Builds machine code for a fixed load address. Branches may target labels
//! that are bound later; offsets are patched in [`Assembler::finish`].
//!
//! ```rust
//! use kernel_memory_addresses::VirtualAddress;
//! use kernel_registers::Register::{Rax, Rcx};
//! use machine_cpu::Assembler;
//!
//! let mut asm = Assembler::new(VirtualAddress::new(0x10_0000));
//! let done = asm.new_label();
//! let top = asm.new_label();
//! asm.movi(Rcx, 3).bind(top);
//! asm.addi(Rcx, -1).jz(Rcx, done).jmp(top);
//! asm.bind(done).movi(Rax, 0).syscall();
//!
//! let code = asm.finish()?;
//! assert_eq!(&code[code.len() - 2..], &[0x0F, 0x05]);
//! # Ok::<(), machine_cpu::AssembleError>(())
//! ```

use crate::instruction::Instruction;
use alloc::vec::Vec;
use kernel_memory_addresses::VirtualAddress;
use kernel_registers::Register;

/// A branch target, bound to a code offset with [`Assembler::bind`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Label(usize);

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum AssembleError {
    #[error("label {0:?} is used but never bound")]
    UnboundLabel(Label),
    #[error("label {0:?} is bound twice")]
    LabelBoundTwice(Label),
    #[error("branch at offset {from:#x} cannot reach offset {target:#x}")]
    BranchOutOfRange { from: usize, target: usize },
}

/// A `rel32` waiting for its label.
#[derive(Debug, Copy, Clone)]
struct Fixup {
    /// Offset of the `rel32` field; the instruction ends right after it.
    at: usize,
    label: Label,
}

/// Machine-code builder for code loaded at `origin`.
#[derive(Debug, Clone)]
pub struct Assembler {
    origin: VirtualAddress,
    code: Vec<u8>,
    labels: Vec<Option<usize>>,
    fixups: Vec<Fixup>,
    error: Option<AssembleError>,
}

impl Assembler {
    #[must_use]
    pub const fn new(origin: VirtualAddress) -> Self {
        Self {
            origin,
            code: Vec::new(),
            labels: Vec::new(),
            fixups: Vec::new(),
            error: None,
        }
    }

    /// Address the code will be loaded at.
    #[inline]
    #[must_use]
    pub const fn origin(&self) -> VirtualAddress {
        self.origin
    }

    /// Address of the next emitted byte.
    #[must_use]
    pub fn here(&self) -> VirtualAddress {
        self.origin + self.code.len() as u64
    }

    /// A fresh, unbound label.
    pub fn new_label(&mut self) -> Label {
        self.labels.push(None);
        Label(self.labels.len() - 1)
    }

    /// Bind `label` to the current position.
    pub fn bind(&mut self, label: Label) -> &mut Self {
        match self.labels.get_mut(label.0) {
            Some(slot @ None) => *slot = Some(self.code.len()),
            _ => self.fail(AssembleError::LabelBoundTwice(label)),
        }
        self
    }

    /// Emit one instruction.
    pub fn emit(&mut self, insn: Instruction) -> &mut Self {
        insn.encode_into(&mut self.code);
        self
    }

    /// Emit raw bytes, e.g. data or deliberately invalid code.
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.code.extend_from_slice(bytes);
        self
    }

    fn branch(&mut self, insn: Instruction, label: Label) -> &mut Self {
        debug_assert!(insn.is_branch());
        self.emit(insn);
        self.fixups.push(Fixup {
            at: self.code.len() - 4,
            label,
        });
        self
    }

    fn fail(&mut self, error: AssembleError) {
        self.error.get_or_insert(error);
    }

    pub fn nop(&mut self) -> &mut Self {
        self.emit(Instruction::Nop)
    }

    pub fn movi(&mut self, dst: Register, imm: u64) -> &mut Self {
        self.emit(Instruction::MovImm { dst, imm })
    }

    pub fn mov(&mut self, dst: Register, src: Register) -> &mut Self {
        self.emit(Instruction::Mov { dst, src })
    }

    pub fn ldb(&mut self, dst: Register, base: Register, disp: i32) -> &mut Self {
        self.emit(Instruction::LoadByte { dst, base, disp })
    }

    pub fn stb(&mut self, base: Register, disp: i32, src: Register) -> &mut Self {
        self.emit(Instruction::StoreByte { base, src, disp })
    }

    pub fn ldq(&mut self, dst: Register, base: Register, disp: i32) -> &mut Self {
        self.emit(Instruction::LoadQuad { dst, base, disp })
    }

    pub fn stq(&mut self, base: Register, disp: i32, src: Register) -> &mut Self {
        self.emit(Instruction::StoreQuad { base, src, disp })
    }

    pub fn add(&mut self, dst: Register, src: Register) -> &mut Self {
        self.emit(Instruction::Add { dst, src })
    }

    pub fn sub(&mut self, dst: Register, src: Register) -> &mut Self {
        self.emit(Instruction::Sub { dst, src })
    }

    pub fn addi(&mut self, dst: Register, imm: i32) -> &mut Self {
        self.emit(Instruction::AddImm { dst, imm })
    }

    pub fn jmp(&mut self, target: Label) -> &mut Self {
        self.branch(Instruction::Jump { rel: 0 }, target)
    }

    pub fn jz(&mut self, reg: Register, target: Label) -> &mut Self {
        self.branch(Instruction::JumpZero { reg, rel: 0 }, target)
    }

    pub fn jnz(&mut self, reg: Register, target: Label) -> &mut Self {
        self.branch(Instruction::JumpNotZero { reg, rel: 0 }, target)
    }

    pub fn jeq(&mut self, a: Register, b: Register, target: Label) -> &mut Self {
        self.branch(Instruction::JumpEqual { a, b, rel: 0 }, target)
    }

    pub fn jne(&mut self, a: Register, b: Register, target: Label) -> &mut Self {
        self.branch(Instruction::JumpNotEqual { a, b, rel: 0 }, target)
    }

    /// Branch if `a < b`, unsigned.
    pub fn jb(&mut self, a: Register, b: Register, target: Label) -> &mut Self {
        self.branch(Instruction::JumpBelow { a, b, rel: 0 }, target)
    }

    pub fn push(&mut self, reg: Register) -> &mut Self {
        self.emit(Instruction::Push(reg))
    }

    pub fn pop(&mut self, reg: Register) -> &mut Self {
        self.emit(Instruction::Pop(reg))
    }

    pub fn call(&mut self, target: Label) -> &mut Self {
        self.branch(Instruction::Call { rel: 0 }, target)
    }

    pub fn ret(&mut self) -> &mut Self {
        self.emit(Instruction::Ret)
    }

    pub fn syscall(&mut self) -> &mut Self {
        self.emit(Instruction::Syscall)
    }

    pub fn int3(&mut self) -> &mut Self {
        self.emit(Instruction::Int3)
    }

    pub fn hlt(&mut self) -> &mut Self {
        self.emit(Instruction::Hlt)
    }

    /// Resolve all branches and return the code.
    ///
    /// # Errors
    /// The first label misuse, or a branch whose offset does not fit.
    pub fn finish(mut self) -> Result<Vec<u8>, AssembleError> {
        if let Some(error) = self.error {
            return Err(error);
        }
        for fixup in &self.fixups {
            let target = self
                .labels
                .get(fixup.label.0)
                .copied()
                .flatten()
                .ok_or(AssembleError::UnboundLabel(fixup.label))?;
            let end = fixup.at + 4;
            let rel = i64::try_from(target)
                .ok()
                .zip(i64::try_from(end).ok())
                .and_then(|(t, e)| i32::try_from(t - e).ok())
                .ok_or(AssembleError::BranchOutOfRange { from: end, target })?;
            self.code[fixup.at..end].copy_from_slice(&rel.to_le_bytes());
        }
        Ok(self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;
    use kernel_registers::Register::{Rax, Rbx};

    fn origin() -> VirtualAddress {
        VirtualAddress::new(0x10_0000)
    }

    #[test]
    fn forward_and_backward_branches() {
        let mut asm = Assembler::new(origin());
        let top = asm.new_label();
        let out = asm.new_label();
        asm.bind(top).jz(Rax, out); // 0..6
        asm.addi(Rax, -1).jmp(top); // 6..12, 12..17
        asm.bind(out).ret(); // 17

        let code = asm.finish().unwrap();
        assert_eq!(
            decode(&code[0..6]),
            Ok(Instruction::JumpZero { reg: Rax, rel: 11 })
        );
        assert_eq!(decode(&code[12..17]), Ok(Instruction::Jump { rel: -17 }));
    }

    #[test]
    fn here_tracks_origin() {
        let mut asm = Assembler::new(origin());
        asm.movi(Rbx, 1).nop();
        assert_eq!(asm.here(), VirtualAddress::new(0x10_000B));
        assert_eq!(asm.origin(), origin());
    }

    #[test]
    fn unbound_label_is_an_error() {
        let mut asm = Assembler::new(origin());
        let nowhere = asm.new_label();
        asm.call(nowhere);
        assert_eq!(asm.finish(), Err(AssembleError::UnboundLabel(nowhere)));
    }

    #[test]
    fn binding_twice_is_an_error() {
        let mut asm = Assembler::new(origin());
        let l = asm.new_label();
        asm.bind(l).nop().bind(l);
        assert_eq!(asm.finish(), Err(AssembleError::LabelBoundTwice(l)));
    }
}
