//! System call emitters.
//!
//! Each `sys_*` function appends the instructions for one system call to the
//! program being assembled. Arguments may be registers or immediates; the
//! result is left in `rax`. `rdi`, `rsi`, `rcx` and `r11` are clobbered.

use crate::syscall_abi::Sysno;
use kernel_registers::Register;
use machine_cpu::Assembler;

/// Registers carrying the first and second argument.
pub const ARGUMENT_REGISTERS: [Register; 2] = [Register::Rdi, Register::Rsi];

/// A system call argument.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Operand {
    Reg(Register),
    Imm(u64),
}

impl From<Register> for Operand {
    fn from(reg: Register) -> Self {
        Self::Reg(reg)
    }
}

impl From<u64> for Operand {
    fn from(imm: u64) -> Self {
        Self::Imm(imm)
    }
}

/// Emit system call `number` with up to two arguments.
///
/// Register arguments are moved through the stack when one of them lives in
/// the other's argument register, so any source assignment is safe.
pub fn syscall_number(asm: &mut Assembler, number: u64, args: &[Operand]) {
    debug_assert!(args.len() <= ARGUMENT_REGISTERS.len());
    let mut moves: [Option<(Register, Register)>; 2] = [None; 2];
    for (slot, (&dst, arg)) in moves.iter_mut().zip(ARGUMENT_REGISTERS.iter().zip(args)) {
        if let Operand::Reg(src) = *arg
            && src != dst
        {
            *slot = Some((dst, src));
        }
    }

    let conflict = moves
        .iter()
        .flatten()
        .any(|&(dst, _)| moves.iter().flatten().any(|&(_, src)| src == dst));
    if conflict {
        for &(_, src) in moves.iter().flatten() {
            asm.push(src);
        }
        for &(dst, _) in moves.iter().rev().flatten() {
            asm.pop(dst);
        }
    } else {
        for &(dst, src) in moves.iter().flatten() {
            asm.mov(dst, src);
        }
    }

    for (&dst, arg) in ARGUMENT_REGISTERS.iter().zip(args) {
        if let Operand::Imm(imm) = *arg {
            asm.movi(dst, imm);
        }
    }
    asm.movi(Register::Rax, number).syscall();
}

/// Emit system call `sysno`.
pub fn syscall(asm: &mut Assembler, sysno: Sysno, args: &[Operand]) {
    syscall_number(asm, sysno.number(), args);
}

pub fn sys_getpid(asm: &mut Assembler) {
    syscall(asm, Sysno::GetPid, &[]);
}

pub fn sys_yield(asm: &mut Assembler) {
    syscall(asm, Sysno::Yield, &[]);
}

/// `msg` points at a NUL-terminated message.
pub fn sys_panic(asm: &mut Assembler, msg: impl Into<Operand>) {
    syscall(asm, Sysno::Panic, &[msg.into()]);
}

pub fn sys_page_alloc(asm: &mut Assembler, addr: impl Into<Operand>) {
    syscall(asm, Sysno::PageAlloc, &[addr.into()]);
}

pub fn sys_getsysname(asm: &mut Assembler, buf: impl Into<Operand>) {
    syscall(asm, Sysno::GetSysName, &[buf.into()]);
}

pub fn sys_spawn(asm: &mut Assembler, command: impl Into<Operand>) {
    syscall(asm, Sysno::Spawn, &[command.into()]);
}

pub fn sys_pipewrite(asm: &mut Assembler, buf: impl Into<Operand>, len: impl Into<Operand>) {
    syscall(asm, Sysno::PipeWrite, &[buf.into(), len.into()]);
}

pub fn sys_piperead(asm: &mut Assembler, buf: impl Into<Operand>, len: impl Into<Operand>) {
    syscall(asm, Sysno::PipeRead, &[buf.into(), len.into()]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_memory_addresses::VirtualAddress;
    use kernel_registers::Register::{Rax, Rdi, Rsi};
    use machine_cpu::{Instruction, decode};

    fn emitted(build: impl FnOnce(&mut Assembler)) -> Vec<Instruction> {
        let mut asm = Assembler::new(VirtualAddress::new(0x10_0000));
        build(&mut asm);
        let code = asm.finish().unwrap();
        let mut out = Vec::new();
        let mut at = 0;
        while at < code.len() {
            let insn = decode(&code[at..]).unwrap();
            at += insn.encoded_len();
            out.push(insn);
        }
        out
    }

    #[test]
    fn immediates_then_number() {
        let insns = emitted(|asm| sys_pipewrite(asm, 0x10_1000, 1));
        assert_eq!(
            insns,
            [
                Instruction::MovImm { dst: Rdi, imm: 0x10_1000 },
                Instruction::MovImm { dst: Rsi, imm: 1 },
                Instruction::MovImm { dst: Rax, imm: 7 },
                Instruction::Syscall,
            ]
        );
    }

    #[test]
    fn argument_already_in_place_is_not_moved() {
        let insns = emitted(|asm| sys_page_alloc(asm, Rdi));
        assert_eq!(
            insns,
            [Instruction::MovImm { dst: Rax, imm: 4 }, Instruction::Syscall]
        );
    }

    #[test]
    fn swapped_arguments_go_through_the_stack() {
        let insns = emitted(|asm| sys_piperead(asm, Rsi, Rdi));
        assert_eq!(
            insns,
            [
                Instruction::Push(Rsi),
                Instruction::Push(Rdi),
                Instruction::Pop(Rsi),
                Instruction::Pop(Rdi),
                Instruction::MovImm { dst: Rax, imm: 8 },
                Instruction::Syscall,
            ]
        );
    }

    #[test]
    fn rax_argument_is_read_before_the_number_is_loaded() {
        let insns = emitted(|asm| sys_panic(asm, Rax));
        assert_eq!(insns[0], Instruction::Mov { dst: Rdi, src: Rax });
        assert_eq!(insns[1], Instruction::MovImm { dst: Rax, imm: 3 });
    }
}
