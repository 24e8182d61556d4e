//! # Demonstration Programs
//!
//! The user programs the kernel boots, assembled for the window of the pid
//! that runs them:
//!
//! ```text
//!   window(pid).start   +0x1000          +0x2000                 end - 0x1000
//!   ├── text ───────────┼── data ────────┼── heap (allocator) ────┼── stack ──┤
//! ```
//!
//! The data segment is always one page, longer than its initial bytes, so
//! the loader's zero fill is part of every load.
//!
//! ```rust
//! use program_image::ProgramSource;
//!
//! let bundle = programs::bundle()?;
//! assert!(bundle.contains("pipewriter"));
//! assert!(bundle.program_image("alice", 1).is_some());
//! # Ok::<(), programs::BuildError>(())
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use kernel_info::memory::KERNEL_START_ADDR;
use kernel_info::process::{NPROC, process_stack_page, process_window};
use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress};
use kernel_registers::Register::{Rax, Rbx, R12, R13};
use machine_cpu::{AssembleError, Assembler};
use program_image::{ImageError, ProgramBundle, ProgramImage, Segment};
use stdlib::syscall::{
    sys_getsysname, sys_page_alloc, sys_panic, sys_piperead, sys_pipewrite, sys_yield,
    syscall_number,
};
use stdlib::{ATTR_NORMAL, console_cell, increment_byte, print_c_string};

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum BuildError {
    #[error("no program called {0:?}")]
    UnknownProgram(String),
    #[error("process {0} has no window")]
    NoWindow(usize),
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Pids the boot command can start programs as.
pub const BOOT_PIDS: [usize; 2] = [1, 2];

/// Console column of the greeters' counter cell.
pub const COUNTER_COLUMN: usize = 40;

/// Console row the pipe reader prints to.
pub const PIPE_ROW: usize = 2;

/// What the pipe writer sends.
pub const PIPE_MESSAGE: &[u8] = b"Hi\n";

/// System call number nobody implements.
pub const BAD_SYSCALL: u64 = 99;

/// Message of the `panicker` program.
pub const PANIC_MESSAGE: &str = "panicker gave up";

/// Bytes reserved at the start of the greeters' data page for the system
/// name; their greeting follows.
const NAME_BUFFER: usize = 32;

/// Where a program's pieces go inside its process window.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Layout {
    pub pid: usize,
    pub text: u64,
    pub data: u64,
    /// First page the allocator asks for.
    pub heap: u64,
    pub stack_page: u64,
}

impl Layout {
    #[must_use]
    pub const fn for_pid(pid: usize) -> Self {
        let text = process_window(pid).start;
        Self {
            pid,
            text,
            data: text + PAGE_SIZE,
            heap: text + 2 * PAGE_SIZE,
            stack_page: process_stack_page(pid),
        }
    }
}

/// Emits a program's text and returns the initial bytes of its data page.
type Builder = fn(&mut Assembler, &Layout) -> Vec<u8>;

const PROGRAMS: [(&str, Builder); 11] = [
    ("alice", alice),
    ("eve", eve),
    ("pipewriter", pipewriter),
    ("pipereader", pipereader),
    ("allocator", allocator),
    ("nullderef", nullderef),
    ("writeconst", writeconst),
    ("panicker", panicker),
    ("badsyscall", badsyscall),
    ("kernelfault", kernelfault),
    ("spinner", spinner),
];

/// Names of all programs.
pub fn names() -> impl ExactSizeIterator<Item = &'static str> {
    PROGRAMS.iter().map(|&(name, _)| name)
}

/// Assemble program `name` for process `pid`.
///
/// # Errors
/// Unknown program, a pid without a window, or code that does not fit its
/// page.
pub fn build(name: &str, pid: usize) -> Result<ProgramImage, BuildError> {
    let builder = PROGRAMS
        .iter()
        .find(|&&(n, _)| n == name)
        .map(|&(_, builder)| builder)
        .ok_or_else(|| BuildError::UnknownProgram(name.into()))?;
    if pid == 0 || pid >= NPROC {
        return Err(BuildError::NoWindow(pid));
    }

    let layout = Layout::for_pid(pid);
    let text_va = VirtualAddress::new(layout.text);
    let mut asm = Assembler::new(text_va);
    let data = builder(&mut asm, &layout);
    let text = asm.finish()?;

    Ok(ProgramImage::new(name, pid, text_va)
        .with_segment(Segment::new(text_va, PAGE_SIZE, text)?)
        .with_segment(Segment::new(VirtualAddress::new(layout.data), PAGE_SIZE, data)?))
}

/// Every program, built for every pid in [`BOOT_PIDS`].
///
/// # Errors
/// See [`build`].
pub fn bundle() -> Result<ProgramBundle, BuildError> {
    let mut bundle = ProgramBundle::new();
    for pid in BOOT_PIDS {
        for name in names() {
            bundle.insert(build(name, pid)?);
        }
    }
    Ok(bundle)
}

/// Print the system name and a greeting on row `pid`, then bump a counter
/// cell forever.
fn greeter(asm: &mut Assembler, layout: &Layout, greeting: &str, yields: bool) -> Vec<u8> {
    let row = layout.pid;
    sys_getsysname(asm, layout.data);
    asm.movi(R12, layout.data);
    print_c_string(asm, console_cell(row, 0), R12, ATTR_NORMAL);
    asm.movi(R12, layout.data + NAME_BUFFER as u64);
    print_c_string(asm, console_cell(row, 14), R12, ATTR_NORMAL);

    let top = asm.new_label();
    asm.bind(top);
    increment_byte(asm, console_cell(row, COUNTER_COLUMN));
    if yields {
        sys_yield(asm);
    }
    asm.jmp(top);

    let mut data = vec![0; NAME_BUFFER];
    data.extend_from_slice(greeting.as_bytes());
    data.push(0);
    data
}

fn alice(asm: &mut Assembler, layout: &Layout) -> Vec<u8> {
    greeter(asm, layout, "Hi, I'm Alice!", true)
}

/// Never yields; only the timer takes the CPU away.
fn eve(asm: &mut Assembler, layout: &Layout) -> Vec<u8> {
    greeter(asm, layout, "Hi, I'm Eve!", false)
}

fn yield_forever(asm: &mut Assembler) {
    let idle = asm.new_label();
    asm.bind(idle);
    sys_yield(asm);
    asm.jmp(idle);
}

fn pipewriter(asm: &mut Assembler, layout: &Layout) -> Vec<u8> {
    let (next, retry, sent, done) = (asm.new_label(), asm.new_label(), asm.new_label(), asm.new_label());
    asm.movi(R12, layout.data)
        .movi(R13, layout.data + PIPE_MESSAGE.len() as u64);

    asm.bind(next).jeq(R12, R13, done);
    asm.bind(retry);
    sys_pipewrite(asm, R12, 1u64);
    asm.movi(Rbx, 1).jeq(Rax, Rbx, sent);
    sys_yield(asm);
    asm.jmp(retry);

    asm.bind(sent).addi(R12, 1).jmp(next);
    asm.bind(done);
    yield_forever(asm);

    PIPE_MESSAGE.to_vec()
}

fn pipereader(asm: &mut Assembler, layout: &Layout) -> Vec<u8> {
    let (next, got) = (asm.new_label(), asm.new_label());
    asm.movi(R12, console_cell(PIPE_ROW, 0));

    asm.bind(next);
    sys_piperead(asm, layout.data, 1u64);
    asm.movi(Rbx, 1).jeq(Rax, Rbx, got);
    sys_yield(asm);
    asm.jmp(next);

    asm.bind(got)
        .movi(Rbx, layout.data)
        .ldb(Rax, Rbx, 0)
        .stb(R12, 0, Rax)
        .movi(Rax, u64::from(ATTR_NORMAL))
        .stb(R12, 1, Rax)
        .addi(R12, 2)
        .jmp(next);

    vec![0]
}

/// Claim the heap one page at a time, tagging each page with the pid, until
/// the stack or a refusal.
fn allocator(asm: &mut Assembler, layout: &Layout) -> Vec<u8> {
    let (next, done) = (asm.new_label(), asm.new_label());
    #[allow(clippy::cast_possible_truncation)]
    let page = PAGE_SIZE as i32;
    asm.movi(R12, layout.heap).movi(R13, layout.stack_page);

    asm.bind(next).jeq(R12, R13, done);
    sys_page_alloc(asm, R12);
    asm.jnz(Rax, done)
        .movi(Rax, layout.pid as u64)
        .stb(R12, 0, Rax)
        .addi(R12, page);
    sys_yield(asm);
    asm.jmp(next);

    asm.bind(done);
    yield_forever(asm);

    vec![0]
}

fn nullderef(asm: &mut Assembler, _layout: &Layout) -> Vec<u8> {
    asm.movi(Rbx, 0).ldb(Rax, Rbx, 0);
    yield_forever(asm);
    vec![0]
}

fn writeconst(asm: &mut Assembler, _layout: &Layout) -> Vec<u8> {
    asm.movi(Rbx, KERNEL_START_ADDR).movi(Rax, 1).stb(Rbx, 0, Rax);
    yield_forever(asm);
    vec![0]
}

fn panicker(asm: &mut Assembler, layout: &Layout) -> Vec<u8> {
    sys_panic(asm, layout.data);
    yield_forever(asm);
    let mut data = PANIC_MESSAGE.as_bytes().to_vec();
    data.push(0);
    data
}

fn badsyscall(asm: &mut Assembler, _layout: &Layout) -> Vec<u8> {
    syscall_number(asm, BAD_SYSCALL, &[]);
    yield_forever(asm);
    vec![0]
}

fn kernelfault(asm: &mut Assembler, _layout: &Layout) -> Vec<u8> {
    sys_getsysname(asm, 0u64);
    yield_forever(asm);
    vec![0]
}

fn spinner(asm: &mut Assembler, _layout: &Layout) -> Vec<u8> {
    let top = asm.new_label();
    asm.bind(top).addi(Rax, 1).jmp(top);
    vec![0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_registers::Register::Rdi;
    use machine_cpu::{Instruction, decode};
    use program_image::ProgramSource;

    #[test]
    fn every_program_fits_every_window() {
        for pid in 1..NPROC {
            for name in names() {
                let image = build(name, pid).unwrap();
                let window = process_window(pid);
                assert_eq!(image.entry().as_u64(), window.start);
                let segments: Vec<_> = image.segments().collect();
                assert_eq!(segments.len(), 2, "{name}");
                assert_eq!(segments[1].va().as_u64(), window.start + PAGE_SIZE);
                assert!((segments[1].data().len() as u64) < segments[1].size());
            }
        }
    }

    #[test]
    fn greeter_starts_by_fetching_the_system_name() {
        let image = build("alice", 2).unwrap();
        let text = image.segments().next().unwrap().data();
        assert_eq!(
            decode(text).unwrap(),
            Instruction::MovImm { dst: Rdi, imm: 0x14_1000 }
        );
    }

    #[test]
    fn pipe_writer_carries_its_message() {
        let image = build("pipewriter", 1).unwrap();
        let data = image.segments().nth(1).unwrap().data();
        assert_eq!(data, PIPE_MESSAGE);
    }

    #[test]
    fn unknown_names_and_pids_are_rejected() {
        assert_eq!(
            build("bob", 1),
            Err(BuildError::UnknownProgram("bob".into()))
        );
        assert_eq!(build("alice", 0), Err(BuildError::NoWindow(0)));
        assert_eq!(build("alice", NPROC), Err(BuildError::NoWindow(NPROC)));
    }

    #[test]
    fn bundle_covers_both_boot_pids() {
        let bundle = bundle().unwrap();
        assert_eq!(bundle.len(), 2 * PROGRAMS.len());
        for name in names() {
            assert!(bundle.program_image(name, 1).is_some());
            assert!(bundle.program_image(name, 2).is_some());
        }
    }
}
