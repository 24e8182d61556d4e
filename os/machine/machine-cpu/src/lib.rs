//! # Machine CPU
//!
//! A single x86-64 flavoured processor core that runs user programs on top
//! of the kernel's page tables. It is the hosted stand-in for the hardware
//! the kernel would otherwise drive through the IDT and `iretq`.
//!
//! ```text
//!   RegState ──► Cpu::run ──┬── fetch ──► translate(Execute) ──► PhysMapper
//!                           ├── load  ──► translate(Read)
//!                           ├── store ──► translate(Write)
//!                           └── Trap { Syscall | Timer | Exception }
//! ```
//!
//! * **Instruction set** ([`isa`], [`Instruction`]): a small variable-length
//!   encoding whose `syscall` (`0F 05`), `int3` (`CC`) and `hlt` (`F4`)
//!   bytes match x86, so poisoned memory (`0xCC`) traps like it would there.
//! * **Decoder** ([`decode`]): bytes to [`Instruction`].
//! * **Assembler** ([`Assembler`]): how user programs are written.
//! * **Core** ([`Cpu`]): fetch, decode, execute; faults carry the x86 error
//!   code and CR2 value, and an interval timer preempts user code.
//!
//! Faulting instructions do not retire: `reg_rip` still points at them and
//! no register or memory is modified.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

pub mod assembler;
pub mod cpu;
pub mod decoder;
pub mod instruction;
pub mod isa;
pub mod trap;

pub use crate::assembler::{AssembleError, Assembler, Label};
pub use crate::cpu::Cpu;
pub use crate::decoder::{DecodeError, decode, instruction_length};
pub use crate::instruction::{Instruction, register_name};
pub use crate::isa::Opcode;
pub use crate::trap::{Exception, Trap};
