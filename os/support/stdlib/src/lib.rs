//! # Userland support library
//!
//! Shared between the kernel and user programs:
//!
//! * `syscall-abi`: the system call numbers and result conventions. This is
//!   all the kernel pulls in.
//! * `syscall`: emitters that place a system call into a program being
//!   assembled, loading the argument registers and the number.
//! * `stdlib`: small helpers user programs are built from, such as writing
//!   text into the console.
//!
//! ## Register ABI
//!
//! | Register | Use |
//! |----------|-----|
//! | `rax`    | system call number in, result out |
//! | `rdi`    | first argument |
//! | `rsi`    | second argument |
//! | `rcx`, `r11` | clobbered by `syscall` |

#![cfg_attr(not(any(test, doctest)), no_std)]
#![forbid(unsafe_code)]

#[cfg(feature = "stdlib")]
pub mod stdlib;

#[cfg(feature = "syscall")]
pub mod syscall;

#[cfg(feature = "syscall-abi")]
pub mod syscall_abi;

#[cfg(feature = "stdlib")]
pub use stdlib::*;
