//! # Kernel Configuration and Boot Interface
//!
//! The authoritative source for the machine's memory layout, the process
//! address windows and the boot command contract. Everything here is a
//! compile-time constant or a pure function over one, so the kernel, the
//! simulated machine and the user programs agree on a single layout.
//!
//! ## Physical Memory Layout
//!
//! Physical and kernel-virtual addresses coincide (identity mapping):
//!
//! ```text
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │ Null page (reserved, unmapped)  │
//! 0x0000_1000 ├─────────────────────────────────┤
//!             │ Allocatable low memory          │
//! 0x0004_0000 ├─────────────────────────────────┤ KERNEL_START_ADDR
//!             │ Kernel image (text, data)       │
//! 0x0005_0000 ├─────────────────────────────────┤ KERNEL_END_ADDR
//!             │ Allocatable                     │
//! 0x0007_F000 ├─────────────────────────────────┤
//!             │ Kernel stack page               │
//! 0x0008_0000 ├─────────────────────────────────┤ KERNEL_STACK_TOP
//!             │ Allocatable                     │
//! 0x000A_0000 ├─────────────────────────────────┤ IO_PHYS_MIN
//!             │ I/O window (console at 0xB8000) │
//! 0x0010_0000 ├─────────────────────────────────┤ IO_PHYS_MAX, PROC_START_ADDR
//!             │ Process windows, PROC_SIZE each │
//! 0x0020_0000 └─────────────────────────────────┘ MEMSIZE_PHYSICAL
//! ```
//!
//! ## Modules
//!
//! * [`memory`]: layout constants and the reserved/allocatable predicates.
//! * [`process`]: process-table sizing and per-process address windows.
//! * [`boot`]: resolution of the boot command into initial programs.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
pub mod process;

/// Timer interrupts per simulated second.
pub const HZ: u64 = 100;
