//! # Process Windows
//!
//! Every process owns an exclusive, fixed-size window of the address space.
//! Process ids start at 1; slot 0 of the process table is never used.

use core::ops::Range;
use kernel_memory_addresses::PAGE_SIZE;

/// Size of the process table, including the unused slot 0.
pub const NPROC: usize = 16;

/// Base of the window belonging to pid 1.
pub const PROC_START_ADDR: u64 = 0x10_0000;

/// Size of each process window.
pub const PROC_SIZE: u64 = 0x4_0000;

/// The exclusive address window of process `pid`.
///
/// `pid` must be at least 1.
///
/// ```rust
/// # use kernel_info::process::*;
/// assert_eq!(process_window(1), 0x10_0000..0x14_0000);
/// assert_eq!(process_window(2), 0x14_0000..0x18_0000);
/// ```
#[must_use]
pub const fn process_window(pid: usize) -> Range<u64> {
    let index = pid.saturating_sub(1) as u64;
    let first = PROC_START_ADDR + index * PROC_SIZE;
    first..first + PROC_SIZE
}

/// Address of the initial stack page of process `pid`: the topmost page of
/// its window.
#[must_use]
pub const fn process_stack_page(pid: usize) -> u64 {
    process_window(pid).end - PAGE_SIZE
}

const _: () = {
    assert!(PROC_SIZE.is_multiple_of(PAGE_SIZE));
    assert!(PROC_START_ADDR.is_multiple_of(PAGE_SIZE));
};
