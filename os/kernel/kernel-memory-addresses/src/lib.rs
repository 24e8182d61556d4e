//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw memory addresses and page bases used by
//! the page registry, the page-table cursor and the process loader.
//!
//! ## Overview
//!
//! The kernel only deals in 4 KiB pages, so the page size is a constant
//! rather than a type parameter. Four types keep the two address spaces
//! apart at compile time:
//!
//! | Type | Meaning |
//! |------|---------|
//! | [`VirtualAddress`] / [`VirtualPage`] | Addresses translated through a page table. |
//! | [`PhysicalAddress`] / [`PhysicalPage`] | Addresses into physical memory (RAM or the console window). |
//!
//! Pages are always page-aligned; [`PhysicalPage::number`] yields the page
//! number used to index per-page arrays such as the refcount registry.
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x10_2042);
//! let (page, off) = va.split();
//! assert_eq!(page.base().as_u64(), 0x10_2000);
//! assert_eq!(off, 0x42);
//! assert_eq!(page.join(off), va);
//!
//! let pa = PhysicalAddress::new(0x10_2000);
//! assert_eq!(pa.page().number(), 0x102);
//! assert!(pa.is_page_aligned());
//! ```
//!
//! ## Design Notes
//!
//! - The types are `#[repr(transparent)]` over `u64` and implement `Copy`,
//!   `Eq`, `Ord` and `Hash`.
//! - All alignment and offset calculations are `const fn`.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![forbid(unsafe_code)]

mod physical_address;
mod physical_page;
mod virtual_address;
mod virtual_page;

pub use physical_address::PhysicalAddress;
pub use physical_page::PhysicalPage;
pub use virtual_address::VirtualAddress;
pub use virtual_page::VirtualPage;

/// Size of a page in bytes.
pub const PAGE_SIZE: u64 = 4096;

/// `log2(PAGE_SIZE)`, i.e. the number of in-page offset bits.
pub const PAGE_SHIFT: u32 = 12;

/// Mask selecting the in-page offset bits.
pub const PAGE_OFFSET_MASK: u64 = PAGE_SIZE - 1;

/// Round `addr` down to the previous page boundary.
#[inline]
#[must_use]
pub const fn round_down(addr: u64) -> u64 {
    addr & !PAGE_OFFSET_MASK
}

/// Round `addr` up to the next page boundary.
///
/// Saturates at the last page boundary of the address space.
#[inline]
#[must_use]
pub const fn round_up(addr: u64) -> u64 {
    match addr.checked_add(PAGE_OFFSET_MASK) {
        Some(v) => round_down(v),
        None => round_down(u64::MAX),
    }
}

/// Whether `addr` lies on a page boundary.
#[inline]
#[must_use]
pub const fn is_page_aligned(addr: u64) -> bool {
    addr & PAGE_OFFSET_MASK == 0
}
