//! # Virtual Memory Support
//!
//! x86-64 four-level paging over simulated physical memory.
//!
//! ## What you get
//! - [`PageEntryBits`]: a page-table entry as a bitfield, with the `P|W|U`
//!   permission constants the kernel uses.
//! - [`VmIter`]: a cursor that looks up and installs mappings page by page,
//!   allocating intermediate tables on demand.
//! - [`translate`]: the MMU's view of an access, producing a physical
//!   address or a page-fault error code.
//! - [`check_pagetable`]: the consistency check run before switching tables.
//! - The seams to the rest of the kernel: [`PhysMapper`] (who owns the
//!   frames) and [`FrameAlloc`] (where new table frames come from).
//!
//! ## x86-64 Virtual Address → Physical Address Walk
//!
//! Each 48-bit virtual address is divided into five fields:
//!
//! ```text
//! | 47‒39 | 38‒30 | 29‒21 | 20‒12 | 11‒0   |
//! |  PML4 |  PDPT |   PD  |   PT  | Offset |
//! ```
//!
//! The fields index four levels of tables, each 512 entries of 8 bytes:
//!
//! ```text
//!  PML4  →  PDPT  →  PD  →  PT  →  Physical Page
//! ```
//!
//! Permissions are the intersection over the walk: a page is user-writable
//! only if every level grants `U` and `W`. Intermediate links are created
//! with `P|W|U`, so the leaf decides.

#![cfg_attr(not(test), no_std)]
#![forbid(unsafe_code)]

mod check;
mod page_entry_bits;
mod page_table;
mod translate;
mod vmiter;

pub use crate::check::{PageTableCheckError, check_pagetable};
pub use crate::page_entry_bits::PageEntryBits;
pub use crate::page_table::{
    ENTRIES_PER_TABLE, TableLevel, Walk, read_entry, walk, write_entry,
};
pub use crate::translate::{Access, AccessKind, translate};
pub use crate::vmiter::{MapError, VmIter};

use kernel_memory_addresses::{PAGE_SIZE, PhysicalPage};

/// The bytes of one physical page.
#[allow(clippy::cast_possible_truncation)]
pub type Frame = [u8; PAGE_SIZE as usize];

/// Owner of physical memory, handing out views of individual frames.
///
/// Page tables are stored in these frames; every table access goes through
/// this trait.
pub trait PhysMapper {
    /// Borrow the frame at `page`, or `None` if it is not backed by memory.
    fn frame(&self, page: PhysicalPage) -> Option<&Frame>;

    /// Mutably borrow the frame at `page`, or `None` if it is not backed by
    /// memory.
    fn frame_mut(&mut self, page: PhysicalPage) -> Option<&mut Frame>;
}

/// Source of **physical** 4 KiB frames for page tables.
///
/// The implementation decides where frames come from (a boot-time pool, the
/// general page allocator, ...). The frame's previous contents do not
/// matter; [`VmIter`] zeroes new tables itself.
///
/// Returns `None` on out-of-memory.
pub trait FrameAlloc<M: PhysMapper + ?Sized> {
    /// Allocate one 4 KiB frame for a page table.
    fn alloc_4k(&mut self, mapper: &mut M) -> Option<PhysicalPage>;
}
