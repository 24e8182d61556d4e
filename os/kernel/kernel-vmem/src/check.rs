//! # Page-Table Consistency Check
//!
//! Before the kernel switches to a page table it verifies that the mappings
//! it relies on while that table is active are in place.

use crate::PhysMapper;
use crate::page_table::walk;
use kernel_info::memory::{CONSOLE_ADDR, KERNEL_ENTRY_ADDR};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, VirtualAddress};

/// A page table the kernel must not switch to.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum PageTableCheckError {
    /// The root frame is outside physical memory.
    #[error("page table root {0} is not backed by memory")]
    UnbackedRoot(PhysicalPage),
    /// A required kernel mapping is missing or not an identity mapping.
    #[error("{what} at {va} is not identity-mapped (maps to {actual:?})")]
    NotIdentityMapped {
        what: &'static str,
        va: VirtualAddress,
        actual: Option<PhysicalAddress>,
    },
}

fn require_identity<M: PhysMapper + ?Sized>(
    mapper: &M,
    root: PhysicalPage,
    what: &'static str,
    pa: PhysicalAddress,
) -> Result<(), PageTableCheckError> {
    let va = pa.identity();
    let actual = walk(mapper, root, va).physical_address(va);
    if actual == Some(pa) {
        Ok(())
    } else {
        Err(PageTableCheckError::NotIdentityMapped { what, va, actual })
    }
}

/// Check the table rooted at `root` against the kernel table `kernel_root`.
///
/// Requires, in `root`: the kernel entry code, the kernel table root and
/// the console to be identity-mapped. Requires, in `kernel_root`: `root`
/// itself to be identity-mapped, so the kernel can edit it.
///
/// # Errors
/// The first violated requirement.
pub fn check_pagetable<M: PhysMapper + ?Sized>(
    mapper: &M,
    root: PhysicalPage,
    kernel_root: PhysicalPage,
) -> Result<(), PageTableCheckError> {
    if mapper.frame(root).is_none() {
        return Err(PageTableCheckError::UnbackedRoot(root));
    }

    require_identity(
        mapper,
        root,
        "kernel entry",
        PhysicalAddress::new(KERNEL_ENTRY_ADDR),
    )?;
    require_identity(mapper, root, "kernel page table", kernel_root.base())?;
    require_identity(mapper, kernel_root, "page table root", root.base())?;
    require_identity(mapper, root, "console", PhysicalAddress::new(CONSOLE_ADDR))
}
