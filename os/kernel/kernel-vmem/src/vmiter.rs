//! # Page-Table Cursor
//!
//! [`VmIter`] walks one page table page by page. It is the only place that
//! installs mappings; callers own the refcount bookkeeping for the physical
//! pages they map.

use crate::page_table::{TableLevel, Walk, read_entry, walk, write_entry};
use crate::{FrameAlloc, PageEntryBits, PhysMapper};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage, VirtualAddress};

/// Reasons a mapping could not be installed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum MapError {
    /// No frame was available for a missing intermediate table.
    #[error("out of memory allocating a {0} table")]
    OutOfMemory(TableLevel),
    /// The cursor or the target physical address is not page-aligned.
    #[error("unaligned mapping {va} -> {pa}")]
    Unaligned {
        va: VirtualAddress,
        pa: PhysicalAddress,
    },
    /// The cursor's address is not canonical; nothing can map it.
    #[error("non-canonical address {0}")]
    NonCanonical(VirtualAddress),
    /// A large-page leaf covers the address.
    #[error("large page in the way at {0}")]
    LargePage(VirtualAddress),
    /// A table frame lies outside physical memory.
    #[error("page table frame {0} is not backed by memory")]
    Unbacked(PhysicalPage),
}

/// Cursor over the mappings of one page table.
///
/// ```rust
/// # use kernel_vmem::*;
/// # use kernel_memory_addresses::*;
/// # struct Ram(Vec<Frame>);
/// # impl PhysMapper for Ram {
/// #     fn frame(&self, p: PhysicalPage) -> Option<&Frame> { self.0.get(p.number()) }
/// #     fn frame_mut(&mut self, p: PhysicalPage) -> Option<&mut Frame> { self.0.get_mut(p.number()) }
/// # }
/// # struct Bump(usize);
/// # impl FrameAlloc<Ram> for Bump {
/// #     fn alloc_4k(&mut self, _: &mut Ram) -> Option<PhysicalPage> { self.0 += 1; Some(PhysicalPage::from_number(self.0)) }
/// # }
/// let mut ram = Ram(vec![[0; 4096]; 16]);
/// let mut alloc = Bump(0);
/// let root = PhysicalPage::from_number(0);
///
/// let mut it = VmIter::new(&mut ram, root, VirtualAddress::new(0x3000));
/// it.map(&mut alloc, PhysicalAddress::new(0x8000), PageEntryBits::USER_RW)?;
/// assert_eq!(it.pa(), Some(PhysicalAddress::new(0x8000)));
/// assert!(it.user() && it.writable());
///
/// it.next_page();
/// assert_eq!(it.va(), VirtualAddress::new(0x4000));
/// assert!(!it.present());
/// # Ok::<(), MapError>(())
/// ```
pub struct VmIter<'m, M: PhysMapper + ?Sized> {
    mapper: &'m mut M,
    root: PhysicalPage,
    va: VirtualAddress,
}

impl<'m, M: PhysMapper + ?Sized> VmIter<'m, M> {
    /// Position a cursor at `va` in the table rooted at `root`.
    pub const fn new(mapper: &'m mut M, root: PhysicalPage, va: VirtualAddress) -> Self {
        Self { mapper, root, va }
    }

    #[inline]
    #[must_use]
    pub const fn va(&self) -> VirtualAddress {
        self.va
    }

    #[inline]
    #[must_use]
    pub const fn root(&self) -> PhysicalPage {
        self.root
    }

    fn walk(&self) -> Walk {
        walk(&*self.mapper, self.root, self.va)
    }

    /// Physical address the cursor's address maps to, if present.
    #[must_use]
    pub fn pa(&self) -> Option<PhysicalAddress> {
        self.walk().physical_address(self.va)
    }

    /// Effective `P|W|U` permissions, intersected over all levels.
    #[must_use]
    pub fn perm(&self) -> PageEntryBits {
        self.walk().perm
    }

    #[must_use]
    pub fn present(&self) -> bool {
        self.perm().present()
    }

    #[must_use]
    pub fn writable(&self) -> bool {
        self.perm().writable()
    }

    /// Whether user code may access the cursor's address.
    #[must_use]
    pub fn user(&self) -> bool {
        self.perm().allows(PageEntryBits::USER_RO)
    }

    /// Move the cursor to `va`.
    pub const fn find(&mut self, va: VirtualAddress) -> &mut Self {
        self.va = va;
        self
    }

    /// Move the cursor to the start of the next page.
    pub const fn next_page(&mut self) -> &mut Self {
        self.va = VirtualAddress::new(self.va.page().base().as_u64() + PAGE_SIZE);
        self
    }

    /// Install `pa` with `perm` at the cursor's page, replacing any previous
    /// mapping.
    ///
    /// Missing intermediate tables are allocated from `alloc` and zeroed.
    /// When `perm` is not present and a level is missing there is nothing to
    /// clear, so no tables are allocated.
    ///
    /// # Errors
    /// - [`MapError::NonCanonical`] if bits 63:47 of the cursor differ.
    /// - [`MapError::Unaligned`] if the cursor (or, for present mappings,
    ///   `pa`) is not page-aligned.
    /// - [`MapError::OutOfMemory`] if a table could not be allocated; no
    ///   leaf is written in that case.
    /// - [`MapError::LargePage`] / [`MapError::Unbacked`] for tables the
    ///   cursor cannot descend through.
    pub fn map<A: FrameAlloc<M> + ?Sized>(
        &mut self,
        alloc: &mut A,
        pa: PhysicalAddress,
        perm: PageEntryBits,
    ) -> Result<(), MapError> {
        let va = self.va;
        if !va.is_canonical() {
            return Err(MapError::NonCanonical(va));
        }
        if !va.is_page_aligned() || (perm.present() && !pa.is_page_aligned()) {
            return Err(MapError::Unaligned { va, pa });
        }

        let mut table = self.root;
        let mut level = TableLevel::Pml4;
        while let Some(child) = level.child() {
            let index = level.index_of(va);
            let entry = read_entry(&*self.mapper, table, index).ok_or(MapError::Unbacked(table))?;

            if entry.present() {
                if entry.large_page() {
                    return Err(MapError::LargePage(va));
                }
                table = entry.physical_address().page();
            } else {
                if !perm.present() {
                    return Ok(());
                }

                let next = alloc
                    .alloc_4k(&mut *self.mapper)
                    .ok_or(MapError::OutOfMemory(child))?;
                self.mapper
                    .frame_mut(next)
                    .ok_or(MapError::Unbacked(next))?
                    .fill(0);
                write_entry(&mut *self.mapper, table, index, PageEntryBits::table_link(next))
                    .ok_or(MapError::Unbacked(table))?;

                log::trace!("allocated {child} table {next} for {va}");
                table = next;
            }
            level = child;
        }

        let leaf = perm.permissions().with_address(pa);
        write_entry(&mut *self.mapper, table, TableLevel::Pt.index_of(va), leaf)
            .ok_or(MapError::Unbacked(table))
    }
}
