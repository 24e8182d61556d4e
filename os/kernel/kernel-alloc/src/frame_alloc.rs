//! # Physical Page Allocator
//!
//! A bump allocator over the page registry. The cursor only moves forward:
//! pages below it are never reconsidered, even once their refcount drops.

use crate::registry::PageRegistry;
use kernel_info::memory::{MEMSIZE_PHYSICAL, allocatable_physical_address};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage};
use kernel_vmem::{FrameAlloc, PhysMapper};

/// Byte pattern freshly allocated pages are filled with.
pub const KALLOC_POISON: u8 = 0xCC;

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum AllocError {
    #[error("freeing {0} is not supported")]
    FreeUnsupported(PhysicalPage),
}

/// Hands out allocatable physical pages with refcount zero.
#[derive(Debug, Clone)]
pub struct PhysicalAllocator {
    pages: PageRegistry,
    next_alloc: PhysicalAddress,
}

impl PhysicalAllocator {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pages: PageRegistry::new(),
            next_alloc: PhysicalAddress::zero(),
        }
    }

    /// The page registry the allocator draws from.
    #[inline]
    #[must_use]
    pub const fn pages(&self) -> &PageRegistry {
        &self.pages
    }

    /// Mutable access for owners that take pages without allocating them
    /// (program segments, user page requests).
    #[inline]
    pub const fn pages_mut(&mut self) -> &mut PageRegistry {
        &mut self.pages
    }

    /// Next physical address the allocator will consider.
    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> PhysicalAddress {
        self.next_alloc
    }

    /// Allocate one page for a request of `size` bytes.
    ///
    /// Requests larger than a page fail. A successful allocation always
    /// covers a whole page, has refcount 1 and is filled with
    /// [`KALLOC_POISON`]. Returns `None` once the cursor has passed the end
    /// of physical memory.
    pub fn kalloc<M: PhysMapper + ?Sized>(
        &mut self,
        mem: &mut M,
        size: u64,
    ) -> Option<PhysicalPage> {
        if size > PAGE_SIZE {
            log::warn!("kalloc: {size} bytes is more than a page");
            return None;
        }

        while self.next_alloc.as_u64() < MEMSIZE_PHYSICAL {
            let pa = self.next_alloc;
            self.next_alloc += PAGE_SIZE;

            let page = pa.page();
            if !allocatable_physical_address(pa) || !self.pages.is_free(page) {
                continue;
            }
            let Some(frame) = mem.frame_mut(page) else {
                continue;
            };
            frame.fill(KALLOC_POISON);
            if self.pages.acquire(page).is_ok() {
                log::trace!("kalloc: {page}");
                return Some(page);
            }
        }

        log::debug!("kalloc: physical memory exhausted");
        None
    }

    /// Return a page to the allocator.
    ///
    /// Freeing nothing is a no-op.
    ///
    /// # Errors
    /// Releasing an actual page is not supported.
    #[allow(clippy::unused_self)]
    pub fn kfree(&mut self, page: Option<PhysicalPage>) -> Result<(), AllocError> {
        match page {
            None => Ok(()),
            Some(page) => Err(AllocError::FreeUnsupported(page)),
        }
    }
}

impl Default for PhysicalAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: PhysMapper + ?Sized> FrameAlloc<M> for PhysicalAllocator {
    fn alloc_4k(&mut self, mapper: &mut M) -> Option<PhysicalPage> {
        self.kalloc(mapper, PAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phys_mapper::PhysMemory;
    use kernel_info::memory::{KERNEL_START_ADDR, NPAGES};

    #[test]
    fn first_allocation_skips_null_page() {
        let mut mem = PhysMemory::new();
        let mut alloc = PhysicalAllocator::new();

        let page = alloc.kalloc(&mut mem, 1).unwrap();
        assert_eq!(page.base().as_u64(), PAGE_SIZE);
        assert_eq!(alloc.pages().refcount(page), Some(1));
        assert!(mem.frame(page).unwrap().iter().all(|&b| b == KALLOC_POISON));
    }

    #[test]
    fn oversized_request_fails_without_moving_cursor() {
        let mut mem = PhysMemory::new();
        let mut alloc = PhysicalAllocator::new();
        assert_eq!(alloc.kalloc(&mut mem, PAGE_SIZE + 1), None);
        assert_eq!(alloc.cursor(), PhysicalAddress::zero());
        assert!(alloc.kalloc(&mut mem, PAGE_SIZE).is_some());
    }

    #[test]
    fn owned_pages_are_skipped() {
        let mut mem = PhysMemory::new();
        let mut alloc = PhysicalAllocator::new();
        alloc.pages_mut().acquire(PhysicalPage::from_number(1)).unwrap();

        let page = alloc.kalloc(&mut mem, 8).unwrap();
        assert_eq!(page, PhysicalPage::from_number(2));
    }

    #[test]
    fn every_allocation_is_allocatable_and_distinct() {
        let mut mem = PhysMemory::new();
        let mut alloc = PhysicalAllocator::new();

        let mut seen = vec![false; NPAGES];
        while let Some(page) = alloc.kalloc(&mut mem, PAGE_SIZE) {
            assert!(allocatable_physical_address(page.base()));
            assert!(!seen[page.number()], "{page} handed out twice");
            seen[page.number()] = true;
        }
        assert!(!seen[PhysicalPage::containing(PhysicalAddress::new(KERNEL_START_ADDR)).number()]);
        assert!(alloc.cursor().as_u64() >= MEMSIZE_PHYSICAL);
        assert_eq!(alloc.kalloc(&mut mem, 1), None);
    }

    #[test]
    fn free_is_unsupported() {
        let mut alloc = PhysicalAllocator::new();
        assert_eq!(alloc.kfree(None), Ok(()));
        let page = PhysicalPage::from_number(3);
        assert_eq!(alloc.kfree(Some(page)), Err(AllocError::FreeUnsupported(page)));
    }
}
