//! # Physical Page Registry
//!
//! One record per physical page. A refcount of zero means the page is
//! unowned; anything else means some process or kernel structure holds it.

use kernel_info::memory::NPAGES;
use kernel_memory_addresses::PhysicalPage;

/// Bookkeeping for one physical page.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct PhysicalPageInfo {
    /// Number of owners of the page.
    pub refcount: u8,
}

impl PhysicalPageInfo {
    #[inline]
    #[must_use]
    pub const fn is_free(self) -> bool {
        self.refcount == 0
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("no physical page {0}")]
    NoSuchPage(PhysicalPage),
    #[error("refcount of {0} overflowed")]
    Overflow(PhysicalPage),
}

/// Refcounts for every page of physical memory.
#[derive(Debug, Clone)]
pub struct PageRegistry {
    pages: [PhysicalPageInfo; NPAGES],
}

impl PageRegistry {
    /// A registry with every page unowned.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pages: [PhysicalPageInfo { refcount: 0 }; NPAGES],
        }
    }

    #[inline]
    #[must_use]
    pub fn get(&self, page: PhysicalPage) -> Option<PhysicalPageInfo> {
        self.pages.get(page.number()).copied()
    }

    /// Refcount of `page`, or `None` outside physical memory.
    #[inline]
    #[must_use]
    pub fn refcount(&self, page: PhysicalPage) -> Option<u8> {
        self.get(page).map(|info| info.refcount)
    }

    /// Whether `page` exists and has no owner.
    #[inline]
    #[must_use]
    pub fn is_free(&self, page: PhysicalPage) -> bool {
        self.get(page).is_some_and(PhysicalPageInfo::is_free)
    }

    /// Add an owner to `page`, returning the new refcount.
    ///
    /// # Errors
    /// The page is outside physical memory or its refcount is saturated.
    pub fn acquire(&mut self, page: PhysicalPage) -> Result<u8, RegistryError> {
        let info = self
            .pages
            .get_mut(page.number())
            .ok_or(RegistryError::NoSuchPage(page))?;
        info.refcount = info
            .refcount
            .checked_add(1)
            .ok_or(RegistryError::Overflow(page))?;
        Ok(info.refcount)
    }

    /// Iterate over `(page, info)` for all of physical memory.
    pub fn iter(&self) -> impl Iterator<Item = (PhysicalPage, PhysicalPageInfo)> + '_ {
        self.pages
            .iter()
            .enumerate()
            .map(|(n, info)| (PhysicalPage::from_number(n), *info))
    }
}

impl Default for PageRegistry {
    fn default() -> Self {
        Self::new()
    }
}
