use crate::{PAGE_SHIFT, PAGE_SIZE, PhysicalAddress, round_down};
use core::fmt;

/// Page-aligned base of a physical page.
///
/// ### Invariants
/// - The low [`PAGE_SHIFT`] bits of the base are always zero.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let page = PhysicalAddress::new(0x0004_1234).page();
/// assert_eq!(page.base().as_u64(), 0x0004_1000);
/// assert_eq!(page.number(), 0x41);
/// assert_eq!(page.join(0x234).as_u64(), 0x0004_1234);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalPage(u64);

impl PhysicalPage {
    /// The page containing `addr`.
    #[inline]
    #[must_use]
    pub const fn containing(addr: PhysicalAddress) -> Self {
        Self(round_down(addr.as_u64()))
    }

    /// The page with page number `n` (`n * PAGE_SIZE`).
    #[inline]
    #[must_use]
    pub const fn from_number(n: usize) -> Self {
        Self((n as u64) << PAGE_SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> PhysicalAddress {
        PhysicalAddress::new(self.0)
    }

    /// Page number, suitable for indexing per-page arrays.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn number(self) -> usize {
        (self.0 >> PAGE_SHIFT) as usize
    }

    #[inline]
    #[must_use]
    pub const fn join(self, offset: u64) -> PhysicalAddress {
        PhysicalAddress::new(self.0 + offset)
    }

    /// The page following this one.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + PAGE_SIZE)
    }
}

impl fmt::Display for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl fmt::Debug for PhysicalPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysicalPage({:#010X})", self.0)
    }
}

impl TryFrom<PhysicalAddress> for PhysicalPage {
    type Error = PhysicalAddress;

    /// Accepts page-aligned addresses only; hands back the address otherwise.
    #[inline]
    fn try_from(pa: PhysicalAddress) -> Result<Self, PhysicalAddress> {
        if pa.is_page_aligned() {
            Ok(pa.page())
        } else {
            Err(pa)
        }
    }
}
