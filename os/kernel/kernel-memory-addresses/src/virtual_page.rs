use crate::{PAGE_SIZE, VirtualAddress, round_down};
use core::fmt;

/// Page-aligned base of a virtual page.
///
/// ### Examples
/// ```rust
/// # use kernel_memory_addresses::*;
/// let page = VirtualAddress::new(0x0017_FFFF).page();
/// assert_eq!(page.base().as_u64(), 0x0017_F000);
/// assert_eq!(page.next().base().as_u64(), 0x0018_0000);
/// ```
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct VirtualPage(u64);

impl VirtualPage {
    /// The page containing `addr`.
    #[inline]
    #[must_use]
    pub const fn containing(addr: VirtualAddress) -> Self {
        Self(round_down(addr.as_u64()))
    }

    #[inline]
    #[must_use]
    pub const fn base(self) -> VirtualAddress {
        VirtualAddress::new(self.0)
    }

    #[inline]
    #[must_use]
    pub const fn join(self, offset: u64) -> VirtualAddress {
        VirtualAddress::new(self.0 + offset)
    }

    /// The page following this one.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + PAGE_SIZE)
    }
}

impl fmt::Display for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

impl fmt::Debug for VirtualPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualPage({:#010X})", self.0)
    }
}

impl TryFrom<VirtualAddress> for VirtualPage {
    type Error = VirtualAddress;

    #[inline]
    fn try_from(va: VirtualAddress) -> Result<Self, VirtualAddress> {
        if va.is_page_aligned() {
            Ok(va.page())
        } else {
            Err(va)
        }
    }
}
