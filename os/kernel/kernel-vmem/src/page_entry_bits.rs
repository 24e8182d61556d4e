use kernel_memory_addresses::{PhysicalAddress, PhysicalPage};
use bitfield_struct::bitfield;

/// A single 64-bit x86-64 page table entry in its raw bitfield form.
///
/// This models the **common superset** of fields found in all four paging
/// levels (PML4E, PDPTE, PDE, PTE). An entry either points to the next-level
/// table or, at the last level (or with `large_page` set), maps a page.
///
/// ### Bit layout
///
/// | Bits      | Name / Mnemonic   | Meaning |
/// |-----------|-------------------|----------|
/// | 0         | `P` (present)     | Valid entry if set |
/// | 1         | `RW`              | Writable if set |
/// | 2         | `US`              | User-mode accessible if set |
/// | 3         | `PWT`             | Write-through caching |
/// | 4         | `PCD`             | Disable caching |
/// | 5         | `A`               | Accessed |
/// | 6         | `D`               | Dirty (leaf only) |
/// | 7         | `PS`              | Large page flag |
/// | 8         | `G`               | Global (leaf only) |
/// | 9–11      | OS avail low      | Reserved for OS use |
/// | 12–51     | `addr`            | Physical frame bits [51:12] |
/// | 52–62     | OS avail high     | Reserved for OS use |
/// | 63        | `NX`              | Execute disable |
///
/// The kernel only ever sets `P`, `RW` and `US`; see [`PageEntryBits::permissions`].
///
/// ### Example
/// ```rust
/// # use kernel_memory_addresses::PhysicalAddress;
/// # use kernel_vmem::PageEntryBits;
/// let e = PageEntryBits::USER_RW.with_address(PhysicalAddress::new(0x12_3000));
/// assert!(e.present() && e.writable() && e.user_access());
/// assert_eq!(e.physical_address().as_u64(), 0x12_3000);
/// assert_eq!(e.into_bits(), 0x12_3007);
/// ```
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct PageEntryBits {
    /// Present (P, bit 0).
    pub present: bool,

    /// Writable (RW, bit 1).
    ///
    /// Writes through a clear entry fault, in user and kernel mode alike.
    pub writable: bool,

    /// User/Supervisor (US, bit 2).
    ///
    /// Set to allow user-mode access; clear restricts to supervisor only.
    pub user_access: bool,

    /// Page Write-Through (PWT, bit 3).
    pub write_through: bool,

    /// Page Cache Disable (PCD, bit 4).
    pub cache_disabled: bool,

    /// Accessed (A, bit 5).
    pub accessed: bool,

    /// Dirty (D, bit 6), leaf only.
    pub dirty: bool,

    /// Large Page / Page Size (PS, bit 7).
    ///
    /// Marks a 1 GiB (PDPTE) or 2 MiB (PDE) leaf. The kernel never creates
    /// these, but the walker honors them.
    pub large_page: bool,

    /// Global (G, bit 8), leaf only.
    pub global_translation: bool,

    /// OS-available (bits 9..=11).
    #[bits(3)]
    pub os_available_low: u8,

    /// Physical address bits [51:12] (bits 12..=51).
    #[bits(40)]
    phys_addr_bits_51_12: u64,

    /// OS-available (bits 52..=62).
    #[bits(11)]
    pub os_available_high: u16,

    /// No-Execute (NX, bit 63).
    pub no_execute: bool,
}

impl PageEntryBits {
    /// Not present.
    pub const NONE: Self = Self::new();

    /// `P|W`: kernel-only read/write.
    pub const KERNEL_RW: Self = Self::new().with_present(true).with_writable(true);

    /// `P|W|U`: user read/write.
    pub const USER_RW: Self = Self::KERNEL_RW.with_user_access(true);

    /// `P|U`: user read-only.
    pub const USER_RO: Self = Self::new().with_present(true).with_user_access(true);

    #[inline]
    pub const fn set_physical_address(&mut self, phys: PhysicalAddress) {
        self.set_phys_addr_bits_51_12(phys.as_u64() >> 12);
    }

    #[inline]
    #[must_use]
    pub const fn physical_address(&self) -> PhysicalAddress {
        PhysicalAddress::new(self.phys_addr_bits_51_12() << 12)
    }

    /// Copy of `self` pointing at the page containing `phys`.
    #[inline]
    #[must_use]
    pub const fn with_address(self, phys: PhysicalAddress) -> Self {
        self.with_phys_addr_bits_51_12(phys.as_u64() >> 12)
    }

    /// Link to a next-level table.
    ///
    /// Links carry `P|W|U` so that the leaf alone decides the effective
    /// permissions of a mapping.
    #[inline]
    #[must_use]
    pub const fn table_link(table: PhysicalPage) -> Self {
        Self::USER_RW.with_address(table.base())
    }

    /// Only the `P`, `RW` and `US` bits of this entry.
    #[inline]
    #[must_use]
    pub const fn permissions(self) -> Self {
        Self::new()
            .with_present(self.present())
            .with_writable(self.writable())
            .with_user_access(self.user_access())
    }

    /// Permission bits granted by both `self` and `other`.
    #[inline]
    #[must_use]
    pub const fn intersect(self, other: Self) -> Self {
        Self::from_bits(self.permissions().into_bits() & other.permissions().into_bits())
    }

    /// Whether every permission bit of `required` is granted.
    #[inline]
    #[must_use]
    pub const fn allows(self, required: Self) -> bool {
        let required = required.permissions().into_bits();
        self.permissions().into_bits() & required == required
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_constants_match_hardware_bits() {
        assert_eq!(PageEntryBits::NONE.into_bits(), 0);
        assert_eq!(PageEntryBits::KERNEL_RW.into_bits(), 0b011);
        assert_eq!(PageEntryBits::USER_RW.into_bits(), 0b111);
        assert_eq!(PageEntryBits::USER_RO.into_bits(), 0b101);
    }

    #[test]
    fn permissions_strip_address_and_other_flags() {
        let e = PageEntryBits::USER_RO
            .with_address(PhysicalAddress::new(0x5000))
            .with_accessed(true)
            .with_no_execute(true);
        assert_eq!(e.permissions(), PageEntryBits::USER_RO);
    }

    #[test]
    fn intersection_and_allows() {
        let both = PageEntryBits::USER_RW.intersect(PageEntryBits::KERNEL_RW);
        assert_eq!(both, PageEntryBits::KERNEL_RW);
        assert!(PageEntryBits::USER_RW.allows(PageEntryBits::USER_RO));
        assert!(!PageEntryBits::KERNEL_RW.allows(PageEntryBits::USER_RO));
        assert!(PageEntryBits::NONE.allows(PageEntryBits::NONE));
    }
}
