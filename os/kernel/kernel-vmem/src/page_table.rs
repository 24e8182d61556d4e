//! # Page Table Levels and Walks
//!
//! Page tables live in physical frames owned by a [`PhysMapper`]. Entries are
//! stored little-endian, 8 bytes each, 512 per table.

use crate::{PageEntryBits, PhysMapper};
use core::fmt;
use kernel_memory_addresses::{PAGE_SHIFT, PhysicalAddress, PhysicalPage, VirtualAddress};

/// Entries per page table.
pub const ENTRIES_PER_TABLE: usize = 512;

const ENTRY_BYTES: usize = 8;

/// One of the four paging levels, from the root down.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum TableLevel {
    /// Page Table: entries map 4 KiB pages.
    Pt = 0,
    /// Page Directory.
    Pd = 1,
    /// Page Directory Pointer Table.
    Pdpt = 2,
    /// Page Map Level 4: the root.
    Pml4 = 3,
}

impl TableLevel {
    /// Index into a table at this level selected by `va`.
    ///
    /// ```rust
    /// # use kernel_vmem::TableLevel;
    /// # use kernel_memory_addresses::VirtualAddress;
    /// let va = VirtualAddress::new(0x0000_0080_4020_1000);
    /// assert_eq!(TableLevel::Pml4.index_of(va), 1);
    /// assert_eq!(TableLevel::Pdpt.index_of(va), 1);
    /// assert_eq!(TableLevel::Pd.index_of(va), 1);
    /// assert_eq!(TableLevel::Pt.index_of(va), 1);
    /// ```
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn index_of(self, va: VirtualAddress) -> usize {
        ((va.as_u64() >> self.shift()) & 0x1FF) as usize
    }

    /// Bytes covered by one entry at this level.
    #[inline]
    #[must_use]
    pub const fn entry_span(self) -> u64 {
        1 << self.shift()
    }

    /// The level below this one, if any.
    #[inline]
    #[must_use]
    pub const fn child(self) -> Option<Self> {
        match self {
            Self::Pml4 => Some(Self::Pdpt),
            Self::Pdpt => Some(Self::Pd),
            Self::Pd => Some(Self::Pt),
            Self::Pt => None,
        }
    }

    const fn shift(self) -> u32 {
        PAGE_SHIFT + 9 * self as u32
    }
}

impl fmt::Display for TableLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pml4 => "PML4",
            Self::Pdpt => "PDPT",
            Self::Pd => "PD",
            Self::Pt => "PT",
        })
    }
}

/// Read entry `index` of the table in frame `table`.
///
/// Returns `None` if the frame is not backed by memory.
#[must_use]
pub fn read_entry<M: PhysMapper + ?Sized>(
    mapper: &M,
    table: PhysicalPage,
    index: usize,
) -> Option<PageEntryBits> {
    debug_assert!(index < ENTRIES_PER_TABLE);
    let frame = mapper.frame(table)?;
    let offset = index * ENTRY_BYTES;
    let mut raw = [0u8; ENTRY_BYTES];
    raw.copy_from_slice(&frame[offset..offset + ENTRY_BYTES]);
    Some(PageEntryBits::from_bits(u64::from_le_bytes(raw)))
}

/// Write entry `index` of the table in frame `table`.
///
/// Returns `None` if the frame is not backed by memory.
pub fn write_entry<M: PhysMapper + ?Sized>(
    mapper: &mut M,
    table: PhysicalPage,
    index: usize,
    entry: PageEntryBits,
) -> Option<()> {
    debug_assert!(index < ENTRIES_PER_TABLE);
    let frame = mapper.frame_mut(table)?;
    let offset = index * ENTRY_BYTES;
    frame[offset..offset + ENTRY_BYTES].copy_from_slice(&entry.into_bits().to_le_bytes());
    Some(())
}

/// Result of walking a page table for one virtual address.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Walk {
    /// The mapping entry, or `None` if some level was not present.
    pub leaf: Option<PageEntryBits>,
    /// Level at which the walk ended.
    pub level: TableLevel,
    /// `P|W|U` granted by every level of the walk; empty if not present.
    pub perm: PageEntryBits,
}

impl Walk {
    /// Physical address `va` translates to, if mapped.
    #[must_use]
    pub const fn physical_address(&self, va: VirtualAddress) -> Option<PhysicalAddress> {
        match self.leaf {
            Some(leaf) => {
                let base = leaf.physical_address().as_u64();
                let offset = va.as_u64() & (self.level.entry_span() - 1);
                Some(PhysicalAddress::new(base + offset))
            }
            None => None,
        }
    }
}

/// Walk the table rooted at `root` for `va`, the way the MMU would.
///
/// A `large_page` entry at the PDPT or PD level ends the walk as a leaf.
/// Tables whose frames are not backed by memory count as not present, and
/// so does every non-canonical address.
#[must_use]
pub fn walk<M: PhysMapper + ?Sized>(mapper: &M, root: PhysicalPage, va: VirtualAddress) -> Walk {
    let mut perm = PageEntryBits::USER_RW;
    let mut table = root;
    let mut level = TableLevel::Pml4;
    let missing = |level| Walk {
        leaf: None,
        level,
        perm: PageEntryBits::NONE,
    };
    if !va.is_canonical() {
        return missing(level);
    }

    loop {
        let entry = read_entry(mapper, table, level.index_of(va)).unwrap_or(PageEntryBits::NONE);
        if !entry.present() {
            return missing(level);
        }

        perm = perm.intersect(entry);
        let large = entry.large_page() && matches!(level, TableLevel::Pdpt | TableLevel::Pd);
        match level.child() {
            Some(child) if !large => {
                table = entry.physical_address().page();
                level = child;
            }
            _ => {
                return Walk {
                    leaf: Some(entry),
                    level,
                    perm,
                };
            }
        }
    }
}
