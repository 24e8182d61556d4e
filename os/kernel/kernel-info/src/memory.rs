//! # Memory Layout

use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, round_up};

/// Bytes of physical memory.
pub const MEMSIZE_PHYSICAL: u64 = 0x20_0000;

/// Number of physical pages.
#[allow(clippy::cast_possible_truncation)]
pub const NPAGES: usize = (MEMSIZE_PHYSICAL / PAGE_SIZE) as usize;

/// Extent of the virtual address range shown by the memory viewer.
pub const MEMSIZE_VIRTUAL: u64 = 0x30_0000;

/// First byte of the kernel image.
pub const KERNEL_START_ADDR: u64 = 0x4_0000;

/// One past the last byte of the kernel image.
pub const KERNEL_END_ADDR: u64 = 0x5_0000;

/// Address of the kernel's trap entry code.
///
/// Every page table the kernel switches to must map this identically.
pub const KERNEL_ENTRY_ADDR: u64 = KERNEL_START_ADDR;

/// Top of the kernel stack; the stack occupies the page below.
pub const KERNEL_STACK_TOP: u64 = 0x8_0000;

/// Start of the memory-mapped I/O window.
pub const IO_PHYS_MIN: u64 = 0xA_0000;

/// End of the memory-mapped I/O window.
pub const IO_PHYS_MAX: u64 = 0x10_0000;

/// Physical (and identity-virtual) address of the text console.
pub const CONSOLE_ADDR: u64 = 0xB_8000;

/// Console columns.
pub const CONSOLE_COLUMNS: usize = 80;

/// Console rows.
pub const CONSOLE_ROWS: usize = 25;

/// Whether `pa` is reserved for hardware and never handed out.
///
/// The null page and the I/O window are reserved.
#[must_use]
pub const fn reserved_physical_address(pa: PhysicalAddress) -> bool {
    let pa = pa.as_u64();
    pa < PAGE_SIZE || (pa >= IO_PHYS_MIN && pa < IO_PHYS_MAX)
}

/// Whether `pa` may be handed out by the physical page allocator.
///
/// Excludes reserved memory, the kernel image, the kernel stack page and
/// anything beyond physical memory.
#[must_use]
pub const fn allocatable_physical_address(pa: PhysicalAddress) -> bool {
    let raw = pa.as_u64();
    !reserved_physical_address(pa)
        && (raw < KERNEL_START_ADDR || raw >= round_up(KERNEL_END_ADDR))
        && (raw < KERNEL_STACK_TOP - PAGE_SIZE || raw >= KERNEL_STACK_TOP)
        && raw < MEMSIZE_PHYSICAL
}

const _: () = {
    assert!(MEMSIZE_PHYSICAL.is_multiple_of(PAGE_SIZE));
    assert!(KERNEL_END_ADDR <= KERNEL_STACK_TOP - PAGE_SIZE);
    assert!(CONSOLE_ADDR >= IO_PHYS_MIN && CONSOLE_ADDR < IO_PHYS_MAX);
    assert!(MEMSIZE_VIRTUAL >= MEMSIZE_PHYSICAL);
};

#[cfg(test)]
mod tests {
    use super::*;

    fn pa(v: u64) -> PhysicalAddress {
        PhysicalAddress::new(v)
    }

    #[test]
    fn null_page_and_io_are_reserved() {
        assert!(reserved_physical_address(pa(0)));
        assert!(reserved_physical_address(pa(0xFFF)));
        assert!(!reserved_physical_address(pa(0x1000)));
        assert!(reserved_physical_address(pa(CONSOLE_ADDR)));
        assert!(!reserved_physical_address(pa(IO_PHYS_MAX)));
    }

    #[test]
    fn kernel_image_and_stack_are_not_allocatable() {
        assert!(allocatable_physical_address(pa(0x1000)));
        assert!(!allocatable_physical_address(pa(KERNEL_START_ADDR)));
        assert!(!allocatable_physical_address(pa(KERNEL_END_ADDR - PAGE_SIZE)));
        assert!(allocatable_physical_address(pa(KERNEL_END_ADDR)));
        assert!(!allocatable_physical_address(pa(KERNEL_STACK_TOP - PAGE_SIZE)));
        assert!(allocatable_physical_address(pa(KERNEL_STACK_TOP)));
    }

    #[test]
    fn nothing_beyond_physical_memory_is_allocatable() {
        assert!(allocatable_physical_address(pa(MEMSIZE_PHYSICAL - PAGE_SIZE)));
        assert!(!allocatable_physical_address(pa(MEMSIZE_PHYSICAL)));
        assert_eq!(NPAGES, 512);
    }
}
