//! # Kernel Access to Virtual Memory
//!
//! [`Vmm`] lets the kernel read and write memory through a page table, the
//! way the kernel itself would see it while that table is active. Every byte
//! goes through [`translate`] with kernel-mode permissions, so an unmapped or
//! read-only page is reported as the page fault the kernel would have taken.

use alloc::string::String;
use alloc::vec::Vec;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalPage, VirtualAddress};
use kernel_registers::page_fault::PageFaultError;
use kernel_vmem::{Access, PhysMapper, translate};

#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
pub enum VmmError {
    /// The kernel would have faulted touching `va`.
    #[error("kernel fault at {va}: {}", .error.explain())]
    Fault {
        va: VirtualAddress,
        error: PageFaultError,
    },
    /// The range wraps around the address space.
    #[error("invalid range {start}+{len:#x}")]
    InvalidRange { start: VirtualAddress, len: usize },
    /// A mapping points outside physical memory.
    #[error("{0} is mapped but not backed by memory")]
    Unbacked(PhysicalPage),
}

/// Kernel view of one address space.
pub struct Vmm<'m, M: PhysMapper + ?Sized> {
    mapper: &'m mut M,
    root: PhysicalPage,
}

impl<'m, M: PhysMapper + ?Sized> Vmm<'m, M> {
    pub const fn new(mapper: &'m mut M, root: PhysicalPage) -> Self {
        Self { mapper, root }
    }

    /// Copy `buf.len()` bytes starting at `va` into `buf`.
    ///
    /// # Errors
    /// See [`VmmError`]; `buf` may be partly filled.
    pub fn read(&self, va: VirtualAddress, buf: &mut [u8]) -> Result<(), VmmError> {
        let mut done = 0;
        for (at, len) in spans(va, buf.len())? {
            let (page, offset) = self.resolve(at, Access::KERNEL_READ)?;
            let frame = self.mapper.frame(page).ok_or(VmmError::Unbacked(page))?;
            buf[done..done + len].copy_from_slice(&frame[offset..offset + len]);
            done += len;
        }
        Ok(())
    }

    /// Copy `data` into memory starting at `va`.
    ///
    /// # Errors
    /// See [`VmmError`]; pages before the failing one have been written.
    pub fn write(&mut self, va: VirtualAddress, data: &[u8]) -> Result<(), VmmError> {
        let mut done = 0;
        for (at, len) in spans(va, data.len())? {
            let (page, offset) = self.resolve(at, Access::KERNEL_WRITE)?;
            let frame = self
                .mapper
                .frame_mut(page)
                .ok_or(VmmError::Unbacked(page))?;
            frame[offset..offset + len].copy_from_slice(&data[done..done + len]);
            done += len;
        }
        Ok(())
    }

    /// Set `len` bytes starting at `va` to `byte`.
    ///
    /// # Errors
    /// See [`VmmError`].
    pub fn fill(&mut self, va: VirtualAddress, len: usize, byte: u8) -> Result<(), VmmError> {
        for (at, len) in spans(va, len)? {
            let (page, offset) = self.resolve(at, Access::KERNEL_WRITE)?;
            self.mapper
                .frame_mut(page)
                .ok_or(VmmError::Unbacked(page))?[offset..offset + len]
                .fill(byte);
        }
        Ok(())
    }

    /// Read a NUL-terminated string of at most `max` bytes at `va`.
    ///
    /// Stops at the first NUL or after `max` bytes, whichever comes first,
    /// and never touches bytes past the terminator. Invalid UTF-8 is
    /// replaced.
    ///
    /// # Errors
    /// See [`VmmError`].
    pub fn read_c_string(&self, va: VirtualAddress, max: usize) -> Result<String, VmmError> {
        let mut bytes = Vec::new();
        'pages: for (at, len) in spans(va, max)? {
            let (page, offset) = self.resolve(at, Access::KERNEL_READ)?;
            let frame = self.mapper.frame(page).ok_or(VmmError::Unbacked(page))?;
            for &b in &frame[offset..offset + len] {
                if b == 0 {
                    break 'pages;
                }
                bytes.push(b);
            }
        }
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn resolve(&self, va: VirtualAddress, access: Access) -> Result<(PhysicalPage, usize), VmmError> {
        let pa = translate(&*self.mapper, self.root, va, access)
            .map_err(|error| VmmError::Fault { va, error })?;
        let (page, offset) = pa.split();
        Ok((page, offset as usize))
    }
}

/// Split `[start, start + len)` into `(va, len)` pieces that each stay
/// within one page.
#[allow(clippy::cast_possible_truncation)]
fn spans(
    start: VirtualAddress,
    len: usize,
) -> Result<impl Iterator<Item = (VirtualAddress, usize)>, VmmError> {
    start
        .checked_add(len as u64)
        .ok_or(VmmError::InvalidRange { start, len })?;

    let mut at = start;
    let mut remaining = len;
    Ok(core::iter::from_fn(move || {
        if remaining == 0 {
            return None;
        }
        let chunk = remaining.min((PAGE_SIZE - at.offset()) as usize);
        let here = at;
        at += chunk as u64;
        remaining -= chunk;
        Some((here, chunk))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame_alloc::PhysicalAllocator;
    use crate::phys_mapper::PhysMemory;
    use kernel_memory_addresses::PhysicalAddress;
    use kernel_vmem::{PageEntryBits, VmIter};

    fn va(v: u64) -> VirtualAddress {
        VirtualAddress::new(v)
    }

    /// Memory with `0x10_0000..0x10_2000` mapped writable and `0x10_2000`
    /// mapped read-only, identity.
    fn setup() -> (PhysMemory, PhysicalPage) {
        let mut mem = PhysMemory::new();
        let mut alloc = PhysicalAllocator::new();
        let root = alloc.kalloc(&mut mem, PAGE_SIZE).unwrap();
        mem.frame_mut(root).unwrap().fill(0);

        let mut it = VmIter::new(&mut mem, root, va(0x10_0000));
        for perm in [PageEntryBits::USER_RW, PageEntryBits::USER_RW, PageEntryBits::USER_RO] {
            let pa = it.va().identity();
            it.map(&mut alloc, pa, perm).unwrap();
            it.next_page();
        }
        (mem, root)
    }

    #[test]
    fn write_and_read_across_pages() {
        let (mut mem, root) = setup();
        let mut vmm = Vmm::new(&mut mem, root);
        vmm.write(va(0x10_0ffe), b"page").unwrap();

        let mut buf = [0u8; 4];
        vmm.read(va(0x10_0ffe), &mut buf).unwrap();
        assert_eq!(&buf, b"page");

        let mut tail = [0u8; 2];
        mem.read(PhysicalAddress::new(0x10_1000), &mut tail).unwrap();
        assert_eq!(&tail, b"ge");
    }

    #[test]
    fn writing_read_only_page_faults() {
        let (mut mem, root) = setup();
        let mut vmm = Vmm::new(&mut mem, root);
        let err = vmm.fill(va(0x10_1ff0), 0x20, 0xAA).unwrap_err();
        let VmmError::Fault { va: at, error } = err else {
            panic!("unexpected {err:?}");
        };
        assert_eq!(at, va(0x10_2000));
        assert!(error.present() && error.write() && !error.user());
    }

    #[test]
    fn reading_unmapped_page_faults() {
        let (mut mem, root) = setup();
        let vmm = Vmm::new(&mut mem, root);
        let mut buf = [0u8; 1];
        let err = vmm.read(va(0x10_3000), &mut buf).unwrap_err();
        assert!(matches!(err, VmmError::Fault { error, .. } if !error.present()));
    }

    #[test]
    fn c_string_stops_at_nul_or_limit() {
        let (mut mem, root) = setup();
        let mut vmm = Vmm::new(&mut mem, root);
        vmm.write(va(0x10_0100), b"oops\0trailing").unwrap();
        assert_eq!(vmm.read_c_string(va(0x10_0100), 160).unwrap(), "oops");
        assert_eq!(vmm.read_c_string(va(0x10_0100), 2).unwrap(), "oo");
    }

    #[test]
    fn c_string_does_not_read_past_terminator() {
        let (mut mem, root) = setup();
        // Terminator is the last byte of the last mapped page.
        mem.write(PhysicalAddress::new(0x10_2ffe), b"x\0").unwrap();
        let vmm = Vmm::new(&mut mem, root);
        assert_eq!(vmm.read_c_string(va(0x10_2ffe), 160).unwrap(), "x");
        assert!(vmm.read_c_string(va(0x10_2fff), 160).unwrap().is_empty());
    }
}
