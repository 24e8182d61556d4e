//! # Physical Memory
//!
//! [`PhysMemory`] is the machine's RAM: one [`Frame`] per physical page,
//! page `n` at physical address `n * PAGE_SIZE`. It implements
//! [`PhysMapper`], so page tables live in it like any other data, and offers
//! byte-level access by physical address for loaders and devices.
//!
//! ```rust
//! use kernel_alloc::phys_mapper::PhysMemory;
//! use kernel_memory_addresses::PhysicalAddress;
//!
//! let mut mem = PhysMemory::with_pages(4);
//! mem.write(PhysicalAddress::new(0x1ffe), b"abcd")?;
//!
//! let mut buf = [0u8; 4];
//! mem.read(PhysicalAddress::new(0x1ffe), &mut buf)?;
//! assert_eq!(&buf, b"abcd");
//! # Ok::<(), kernel_alloc::phys_mapper::PhysAccessError>(())
//! ```

use alloc::boxed::Box;
use alloc::vec;
use kernel_info::memory::NPAGES;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalAddress, PhysicalPage};
use kernel_vmem::{Frame, PhysMapper};

/// An access that runs past the end of physical memory.
#[derive(Debug, Copy, Clone, Eq, PartialEq, thiserror::Error)]
#[error("physical range {start}+{len:#x} is outside memory")]
pub struct PhysAccessError {
    pub start: PhysicalAddress,
    pub len: usize,
}

/// Physical RAM as a boxed slice of frames.
pub struct PhysMemory {
    frames: Box<[Frame]>,
}

impl PhysMemory {
    /// Zeroed memory covering the whole physical address space.
    #[must_use]
    pub fn new() -> Self {
        Self::with_pages(NPAGES)
    }

    /// Zeroed memory of `pages` frames.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn with_pages(pages: usize) -> Self {
        Self {
            frames: vec![[0u8; PAGE_SIZE as usize]; pages].into_boxed_slice(),
        }
    }

    /// Number of frames.
    #[inline]
    #[must_use]
    pub fn pages(&self) -> usize {
        self.frames.len()
    }

    /// Copy `buf.len()` bytes starting at `pa` into `buf`.
    ///
    /// # Errors
    /// The range is not entirely backed by memory; `buf` may be partly filled.
    pub fn read(&self, pa: PhysicalAddress, buf: &mut [u8]) -> Result<(), PhysAccessError> {
        let mut done = 0;
        for (page, offset, len) in spans(pa, buf.len())? {
            let frame = self.frame(page).ok_or(PhysAccessError {
                start: pa,
                len: buf.len(),
            })?;
            buf[done..done + len].copy_from_slice(&frame[offset..offset + len]);
            done += len;
        }
        Ok(())
    }

    /// Copy `data` into memory starting at `pa`.
    ///
    /// # Errors
    /// The range is not entirely backed by memory; nothing is written.
    pub fn write(&mut self, pa: PhysicalAddress, data: &[u8]) -> Result<(), PhysAccessError> {
        self.check_range(pa, data.len())?;
        let mut done = 0;
        for (page, offset, len) in spans(pa, data.len())? {
            if let Some(frame) = self.frame_mut(page) {
                frame[offset..offset + len].copy_from_slice(&data[done..done + len]);
            }
            done += len;
        }
        Ok(())
    }

    /// Set `len` bytes starting at `pa` to `byte`.
    ///
    /// # Errors
    /// The range is not entirely backed by memory; nothing is written.
    pub fn fill(&mut self, pa: PhysicalAddress, len: usize, byte: u8) -> Result<(), PhysAccessError> {
        self.check_range(pa, len)?;
        for (page, offset, len) in spans(pa, len)? {
            if let Some(frame) = self.frame_mut(page) {
                frame[offset..offset + len].fill(byte);
            }
        }
        Ok(())
    }

    fn check_range(&self, start: PhysicalAddress, len: usize) -> Result<(), PhysAccessError> {
        let end = start.as_u64().checked_add(len as u64);
        match end {
            Some(end) if end <= self.pages() as u64 * PAGE_SIZE => Ok(()),
            _ => Err(PhysAccessError { start, len }),
        }
    }
}

impl Default for PhysMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysMapper for PhysMemory {
    #[inline]
    fn frame(&self, page: PhysicalPage) -> Option<&Frame> {
        self.frames.get(page.number())
    }

    #[inline]
    fn frame_mut(&mut self, page: PhysicalPage) -> Option<&mut Frame> {
        self.frames.get_mut(page.number())
    }
}

/// Split `[start, start + len)` into `(page, offset, len)` pieces that each
/// stay within one page.
#[allow(clippy::cast_possible_truncation)]
fn spans(
    start: PhysicalAddress,
    len: usize,
) -> Result<impl Iterator<Item = (PhysicalPage, usize, usize)>, PhysAccessError> {
    start
        .checked_add(len as u64)
        .ok_or(PhysAccessError { start, len })?;

    let mut at = start;
    let mut remaining = len;
    Ok(core::iter::from_fn(move || {
        if remaining == 0 {
            return None;
        }
        let (page, offset) = at.split();
        let chunk = remaining.min((PAGE_SIZE - offset) as usize);
        at += chunk as u64;
        remaining -= chunk;
        Some((page, offset as usize, chunk))
    }))
}
