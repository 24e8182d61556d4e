//! # Program Images
//!
//! What the process loader consumes: an entry point and an ordered list of
//! loadable segments, each much like an ELF `PT_LOAD` header.
//!
//! ```text
//!   va            va + data.len()          va + size
//!   ├──── data ───────┼──── zero fill ───────┤
//! ```
//!
//! A [`ProgramBundle`] collects named images. Images are position dependent,
//! so each one records the process id it was built for.
//!
//! ```rust
//! use kernel_memory_addresses::VirtualAddress;
//! use program_image::{ProgramBundle, ProgramImage, ProgramSource, Segment};
//!
//! let text = Segment::new(VirtualAddress::new(0x10_0000), 0x1000, vec![0xF4])?;
//! let image = ProgramImage::new("halt", 1, VirtualAddress::new(0x10_0000)).with_segment(text);
//!
//! let mut bundle = ProgramBundle::new();
//! bundle.insert(image);
//! assert!(bundle.contains("halt"));
//! assert_eq!(bundle.program_image("halt", 1).map(ProgramImage::entry), Some(VirtualAddress::new(0x10_0000)));
//! assert!(bundle.program_image("halt", 2).is_none());
//! # Ok::<(), program_image::ImageError>(())
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

use alloc::string::String;
use alloc::vec::Vec;
use core::ops::Range;
use kernel_memory_addresses::{PAGE_OFFSET_MASK, VirtualAddress, round_down, round_up};

#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum ImageError {
    #[error("segment at {va} holds {data_len} bytes of data but is only {size} bytes long")]
    DataLargerThanSegment {
        va: VirtualAddress,
        data_len: u64,
        size: u64,
    },
    #[error("segment at {va} of {size} bytes wraps the address space")]
    AddressOverflow { va: VirtualAddress, size: u64 },
}

/// One loadable segment.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Segment {
    va: VirtualAddress,
    size: u64,
    data: Vec<u8>,
}

impl Segment {
    /// A segment of `size` bytes at `va` whose first bytes are `data`.
    ///
    /// # Errors
    /// `data` is longer than `size`, or the segment's last page wraps around.
    pub fn new(va: VirtualAddress, size: u64, data: Vec<u8>) -> Result<Self, ImageError> {
        let data_len = data.len() as u64;
        if data_len > size {
            return Err(ImageError::DataLargerThanSegment { va, data_len, size });
        }
        let fits = va
            .as_u64()
            .checked_add(size)
            .and_then(|end| end.checked_add(PAGE_OFFSET_MASK))
            .is_some();
        if !fits {
            return Err(ImageError::AddressOverflow { va, size });
        }
        Ok(Self { va, size, data })
    }

    #[inline]
    #[must_use]
    pub const fn va(&self) -> VirtualAddress {
        self.va
    }

    /// In-memory size.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Initialized bytes; the rest of the segment is zero.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// The segment widened to whole pages.
    #[must_use]
    pub const fn page_range(&self) -> Range<u64> {
        round_down(self.va.as_u64())..round_up(self.va.as_u64() + self.size)
    }
}

/// An executable image built for one process.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProgramImage {
    name: String,
    pid: usize,
    entry: VirtualAddress,
    segments: Vec<Segment>,
}

impl ProgramImage {
    #[must_use]
    pub fn new(name: impl Into<String>, pid: usize, entry: VirtualAddress) -> Self {
        Self {
            name: name.into(),
            pid,
            entry,
            segments: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_segment(mut self, segment: Segment) -> Self {
        self.push_segment(segment);
        self
    }

    pub fn push_segment(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process id whose window the image was built for.
    #[inline]
    #[must_use]
    pub const fn pid(&self) -> usize {
        self.pid
    }

    #[inline]
    #[must_use]
    pub const fn entry(&self) -> VirtualAddress {
        self.entry
    }

    /// Segments in load order.
    pub fn segments(&self) -> impl ExactSizeIterator<Item = &Segment> + '_ {
        self.segments.iter()
    }
}

/// Where the loader gets images from.
pub trait ProgramSource {
    /// The image called `name` built for process `pid`.
    fn program_image(&self, name: &str, pid: usize) -> Option<&ProgramImage>;

    /// Whether any image is called `name`.
    fn contains(&self, name: &str) -> bool;
}

/// A set of named images.
#[derive(Debug, Clone, Default)]
pub struct ProgramBundle {
    images: Vec<ProgramImage>,
}

impl ProgramBundle {
    #[must_use]
    pub const fn new() -> Self {
        Self { images: Vec::new() }
    }

    /// Add `image`, replacing one with the same name and pid.
    pub fn insert(&mut self, image: ProgramImage) {
        match self
            .images
            .iter_mut()
            .find(|i| i.name == image.name && i.pid == image.pid)
        {
            Some(slot) => *slot = image,
            None => self.images.push(image),
        }
    }

    /// Distinct image names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.images
            .iter()
            .enumerate()
            .filter(|(i, image)| !self.images[..*i].iter().any(|p| p.name == image.name))
            .map(|(_, image)| image.name())
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &ProgramImage> + '_ {
        self.images.iter()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.images.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

impl ProgramSource for ProgramBundle {
    fn program_image(&self, name: &str, pid: usize) -> Option<&ProgramImage> {
        self.images
            .iter()
            .find(|image| image.name == name && image.pid == pid)
    }

    fn contains(&self, name: &str) -> bool {
        self.images.iter().any(|image| image.name == name)
    }
}

impl Extend<ProgramImage> for ProgramBundle {
    fn extend<T: IntoIterator<Item = ProgramImage>>(&mut self, iter: T) {
        for image in iter {
            self.insert(image);
        }
    }
}

impl FromIterator<ProgramImage> for ProgramBundle {
    fn from_iter<T: IntoIterator<Item = ProgramImage>>(iter: T) -> Self {
        let mut bundle = Self::new();
        bundle.extend(iter);
        bundle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn va(v: u64) -> VirtualAddress {
        VirtualAddress::new(v)
    }

    #[test]
    fn data_may_not_exceed_segment() {
        assert_eq!(
            Segment::new(va(0x10_0000), 2, vec![1, 2, 3]),
            Err(ImageError::DataLargerThanSegment {
                va: va(0x10_0000),
                data_len: 3,
                size: 2
            })
        );
        assert!(Segment::new(va(0x10_0000), 3, vec![1, 2, 3]).is_ok());
    }

    #[test]
    fn wrapping_segment_is_rejected() {
        let err = Segment::new(va(u64::MAX - 0x10), 0x100, Vec::new());
        assert!(matches!(err, Err(ImageError::AddressOverflow { .. })));
        let err = Segment::new(va(u64::MAX - 0x10), 0x8, Vec::new());
        assert!(matches!(err, Err(ImageError::AddressOverflow { .. })));
    }

    #[test]
    fn page_range_covers_partial_pages() {
        let seg = Segment::new(va(0x10_0800), 0x1000, Vec::new()).unwrap();
        assert_eq!(seg.page_range(), 0x10_0000..0x10_2000);
    }

    #[test]
    fn bundle_is_keyed_by_name_and_pid() {
        let mut bundle: ProgramBundle = [
            ProgramImage::new("a", 1, va(0x10_0000)),
            ProgramImage::new("a", 2, va(0x14_0000)),
            ProgramImage::new("b", 1, va(0x10_0000)),
        ]
        .into_iter()
        .collect();
        bundle.insert(ProgramImage::new("a", 1, va(0x10_0010)));

        assert_eq!(bundle.len(), 3);
        assert_eq!(bundle.names().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(
            bundle.program_image("a", 1).map(ProgramImage::entry),
            Some(va(0x10_0010))
        );
        assert!(!bundle.contains("c"));
    }
}
