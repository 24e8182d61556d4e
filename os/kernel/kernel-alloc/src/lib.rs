//! # Kernel Memory Allocation
//!
//! Physical memory and who owns it. This crate provides the machine's RAM,
//! the per-page ownership registry, the page allocator that hands pages to
//! the kernel, and the kernel's byte-level access to a virtual address
//! space.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                Virtual Memory Access (Vmm)          │
//! │    • Kernel reads/writes through a page table       │
//! │    • Faults reported as page-fault error codes      │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │              Physical Memory                        │
//! │    • One 4 KiB frame per physical page              │
//! │    • Backs page tables via PhysMapper               │
//! └─────────────────┬───────────────────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────────────────┐
//! │     Page Registry and Physical Allocator            │
//! │    • Refcount per physical page                     │
//! │    • Forward-only bump cursor                       │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! ### Physical Memory ([`phys_mapper`])
//!
//! [`PhysMemory`] owns the frames. Page `n` lives at physical address
//! `n * 4096`; there is no translation between "physical" and "host".
//!
//! ### Page Registry ([`registry`])
//!
//! [`PageRegistry`] records a refcount per page. Zero means unowned.
//! Processes claim their program pages and explicitly requested pages
//! directly in the registry; everything else comes through the allocator.
//!
//! ### Physical Allocator ([`frame_alloc`])
//!
//! [`PhysicalAllocator::kalloc`] scans forward from a cursor for an
//! allocatable page with refcount zero, claims it and poisons it with
//! `0xCC` so stale data is obvious. Freeing is not supported.
//! The allocator is also the [`FrameAlloc`](kernel_vmem::FrameAlloc) used
//! for page-table pages.
//!
//! ### Virtual Memory Access ([`vmm`])
//!
//! [`Vmm`] copies bytes in and out of an address space with kernel
//! permissions. It is how programs are loaded and how system calls read
//! user buffers.
//!
//! ## Usage
//!
//! ```rust
//! use kernel_alloc::{PhysMemory, PhysicalAllocator, Vmm};
//! use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress};
//! use kernel_vmem::{PageEntryBits, PhysMapper, VmIter};
//!
//! let mut mem = PhysMemory::new();
//! let mut alloc = PhysicalAllocator::new();
//!
//! let root = alloc.kalloc(&mut mem, PAGE_SIZE).unwrap();
//! mem.frame_mut(root).unwrap().fill(0);
//!
//! let page = alloc.kalloc(&mut mem, 64).unwrap();
//! let va = VirtualAddress::new(0x10_0000);
//! VmIter::new(&mut mem, root, va).map(&mut alloc, page.base(), PageEntryBits::USER_RW)?;
//!
//! let mut vmm = Vmm::new(&mut mem, root);
//! vmm.write(va, b"hello")?;
//! assert_eq!(vmm.read_c_string(va, 5)?, "hello");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

pub mod frame_alloc;
pub mod phys_mapper;
pub mod registry;
pub mod vmm;

pub use frame_alloc::{AllocError, KALLOC_POISON, PhysicalAllocator};
pub use phys_mapper::{PhysAccessError, PhysMemory};
pub use registry::{PageRegistry, PhysicalPageInfo, RegistryError};
pub use vmm::{Vmm, VmmError};
