//! # Address Translation with Access Checks
//!
//! What the MMU does on every memory access: walk the table, intersect the
//! permissions, and either produce a physical address or a page-fault error
//! code.

use crate::page_table::walk;
use crate::{PageEntryBits, PhysMapper};
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, VirtualAddress};
use kernel_registers::page_fault::PageFaultError;

/// Kind of memory access.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AccessKind {
    Read,
    Write,
    Execute,
}

/// A memory access to check against a page table.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Access {
    pub kind: AccessKind,
    /// Access made by user-mode code.
    pub user: bool,
}

impl Access {
    pub const USER_READ: Self = Self::new(AccessKind::Read, true);
    pub const USER_WRITE: Self = Self::new(AccessKind::Write, true);
    pub const USER_EXECUTE: Self = Self::new(AccessKind::Execute, true);
    pub const KERNEL_READ: Self = Self::new(AccessKind::Read, false);
    pub const KERNEL_WRITE: Self = Self::new(AccessKind::Write, false);

    #[must_use]
    pub const fn new(kind: AccessKind, user: bool) -> Self {
        Self { kind, user }
    }

    /// Permission bits the access needs at every level.
    const fn required(self) -> PageEntryBits {
        let bits = PageEntryBits::new()
            .with_present(true)
            .with_user_access(self.user);
        match self.kind {
            AccessKind::Write => bits.with_writable(true),
            AccessKind::Read | AccessKind::Execute => bits,
        }
    }

    /// Error code reported for a failed access; `present` tells a protection
    /// problem from a missing page.
    const fn fault(self, present: bool) -> PageFaultError {
        PageFaultError::new()
            .with_present(present)
            .with_write(matches!(self.kind, AccessKind::Write))
            .with_user(self.user)
            .with_instruction_fetch(matches!(self.kind, AccessKind::Execute))
    }
}

/// Translate `va` through the table rooted at `root` for `access`.
///
/// Writes need `W` at every level in kernel mode too. A non-canonical `va`
/// never translates; it reports as a missing page here, and the CPU raises
/// a general-protection fault before it gets this far.
///
/// # Errors
/// The page-fault error code the access raises.
pub fn translate<M: PhysMapper + ?Sized>(
    mapper: &M,
    root: PhysicalPage,
    va: VirtualAddress,
    access: Access,
) -> Result<PhysicalAddress, PageFaultError> {
    let walk = walk(mapper, root, va);
    let Some(pa) = walk.physical_address(va) else {
        return Err(access.fault(false));
    };
    if !walk.perm.allows(access.required()) {
        return Err(access.fault(true));
    }
    Ok(pa)
}
