use crate::process::Pid;
use alloc::string::String;
use kernel_alloc::{AllocError, PhysAccessError, RegistryError, VmmError};
use kernel_memory_addresses::{PhysicalPage, VirtualAddress};
use kernel_registers::page_fault::PageFaultError;
use kernel_vmem::{MapError, PageTableCheckError};

/// A condition the kernel cannot recover from. It halts the machine.
///
/// The `Display` text is what the kernel prints when it halts.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum KernelPanic {
    #[error("Kernel page fault on {addr:#x} ({operation} {problem}, rip={rip:#x})!")]
    KernelPageFault {
        addr: u64,
        operation: &'static str,
        problem: &'static str,
        rip: u64,
    },
    #[error("Unexpected exception {intno}!")]
    UnexpectedException { intno: u64 },
    #[error("Unexpected system call {number}!")]
    UnexpectedSyscall { number: u64 },
    #[error("PANIC: {message}")]
    UserPanic { pid: Pid, message: String },
    #[error("process {pid}: no such process slot")]
    NoSuchSlot { pid: Pid },
    #[error("process {pid}: process slot is not free")]
    SlotInUse { pid: Pid },
    #[error("no program image {name:?} for process {pid}")]
    UnknownProgram { name: String, pid: Pid },
    #[error("process {pid}: segment page {va} lies outside the process window")]
    SegmentOutsideWindow { pid: Pid, va: VirtualAddress },
    #[error("process {pid}: physical page {page} is already owned")]
    PageAlreadyOwned { pid: Pid, page: PhysicalPage },
    #[error("process {pid}: page_alloc on {va} which is already in use")]
    PageAllocInUse { pid: Pid, va: VirtualAddress },
    #[error("process {pid} is not runnable")]
    NotRunnable { pid: Pid },
    #[error("process {pid} has no page table")]
    MissingPageTable { pid: Pid },
    #[error("process {pid}: invalid page table: {source}")]
    InvalidPageTable {
        pid: Pid,
        source: PageTableCheckError,
    },
    #[error("out of physical memory")]
    OutOfMemory,
    #[error("mapping failed: {0}")]
    Map(#[from] MapError),
    #[error("kernel memory access failed: {0}")]
    Memory(VmmError),
    #[error("{0}")]
    Alloc(#[from] AllocError),
    #[error("{0}")]
    Registry(#[from] RegistryError),
    #[error("{0}")]
    Physical(#[from] PhysAccessError),
}

impl KernelPanic {
    /// A kernel-mode page fault on `addr` while serving code at `rip`.
    #[must_use]
    pub const fn kernel_page_fault(addr: VirtualAddress, error: PageFaultError, rip: u64) -> Self {
        Self::KernelPageFault {
            addr: addr.as_u64(),
            operation: error.operation(),
            problem: error.problem(),
            rip,
        }
    }

    /// A failed kernel access to user memory, reported at user `rip`.
    #[must_use]
    pub const fn from_vmm(error: VmmError, rip: u64) -> Self {
        match error {
            VmmError::Fault { va, error } => Self::kernel_page_fault(va, error, rip),
            other => Self::Memory(other),
        }
    }
}
