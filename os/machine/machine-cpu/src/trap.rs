use kernel_registers::page_fault::PageFaultError;
use kernel_registers::vectors::{
    INT_BREAKPOINT, INT_GENERAL_PROTECTION, INT_INVALID_OPCODE, INT_PAGE_FAULT,
};
use kernel_memory_addresses::VirtualAddress;

/// Why the CPU stopped executing user code and entered the kernel.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Trap {
    /// The `syscall` instruction.
    Syscall,
    /// The interval timer fired.
    Timer,
    /// A fault or trap raised by an instruction.
    Exception(Exception),
}

impl Trap {
    /// Interrupt vector the kernel sees in `reg_intno`; `None` for
    /// `syscall`, which has its own entry point.
    #[must_use]
    pub const fn vector(&self) -> Option<u64> {
        match self {
            Self::Syscall => None,
            Self::Timer => Some(kernel_registers::vectors::INT_TIMER),
            Self::Exception(e) => Some(e.vector),
        }
    }
}

/// An exception raised by an instruction.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Exception {
    pub vector: u64,
    pub error_code: u64,
    /// Faulting address for page faults (what CR2 holds).
    pub address: Option<VirtualAddress>,
}

impl Exception {
    #[must_use]
    pub const fn page_fault(address: VirtualAddress, error: PageFaultError) -> Self {
        Self {
            vector: INT_PAGE_FAULT,
            error_code: error.into_bits(),
            address: Some(address),
        }
    }

    #[must_use]
    pub const fn general_protection() -> Self {
        Self::plain(INT_GENERAL_PROTECTION)
    }

    #[must_use]
    pub const fn invalid_opcode() -> Self {
        Self::plain(INT_INVALID_OPCODE)
    }

    #[must_use]
    pub const fn breakpoint() -> Self {
        Self::plain(INT_BREAKPOINT)
    }

    const fn plain(vector: u64) -> Self {
        Self {
            vector,
            error_code: 0,
            address: None,
        }
    }
}
