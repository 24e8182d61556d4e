//! # Interrupt Vectors

/// `int3` breakpoint.
pub const INT_BREAKPOINT: u64 = 3;

/// Invalid opcode (`#UD`).
pub const INT_INVALID_OPCODE: u64 = 6;

/// General protection fault (`#GP`).
pub const INT_GENERAL_PROTECTION: u64 = 13;

/// Page fault (`#PF`).
pub const INT_PAGE_FAULT: u64 = 14;

/// First vector used for hardware interrupt lines.
pub const INT_IRQ: u64 = 32;

/// Interrupt line of the interval timer.
pub const IRQ_TIMER: u64 = 0;

/// Vector delivered by the interval timer.
pub const INT_TIMER: u64 = INT_IRQ + IRQ_TIMER;
