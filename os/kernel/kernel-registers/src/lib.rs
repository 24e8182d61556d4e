//! # Typed `X86_64` Register State
//!
//! The register snapshot that travels between the trap path and the kernel,
//! plus the typed views the kernel needs to interpret it:
//!
//! * [`RegState`]: full general-purpose register file, instruction and stack
//!   pointers, flags, selectors, interrupt number and error code.
//! * [`Register`]: names for the sixteen general-purpose registers.
//! * [`rflags::Rflags`]: the flags register as a bitfield.
//! * [`selectors::SegmentSelector`]: code/stack selector encoding and the
//!   privilege level it carries.
//! * [`page_fault::PageFaultError`]: the page-fault error code.
//! * [`vectors`]: interrupt vector numbers.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![forbid(unsafe_code)]

pub mod page_fault;
mod regstate;
pub mod rflags;
pub mod selectors;
pub mod vectors;

pub use regstate::{RegState, Register};
