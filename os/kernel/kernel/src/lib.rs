//! # Kernel
//!
//! A single-CPU kernel for cooperative user processes. It owns physical
//! memory, builds the page table every process runs on, loads program images
//! into fixed per-process windows, and routes traps: timer interrupts, page
//! faults and system calls.
//!
//! ## Control Flow
//!
//! The kernel never jumps into a process itself. Each entry point returns a
//! [`Transfer`] telling whoever hosts it what to do next:
//!
//! ```text
//!   start(command) ──► Transfer::Resume(pid)
//!                           │
//!                 host runs pid until it traps
//!                           │
//!          ┌────────────────┴────────────────┐
//!    exception(regs, cr2)              syscall(regs)
//!          └────────────────┬────────────────┘
//!                           ▼
//!        Resume(pid) │ Idle │ PowerOff │ Err(KernelPanic)
//! ```
//!
//! A [`KernelPanic`] halts the machine. It has already been logged and
//! written to the bottom console row when it is returned.
//!
//! ## Memory
//!
//! Physical memory is identity-mapped by one kernel page table that every
//! process shares. Program pages, user-requested pages and the stack page of
//! each process are remapped `P|W|U` in that same table; everything else
//! stays kernel-only except for the console.
//!
//! ## Usage
//!
//! ```rust
//! use kernel::{Kernel, KernelConfig, NullPlatform, Transfer};
//! use kernel_memory_addresses::VirtualAddress;
//! use program_image::{ProgramBundle, ProgramImage, Segment};
//!
//! let text = Segment::new(VirtualAddress::new(0x10_0000), 0x1000, vec![0x0F, 0x05])?;
//! let image = ProgramImage::new("allocator", 1, VirtualAddress::new(0x10_0000)).with_segment(text);
//! let bundle: ProgramBundle = [image].into_iter().collect();
//!
//! let mut kernel = Kernel::new(NullPlatform, KernelConfig::default())?;
//! assert_eq!(kernel.start(&bundle, None)?, Transfer::Resume(1));
//! assert_eq!(kernel.process(1).map(|p| p.regs.reg_rsp), Some(0x14_0000));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

mod boot;
pub mod console;
mod error;
mod exception;
mod loader;
pub mod memshow;
mod pipe;
mod platform;
mod process;
mod scheduler;
mod syscall;

pub use error::KernelPanic;
pub use memshow::{MemoryView, PageOwner};
pub use pipe::PipeBuffer;
pub use platform::{KEY_CTRL_C, NullPlatform, Platform};
pub use process::{Pid, Process, ProcessState, ProcessTable};

use kernel_alloc::{PhysMemory, PhysicalAllocator};
use kernel_memory_addresses::PhysicalPage;
use memshow::MemShow;

/// What the host does after a kernel entry point returns.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[must_use]
pub enum Transfer {
    /// Restore the registers of `pid` and run it.
    Resume(Pid),
    /// Nothing is runnable and the scheduler gave up spinning.
    Idle,
    /// Ctrl-C was pressed.
    PowerOff,
}

/// Runtime switches.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct KernelConfig {
    /// Build a [`MemoryView`] for the platform on every trap.
    pub show_memory: bool,
    /// Scheduler spins without a runnable process before giving up with
    /// [`Transfer::Idle`]. `None` spins until Ctrl-C.
    pub idle_limit: Option<u64>,
}

/// The kernel's entire state.
pub struct Kernel<P: Platform> {
    platform: P,
    config: KernelConfig,
    mem: PhysMemory,
    alloc: PhysicalAllocator,
    kernel_pagetable: PhysicalPage,
    procs: ProcessTable,
    /// Slot of the process that trapped last; only the scheduler moves it.
    current: Pid,
    ticks: u64,
    pipe: PipeBuffer,
    memshow: MemShow,
}

impl<P: Platform> Kernel<P> {
    /// Pid of the running (or last run) process.
    #[inline]
    #[must_use]
    pub const fn current(&self) -> Pid {
        self.current
    }

    /// Timer interrupts seen, starting at 1.
    #[inline]
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    #[inline]
    #[must_use]
    pub const fn config(&self) -> &KernelConfig {
        &self.config
    }

    #[must_use]
    pub fn process(&self, pid: Pid) -> Option<&Process> {
        self.procs.get(pid)
    }

    #[inline]
    #[must_use]
    pub const fn processes(&self) -> &ProcessTable {
        &self.procs
    }

    /// Physical memory.
    #[inline]
    #[must_use]
    pub const fn memory(&self) -> &PhysMemory {
        &self.mem
    }

    /// Physical memory, for the host CPU to execute out of.
    #[inline]
    pub const fn memory_mut(&mut self) -> &mut PhysMemory {
        &mut self.mem
    }

    #[inline]
    #[must_use]
    pub const fn allocator(&self) -> &PhysicalAllocator {
        &self.alloc
    }

    #[inline]
    #[must_use]
    pub const fn kernel_pagetable(&self) -> PhysicalPage {
        self.kernel_pagetable
    }

    #[inline]
    #[must_use]
    pub const fn pipe(&self) -> &PipeBuffer {
        &self.pipe
    }

    #[inline]
    #[must_use]
    pub const fn platform(&self) -> &P {
        &self.platform
    }

    #[inline]
    pub const fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    /// A picture of memory right now, showing the address space of
    /// `showing` if given.
    #[must_use]
    pub fn memory_view(&self, showing: Option<Pid>) -> MemoryView {
        MemoryView::build(&self.mem, self.alloc.pages(), &self.procs, self.ticks, showing)
    }

    /// Release a page back to the allocator.
    ///
    /// # Errors
    /// Releasing a page is not supported; only `None` succeeds.
    pub fn kfree(&mut self, page: Option<PhysicalPage>) -> Result<(), KernelPanic> {
        self.alloc
            .kfree(page)
            .map_err(KernelPanic::from)
            .inspect_err(|panic| self.report_panic(panic))
    }

    /// Refresh the platform's memory viewer if enabled.
    fn memshow(&mut self) {
        if !self.config.show_memory {
            return;
        }
        let showing = self.memshow.select(self.ticks, &self.procs);
        let view = self.memory_view(showing);
        self.platform.show_memory(&view);
    }

    /// Whether Ctrl-C was pressed.
    fn check_keyboard(&mut self) -> bool {
        let ctrl_c = self.platform.check_keyboard() == Some(KEY_CTRL_C);
        if ctrl_c {
            log::info!("Ctrl-C pressed, powering off");
        }
        ctrl_c
    }

    /// Log `panic` and print it on the console.
    fn report_panic(&mut self, panic: &KernelPanic) {
        let message = alloc::format!("{panic}");
        log::error!("{message}");
        if let Err(e) = console::write_line(&mut self.mem, console::ERROR_ROW, console::ERROR_ATTR, &message) {
            log::error!("cannot print panic: {e}");
        }
    }

    /// Pass `result` through, reporting a panic.
    fn check(&mut self, result: Result<Transfer, KernelPanic>) -> Result<Transfer, KernelPanic> {
        result.inspect_err(|panic| self.report_panic(panic))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_alloc::AllocError;

    #[test]
    fn kfree_of_nothing_succeeds_quietly() {
        let mut kernel = Kernel::new(NullPlatform, KernelConfig::default()).unwrap();
        assert_eq!(kernel.kfree(None), Ok(()));
        let row = console::read_row(kernel.memory(), console::ERROR_ROW).unwrap();
        assert!(row.iter().all(|&c| c == 0 || c == b' '));
    }

    #[test]
    fn kfree_of_a_page_is_fatal() {
        let mut kernel = Kernel::new(NullPlatform, KernelConfig::default()).unwrap();
        let page = PhysicalPage::from_number(0x80);
        assert_eq!(
            kernel.kfree(Some(page)),
            Err(KernelPanic::Alloc(AllocError::FreeUnsupported(page)))
        );

        let row = console::read_row(kernel.memory(), console::ERROR_ROW).unwrap();
        let expected = alloc::format!("freeing {page} is not supported");
        assert!(row.starts_with(expected.as_bytes()));
        assert_eq!(kernel.allocator().pages().refcount(page), Some(0));
    }
}
