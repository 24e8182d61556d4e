//! # Exception Dispatch
//!
//! Hardware traps other than `syscall`: the timer interrupt and page faults.
//! Any other vector halts the kernel.

use crate::console::{ERROR_ATTR, ERROR_ROW, write_line};
use crate::{Kernel, KernelPanic, Platform, ProcessState, Transfer};
use alloc::format;
use kernel_debugcon::debugcon_trace;
use kernel_memory_addresses::VirtualAddress;
use kernel_registers::RegState;
use kernel_registers::page_fault::PageFaultError;
use kernel_registers::vectors::{INT_PAGE_FAULT, INT_TIMER};

impl<P: Platform> Kernel<P> {
    /// Handle a trap taken by the current process.
    ///
    /// `regs` is the snapshot at the trap; `fault_addr` is the faulting
    /// address of a page fault (CR2).
    ///
    /// # Errors
    /// A kernel-mode page fault or an unexpected vector.
    pub fn exception(
        &mut self,
        regs: &RegState,
        fault_addr: VirtualAddress,
    ) -> Result<Transfer, KernelPanic> {
        let result = self.handle_exception(regs, fault_addr);
        self.check(result)
    }

    fn handle_exception(
        &mut self,
        regs: &RegState,
        fault_addr: VirtualAddress,
    ) -> Result<Transfer, KernelPanic> {
        let pid = self.current;
        self.procs[pid].regs = regs.clone();

        let error = PageFaultError::from_bits(regs.reg_errcode);
        let kernel_fault = regs.reg_intno == INT_PAGE_FAULT && !error.user();
        if !kernel_fault {
            self.memshow();
        }
        if self.check_keyboard() {
            return Ok(Transfer::PowerOff);
        }

        match regs.reg_intno {
            INT_TIMER => {
                self.ticks += 1;
                self.platform.ack_timer();
                debugcon_trace!("tick {}", self.ticks);
                return self.schedule_next();
            }
            INT_PAGE_FAULT if kernel_fault => {
                return Err(KernelPanic::kernel_page_fault(fault_addr, error, regs.reg_rip));
            }
            INT_PAGE_FAULT => {
                let report = format!(
                    "Process {pid} page fault on {fault_addr:#x} ({} {}, rip={:#x})!",
                    error.operation(),
                    error.problem(),
                    regs.reg_rip
                );
                log::warn!("{report}");
                write_line(&mut self.mem, ERROR_ROW, ERROR_ATTR, &report)?;
                self.procs[pid].state = ProcessState::Faulted;
            }
            intno => return Err(KernelPanic::UnexpectedException { intno }),
        }

        if self.procs[pid].is_runnable() {
            self.resume(pid)
        } else {
            self.schedule_next()
        }
    }
}
