//! # Scheduler
//!
//! Round robin over the process table, starting after the current slot.

use crate::{Kernel, KernelPanic, Pid, Platform, Transfer};
use kernel_debugcon::debugcon_trace;
use kernel_vmem::check_pagetable;

/// Idle spins between memory view refreshes.
const MEMSHOW_SPINS: u64 = 1 << 12;

impl<P: Platform> Kernel<P> {
    /// Pick the next RUNNABLE process after the current one and run it.
    ///
    /// With nothing runnable this spins, polling the keyboard, until
    /// Ctrl-C or the configured idle limit.
    ///
    /// # Errors
    /// The chosen process cannot be run.
    pub fn schedule(&mut self) -> Result<Transfer, KernelPanic> {
        let result = self.schedule_next();
        self.check(result)
    }

    /// Make `pid` the current process and resume it.
    ///
    /// # Errors
    /// `pid` is not RUNNABLE or its page table fails the check.
    pub fn run(&mut self, pid: Pid) -> Result<Transfer, KernelPanic> {
        let result = self.resume(pid);
        self.check(result)
    }

    pub(crate) fn schedule_next(&mut self) -> Result<Transfer, KernelPanic> {
        let mut spins: u64 = 1;
        loop {
            if let Some(pid) = self.procs.next_runnable(self.current) {
                return self.resume(pid);
            }

            if self.check_keyboard() {
                return Ok(Transfer::PowerOff);
            }
            if spins.is_multiple_of(MEMSHOW_SPINS) {
                self.memshow();
            }
            if self.config.idle_limit.is_some_and(|limit| spins >= limit) {
                log::info!("no runnable process after {spins} spins");
                return Ok(Transfer::Idle);
            }
            spins += 1;
        }
    }

    pub(crate) fn resume(&mut self, pid: Pid) -> Result<Transfer, KernelPanic> {
        let process = self.procs.get(pid).ok_or(KernelPanic::NoSuchSlot { pid })?;
        if !process.is_runnable() {
            return Err(KernelPanic::NotRunnable { pid });
        }
        let root = process
            .pagetable
            .ok_or(KernelPanic::MissingPageTable { pid })?;

        self.current = pid;
        check_pagetable(&self.mem, root, self.kernel_pagetable)
            .map_err(|source| KernelPanic::InvalidPageTable { pid, source })?;

        debugcon_trace!("run process {pid}");
        Ok(Transfer::Resume(pid))
    }
}
