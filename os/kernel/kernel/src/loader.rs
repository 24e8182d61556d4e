//! # Process Loader
//!
//! Places a [`ProgramImage`] into the window of one process:
//!
//! ```text
//!   window(pid).start                                   window(pid).end
//!   ├── segment pages (P|W|U) ──┤ ... ├── stack page (P|W|U) ──┤ ◄ rsp
//! ```
//!
//! Every page is claimed in the page registry before it is mapped, and must
//! have been unowned. Segment bytes are written only after all pages are
//! mapped: zero fill first, then the data.

use crate::{Kernel, KernelPanic, Pid, Platform, ProcessState};
use kernel_alloc::Vmm;
use kernel_info::process::{NPROC, process_stack_page, process_window};
use kernel_memory_addresses::{PAGE_SIZE, VirtualAddress};
use kernel_registers::RegState;
use kernel_vmem::{PageEntryBits, VmIter};
use program_image::ProgramImage;

#[allow(clippy::cast_possible_truncation)]
const PAGE_STEP: usize = PAGE_SIZE as usize;

impl<P: Platform> Kernel<P> {
    /// Load `image` as process `pid` and make it RUNNABLE.
    ///
    /// # Errors
    /// All fatal: the slot is not free, a segment leaves the process window,
    /// a page is already owned, or memory ran out while mapping.
    pub fn process_setup(&mut self, pid: Pid, image: &ProgramImage) -> Result<(), KernelPanic> {
        if pid == 0 || pid >= NPROC {
            return Err(KernelPanic::NoSuchSlot { pid });
        }
        if self.procs[pid].state != ProcessState::Free {
            return Err(KernelPanic::SlotInUse { pid });
        }
        log::debug!(
            "process {pid}: loading {} ({} segments, entry {})",
            image.name(),
            image.segments().len(),
            image.entry()
        );

        let window = process_window(pid);
        for segment in image.segments() {
            for addr in segment.page_range().step_by(PAGE_STEP) {
                let va = VirtualAddress::new(addr);
                if !window.contains(&addr) {
                    return Err(KernelPanic::SegmentOutsideWindow { pid, va });
                }
                self.claim_user_page(pid, va)?;
            }
        }

        let mut vmm = Vmm::new(&mut self.mem, self.kernel_pagetable);
        for segment in image.segments() {
            #[allow(clippy::cast_possible_truncation)]
            let size = segment.size() as usize;
            vmm.fill(segment.va(), size, 0).map_err(KernelPanic::Memory)?;
            vmm.write(segment.va(), segment.data())
                .map_err(KernelPanic::Memory)?;
        }

        self.claim_user_page(pid, VirtualAddress::new(process_stack_page(pid)))?;

        let process = &mut self.procs[pid];
        process.regs = RegState::new_user();
        process.regs.reg_rip = image.entry().as_u64();
        process.regs.reg_rsp = window.end;
        process.pagetable = Some(self.kernel_pagetable);
        process.state = ProcessState::Runnable;
        Ok(())
    }

    /// Take ownership of the unowned physical page behind `va` and map it
    /// identity `P|W|U`.
    fn claim_user_page(&mut self, pid: Pid, va: VirtualAddress) -> Result<(), KernelPanic> {
        let page = va.identity().page();
        if self.alloc.pages().refcount(page).is_some_and(|rc| rc > 0) {
            return Err(KernelPanic::PageAlreadyOwned { pid, page });
        }
        self.alloc.pages_mut().acquire(page)?;
        VmIter::new(&mut self.mem, self.kernel_pagetable, va).map(
            &mut self.alloc,
            va.identity(),
            PageEntryBits::USER_RW,
        )?;
        Ok(())
    }
}
