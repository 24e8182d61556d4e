//! # System Call Dispatch
//!
//! The number arrives in `rax`, arguments in `rdi` and `rsi`; the result is
//! stored into the caller's saved `rax` before it resumes. User buffers are
//! accessed through the caller's page table with kernel permissions, so a
//! bad pointer is a kernel page fault.

use crate::{Kernel, KernelPanic, Platform, Transfer};
use kernel_alloc::{PhysMemory, Vmm};
use kernel_info::memory::allocatable_physical_address;
use kernel_memory_addresses::{PAGE_SIZE, PhysicalPage, VirtualAddress};
use kernel_registers::RegState;
use kernel_vmem::{PageEntryBits, VmIter, walk};
use stdlib::syscall_abi::{PANIC_MESSAGE_MAX, SYSCALL_FAILURE, SYSTEM_NAME, Sysno};

#[allow(clippy::cast_possible_truncation)]
const PAGE_BYTES: usize = PAGE_SIZE as usize;

impl<P: Platform> Kernel<P> {
    /// Handle a `syscall` instruction executed by the current process.
    ///
    /// # Errors
    /// An unknown system call number, a user panic, a bad user pointer, or
    /// a page request for memory that is already in use.
    pub fn syscall(&mut self, regs: &RegState) -> Result<Transfer, KernelPanic> {
        let result = self.handle_syscall(regs);
        self.check(result)
    }

    fn handle_syscall(&mut self, regs: &RegState) -> Result<Transfer, KernelPanic> {
        let pid = self.current;
        self.procs[pid].regs = regs.clone();

        self.memshow();
        if self.check_keyboard() {
            return Ok(Transfer::PowerOff);
        }

        let number = regs.reg_rax;
        let sysno =
            Sysno::try_from(number).map_err(|number| KernelPanic::UnexpectedSyscall { number })?;
        log::trace!("process {pid}: {}", sysno.name());

        let (arg0, arg1) = (regs.reg_rdi, regs.reg_rsi);
        let result = match sysno {
            Sysno::GetPid => pid as u64,
            Sysno::Yield => {
                self.procs[pid].regs.reg_rax = 0;
                return self.schedule_next();
            }
            Sysno::Panic => {
                let message = self
                    .user_memory()?
                    .read_c_string(VirtualAddress::new(arg0), PANIC_MESSAGE_MAX)
                    .map_err(|e| KernelPanic::from_vmm(e, regs.reg_rip))?;
                return Err(KernelPanic::UserPanic { pid, message });
            }
            Sysno::PageAlloc => self.page_alloc(VirtualAddress::new(arg0))?,
            Sysno::GetSysName => {
                let buf = VirtualAddress::new(arg0);
                let mut vmm = self.user_memory()?;
                vmm.write(buf, SYSTEM_NAME.as_bytes())
                    .and_then(|()| vmm.write(buf + SYSTEM_NAME.len() as u64, &[0]))
                    .map_err(|e| KernelPanic::from_vmm(e, regs.reg_rip))?;
                0
            }
            Sysno::Spawn => SYSCALL_FAILURE,
            Sysno::PipeWrite => self.pipe_write(VirtualAddress::new(arg0), arg1, regs.reg_rip)?,
            Sysno::PipeRead => self.pipe_read(VirtualAddress::new(arg0), arg1, regs.reg_rip)?,
        };

        self.procs[pid].regs.reg_rax = result;
        self.resume(pid)
    }

    /// The current process's address space, as seen by the kernel.
    fn user_memory(&mut self) -> Result<Vmm<'_, PhysMemory>, KernelPanic> {
        let pid = self.current;
        let root = self.procs[pid]
            .pagetable
            .ok_or(KernelPanic::MissingPageTable { pid })?;
        Ok(Vmm::new(&mut self.mem, root))
    }

    /// Give the caller the physical page at `addr`, mapped identity `P|W|U`.
    ///
    /// Malformed requests fail with `-1`; a page that is already in use is
    /// fatal.
    fn page_alloc(&mut self, addr: VirtualAddress) -> Result<u64, KernelPanic> {
        let pid = self.current;
        let pa = addr.identity();
        if !addr.is_page_aligned() || !allocatable_physical_address(pa) {
            log::debug!("process {pid}: page_alloc({addr}) refused");
            return Ok(SYSCALL_FAILURE);
        }

        let page = PhysicalPage::containing(pa);
        let root = self.procs[pid]
            .pagetable
            .ok_or(KernelPanic::MissingPageTable { pid })?;
        let user_mapped = walk(&self.mem, root, addr).perm.allows(PageEntryBits::USER_RO);
        if user_mapped || !self.alloc.pages().is_free(page) {
            return Err(KernelPanic::PageAllocInUse { pid, va: addr });
        }

        self.alloc.pages_mut().acquire(page)?;
        self.mem.fill(pa, PAGE_BYTES, 0)?;
        VmIter::new(&mut self.mem, root, addr).map(&mut self.alloc, pa, PageEntryBits::USER_RW)?;
        log::debug!("process {pid}: page_alloc({addr}) -> {page}");
        Ok(0)
    }

    fn pipe_write(&mut self, buf: VirtualAddress, len: u64, rip: u64) -> Result<u64, KernelPanic> {
        if len == 0 {
            return Ok(0);
        }
        if !self.pipe.is_empty() {
            return Ok(SYSCALL_FAILURE);
        }
        let mut byte = [0u8; 1];
        self.user_memory()?
            .read(buf, &mut byte)
            .map_err(|e| KernelPanic::from_vmm(e, rip))?;
        Ok(if self.pipe.put(byte[0]) { 1 } else { SYSCALL_FAILURE })
    }

    fn pipe_read(&mut self, buf: VirtualAddress, len: u64, rip: u64) -> Result<u64, KernelPanic> {
        if len == 0 {
            return Ok(0);
        }
        let Some(byte) = self.pipe.peek() else {
            return Ok(SYSCALL_FAILURE);
        };
        self.user_memory()?
            .write(buf, &[byte])
            .map_err(|e| KernelPanic::from_vmm(e, rip))?;
        Ok(self.pipe.take().map_or(SYSCALL_FAILURE, |_| 1))
    }
}
