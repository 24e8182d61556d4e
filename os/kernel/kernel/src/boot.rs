//! # Boot
//!
//! Bringing the kernel up: the identity-mapped kernel page table, an empty
//! process table and the initial processes named by the boot command.

use crate::memshow::MemShow;
use crate::{Kernel, KernelConfig, KernelPanic, PipeBuffer, Platform, ProcessTable, Transfer, console};
use kernel_alloc::{PhysMemory, PhysicalAllocator};
use kernel_debugcon::debugcon_trace;
use kernel_info::boot::BootCommand;
use kernel_info::memory::{CONSOLE_ADDR, MEMSIZE_PHYSICAL};
use kernel_memory_addresses::{PAGE_SIZE, PhysicalPage, VirtualAddress};
use kernel_vmem::{MapError, PageEntryBits, PhysMapper, VmIter};
use program_image::{ProgramImage, ProgramSource};

/// Permissions of the kernel's identity mapping at `va`.
const fn kernel_permissions(va: VirtualAddress) -> PageEntryBits {
    if va.is_null() {
        PageEntryBits::NONE
    } else if va.as_u64() == CONSOLE_ADDR {
        PageEntryBits::USER_RW
    } else {
        PageEntryBits::KERNEL_RW
    }
}

/// Allocate a kernel page table identity-mapping all of physical memory.
fn build_kernel_pagetable(
    mem: &mut PhysMemory,
    alloc: &mut PhysicalAllocator,
) -> Result<PhysicalPage, KernelPanic> {
    let root = alloc
        .kalloc(mem, PAGE_SIZE)
        .ok_or(KernelPanic::OutOfMemory)?;
    mem.frame_mut(root).ok_or(MapError::Unbacked(root))?.fill(0);

    let mut it = VmIter::new(mem, root, VirtualAddress::zero());
    while it.va().as_u64() < MEMSIZE_PHYSICAL {
        let va = it.va();
        it.map(alloc, va.identity(), kernel_permissions(va))?;
        it.next_page();
    }
    Ok(root)
}

impl<P: Platform> Kernel<P> {
    /// Initialize memory, the kernel page table and the process table.
    ///
    /// # Errors
    /// The kernel page table could not be built.
    pub fn new(platform: P, config: KernelConfig) -> Result<Self, KernelPanic> {
        let mut mem = PhysMemory::new();
        let mut alloc = PhysicalAllocator::new();
        console::clear(&mut mem)?;
        let kernel_pagetable = build_kernel_pagetable(&mut mem, &mut alloc)?;
        log::info!("kernel page table at {kernel_pagetable}");

        Ok(Self {
            platform,
            config,
            mem,
            alloc,
            kernel_pagetable,
            procs: ProcessTable::new(),
            current: 0,
            ticks: 1,
            pipe: PipeBuffer::new(),
            memshow: MemShow::new(),
        })
    }

    /// Load the initial processes chosen by `command` and run pid 1.
    ///
    /// No command (or an empty one) loads the default first program. A
    /// command naming a program in `programs` loads it as pid 1. `"pipe"`
    /// loads the pipe writer and reader, anything else the default pair.
    ///
    /// # Errors
    /// A program is missing from `programs` or could not be loaded.
    pub fn start<S: ProgramSource + ?Sized>(
        &mut self,
        programs: &S,
        command: Option<&str>,
    ) -> Result<Transfer, KernelPanic> {
        let result = self.boot(programs, command);
        self.check(result)
    }

    fn boot<S: ProgramSource + ?Sized>(
        &mut self,
        programs: &S,
        command: Option<&str>,
    ) -> Result<Transfer, KernelPanic> {
        let (first, second) =
            BootCommand::resolve(command, |name| programs.contains(name)).programs();
        log::info!("Starting {first} as process 1");
        self.process_setup(1, lookup(programs, first, 1)?)?;

        if let Some(second) = second {
            log::info!("Starting {second} as process 2");
            self.process_setup(2, lookup(programs, second, 2)?)?;
        }

        debugcon_trace!("boot complete, allocator cursor at {}", self.alloc.cursor());
        self.resume(1)
    }
}

fn lookup<'a, S: ProgramSource + ?Sized>(
    programs: &'a S,
    name: &str,
    pid: usize,
) -> Result<&'a ProgramImage, KernelPanic> {
    programs
        .program_image(name, pid)
        .ok_or_else(|| KernelPanic::UnknownProgram {
            name: name.into(),
            pid,
        })
}
