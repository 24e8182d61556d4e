//! # Memory View
//!
//! A snapshot of who owns physical memory and how one process sees virtual
//! memory, handed to the platform's memory viewer.
//!
//! All processes share the kernel's page table, so "process P maps page X"
//! is judged by where the mapping lives:
//!
//! ```text
//!   0 ─────────── PROC_START_ADDR ── window(1) ── window(2) ── ...
//!   │ shared, every process │  pid 1 only │  pid 2 only │
//! ```
//!
//! A user-accessible mapping inside a process window counts for that
//! window's owner only; one below the first window counts for every live
//! process.

use crate::process::{Pid, ProcessState, ProcessTable};
use alloc::vec::Vec;
use kernel_alloc::PageRegistry;
use kernel_info::HZ;
use kernel_info::memory::{
    CONSOLE_ADDR, KERNEL_END_ADDR, KERNEL_STACK_TOP, KERNEL_START_ADDR, MEMSIZE_VIRTUAL, NPAGES,
    allocatable_physical_address,
};
use kernel_info::process::{NPROC, PROC_SIZE, PROC_START_ADDR, process_window};
use kernel_memory_addresses::{
    PAGE_SIZE, PhysicalAddress, PhysicalPage, VirtualAddress, round_up,
};
use kernel_vmem::{PageEntryBits, PhysMapper, walk};

/// Who a physical page belongs to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PageOwner {
    Free,
    /// Hardware or otherwise never allocatable.
    Reserved,
    /// Kernel image, kernel stack or a kernel-allocated page (page tables).
    Kernel,
    Console,
    Process(Pid),
    /// User-mapped by more than one process.
    Shared,
}

/// One virtual page of the displayed process.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Mapping {
    pub page: PhysicalPage,
    pub owner: PageOwner,
    pub user: bool,
    pub writable: bool,
}

/// The virtual address space `[0, MEMSIZE_VIRTUAL)` of one process.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ProcessMap {
    pub pid: Pid,
    /// One entry per virtual page; `None` if unmapped.
    pub pages: Vec<Option<Mapping>>,
}

/// A picture of memory at one instant.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MemoryView {
    pub ticks: u64,
    /// Owner of every physical page, indexed by page number.
    pub physical: Vec<PageOwner>,
    pub process: Option<ProcessMap>,
}

impl MemoryView {
    /// Build the view, showing the address space of `showing` if given.
    pub fn build<M: PhysMapper + ?Sized>(
        mem: &M,
        pages: &PageRegistry,
        procs: &ProcessTable,
        ticks: u64,
        showing: Option<Pid>,
    ) -> Self {
        let physical = physical_owners(mem, pages, procs);
        let process = showing
            .and_then(|pid| procs.get(pid))
            .and_then(|p| p.pagetable.map(|root| (p.pid, root)))
            .map(|(pid, root)| ProcessMap {
                pid,
                pages: virtual_pages(mem, root, &physical),
            });
        Self {
            ticks,
            physical,
            process,
        }
    }

    /// Owner of `page`, or `None` outside physical memory.
    #[must_use]
    pub fn owner(&self, page: PhysicalPage) -> Option<PageOwner> {
        self.physical.get(page.number()).copied()
    }

    /// Number of physical pages with `owner`.
    #[must_use]
    pub fn count(&self, owner: PageOwner) -> usize {
        self.physical.iter().filter(|&&o| o == owner).count()
    }
}

/// Which process the viewer shows; rotates every `HZ / 2` ticks.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct MemShow {
    last_ticks: u64,
    showing: Pid,
}

impl MemShow {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_ticks: 0,
            showing: 0,
        }
    }

    /// Advance the rotation to `ticks` and pick the process to show: the
    /// first non-FREE slot with a page table, starting at the current one.
    pub fn select(&mut self, ticks: u64, procs: &ProcessTable) -> Option<Pid> {
        if self.last_ticks == 0 || ticks.saturating_sub(self.last_ticks) >= HZ / 2 {
            self.last_ticks = ticks;
            self.showing = (self.showing + 1) % NPROC;
        }

        for _ in 0..NPROC {
            let p = &procs[self.showing];
            if p.state != ProcessState::Free && p.pagetable.is_some() {
                return Some(self.showing);
            }
            self.showing = (self.showing + 1) % NPROC;
        }
        None
    }
}

#[allow(clippy::cast_possible_truncation)]
const PAGE_STEP: usize = PAGE_SIZE as usize;

/// Whether a user mapping at `va` in a table used by `pid` counts as `pid`
/// mapping the page.
fn attributable(pid: Pid, va: u64) -> bool {
    let windows_end = PROC_START_ADDR + (NPROC as u64 - 1) * PROC_SIZE;
    process_window(pid).contains(&va) || va < PROC_START_ADDR || va >= windows_end
}

fn is_kernel_memory(pa: PhysicalAddress) -> bool {
    let pa = pa.as_u64();
    (KERNEL_START_ADDR..round_up(KERNEL_END_ADDR)).contains(&pa)
        || (KERNEL_STACK_TOP - PAGE_SIZE..KERNEL_STACK_TOP).contains(&pa)
}

fn physical_owners<M: PhysMapper + ?Sized>(
    mem: &M,
    pages: &PageRegistry,
    procs: &ProcessTable,
) -> Vec<PageOwner> {
    // (number of mapping processes, last one seen)
    let mut mappers: Vec<(usize, Pid)> = alloc::vec![(0, 0); NPAGES];

    for p in procs.live() {
        let Some(root) = p.pagetable else {
            continue;
        };
        let mut seen = alloc::vec![false; NPAGES];
        for va in (0..MEMSIZE_VIRTUAL).step_by(PAGE_STEP) {
            if !attributable(p.pid, va) {
                continue;
            }
            let va = VirtualAddress::new(va);
            let w = walk(mem, root, va);
            if !w.perm.allows(PageEntryBits::USER_RO) {
                continue;
            }
            let Some(pa) = w.physical_address(va) else {
                continue;
            };
            let n = pa.page().number();
            if n < NPAGES && !seen[n] {
                seen[n] = true;
                mappers[n].0 += 1;
                mappers[n].1 = p.pid;
            }
        }
    }

    let console = PhysicalAddress::new(CONSOLE_ADDR).page();
    mappers
        .iter()
        .enumerate()
        .map(|(n, &(count, pid))| {
            let page = PhysicalPage::from_number(n);
            if page == console {
                PageOwner::Console
            } else if count == 1 {
                PageOwner::Process(pid)
            } else if count > 1 {
                PageOwner::Shared
            } else if is_kernel_memory(page.base()) {
                PageOwner::Kernel
            } else if !allocatable_physical_address(page.base()) {
                PageOwner::Reserved
            } else if pages.is_free(page) {
                PageOwner::Free
            } else {
                PageOwner::Kernel
            }
        })
        .collect()
}

fn virtual_pages<M: PhysMapper + ?Sized>(
    mem: &M,
    root: PhysicalPage,
    physical: &[PageOwner],
) -> Vec<Option<Mapping>> {
    (0..MEMSIZE_VIRTUAL)
        .step_by(PAGE_STEP)
        .map(|va| {
            let va = VirtualAddress::new(va);
            let w = walk(mem, root, va);
            let pa = w.physical_address(va)?;
            let page = pa.page();
            Some(Mapping {
                page,
                owner: physical
                    .get(page.number())
                    .copied()
                    .unwrap_or(PageOwner::Reserved),
                user: w.perm.allows(PageEntryBits::USER_RO),
                writable: w.perm.writable(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_alloc::{PhysMemory, PhysicalAllocator};
    use kernel_vmem::VmIter;

    struct Setup {
        mem: PhysMemory,
        alloc: PhysicalAllocator,
        procs: ProcessTable,
    }

    impl Setup {
        fn new() -> Self {
            Self {
                mem: PhysMemory::new(),
                alloc: PhysicalAllocator::new(),
                procs: ProcessTable::new(),
            }
        }

        fn table(&mut self) -> PhysicalPage {
            let root = self.alloc.kalloc(&mut self.mem, PAGE_SIZE).unwrap();
            self.mem.frame_mut(root).unwrap().fill(0);
            root
        }

        fn map_user(&mut self, root: PhysicalPage, va: u64) {
            let pa = PhysicalAddress::new(va);
            if self.alloc.pages().is_free(pa.page()) {
                self.alloc.pages_mut().acquire(pa.page()).unwrap();
            }
            VmIter::new(&mut self.mem, root, VirtualAddress::new(va))
                .map(&mut self.alloc, pa, PageEntryBits::USER_RW)
                .unwrap();
        }

        fn spawn(&mut self, pid: Pid, root: PhysicalPage) {
            self.procs[pid].state = ProcessState::Runnable;
            self.procs[pid].pagetable = Some(root);
        }

        fn view(&self, showing: Option<Pid>) -> MemoryView {
            MemoryView::build(&self.mem, self.alloc.pages(), &self.procs, 7, showing)
        }
    }

    fn page(addr: u64) -> PhysicalPage {
        PhysicalAddress::new(addr).page()
    }

    #[test]
    fn window_pages_belong_to_their_process() {
        let mut s = Setup::new();
        let root = s.table();
        s.map_user(root, 0x10_0000);
        s.map_user(root, 0x14_0000);
        s.map_user(root, CONSOLE_ADDR);
        s.spawn(1, root);
        s.spawn(2, root);

        let view = s.view(None);
        assert_eq!(view.ticks, 7);
        assert_eq!(view.owner(page(0x10_0000)), Some(PageOwner::Process(1)));
        assert_eq!(view.owner(page(0x14_0000)), Some(PageOwner::Process(2)));
        assert_eq!(view.owner(page(CONSOLE_ADDR)), Some(PageOwner::Console));
        assert_eq!(view.owner(page(root.base().as_u64())), Some(PageOwner::Kernel));
        assert_eq!(view.owner(page(KERNEL_START_ADDR)), Some(PageOwner::Kernel));
        assert_eq!(view.owner(page(0)), Some(PageOwner::Reserved));
        assert_eq!(view.owner(page(0x1F_0000)), Some(PageOwner::Free));
        assert!(view.process.is_none());
    }

    #[test]
    fn low_pages_mapped_by_two_processes_are_shared() {
        let mut s = Setup::new();
        let first = s.table();
        let second = s.table();
        s.map_user(first, 0x9_0000);
        s.map_user(second, 0x9_0000);
        s.spawn(1, first);
        s.spawn(2, second);

        assert_eq!(s.view(None).owner(page(0x9_0000)), Some(PageOwner::Shared));

        s.procs[2].state = ProcessState::Free;
        assert_eq!(s.view(None).owner(page(0x9_0000)), Some(PageOwner::Process(1)));
    }

    #[test]
    fn process_map_covers_virtual_memory() {
        let mut s = Setup::new();
        let root = s.table();
        s.map_user(root, 0x10_0000);
        s.spawn(1, root);

        let view = s.view(Some(1));
        let map = view.process.unwrap();
        assert_eq!(map.pid, 1);
        assert_eq!(map.pages.len() as u64, MEMSIZE_VIRTUAL / PAGE_SIZE);
        let text = map.pages[0x100].unwrap();
        assert_eq!(text.owner, PageOwner::Process(1));
        assert!(text.user && text.writable);
        assert!(map.pages[0x101].is_none());
    }

    #[test]
    fn rotation_skips_free_slots_and_waits_half_a_second() {
        let mut s = Setup::new();
        let root = s.table();
        s.spawn(2, root);
        s.spawn(5, root);

        let mut show = MemShow::new();
        assert_eq!(show.select(1, &s.procs), Some(2));
        assert_eq!(show.select(1 + HZ / 2 - 1, &s.procs), Some(2));
        assert_eq!(show.select(1 + HZ / 2, &s.procs), Some(5));
        assert_eq!(show.select(1 + HZ, &s.procs), Some(2));
        assert_eq!(MemShow::new().select(1, &ProcessTable::new()), None);
    }
}
