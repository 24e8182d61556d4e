//! # Process Table

use core::ops::{Index, IndexMut};
use kernel_info::process::NPROC;
use kernel_memory_addresses::PhysicalPage;
use kernel_registers::RegState;

/// Process id: the index of the descriptor in the process table.
pub type Pid = usize;

/// Lifecycle of a process slot.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub enum ProcessState {
    /// Unused slot.
    #[default]
    Free,
    /// Ready to run.
    Runnable,
    /// Stopped by a user-mode fault. Kept for inspection, never scheduled.
    Faulted,
    /// Waiting; never scheduled.
    Blocked,
}

/// Process descriptor.
#[derive(Debug, Clone, Default)]
pub struct Process {
    pub pid: Pid,
    pub state: ProcessState,
    /// Registers saved at the last trap.
    pub regs: RegState,
    /// Root of the page table; may alias the kernel's.
    pub pagetable: Option<PhysicalPage>,
}

impl Process {
    #[inline]
    #[must_use]
    pub fn is_runnable(&self) -> bool {
        self.state == ProcessState::Runnable
    }
}

/// All process descriptors. Slot 0 is never used.
#[derive(Debug, Clone)]
pub struct ProcessTable {
    procs: [Process; NPROC],
}

impl ProcessTable {
    /// Every slot FREE, with its pid set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            procs: core::array::from_fn(|pid| Process {
                pid,
                ..Process::default()
            }),
        }
    }

    #[must_use]
    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.procs.get(pid)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Process> + '_ {
        self.procs.iter()
    }

    /// Descriptors that are not FREE.
    pub fn live(&self) -> impl Iterator<Item = &Process> + '_ {
        self.procs
            .iter()
            .filter(|p| p.pid != 0 && p.state != ProcessState::Free)
    }

    /// The first RUNNABLE slot after `pid`, wrapping around and ending with
    /// `pid` itself.
    #[must_use]
    pub fn next_runnable(&self, pid: Pid) -> Option<Pid> {
        (1..=NPROC)
            .map(|step| (pid + step) % NPROC)
            .find(|&candidate| self.procs[candidate].is_runnable())
    }
}

impl Default for ProcessTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Index<Pid> for ProcessTable {
    type Output = Process;

    fn index(&self, pid: Pid) -> &Self::Output {
        &self.procs[pid]
    }
}

impl IndexMut<Pid> for ProcessTable {
    fn index_mut(&mut self, pid: Pid) -> &mut Self::Output {
        &mut self.procs[pid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_runnable(pids: &[Pid]) -> ProcessTable {
        let mut table = ProcessTable::new();
        for &pid in pids {
            table[pid].state = ProcessState::Runnable;
        }
        table
    }

    #[test]
    fn slots_start_free_with_their_pid() {
        let table = ProcessTable::new();
        assert!(table.iter().enumerate().all(|(i, p)| p.pid == i && p.state == ProcessState::Free));
        assert_eq!(table.live().count(), 0);
    }

    #[test]
    fn next_runnable_is_round_robin() {
        let table = with_runnable(&[2, 5, 9]);
        assert_eq!(table.next_runnable(2), Some(5));
        assert_eq!(table.next_runnable(5), Some(9));
        assert_eq!(table.next_runnable(9), Some(2));
        assert_eq!(table.next_runnable(0), Some(2));
    }

    #[test]
    fn next_runnable_falls_back_to_self() {
        let table = with_runnable(&[3]);
        assert_eq!(table.next_runnable(3), Some(3));
        assert_eq!(ProcessTable::new().next_runnable(1), None);
    }

    #[test]
    fn faulted_and_blocked_are_skipped() {
        let mut table = with_runnable(&[1, 2, 3]);
        table[2].state = ProcessState::Faulted;
        table[3].state = ProcessState::Blocked;
        assert_eq!(table.next_runnable(1), Some(1));
        assert_eq!(table.live().count(), 3);
    }
}
