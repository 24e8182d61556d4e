//! # Machine
//!
//! Hosts the kernel on a simulated CPU. The kernel decides who runs; the
//! machine runs them and brings every trap back:
//!
//! ```text
//!   Kernel::start ──► Resume(pid)
//!                         │
//!        ┌────────────────▼────────────────┐
//!        │ Cpu::run(pid's registers, table) │◄───────────┐
//!        └────────────────┬────────────────┘            │
//!               Syscall   │   Timer / Exception         │
//!        Kernel::syscall ─┴─ Kernel::exception          │
//!                         │                             │
//!             Resume(pid) ┴─────────────────────────────┘
//!             Idle │ PowerOff │ KernelPanic  ──► Halted
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use machine::{Halted, Machine, MachineConfig};
//! use kernel_memory_addresses::VirtualAddress;
//! use program_image::{ProgramBundle, ProgramImage, Segment};
//!
//! // `int3` right at the entry point.
//! let text = Segment::new(VirtualAddress::new(0x10_0000), 0x1000, vec![0xCC])?;
//! let image = ProgramImage::new("allocator", 1, VirtualAddress::new(0x10_0000)).with_segment(text);
//! let bundle: ProgramBundle = [image].into_iter().collect();
//!
//! let mut machine = Machine::new(MachineConfig::default())?;
//! machine.boot(&bundle, None)?;
//! assert!(matches!(machine.run(), Halted::Panic(_)));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![forbid(unsafe_code)]

extern crate alloc;

mod platform;
pub mod screen;

pub use platform::SimPlatform;

use kernel::{Kernel, KernelConfig, KernelPanic, Pid, Transfer};
use machine_cpu::{Cpu, Trap};
use program_image::ProgramSource;

/// Scheduler spins without a runnable process before the machine halts.
pub const DEFAULT_IDLE_LIMIT: u64 = 1 << 16;

/// Instructions between timer interrupts.
pub const DEFAULT_TIMER_QUANTUM: u64 = 64;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MachineConfig {
    /// Instructions per timer tick; 0 disables the timer.
    pub timer_quantum: u64,
    /// Hand a memory view to the platform on every trap.
    pub show_memory: bool,
    /// See [`KernelConfig::idle_limit`].
    pub idle_limit: Option<u64>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            timer_quantum: DEFAULT_TIMER_QUANTUM,
            show_memory: false,
            idle_limit: Some(DEFAULT_IDLE_LIMIT),
        }
    }
}

/// Why the machine stopped.
#[derive(Debug, Clone, Eq, PartialEq, thiserror::Error)]
pub enum Halted {
    #[error("powered off")]
    PowerOff,
    #[error("no runnable process")]
    Idle,
    #[error("kernel panic: {0}")]
    Panic(#[from] KernelPanic),
    #[error("no program has been booted")]
    NotBooted,
}

#[derive(Debug, Clone, Eq, PartialEq)]
enum State {
    Off,
    Running(Pid),
    Halted(Halted),
}

pub struct Machine {
    kernel: Kernel<SimPlatform>,
    cpu: Cpu,
    state: State,
    traps: u64,
}

impl Machine {
    /// Power on: initialize the kernel, nothing runs yet.
    ///
    /// # Errors
    /// The kernel could not initialize memory.
    pub fn new(config: MachineConfig) -> Result<Self, KernelPanic> {
        let kernel_config = KernelConfig {
            show_memory: config.show_memory,
            idle_limit: config.idle_limit,
        };
        Ok(Self {
            kernel: Kernel::new(SimPlatform::new(), kernel_config)?,
            cpu: Cpu::new(config.timer_quantum),
            state: State::Off,
            traps: 0,
        })
    }

    /// Load the programs selected by `command` and point the CPU at pid 1.
    ///
    /// # Errors
    /// The kernel panicked while loading.
    pub fn boot<S: ProgramSource + ?Sized>(
        &mut self,
        programs: &S,
        command: Option<&str>,
    ) -> Result<Pid, Halted> {
        log::info!("booting {:?}", command.unwrap_or_default());
        let next = self.kernel.start(programs, command);
        self.transfer(next)
    }

    /// Run the current process until it traps and let the kernel handle the
    /// trap. Returns the pid that runs next.
    ///
    /// # Errors
    /// The machine halted, now or earlier.
    pub fn step(&mut self) -> Result<Pid, Halted> {
        let pid = match &self.state {
            State::Running(pid) => *pid,
            State::Halted(halted) => return Err(halted.clone()),
            State::Off => return Err(Halted::NotBooted),
        };

        let (mut regs, root) = match self.kernel.process(pid) {
            Some(process) => (
                process.regs.clone(),
                process.pagetable.ok_or(KernelPanic::MissingPageTable { pid })?,
            ),
            None => return Err(KernelPanic::NoSuchSlot { pid }.into()),
        };

        let trap = self.cpu.run(self.kernel.memory_mut(), root, &mut regs);
        self.traps += 1;
        let next = match trap {
            Trap::Syscall => self.kernel.syscall(&regs),
            Trap::Timer | Trap::Exception(_) => self.kernel.exception(&regs, self.cpu.cr2()),
        };
        self.transfer(next)
    }

    /// Run until the machine halts.
    pub fn run(&mut self) -> Halted {
        loop {
            if let Err(halted) = self.step() {
                return halted;
            }
        }
    }

    /// Run for `ticks` more timer interrupts.
    ///
    /// # Errors
    /// The machine halted first.
    pub fn run_ticks(&mut self, ticks: u64) -> Result<(), Halted> {
        let until = self.kernel.ticks().saturating_add(ticks);
        while self.kernel.ticks() < until {
            self.step()?;
        }
        Ok(())
    }

    /// Step until `done` holds or `max_traps` traps have been handled.
    /// Returns whether `done` held.
    ///
    /// # Errors
    /// The machine halted first.
    pub fn run_until(
        &mut self,
        max_traps: u64,
        mut done: impl FnMut(&Kernel<SimPlatform>) -> bool,
    ) -> Result<bool, Halted> {
        for _ in 0..max_traps {
            if done(&self.kernel) {
                return Ok(true);
            }
            self.step()?;
        }
        Ok(done(&self.kernel))
    }

    #[inline]
    #[must_use]
    pub const fn kernel(&self) -> &Kernel<SimPlatform> {
        &self.kernel
    }

    /// The kernel, e.g. to load further processes after boot.
    #[inline]
    pub const fn kernel_mut(&mut self) -> &mut Kernel<SimPlatform> {
        &mut self.kernel
    }

    #[inline]
    #[must_use]
    pub const fn platform(&self) -> &SimPlatform {
        self.kernel.platform()
    }

    #[inline]
    pub const fn platform_mut(&mut self) -> &mut SimPlatform {
        self.kernel.platform_mut()
    }

    #[inline]
    #[must_use]
    pub const fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Traps handled since boot.
    #[inline]
    #[must_use]
    pub const fn traps(&self) -> u64 {
        self.traps
    }

    /// Why the machine stopped, if it did.
    #[must_use]
    pub const fn halted(&self) -> Option<&Halted> {
        match &self.state {
            State::Halted(halted) => Some(halted),
            State::Off | State::Running(_) => None,
        }
    }

    fn transfer(&mut self, next: Result<Transfer, KernelPanic>) -> Result<Pid, Halted> {
        let halted = match next {
            Ok(Transfer::Resume(pid)) => {
                self.state = State::Running(pid);
                return Ok(pid);
            }
            Ok(Transfer::Idle) => Halted::Idle,
            Ok(Transfer::PowerOff) => Halted::PowerOff,
            Err(panic) => Halted::Panic(panic),
        };
        log::info!("machine halted after {} traps: {halted}", self.traps);
        self.state = State::Halted(halted.clone());
        Err(halted)
    }
}
