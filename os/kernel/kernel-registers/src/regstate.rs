use crate::rflags::Rflags;
use crate::selectors::{SEGSEL_APP_CODE, SEGSEL_APP_DATA, SegmentSelector};

/// The sixteen general-purpose registers, in x86 encoding order.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(u8)]
pub enum Register {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

impl Register {
    pub const ALL: [Self; 16] = [
        Self::Rax,
        Self::Rcx,
        Self::Rdx,
        Self::Rbx,
        Self::Rsp,
        Self::Rbp,
        Self::Rsi,
        Self::Rdi,
        Self::R8,
        Self::R9,
        Self::R10,
        Self::R11,
        Self::R12,
        Self::R13,
        Self::R14,
        Self::R15,
    ];

    #[inline]
    #[must_use]
    pub const fn encoding(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Register {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, u8> {
        Self::ALL.get(usize::from(value)).copied().ok_or(value)
    }
}

/// Snapshot of a process's CPU state, taken at trap entry and restored on
/// return to user mode.
///
/// `reg_intno` and `reg_errcode` are filled in by the trap path and describe
/// why the process stopped running.
#[derive(Debug, Default, Clone, Eq, PartialEq)]
#[repr(C)]
pub struct RegState {
    pub reg_rax: u64,
    pub reg_rcx: u64,
    pub reg_rdx: u64,
    pub reg_rbx: u64,
    pub reg_rbp: u64,
    pub reg_rsi: u64,
    pub reg_rdi: u64,
    pub reg_r8: u64,
    pub reg_r9: u64,
    pub reg_r10: u64,
    pub reg_r11: u64,
    pub reg_r12: u64,
    pub reg_r13: u64,
    pub reg_r14: u64,
    pub reg_r15: u64,

    /// Interrupt vector that caused the trap.
    pub reg_intno: u64,
    /// Error code pushed by the CPU, or 0.
    pub reg_errcode: u64,

    pub reg_rip: u64,
    pub reg_cs: SegmentSelector,
    pub reg_rflags: Rflags,
    pub reg_rsp: u64,
    pub reg_ss: SegmentSelector,
}

impl RegState {
    /// Register state of a freshly created user process: everything zero,
    /// user selectors, interrupts enabled.
    #[must_use]
    pub fn new_user() -> Self {
        Self {
            reg_cs: SEGSEL_APP_CODE,
            reg_ss: SEGSEL_APP_DATA,
            reg_rflags: Rflags::user_default(),
            ..Self::default()
        }
    }

    /// Whether the snapshot was taken while running user code.
    #[inline]
    #[must_use]
    pub const fn is_user_mode(&self) -> bool {
        self.reg_cs.is_user()
    }

    #[must_use]
    pub const fn get(&self, reg: Register) -> u64 {
        match reg {
            Register::Rax => self.reg_rax,
            Register::Rcx => self.reg_rcx,
            Register::Rdx => self.reg_rdx,
            Register::Rbx => self.reg_rbx,
            Register::Rsp => self.reg_rsp,
            Register::Rbp => self.reg_rbp,
            Register::Rsi => self.reg_rsi,
            Register::Rdi => self.reg_rdi,
            Register::R8 => self.reg_r8,
            Register::R9 => self.reg_r9,
            Register::R10 => self.reg_r10,
            Register::R11 => self.reg_r11,
            Register::R12 => self.reg_r12,
            Register::R13 => self.reg_r13,
            Register::R14 => self.reg_r14,
            Register::R15 => self.reg_r15,
        }
    }

    pub const fn set(&mut self, reg: Register, value: u64) {
        let slot = match reg {
            Register::Rax => &mut self.reg_rax,
            Register::Rcx => &mut self.reg_rcx,
            Register::Rdx => &mut self.reg_rdx,
            Register::Rbx => &mut self.reg_rbx,
            Register::Rsp => &mut self.reg_rsp,
            Register::Rbp => &mut self.reg_rbp,
            Register::Rsi => &mut self.reg_rsi,
            Register::Rdi => &mut self.reg_rdi,
            Register::R8 => &mut self.reg_r8,
            Register::R9 => &mut self.reg_r9,
            Register::R10 => &mut self.reg_r10,
            Register::R11 => &mut self.reg_r11,
            Register::R12 => &mut self.reg_r12,
            Register::R13 => &mut self.reg_r13,
            Register::R14 => &mut self.reg_r14,
            Register::R15 => &mut self.reg_r15,
        };
        *slot = value;
    }
}
