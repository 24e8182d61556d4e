//! # CPU Core
//!
//! Executes one register snapshot against one page table until something
//! traps back to the kernel. Every fetch, load and store is translated
//! through the page table with the privilege of the snapshot's code
//! selector, so user code faults exactly where x86 paging would fault it.

use crate::decoder::{decode, instruction_length};
use crate::instruction::Instruction;
use crate::isa::MAX_INSTRUCTION_LEN;
use crate::trap::{Exception, Trap};
use kernel_memory_addresses::{PhysicalPage, VirtualAddress};
use kernel_registers::{RegState, Register};
use kernel_vmem::{Access, AccessKind, PhysMapper, translate};

/// The processor: interval timer state plus the CR2 register.
///
/// Register contents live in the [`RegState`] handed to [`Cpu::run`].
#[derive(Debug, Clone)]
pub struct Cpu {
    timer_quantum: u64,
    countdown: u64,
    retired: u64,
    cr2: VirtualAddress,
}

impl Cpu {
    /// A CPU whose timer fires every `timer_quantum` retired instructions.
    /// A quantum of 0 disables the timer.
    #[must_use]
    pub const fn new(timer_quantum: u64) -> Self {
        Self {
            timer_quantum,
            countdown: timer_quantum,
            retired: 0,
            cr2: VirtualAddress::zero(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn timer_quantum(&self) -> u64 {
        self.timer_quantum
    }

    /// Instructions retired since power-on.
    #[inline]
    #[must_use]
    pub const fn retired(&self) -> u64 {
        self.retired
    }

    /// Address of the most recent page fault.
    #[inline]
    #[must_use]
    pub const fn cr2(&self) -> VirtualAddress {
        self.cr2
    }

    /// Run `regs` in the address space rooted at `root` until it traps.
    ///
    /// On return `regs` holds the state at the trap: `reg_rip` points at the
    /// faulting instruction for faults and past the instruction for
    /// `syscall`, `int3` and the timer. `reg_intno` and `reg_errcode` are set
    /// for everything but `syscall`.
    pub fn run<M: PhysMapper + ?Sized>(
        &mut self,
        mem: &mut M,
        root: PhysicalPage,
        regs: &mut RegState,
    ) -> Trap {
        loop {
            if let Some(trap) = self.step(mem, root, regs) {
                return trap;
            }
        }
    }

    /// Deliver a pending timer interrupt or execute one instruction.
    pub fn step<M: PhysMapper + ?Sized>(
        &mut self,
        mem: &mut M,
        root: PhysicalPage,
        regs: &mut RegState,
    ) -> Option<Trap> {
        if self.timer_pending() && regs.reg_rflags.if_interrupt_enable() {
            self.countdown = self.timer_quantum;
            return Some(self.deliver(regs, Trap::Timer));
        }

        let mut mmu = Mmu {
            mem,
            root,
            user: regs.is_user_mode(),
        };
        match self.execute(&mut mmu, regs) {
            Ok(None) => {
                self.retire();
                None
            }
            Ok(Some(trap)) => {
                self.retire();
                Some(self.deliver(regs, trap))
            }
            Err(exception) => Some(self.deliver(regs, Trap::Exception(exception))),
        }
    }

    const fn timer_pending(&self) -> bool {
        self.timer_quantum != 0 && self.countdown == 0
    }

    const fn retire(&mut self) {
        self.retired += 1;
        self.countdown = self.countdown.saturating_sub(1);
    }

    fn deliver(&mut self, regs: &mut RegState, trap: Trap) -> Trap {
        if let Some(vector) = trap.vector() {
            regs.reg_intno = vector;
            regs.reg_errcode = match trap {
                Trap::Exception(e) => e.error_code,
                Trap::Syscall | Trap::Timer => 0,
            };
        }
        if let Trap::Exception(Exception {
            address: Some(addr),
            ..
        }) = trap
        {
            self.cr2 = addr;
        }
        log::trace!("trap {trap:?} at rip {:#x}", regs.reg_rip);
        trap
    }

    /// Execute the instruction at `rip`. Faulting instructions leave `regs`
    /// untouched.
    #[allow(clippy::too_many_lines)]
    fn execute<M: PhysMapper + ?Sized>(
        &mut self,
        mmu: &mut Mmu<'_, M>,
        regs: &mut RegState,
    ) -> Result<Option<Trap>, Exception> {
        let rip = regs.reg_rip;
        let insn = mmu.fetch(rip)?;
        let next = rip.wrapping_add(insn.encoded_len() as u64);
        let target = |rel: i32| next.wrapping_add_signed(i64::from(rel));
        let ea = |regs: &RegState, base: Register, disp: i32| {
            regs.get(base).wrapping_add_signed(i64::from(disp))
        };

        let mut rip_after = next;
        match insn {
            Instruction::Nop => {}
            Instruction::MovImm { dst, imm } => regs.set(dst, imm),
            Instruction::Mov { dst, src } => regs.set(dst, regs.get(src)),
            Instruction::LoadByte { dst, base, disp } => {
                let [byte] = mmu.read::<1>(ea(regs, base, disp))?;
                regs.set(dst, u64::from(byte));
            }
            Instruction::StoreByte { base, src, disp } => {
                let low = regs.get(src).to_le_bytes()[0];
                mmu.write(ea(regs, base, disp), [low])?;
            }
            Instruction::LoadQuad { dst, base, disp } => {
                let value = u64::from_le_bytes(mmu.read(ea(regs, base, disp))?);
                regs.set(dst, value);
            }
            Instruction::StoreQuad { base, src, disp } => {
                mmu.write(ea(regs, base, disp), regs.get(src).to_le_bytes())?;
            }
            Instruction::Add { dst, src } => regs.set(dst, regs.get(dst).wrapping_add(regs.get(src))),
            Instruction::Sub { dst, src } => regs.set(dst, regs.get(dst).wrapping_sub(regs.get(src))),
            Instruction::AddImm { dst, imm } => {
                regs.set(dst, regs.get(dst).wrapping_add_signed(i64::from(imm)));
            }
            Instruction::Jump { rel } => rip_after = target(rel),
            Instruction::JumpZero { reg, rel } => {
                if regs.get(reg) == 0 {
                    rip_after = target(rel);
                }
            }
            Instruction::JumpNotZero { reg, rel } => {
                if regs.get(reg) != 0 {
                    rip_after = target(rel);
                }
            }
            Instruction::JumpEqual { a, b, rel } => {
                if regs.get(a) == regs.get(b) {
                    rip_after = target(rel);
                }
            }
            Instruction::JumpNotEqual { a, b, rel } => {
                if regs.get(a) != regs.get(b) {
                    rip_after = target(rel);
                }
            }
            Instruction::JumpBelow { a, b, rel } => {
                if regs.get(a) < regs.get(b) {
                    rip_after = target(rel);
                }
            }
            Instruction::Push(reg) => {
                let sp = regs.reg_rsp.wrapping_sub(8);
                mmu.write(sp, regs.get(reg).to_le_bytes())?;
                regs.reg_rsp = sp;
            }
            Instruction::Pop(reg) => {
                let value = u64::from_le_bytes(mmu.read(regs.reg_rsp)?);
                regs.reg_rsp = regs.reg_rsp.wrapping_add(8);
                regs.set(reg, value);
            }
            Instruction::Call { rel } => {
                let sp = regs.reg_rsp.wrapping_sub(8);
                mmu.write(sp, next.to_le_bytes())?;
                regs.reg_rsp = sp;
                rip_after = target(rel);
            }
            Instruction::Ret => {
                rip_after = u64::from_le_bytes(mmu.read(regs.reg_rsp)?);
                regs.reg_rsp = regs.reg_rsp.wrapping_add(8);
            }
            Instruction::Syscall => {
                // SYSCALL saves the return address in rcx and the flags in r11.
                regs.reg_rcx = next;
                regs.reg_r11 = regs.reg_rflags.into_bits();
                regs.reg_rip = next;
                return Ok(Some(Trap::Syscall));
            }
            Instruction::Int3 => {
                regs.reg_rip = next;
                return Ok(Some(Trap::Exception(Exception::breakpoint())));
            }
            Instruction::Hlt => {
                if mmu.user {
                    return Err(Exception::general_protection());
                }
                // Sleep until the next timer interrupt.
                self.countdown = 0;
            }
        }
        regs.reg_rip = rip_after;
        Ok(None)
    }
}

/// Memory as seen by the running code.
struct Mmu<'a, M: PhysMapper + ?Sized> {
    mem: &'a mut M,
    root: PhysicalPage,
    user: bool,
}

impl<M: PhysMapper + ?Sized> Mmu<'_, M> {
    fn locate(&self, addr: u64, kind: AccessKind) -> Result<(PhysicalPage, usize), Exception> {
        let va = VirtualAddress::new(addr);
        if !va.is_canonical() {
            return Err(Exception::general_protection());
        }
        let pa = translate(&*self.mem, self.root, va, Access::new(kind, self.user))
            .map_err(|error| Exception::page_fault(va, error))?;
        let (page, offset) = pa.split();
        if self.mem.frame(page).is_none() {
            return Err(Exception::general_protection());
        }
        #[allow(clippy::cast_possible_truncation)]
        Ok((page, offset as usize))
    }

    fn byte(&self, addr: u64, kind: AccessKind) -> Result<u8, Exception> {
        let (page, offset) = self.locate(addr, kind)?;
        self.mem
            .frame(page)
            .map(|frame| frame[offset])
            .ok_or_else(Exception::general_protection)
    }

    fn fetch(&self, rip: u64) -> Result<Instruction, Exception> {
        let mut buf = [0u8; MAX_INSTRUCTION_LEN];
        buf[0] = self.byte(rip, AccessKind::Execute)?;
        let len = instruction_length(buf[0]).map_err(|_| Exception::invalid_opcode())?;
        for (i, slot) in buf.iter_mut().enumerate().take(len).skip(1) {
            *slot = self.byte(rip.wrapping_add(i as u64), AccessKind::Execute)?;
        }
        decode(&buf[..len]).map_err(|_| Exception::invalid_opcode())
    }

    fn read<const N: usize>(&self, addr: u64) -> Result<[u8; N], Exception> {
        let mut out = [0u8; N];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.byte(addr.wrapping_add(i as u64), AccessKind::Read)?;
        }
        Ok(out)
    }

    /// All bytes are translated before any is written.
    fn write<const N: usize>(&mut self, addr: u64, bytes: [u8; N]) -> Result<(), Exception> {
        let mut targets = [(PhysicalPage::from_number(0), 0usize); N];
        for (i, slot) in targets.iter_mut().enumerate() {
            *slot = self.locate(addr.wrapping_add(i as u64), AccessKind::Write)?;
        }
        for ((page, offset), byte) in targets.into_iter().zip(bytes) {
            if let Some(frame) = self.mem.frame_mut(page) {
                frame[offset] = byte;
            }
        }
        Ok(())
    }
}
