//! System calls issued by assembled user programs running on the machine CPU.

use kernel::{Kernel, KernelConfig, KernelPanic, NullPlatform, Pid, Transfer, console};
use kernel_info::memory::{CONSOLE_ADDR, KERNEL_START_ADDR, MEMSIZE_PHYSICAL};
use kernel_info::process::process_window;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, VirtualAddress};
use kernel_registers::Register::Rbx;
use kernel_vmem::{PageEntryBits, walk};
use machine_cpu::{Assembler, Cpu, Trap};
use program_image::{ProgramBundle, ProgramImage, Segment};
use stdlib::syscall::{
    sys_getpid, sys_getsysname, sys_page_alloc, sys_panic, sys_piperead, sys_pipewrite, sys_spawn,
    sys_yield, syscall_number,
};
use stdlib::syscall_abi::SYSCALL_FAILURE;

/// First byte of the data page following a program's text.
fn data(pid: Pid) -> u64 {
    process_window(pid).start + 0x1000
}

fn program(name: &str, pid: Pid, data: &[u8], build: impl FnOnce(&mut Assembler)) -> ProgramImage {
    let base = VirtualAddress::new(process_window(pid).start);
    let mut asm = Assembler::new(base);
    build(&mut asm);
    let text = asm.finish().unwrap();
    ProgramImage::new(name, pid, base)
        .with_segment(Segment::new(base, 0x1000, text).unwrap())
        .with_segment(Segment::new(base + 0x1000, 0x1000, data.to_vec()).unwrap())
}

struct Rig {
    kernel: Kernel<NullPlatform>,
    cpu: Cpu,
}

impl Rig {
    fn new() -> Self {
        let config = KernelConfig {
            idle_limit: Some(64),
            ..KernelConfig::default()
        };
        Self {
            kernel: Kernel::new(NullPlatform, config).unwrap(),
            cpu: Cpu::new(0),
        }
    }

    /// Boot a single program as pid 1.
    fn solo(data: &[u8], build: impl FnOnce(&mut Assembler)) -> Self {
        let mut rig = Self::new();
        rig.start(&[program("allocator", 1, data, build)], None);
        rig
    }

    fn start(&mut self, images: &[ProgramImage], command: Option<&str>) {
        let bundle: ProgramBundle = images.iter().cloned().collect();
        assert_eq!(self.kernel.start(&bundle, command), Ok(Transfer::Resume(1)));
    }

    /// Run the current process until it traps and hand the trap to the kernel.
    fn trap(&mut self) -> Result<Transfer, KernelPanic> {
        let pid = self.kernel.current();
        let process = self.kernel.process(pid).unwrap();
        let mut regs = process.regs.clone();
        let root = process.pagetable.unwrap();
        match self.cpu.run(self.kernel.memory_mut(), root, &mut regs) {
            Trap::Syscall => self.kernel.syscall(&regs),
            Trap::Timer | Trap::Exception(_) => self.kernel.exception(&regs, self.cpu.cr2()),
        }
    }

    fn rax(&self, pid: Pid) -> u64 {
        self.kernel.process(pid).unwrap().regs.reg_rax
    }

    fn read(&self, addr: u64, len: usize) -> Vec<u8> {
        let mut buf = vec![0; len];
        self.kernel
            .memory()
            .read(PhysicalAddress::new(addr), &mut buf)
            .unwrap();
        buf
    }
}

#[test]
fn getpid_returns_the_callers_pid() {
    let mut rig = Rig::new();
    rig.start(
        &[
            program("alice", 1, &[], sys_getpid),
            program("eve", 2, &[], sys_getpid),
        ],
        Some("pair"),
    );

    assert_eq!(rig.trap(), Ok(Transfer::Resume(1)));
    assert_eq!(rig.rax(1), 1);

    assert_eq!(rig.kernel.run(2), Ok(Transfer::Resume(2)));
    assert_eq!(rig.trap(), Ok(Transfer::Resume(2)));
    assert_eq!(rig.rax(2), 2);
}

#[test]
fn yield_hands_over_and_returns_zero() {
    let mut rig = Rig::new();
    rig.start(
        &[
            program("alice", 1, &[], sys_yield),
            program("eve", 2, &[], sys_yield),
        ],
        Some("pair"),
    );

    assert_eq!(rig.trap(), Ok(Transfer::Resume(2)));
    assert_eq!(rig.rax(1), 0);
    assert_eq!(rig.trap(), Ok(Transfer::Resume(1)));
    assert_eq!(rig.rax(2), 0);
}

#[test]
fn getsysname_copies_the_terminated_name() {
    let mut rig = Rig::solo(&[0xFF; 16], |asm| sys_getsysname(asm, data(1)));

    assert_eq!(rig.trap(), Ok(Transfer::Resume(1)));
    assert_eq!(rig.rax(1), 0);
    assert_eq!(rig.read(data(1), 14), b"DemoOS 61.61\0\xFF");
}

#[test]
fn getsysname_into_the_null_page_is_a_kernel_fault() {
    let mut rig = Rig::solo(&[], |asm| sys_getsysname(asm, 0u64));

    let err = rig.trap().unwrap_err();
    assert!(matches!(err, KernelPanic::KernelPageFault { addr: 0, .. }), "{err}");
    let row = console::read_row(rig.kernel.memory(), console::ERROR_ROW).unwrap();
    assert!(row.starts_with(b"Kernel page fault on 0x0 "));
}

#[test]
fn page_alloc_maps_a_zeroed_user_page() {
    let mut rig = Rig::new();
    rig.kernel
        .memory_mut()
        .fill(PhysicalAddress::new(0x10_3000), 0x1000, 0xCC)
        .unwrap();
    rig.start(
        &[program("allocator", 1, &[], |asm| {
            sys_page_alloc(asm, 0x10_3000u64);
        })],
        None,
    );

    assert_eq!(rig.trap(), Ok(Transfer::Resume(1)));
    assert_eq!(rig.rax(1), 0);

    let page = PhysicalPage::containing(PhysicalAddress::new(0x10_3000));
    assert_eq!(rig.kernel.allocator().pages().refcount(page), Some(1));
    let w = walk(rig.kernel.memory(), rig.kernel.kernel_pagetable(), VirtualAddress::new(0x10_3000));
    assert!(w.perm.allows(PageEntryBits::USER_RW));
    assert!(rig.read(0x10_3000, 0x1000).iter().all(|&b| b == 0));
}

#[test]
fn page_alloc_refuses_malformed_requests() {
    let refused = [0x10_3001, KERNEL_START_ADDR, CONSOLE_ADDR, MEMSIZE_PHYSICAL];
    let mut rig = Rig::solo(&[], |asm| {
        for addr in refused {
            sys_page_alloc(asm, addr);
        }
    });

    for addr in refused {
        assert_eq!(rig.trap(), Ok(Transfer::Resume(1)));
        assert_eq!(rig.rax(1), SYSCALL_FAILURE, "page_alloc({addr:#x})");
    }
}

#[test]
fn page_alloc_of_an_owned_page_is_fatal() {
    let mut rig = Rig::solo(&[], |asm| {
        sys_page_alloc(asm, 0x10_3000u64);
        sys_page_alloc(asm, 0x10_3000u64);
    });

    assert_eq!(rig.trap(), Ok(Transfer::Resume(1)));
    assert_eq!(
        rig.trap(),
        Err(KernelPanic::PageAllocInUse {
            pid: 1,
            va: VirtualAddress::new(0x10_3000)
        })
    );
}

#[test]
fn page_alloc_of_the_programs_own_text_is_fatal() {
    let mut rig = Rig::solo(&[], |asm| sys_page_alloc(asm, 0x10_0000u64));
    assert!(matches!(rig.trap(), Err(KernelPanic::PageAllocInUse { pid: 1, .. })));
}

#[test]
fn spawn_always_fails() {
    let mut rig = Rig::solo(b"alice\0", |asm| sys_spawn(asm, data(1)));
    assert_eq!(rig.trap(), Ok(Transfer::Resume(1)));
    assert_eq!(rig.rax(1), SYSCALL_FAILURE);
    assert_eq!(rig.kernel.processes().live().count(), 1);
}

#[test]
fn user_panic_halts_with_its_message() {
    let mut rig = Rig::solo(b"oh no\0", |asm| sys_panic(asm, data(1)));

    assert_eq!(
        rig.trap(),
        Err(KernelPanic::UserPanic {
            pid: 1,
            message: "oh no".into()
        })
    );
    let row = console::read_row(rig.kernel.memory(), console::ERROR_ROW).unwrap();
    assert!(row.starts_with(b"PANIC: oh no "));
}

#[test]
fn unknown_system_call_is_fatal() {
    let mut rig = Rig::solo(&[], |asm| syscall_number(asm, 99, &[]));

    let err = rig.trap().unwrap_err();
    assert_eq!(err, KernelPanic::UnexpectedSyscall { number: 99 });
    assert_eq!(err.to_string(), "Unexpected system call 99!");
}

#[test]
fn pipe_carries_one_byte_at_a_time() {
    let mut rig = Rig::new();
    rig.start(
        &[
            program("pipewriter", 1, b"xy", |asm| {
                sys_pipewrite(asm, data(1), 0u64);
                sys_pipewrite(asm, data(1), 2u64);
                asm.movi(Rbx, data(1) + 1);
                sys_pipewrite(asm, Rbx, 1u64);
            }),
            program("pipereader", 2, &[], |asm| {
                sys_piperead(asm, data(2), 8u64);
                sys_piperead(asm, data(2), 8u64);
            }),
        ],
        Some("pipe"),
    );

    assert_eq!(rig.trap(), Ok(Transfer::Resume(1)));
    assert_eq!(rig.rax(1), 0);
    assert_eq!(rig.trap(), Ok(Transfer::Resume(1)));
    assert_eq!(rig.rax(1), 1);
    assert_eq!(rig.kernel.pipe().peek(), Some(b'x'));
    // Full: the second byte is refused and the buffer keeps the first.
    assert_eq!(rig.trap(), Ok(Transfer::Resume(1)));
    assert_eq!(rig.rax(1), SYSCALL_FAILURE);
    assert_eq!(rig.kernel.pipe().peek(), Some(b'x'));

    assert_eq!(rig.kernel.run(2), Ok(Transfer::Resume(2)));
    assert_eq!(rig.trap(), Ok(Transfer::Resume(2)));
    assert_eq!(rig.rax(2), 1);
    assert_eq!(rig.read(data(2), 2), b"x\0");
    assert!(rig.kernel.pipe().is_empty());

    assert_eq!(rig.trap(), Ok(Transfer::Resume(2)));
    assert_eq!(rig.rax(2), SYSCALL_FAILURE);
}

#[test]
fn pipe_write_from_an_unmapped_buffer_is_a_kernel_fault() {
    let mut rig = Rig::solo(&[], |asm| sys_pipewrite(asm, 0x10u64, 1u64));

    let err = rig.trap().unwrap_err();
    assert!(matches!(err, KernelPanic::KernelPageFault { addr: 0x10, .. }), "{err}");
    assert!(rig.kernel.pipe().is_empty());
}

#[test]
fn full_pipe_refuses_a_write_without_reading_the_buffer() {
    let mut rig = Rig::solo(b"z", |asm| {
        sys_pipewrite(asm, data(1), 1u64);
        sys_pipewrite(asm, 0x10u64, 1u64);
    });

    assert_eq!(rig.trap(), Ok(Transfer::Resume(1)));
    assert_eq!(rig.rax(1), 1);
    assert_eq!(rig.trap(), Ok(Transfer::Resume(1)));
    assert_eq!(rig.rax(1), SYSCALL_FAILURE);
    assert_eq!(rig.kernel.pipe().peek(), Some(b'z'));
}

#[test]
fn pipe_read_into_an_unmapped_buffer_keeps_the_byte() {
    let mut rig = Rig::solo(b"q", |asm| {
        sys_pipewrite(asm, data(1), 1u64);
        sys_piperead(asm, 0x10u64, 1u64);
    });

    assert_eq!(rig.trap(), Ok(Transfer::Resume(1)));
    let err = rig.trap().unwrap_err();
    assert!(matches!(err, KernelPanic::KernelPageFault { addr: 0x10, .. }), "{err}");
    assert_eq!(rig.kernel.pipe().peek(), Some(b'q'));
}
