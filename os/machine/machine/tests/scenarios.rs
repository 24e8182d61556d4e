//! Whole workloads from the program library, booted and run on the machine.

use kernel::{Kernel, KEY_CTRL_C, KernelPanic, PageOwner, ProcessState, console};
use kernel_info::memory::CONSOLE_COLUMNS;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage};
use machine::{Halted, Machine, MachineConfig, SimPlatform, screen};
use programs::{COUNTER_COLUMN, PANIC_MESSAGE, PIPE_MESSAGE, PIPE_ROW};

const MAX_TRAPS: u64 = 20_000;

fn boot_with(config: MachineConfig, command: Option<&str>) -> Machine {
    let mut machine = Machine::new(config).unwrap();
    machine.boot(&programs::bundle().unwrap(), command).unwrap();
    machine
}

fn boot(command: Option<&str>) -> Machine {
    boot_with(MachineConfig::default(), command)
}

fn row(kernel: &Kernel<SimPlatform>, row: usize) -> [u8; CONSOLE_COLUMNS] {
    console::read_row(kernel.memory(), row).unwrap()
}

fn counter_moved(kernel: &Kernel<SimPlatform>, pid: usize) -> bool {
    row(kernel, pid)[COUNTER_COLUMN] != b' '
}

fn page(addr: u64) -> PhysicalPage {
    PhysicalPage::containing(PhysicalAddress::new(addr))
}

#[test]
fn pipe_delivers_the_message_in_order() {
    let mut machine = boot(Some("pipe"));
    let delivered = machine
        .run_until(MAX_TRAPS, |k| row(k, PIPE_ROW).starts_with(PIPE_MESSAGE))
        .unwrap();

    assert!(delivered);
    assert!(machine.kernel().pipe().is_empty());
    for pid in [1, 2] {
        assert_eq!(machine.kernel().process(pid).unwrap().state, ProcessState::Runnable);
    }
}

#[test]
fn greeters_print_the_system_name_and_both_make_progress() {
    let mut machine = boot(Some("bogus"));
    let both = machine
        .run_until(MAX_TRAPS, |k| counter_moved(k, 1) && counter_moved(k, 2))
        .unwrap();
    assert!(both);

    let lines = screen::console_lines(machine.kernel().memory()).unwrap();
    assert!(lines[1].starts_with("DemoOS 61.61  Hi, I'm Alice!"));
    assert!(lines[2].starts_with("DemoOS 61.61  Hi, I'm Eve!"));
}

#[test]
fn timer_preempts_the_process_that_never_yields() {
    let mut machine = boot(Some("eve"));
    machine.kernel_mut()
        .process_setup(2, &programs::build("spinner", 2).unwrap())
        .unwrap();

    let mut ran = [0u32; 3];
    for _ in 0..200 {
        ran[machine.step().unwrap()] += 1;
    }
    assert!(ran[1] > 0 && ran[2] > 0, "{ran:?}");

    let kernel = machine.kernel();
    assert!(kernel.ticks() > 50);
    assert_eq!(machine.platform().timer_acks(), kernel.ticks() - 1);
}

#[test]
fn faulting_process_does_not_stop_the_others() {
    let mut machine = boot(Some("nullderef"));
    machine.kernel_mut()
        .process_setup(2, &programs::build("alice", 2).unwrap())
        .unwrap();

    let alice_ran = machine.run_until(MAX_TRAPS, |k| counter_moved(k, 2)).unwrap();
    assert!(alice_ran);

    let kernel = machine.kernel();
    assert_eq!(kernel.process(1).unwrap().state, ProcessState::Faulted);
    assert_eq!(kernel.process(2).unwrap().state, ProcessState::Runnable);
    assert!(row(kernel, console::ERROR_ROW)
        .starts_with(b"Process 1 page fault on 0x0 (read missing page, rip=0x10000a)!"));
}

#[test]
fn write_to_kernel_memory_faults_and_leaves_the_machine_idle() {
    let mut machine = boot(Some("writeconst"));
    assert_eq!(machine.run(), Halted::Idle);
    assert!(row(machine.kernel(), console::ERROR_ROW).starts_with(
        b"Process 1 page fault on 0x40000 (write protection problem, rip=0x100014)!"
    ));
    let mut byte = [0u8; 1];
    machine
        .kernel()
        .memory()
        .read(PhysicalAddress::new(0x4_0000), &mut byte)
        .unwrap();
    assert_eq!(byte, [0]);
}

#[test]
fn user_panic_halts_the_machine() {
    let mut machine = boot(Some("panicker"));
    assert_eq!(
        machine.run(),
        Halted::Panic(KernelPanic::UserPanic {
            pid: 1,
            message: PANIC_MESSAGE.into()
        })
    );
    let expected = format!("PANIC: {PANIC_MESSAGE}");
    assert!(row(machine.kernel(), console::ERROR_ROW).starts_with(expected.as_bytes()));
}

#[test]
fn unknown_system_call_halts_the_machine() {
    let mut machine = boot(Some("badsyscall"));
    assert_eq!(
        machine.run(),
        Halted::Panic(KernelPanic::UnexpectedSyscall { number: 99 })
    );
}

#[test]
fn kernel_fault_on_a_user_pointer_halts_the_machine() {
    let mut machine = boot(Some("kernelfault"));
    let halted = machine.run();
    assert!(
        matches!(halted, Halted::Panic(KernelPanic::KernelPageFault { addr: 0, .. })),
        "{halted}"
    );
}

#[test]
fn allocator_grows_its_heap_up_to_the_stack() {
    let mut machine = boot(None);
    let last = page(0x13_E000);
    let grown = machine
        .run_until(MAX_TRAPS, |k| k.allocator().pages().refcount(last) == Some(1))
        .unwrap();
    assert!(grown);

    // Having reached the stack it stops asking and keeps yielding.
    machine.run_ticks(5).unwrap();
    let kernel = machine.kernel();
    assert_eq!(kernel.process(1).unwrap().state, ProcessState::Runnable);

    let view = kernel.memory_view(None);
    // text, data, 61 heap pages, stack
    assert_eq!(view.count(PageOwner::Process(1)), 64);
    for addr in (0x10_2000..0x13_F000).step_by(0x1000) {
        let mut tag = [0u8; 1];
        kernel.memory().read(PhysicalAddress::new(addr), &mut tag).unwrap();
        assert_eq!(tag, [1], "page {addr:#x}");
    }
}

#[test]
fn memory_viewer_follows_the_processes() {
    let config = MachineConfig {
        show_memory: true,
        ..MachineConfig::default()
    };
    let mut machine = boot_with(config, Some("pipe"));
    machine.run_ticks(60).unwrap();

    let platform = machine.platform();
    assert!(platform.views() > 0);
    let view = platform.last_view().unwrap();
    assert!(view.process.is_some());
    assert_eq!(view.owner(page(0x10_0000)), Some(PageOwner::Process(1)));
    assert_eq!(view.owner(page(0x14_0000)), Some(PageOwner::Process(2)));

    let text = screen::render_memory(view);
    assert!(text.starts_with("PHYSICAL MEMORY"));
    assert!(text.contains("VIRTUAL ADDRESS SPACE FOR "));
}

#[test]
fn ctrl_c_powers_off() {
    let mut machine = boot(Some("spinner"));
    machine.run_ticks(5).unwrap();
    machine.platform_mut().press(KEY_CTRL_C);
    assert_eq!(machine.run(), Halted::PowerOff);
    assert_eq!(machine.halted(), Some(&Halted::PowerOff));
}
