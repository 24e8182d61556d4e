//! Boots the kernel on the simulated machine, runs it, and prints the
//! console (and optionally the memory viewer) when it stops.
//!
//! ```text
//! weensy [--memshow] [--ticks N] [COMMAND]
//! ```
//!
//! Log records go to standard error through the debug console logger.

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use kernel_debugcon::DebugconLogger;
use log::LevelFilter;
use machine::{Halted, Machine, MachineConfig, screen};
use std::fmt;

/// Run the kernel on a simulated x86-64 machine.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Show the memory viewer when the machine stops
    #[arg(long)]
    memshow: bool,

    /// Timer ticks to run before stopping
    #[arg(long, default_value_t = 1000)]
    ticks: u64,

    /// Instructions per timer tick
    #[arg(long, default_value_t = machine::DEFAULT_TIMER_QUANTUM)]
    quantum: u64,

    /// Most verbose log level written to stderr
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,

    /// A program name, `pipe` for the pipe pair, or anything else for
    /// alice and eve. Defaults to the allocator.
    command: Option<String>,
}

fn to_stderr(args: fmt::Arguments<'_>) {
    eprint!("{args}");
}

static LOGGER: DebugconLogger = DebugconLogger::new(to_stderr);

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    LOGGER
        .init(args.log_level)
        .map_err(|e| anyhow!("installing the logger: {e}"))?;

    let config = MachineConfig {
        timer_quantum: args.quantum,
        show_memory: args.memshow,
        ..MachineConfig::default()
    };
    let bundle = programs::bundle().context("assembling the programs")?;
    let mut machine = Machine::new(config).context("powering on")?;

    let outcome = machine
        .boot(&bundle, args.command.as_deref())
        .and_then(|_| machine.run_ticks(args.ticks));

    let console = screen::render_console(machine.kernel().memory()).context("reading the console")?;
    println!("{console}");
    if args.memshow
        && let Some(view) = machine.platform().last_view()
    {
        println!("{}", screen::render_memory(view));
    }

    match outcome {
        Ok(()) => {
            log::info!("stopped after {} ticks", args.ticks);
            Ok(())
        }
        Err(halted @ (Halted::PowerOff | Halted::Idle)) => {
            log::info!("{halted}");
            Ok(())
        }
        Err(halted) => Err(halted.into()),
    }
}
