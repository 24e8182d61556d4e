//! # Debug Console Logging
//!
//! The kernel's diagnostic output channel. Kernel code logs through the
//! [`log`] facade; [`DebugconLogger`] formats each record as one line and
//! hands it to a sink function supplied by whoever hosts the kernel (the
//! machine writes it to standard error, tests capture it).
//!
//! ## Output Mechanism
//! ```text
//! Kernel Code
//!     ↓
//! log::info! / debugcon_trace!
//!     ↓
//! DebugconLogger (log::Log)
//!     ↓
//! sink(fmt::Arguments)
//!     ↓
//! Host stderr / test buffer
//! ```
//!
//! Each record is rendered as `[LEVEL] target: message` followed by a
//! newline. Formatting is done with `format_args!`, so the logger itself
//! never allocates.
//!
//! ## Feature System
//!
//! ### `enabled` Feature (default)
//! When disabled, [`debugcon_trace!`] compiles to nothing and the logger
//! drops every record.
//!
//! ## Usage
//! ```rust
//! use core::fmt;
//! use kernel_debugcon::DebugconLogger;
//! use log::LevelFilter;
//!
//! fn to_stderr(args: fmt::Arguments<'_>) {
//!     eprint!("{args}");
//! }
//!
//! static LOGGER: DebugconLogger = DebugconLogger::new(to_stderr);
//!
//! LOGGER.init(LevelFilter::Debug).expect("logger initialization");
//! log::info!("kernel subsystem initialized");
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![forbid(unsafe_code)]

use core::fmt;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// Destination of formatted log lines.
pub type Sink = fn(fmt::Arguments<'_>);

/// A [`Log`] implementation writing one line per record to a [`Sink`].
pub struct DebugconLogger {
    sink: Sink,
}

impl DebugconLogger {
    #[must_use]
    pub const fn new(sink: Sink) -> Self {
        Self { sink }
    }

    /// Install as the global logger. Call this once during early init.
    ///
    /// # Errors
    /// A logger was already installed.
    pub fn init(&'static self, max_level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_logger(self)?;
        log::set_max_level(max_level);
        Ok(())
    }

    /// Render `record` into the sink without level filtering.
    pub fn write_record(&self, record: &Record<'_>) {
        (self.sink)(format_args!(
            "[{}] {}: {}\n",
            record.level(),
            record.target(),
            record.args()
        ));
    }
}

impl Log for DebugconLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        cfg!(feature = "enabled") && metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if self.enabled(record.metadata()) {
            self.write_record(record);
        }
    }

    fn flush(&self) {}
}

/// Trace-level output to the debug console, compiled out when the `enabled`
/// feature is off.
#[cfg(feature = "enabled")]
#[macro_export]
macro_rules! debugcon_trace {
    ($($arg:tt)*) => {
        ::log::trace!(target: "debugcon", $($arg)*)
    };
}

#[cfg(not(feature = "enabled"))]
#[macro_export]
macro_rules! debugcon_trace {
    ($($arg:tt)*) => {{}};
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::string::String;

    thread_local! {
        static CAPTURED: RefCell<String> = const { RefCell::new(String::new()) };
    }

    fn capture(args: fmt::Arguments<'_>) {
        CAPTURED.with(|c| c.borrow_mut().push_str(&args.to_string()));
    }

    #[test]
    fn renders_level_target_and_message() {
        let logger = DebugconLogger::new(capture);
        logger.write_record(
            &Record::builder()
                .level(log::Level::Warn)
                .target("kernel::scheduler")
                .args(format_args!("pid {} faulted", 3))
                .build(),
        );
        CAPTURED.with(|c| {
            assert_eq!(c.borrow().as_str(), "[WARN] kernel::scheduler: pid 3 faulted\n");
        });
    }
}
