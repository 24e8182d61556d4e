/// System call numbers, passed in `rax`.
#[repr(u64)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Sysno {
    /// Return the caller's process id.
    GetPid = 1,
    /// Give up the CPU; returns 0 once the caller runs again.
    Yield = 2,
    /// Halt the machine with the NUL-terminated message at `rdi`.
    Panic = 3,
    /// Map a fresh zeroed page at the page-aligned address in `rdi`.
    PageAlloc = 4,
    /// Copy the NUL-terminated system name into the buffer at `rdi`.
    GetSysName = 5,
    /// Start the program named at `rdi`. Not supported; always fails.
    Spawn = 6,
    /// Write one byte from the buffer at `rdi` (`rsi` bytes long) to the pipe.
    PipeWrite = 7,
    /// Read one byte from the pipe into the buffer at `rdi` (`rsi` bytes long).
    PipeRead = 8,
}

/// Result of a failed system call: `-1`.
pub const SYSCALL_FAILURE: u64 = u64::MAX;

/// What [`Sysno::GetSysName`] copies out, without its NUL terminator.
pub const SYSTEM_NAME: &str = "DemoOS 61.61";

/// At most this many bytes of a [`Sysno::Panic`] message are read.
pub const PANIC_MESSAGE_MAX: usize = 160;

impl Sysno {
    pub const ALL: [Self; 8] = [
        Self::GetPid,
        Self::Yield,
        Self::Panic,
        Self::PageAlloc,
        Self::GetSysName,
        Self::Spawn,
        Self::PipeWrite,
        Self::PipeRead,
    ];

    #[inline]
    #[must_use]
    pub const fn number(self) -> u64 {
        self as u64
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GetPid => "getpid",
            Self::Yield => "yield",
            Self::Panic => "panic",
            Self::PageAlloc => "page_alloc",
            Self::GetSysName => "getsysname",
            Self::Spawn => "spawn",
            Self::PipeWrite => "pipewrite",
            Self::PipeRead => "piperead",
        }
    }
}

impl TryFrom<u64> for Sysno {
    type Error = u64;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|sysno| sysno.number() == value)
            .ok_or(value)
    }
}
