//! # Boot Command
//!
//! The boot entry point takes an optional command string that selects the
//! initial process(es).

/// Program started as pid 1 when no command is given.
pub const DEFAULT_FIRST_PROCESS: &str = "allocator";

/// Command selecting the pipe writer/reader pair.
pub const PIPE_COMMAND: &str = "pipe";

/// Programs of the default two-process workload.
pub const DEFAULT_PAIR: (&str, &str) = ("alice", "eve");

/// Programs of the producer/consumer workload.
pub const PIPE_PAIR: (&str, &str) = ("pipewriter", "pipereader");

/// The initial workload selected by a boot command.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum BootCommand<'a> {
    /// A single named program loaded as pid 1.
    Program(&'a str),
    /// Two programs loaded as pid 1 and pid 2.
    Pair(&'a str, &'a str),
}

impl<'a> BootCommand<'a> {
    /// Resolve a command against the set of known program names.
    ///
    /// An absent or empty command means [`DEFAULT_FIRST_PROCESS`]. A known
    /// program name wins over the special commands; [`PIPE_COMMAND`] selects
    /// [`PIPE_PAIR`]; anything else selects [`DEFAULT_PAIR`].
    ///
    /// ```rust
    /// # use kernel_info::boot::*;
    /// let known = |name: &str| name == "allocator" || name == "alice";
    /// assert_eq!(BootCommand::resolve(None, known), BootCommand::Program("allocator"));
    /// assert_eq!(BootCommand::resolve(Some("pipe"), known), BootCommand::Pair("pipewriter", "pipereader"));
    /// assert_eq!(BootCommand::resolve(Some("zzz"), known), BootCommand::Pair("alice", "eve"));
    /// ```
    pub fn resolve(command: Option<&'a str>, known: impl Fn(&str) -> bool) -> Self {
        let command = match command {
            Some(c) if !c.is_empty() => c,
            _ => DEFAULT_FIRST_PROCESS,
        };

        if known(command) {
            Self::Program(command)
        } else if command == PIPE_COMMAND {
            Self::Pair(PIPE_PAIR.0, PIPE_PAIR.1)
        } else {
            Self::Pair(DEFAULT_PAIR.0, DEFAULT_PAIR.1)
        }
    }

    /// Program for pid 1 and, if any, the program for pid 2.
    #[must_use]
    pub const fn programs(self) -> (&'a str, Option<&'a str>) {
        match self {
            Self::Program(p) => (p, None),
            Self::Pair(a, b) => (a, Some(b)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_command_means_default() {
        let cmd = BootCommand::resolve(Some(""), |n| n == DEFAULT_FIRST_PROCESS);
        assert_eq!(cmd, BootCommand::Program(DEFAULT_FIRST_PROCESS));
    }

    #[test]
    fn known_program_wins_over_pipe() {
        let cmd = BootCommand::resolve(Some("pipe"), |n| n == "pipe");
        assert_eq!(cmd.programs(), ("pipe", None));
    }

    #[test]
    fn unknown_command_selects_default_pair() {
        let cmd = BootCommand::resolve(Some("nope"), |_| false);
        assert_eq!(cmd.programs(), ("alice", Some("eve")));
    }
}
