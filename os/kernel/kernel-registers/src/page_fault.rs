use bitfield_struct::bitfield;

/// Page-fault error code layout (x86-64).
///
/// Each bit describes the condition that caused the page fault.
/// Reference: Intel SDM Vol. 3A, §6.15.1 “Page-Fault Exception (#PF)”.
#[bitfield(u64)]
#[derive(Eq, PartialEq)]
pub struct PageFaultError {
    /// 0 = non-present page.
    /// 1 = protection violation (page present but access disallowed).
    pub present: bool, // bit 0

    /// 0 = read or execute.
    /// 1 = write access.
    pub write: bool, // bit 1

    /// 0 = supervisor (CPL 0–2).
    /// 1 = user mode (CPL 3).
    pub user: bool, // bit 2

    /// 1 = caused by reserved bit set in a paging structure.
    pub reserved_bit: bool, // bit 3

    /// 1 = instruction fetch (execute access).
    pub instruction_fetch: bool, // bit 4

    #[bits(59)]
    __: u64,
}

impl PageFaultError {
    /// `"write"` or `"read"`, as printed in fault reports.
    #[must_use]
    pub const fn operation(&self) -> &'static str {
        if self.write() { "write" } else { "read" }
    }

    /// `"protection problem"` or `"missing page"`, as printed in fault reports.
    #[must_use]
    pub const fn problem(&self) -> &'static str {
        if self.present() {
            "protection problem"
        } else {
            "missing page"
        }
    }

    /// Longer human-readable explanation.
    #[must_use]
    pub const fn explain(&self) -> &'static str {
        if !self.present() {
            "Non-present page (page not mapped)"
        } else if self.instruction_fetch() {
            if self.user() {
                "User-mode instruction fetch on protected page"
            } else {
                "Kernel instruction fetch on protected page"
            }
        } else if self.write() {
            "Write access to protected page"
        } else {
            "Read access to protected page"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_strings() {
        let missing_read = PageFaultError::new().with_user(true);
        assert_eq!(missing_read.operation(), "read");
        assert_eq!(missing_read.problem(), "missing page");

        let protected_write = PageFaultError::from_bits(0b111);
        assert!(protected_write.present() && protected_write.write() && protected_write.user());
        assert_eq!(protected_write.operation(), "write");
        assert_eq!(protected_write.problem(), "protection problem");
        assert_eq!(protected_write.explain(), "Write access to protected page");
    }
}
