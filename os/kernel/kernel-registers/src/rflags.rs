use bitfield_struct::bitfield;

/// RFLAGS as seen in a register snapshot.
///
/// The kernel mostly cares about `IF`: user processes run with interrupts
/// enabled so the timer can preempt them. Bit 1 is architecturally fixed to 1.
#[bitfield(u64, order = Lsb)]
#[derive(Eq, PartialEq)]
pub struct Rflags {
    /// Carry Flag
    pub cf_carry: bool, // 0

    /// Always 1.
    #[bits(default = true)]
    _always1: bool, // 1

    /// Parity Flag
    pub pf_parity: bool, // 2

    #[bits(default = false)]
    _rsvd3: bool, // 3

    /// Adjust Flag
    pub af_adjust: bool, // 4

    #[bits(default = false)]
    _rsvd5: bool, // 5

    /// Zero Flag
    pub zf_zero: bool, // 6

    /// Sign Flag
    pub sf_sign: bool, // 7

    /// Trap Flag
    pub tf_trap: bool, // 8

    /// Interrupt Enable Flag
    pub if_interrupt_enable: bool, // 9

    /// Direction Flag
    pub df_direction: bool, // 10

    /// Overflow Flag
    pub of_overflow: bool, // 11

    /// I/O Privilege Level
    #[bits(2)]
    pub iopl: u8, // 12–13

    #[bits(50, default = 0)]
    _rest: u64,
}

impl Rflags {
    /// Flags a user process starts with: interrupts enabled, IOPL 0.
    #[must_use]
    pub const fn user_default() -> Self {
        Self::new().with_if_interrupt_enable(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_default_enables_interrupts_only() {
        let flags = Rflags::user_default();
        assert!(flags.if_interrupt_enable());
        assert_eq!(flags.iopl(), 0);
        assert_eq!(flags.into_bits(), 0x202);
    }
}
