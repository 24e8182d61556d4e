//! # Segment Selectors
//!
//! A selector encodes:
//!
//! ```text
//!  15            3 2  1  0
//! +----------------+--+----+
//! |   Index[12:0]  |TI| RPL|
//! +----------------+--+----+  (TI=0 → GDT, TI=1 → LDT; RPL=0..3)
//! ```
//!
//! The privilege level of running code is the RPL of its code selector, so
//! the trap path tells user from kernel context by looking at `reg_cs`.

use bitfield_struct::bitfield;

/// Raw 16-bit selector encoding (index/TI/RPL).
#[bitfield(u16)]
#[derive(Eq, PartialEq)]
pub struct SegmentSelector {
    /// Requested Privilege Level (bits 0..1).
    #[bits(2)]
    pub rpl: u8,
    /// Table Indicator (bit 2): 0 = GDT, 1 = LDT.
    pub ldt: bool,
    /// Descriptor index (bits 3..15).
    #[bits(13)]
    pub index: u16,
}

/// Privilege level of user code.
pub const USER_RPL: u8 = 3;

/// Kernel code segment (GDT index 1, ring 0).
pub const SEGSEL_KERNEL_CODE: SegmentSelector = SegmentSelector::new().with_index(1);

/// Application code segment (GDT index 4, ring 3).
pub const SEGSEL_APP_CODE: SegmentSelector =
    SegmentSelector::new().with_index(4).with_rpl(USER_RPL);

/// Application data segment (GDT index 5, ring 3).
pub const SEGSEL_APP_DATA: SegmentSelector =
    SegmentSelector::new().with_index(5).with_rpl(USER_RPL);

impl SegmentSelector {
    /// Whether code running under this selector is user code.
    #[must_use]
    pub const fn is_user(self) -> bool {
        self.rpl() == USER_RPL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_encodings() {
        assert_eq!(SEGSEL_KERNEL_CODE.into_bits(), 0x08);
        assert_eq!(SEGSEL_APP_CODE.into_bits(), 0x23);
        assert_eq!(SEGSEL_APP_DATA.into_bits(), 0x2B);
        assert!(SEGSEL_APP_CODE.is_user());
        assert!(!SEGSEL_KERNEL_CODE.is_user());
    }
}
