//! The devices the kernel talks to, simulated.

use alloc::collections::VecDeque;
use kernel::{MemoryView, Platform};

/// Timer, keyboard and memory viewer of the hosted machine.
///
/// Key presses are queued with [`SimPlatform::press`] and handed out one per
/// keyboard poll. The memory viewer keeps the most recent view.
#[derive(Debug, Default)]
pub struct SimPlatform {
    keys: VecDeque<u8>,
    timer_acks: u64,
    views: u64,
    last_view: Option<MemoryView>,
}

impl SimPlatform {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            keys: VecDeque::new(),
            timer_acks: 0,
            views: 0,
            last_view: None,
        }
    }

    /// Queue a key press.
    pub fn press(&mut self, key: u8) {
        self.keys.push_back(key);
    }

    /// Key presses not yet polled.
    #[must_use]
    pub fn pending_keys(&self) -> usize {
        self.keys.len()
    }

    /// Timer interrupts acknowledged.
    #[inline]
    #[must_use]
    pub const fn timer_acks(&self) -> u64 {
        self.timer_acks
    }

    /// Memory views received.
    #[inline]
    #[must_use]
    pub const fn views(&self) -> u64 {
        self.views
    }

    #[inline]
    #[must_use]
    pub const fn last_view(&self) -> Option<&MemoryView> {
        self.last_view.as_ref()
    }
}

impl Platform for SimPlatform {
    fn ack_timer(&mut self) {
        self.timer_acks += 1;
    }

    fn check_keyboard(&mut self) -> Option<u8> {
        self.keys.pop_front()
    }

    fn show_memory(&mut self, view: &MemoryView) {
        self.views += 1;
        self.last_view = Some(view.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::KEY_CTRL_C;

    #[test]
    fn keys_come_out_in_order() {
        let mut platform = SimPlatform::new();
        platform.press(b'a');
        platform.press(KEY_CTRL_C);
        assert_eq!(platform.pending_keys(), 2);
        assert_eq!(platform.check_keyboard(), Some(b'a'));
        assert_eq!(platform.check_keyboard(), Some(KEY_CTRL_C));
        assert_eq!(platform.check_keyboard(), None);
    }

    #[test]
    fn viewer_keeps_the_latest_view() {
        let mut platform = SimPlatform::new();
        for ticks in [3, 9] {
            platform.show_memory(&MemoryView {
                ticks,
                physical: alloc::vec::Vec::new(),
                process: None,
            });
        }
        assert_eq!(platform.views(), 2);
        assert_eq!(platform.last_view().map(|v| v.ticks), Some(9));
    }
}
