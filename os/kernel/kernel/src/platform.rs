use crate::memshow::MemoryView;

/// ASCII ETX, what the keyboard delivers for Ctrl-C.
pub const KEY_CTRL_C: u8 = 0x03;

/// The hardware the kernel talks to besides memory and the CPU.
pub trait Platform {
    /// Acknowledge the timer interrupt at the interrupt controller.
    fn ack_timer(&mut self) {}

    /// Next pending key press, if any.
    fn check_keyboard(&mut self) -> Option<u8> {
        None
    }

    /// Draw a picture of memory.
    fn show_memory(&mut self, view: &MemoryView) {
        let _ = view;
    }
}

/// A platform with no devices.
#[derive(Debug, Default, Copy, Clone)]
pub struct NullPlatform;

impl Platform for NullPlatform {}
