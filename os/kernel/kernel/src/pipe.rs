/// A one-byte rendezvous slot between a writer and a reader.
///
/// Not a queue: a second byte is refused until the first has been read.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct PipeBuffer {
    byte: u8,
    full: bool,
}

impl PipeBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            byte: 0,
            full: false,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        !self.full
    }

    /// Store `byte`. Returns `false`, leaving the slot untouched, if it is
    /// already full.
    pub const fn put(&mut self, byte: u8) -> bool {
        if self.full {
            return false;
        }
        self.byte = byte;
        self.full = true;
        true
    }

    /// Take the buffered byte, if any.
    pub const fn take(&mut self) -> Option<u8> {
        if self.full {
            self.full = false;
            Some(self.byte)
        } else {
            None
        }
    }

    /// The buffered byte without consuming it.
    #[must_use]
    pub const fn peek(&self) -> Option<u8> {
        if self.full { Some(self.byte) } else { None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read() {
        let mut pipe = PipeBuffer::new();
        assert!(pipe.put(b'A'));
        assert_eq!(pipe.peek(), Some(b'A'));
        assert_eq!(pipe.take(), Some(b'A'));
        assert!(pipe.is_empty());
    }

    #[test]
    fn full_pipe_keeps_first_byte() {
        let mut pipe = PipeBuffer::new();
        assert!(pipe.put(b'x'));
        assert!(!pipe.put(b'y'));
        assert_eq!(pipe.peek(), Some(b'x'));
    }

    #[test]
    fn empty_read_changes_nothing() {
        let mut pipe = PipeBuffer::new();
        assert_eq!(pipe.take(), None);
        assert_eq!(pipe, PipeBuffer::new());
    }
}
