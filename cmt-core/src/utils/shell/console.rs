//! Operator console line assembly.
//!
//! Collects received bytes into a bounded line: backspace removes the
//! previous character, upper-case letters fold to lower case, CR (or LF)
//! completes the line, and a full buffer completes it early. Only printable
//! ASCII is stored, so the buffer is always valid UTF-8.

/// Maximum characters per input line; longer input is truncated.
pub const MAX_LINE: usize = 80;

const BACKSPACE: u8 = 0x08;
const DELETE: u8 = 0x7f;

/// Bounded, resumable line buffer. Feeding bytes one at a time keeps the
/// shell free to service the periodic engine between keystrokes.
pub struct LineBuffer {
    buf: [u8; MAX_LINE],
    len: usize,
}

impl LineBuffer {
    pub const fn new() -> Self {
        Self {
            buf: [0; MAX_LINE],
            len: 0,
        }
    }

    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Feed one received byte. Returns `true` when the line is complete
    /// and ready to be read with [`as_str`](Self::as_str).
    pub fn push(
        &mut self,
        byte: u8,
    ) -> bool {
        match byte {
            BACKSPACE | DELETE => {
                self.len = self.len.saturating_sub(1);
                false
            }
            b'\r' | b'\n' => true,
            b if (0x20..0x7f).contains(&b) => {
                if self.len < MAX_LINE {
                    self.buf[self.len] = b.to_ascii_lowercase();
                    self.len += 1;
                }
                self.len == MAX_LINE
            }
            _ => false,
        }
    }

    pub fn as_str(&self) -> &str {
        // Only printable ASCII is ever stored.
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(buffer: &mut LineBuffer, bytes: &[u8]) -> bool {
        let mut done = false;
        for &b in bytes {
            done = buffer.push(b);
        }
        done
    }

    #[test]
    fn carriage_return_completes_a_line() {
        let mut line = LineBuffer::new();
        assert!(feed(&mut line, b"rgb off\r"));
        assert_eq!(line.as_str(), "rgb off");
    }

    #[test]
    fn input_is_folded_to_lower_case() {
        let mut line = LineBuffer::new();
        feed(&mut line, b"RGB Off\r");
        assert_eq!(line.as_str(), "rgb off");
    }

    #[test]
    fn backspace_removes_previous_character() {
        let mut line = LineBuffer::new();
        feed(&mut line, b"rgx\x08b\r");
        assert_eq!(line.as_str(), "rgb");
    }

    #[test]
    fn backspace_on_empty_buffer_is_ignored() {
        let mut line = LineBuffer::new();
        assert!(!line.push(0x08));
        assert_eq!(line.as_str(), "");
    }

    #[test]
    fn full_buffer_completes_early() {
        let mut line = LineBuffer::new();
        let mut done = false;
        for _ in 0..MAX_LINE {
            done = line.push(b'a');
        }
        assert!(done);
        assert_eq!(line.as_str().len(), MAX_LINE);
        // Further printable bytes are dropped.
        line.push(b'b');
        assert!(!line.as_str().contains('b'));
    }

    #[test]
    fn control_bytes_are_not_stored() {
        let mut line = LineBuffer::new();
        feed(&mut line, b"a\x01b\r");
        assert_eq!(line.as_str(), "ab");
    }
}
