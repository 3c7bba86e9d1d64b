//! Append-only text accumulator for PTY output.

use std::str::Utf8Error;

/// Decodes PTY chunks into one growing UTF-8 string.
///
/// Reads can split a multi-byte character; the incomplete tail is held back
/// until the next chunk completes it. The decoded text only ever grows.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    text: String,
    pending: Vec<u8>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return the newly decoded text.
    pub fn push(&mut self, chunk: &[u8]) -> Result<&str, Utf8Error> {
        let start = self.text.len();
        self.pending.extend_from_slice(chunk);

        let complete = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            // `error_len() == None` means the input ended mid-character.
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(e) => return Err(e),
        };

        let decoded = std::str::from_utf8(&self.pending[..complete])?;
        self.text.push_str(decoded);
        self.pending.drain(..complete);
        Ok(&self.text[start..])
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_ascii_chunks() {
        let mut buf = OutputBuffer::new();
        assert_eq!(buf.push(b"> ").unwrap(), "> ");
        assert_eq!(buf.push(b"hello\r\n").unwrap(), "hello\r\n");
        assert_eq!(buf.text(), "> hello\r\n");
    }

    #[test]
    fn split_multibyte_character_is_carried_over() {
        let bytes = "caf\u{e9}".as_bytes();
        let (head, tail) = bytes.split_at(bytes.len() - 1);

        let mut buf = OutputBuffer::new();
        assert_eq!(buf.push(head).unwrap(), "caf");
        assert_eq!(buf.push(tail).unwrap(), "\u{e9}");
        assert_eq!(buf.text(), "caf\u{e9}");
    }

    #[test]
    fn invalid_bytes_are_an_error() {
        let mut buf = OutputBuffer::new();
        buf.push(b"ok ").unwrap();
        assert!(buf.push(&[0xff, b'x']).is_err());
        assert_eq!(buf.text(), "ok ");
    }

    #[test]
    fn length_never_decreases() {
        let mut buf = OutputBuffer::new();
        let mut last = 0;
        let chunks: [&[u8]; 5] = [b"a", &[0xe2, 0x86], &[0x92], b"", b"\n> "];
        for chunk in chunks {
            buf.push(chunk).unwrap();
            assert!(buf.len() >= last);
            last = buf.len();
        }
        assert_eq!(buf.text(), "a\u{2192}\n> ");
    }
}
