use bytes::{Buf, BufMut, BytesMut};

/// Splits a streamed response body into newline-delimited lines.
///
/// Bytes are buffered until a `\n` arrives, so a line (or a multi-byte
/// character) split across network chunks is only handed out once complete.
pub struct LineSplitter {
    buffer: BytesMut,
}

impl LineSplitter {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::new(),
        }
    }

    pub fn feed(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Removes and returns the next complete line, without its `\n` or a
    /// trailing `\r`.
    pub fn next_line(&mut self) -> Option<String> {
        let i = self.buffer.iter().position(|&b| b == b'\n')?;
        let line_bytes = self.buffer.split_to(i);
        self.buffer.advance(1); // skip newline
        Some(decode_line(&line_bytes))
    }

    /// Puts `line` back at the front of the buffer, newline included, so it is
    /// the next line handed out.
    pub fn push_front(&mut self, line: &str) {
        let mut restored = BytesMut::with_capacity(line.len() + 1 + self.buffer.len());
        restored.put_slice(line.as_bytes());
        restored.put_u8(b'\n');
        restored.put_slice(&self.buffer);
        self.buffer = restored;
    }

    /// Drains everything left once the body has ended: the remaining complete
    /// lines followed by the unterminated tail, if any.
    pub fn finish(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = self.next_line() {
            lines.push(line);
        }
        if !self.buffer.is_empty() {
            let tail = self.buffer.split();
            lines.push(decode_line(&tail));
        }
        lines
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for LineSplitter {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_line(line_bytes: &[u8]) -> String {
    // Handle \r if present (CRLF)
    let line_slice = line_bytes.strip_suffix(b"\r").unwrap_or(line_bytes);
    String::from_utf8_lossy(line_slice).into_owned()
}
