//! Classification of single SSE lines.

pub const DATA_PREFIX: &str = "data: ";
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    Blank,
    Comment,
    /// Trimmed payload of a `data: ` line.
    Data(&'a str),
    Terminator,
    /// `event:`, `id:`, `retry:` and anything else the chat stream does not use.
    Other,
}

pub fn decode_line(line: &str) -> Frame<'_> {
    if line.trim().is_empty() {
        return Frame::Blank;
    }
    if line.starts_with(':') {
        return Frame::Comment;
    }
    match line.strip_prefix(DATA_PREFIX) {
        Some(rest) => {
            let payload = rest.trim();
            if payload == DONE_SENTINEL {
                Frame::Terminator
            } else {
                Frame::Data(payload)
            }
        }
        None => Frame::Other,
    }
}
