use serde::Deserialize;
use serde_json::Value;

use crate::types::ChatChunk;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delta {
    Fragment(String),
    /// Valid JSON without text: role announcements, finish markers, usage.
    Empty,
    /// The payload is not (yet) valid JSON.
    Incomplete,
}

/// Pulls `choices[0].delta.content` out of a `data:` payload.
pub fn extract_delta(payload: &str) -> Delta {
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(_) => return Delta::Incomplete,
    };

    // Anything that parses but doesn't look like a chunk carries no text.
    let chunk = ChatChunk::deserialize(value).unwrap_or_default();
    chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta)
        .and_then(|delta| delta.content)
        .filter(|content| !content.is_empty())
        .map_or(Delta::Empty, Delta::Fragment)
}
