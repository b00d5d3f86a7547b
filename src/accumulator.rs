use crate::types::ChatMessage;

/// Builds the single assistant turn of one request inside a message list.
///
/// The first fragment either coalesces into a trailing assistant entry or
/// appends a new one; later fragments rewrite that same entry. `rollback`
/// puts the list back the way it was before the turn started.
pub struct AssistantTurn {
    content: String,
    base_len: usize,
    /// Trailing assistant entry as it was before the turn overwrote it.
    replaced: Option<ChatMessage>,
    touched: bool,
}

impl AssistantTurn {
    pub fn begin(messages: &[ChatMessage]) -> Self {
        Self {
            content: String::new(),
            base_len: messages.len(),
            replaced: messages.last().filter(|m| m.is_assistant()).cloned(),
            touched: false,
        }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn into_content(self) -> String {
        self.content
    }

    pub fn append(&mut self, messages: &mut Vec<ChatMessage>, fragment: &str) {
        self.content.push_str(fragment);
        self.touched = true;
        match messages.last_mut() {
            Some(last) if last.is_assistant() => last.content.clone_from(&self.content),
            _ => messages.push(ChatMessage::assistant(self.content.clone())),
        }
    }

    /// Removes whatever this turn published. Returns `true` if the list changed.
    pub fn rollback(&mut self, messages: &mut Vec<ChatMessage>) -> bool {
        if !self.touched {
            return false;
        }
        messages.truncate(self.base_len);
        if let (Some(original), Some(last)) = (self.replaced.as_ref(), messages.last_mut()) {
            *last = original.clone();
        }
        self.touched = false;
        true
    }
}
