//! Rolling conversation memory.
//!
//! A bounded FIFO log of user/assistant turns. The dispatcher appends the
//! user command before any routing decision and the assistant's spoken reply
//! after the turn completes, so the transcript fed to the semantic router
//! always reflects the freshest exchange.

use std::collections::VecDeque;

/// Who produced a conversation entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

/// One turn in the conversation log.
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    pub role: Role,
    pub content: String,
}

/// Fixed-capacity conversation log with strict FIFO eviction.
///
/// Capacity is set at construction and never changes. Only the dispatcher
/// mutates the log; tool handlers never touch it directly.
#[derive(Debug)]
pub struct ConversationMemory {
    entries: VecDeque<MemoryEntry>,
    capacity: usize,
    assistant_label: String,
}

impl ConversationMemory {
    /// Create a memory window holding at most `capacity` entries.
    ///
    /// `assistant_label` is the display name used for assistant turns in
    /// the formatted transcript.
    #[must_use]
    pub fn new(capacity: usize, assistant_label: impl Into<String>) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            assistant_label: assistant_label.into(),
        }
    }

    /// Append a user turn, evicting the oldest entry when full.
    pub fn add_user_message(&mut self, content: impl Into<String>) {
        self.push(Role::User, content.into());
    }

    /// Append an assistant turn, evicting the oldest entry when full.
    pub fn add_assistant_message(&mut self, content: impl Into<String>) {
        self.push(Role::Assistant, content.into());
    }

    fn push(&mut self, role: Role, content: String) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(MemoryEntry { role, content });
    }

    /// Current entries, oldest first.
    #[must_use]
    pub fn entries(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.entries.iter()
    }

    /// Number of entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no entries are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render the log as `"<Role label>: <content>"` lines, oldest first.
    ///
    /// User turns are labelled "Usuário"; assistant turns carry the
    /// configured display name.
    #[must_use]
    pub fn get_formatted_history(&self) -> String {
        let mut formatted = String::new();
        for entry in &self.entries {
            let label = match entry.role {
                Role::User => "Usuário",
                Role::Assistant => self.assistant_label.as_str(),
            };
            formatted.push_str(label);
            formatted.push_str(": ");
            formatted.push_str(&entry.content);
            formatted.push('\n');
        }
        formatted
    }

    /// Drop all entries. Only explicit reset commands call this.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
