//! Oldest-first positional index over the message ids of the current conversation.

use lens_core::{LoadedMessage, Role};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub message_id: String,
    pub role: Option<Role>,
}

/// Position `0` is the oldest message. Rebuilt from each full list, appended to by single
/// new messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexMap {
    entries: Vec<IndexEntry>,
}

impl IndexMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the index with `messages` as the server returns them (newest first).
    pub fn rebuild_from_newest_first(&mut self, messages: &[LoadedMessage]) {
        self.entries = messages
            .iter()
            .rev()
            .map(|m| IndexEntry {
                message_id: m.message_id.clone(),
                role: m.role(),
            })
            .collect();
    }

    /// Appends a message at the newest end. Ids already indexed are left in place.
    pub fn append(&mut self, message_id: impl Into<String>, role: Option<Role>) -> bool {
        let message_id = message_id.into();
        if self.position(&message_id).is_some() {
            return false;
        }
        self.entries.push(IndexEntry { message_id, role });
        true
    }

    pub fn get(&self, position: usize) -> Option<&str> {
        self.entries.get(position).map(|e| e.message_id.as_str())
    }

    pub fn position(&self, message_id: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.message_id == message_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Ids of bot messages, oldest first.
    pub fn bot_ids(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.role == Some(Role::Bot))
            .map(|e| e.message_id.as_str())
            .collect()
    }

    /// Id of the `bot_index`-th rendered bot message, when only the newest `rendered_bots`
    /// bot messages are rendered.
    pub fn bot_in_window(&self, bot_index: usize, rendered_bots: usize) -> Option<&str> {
        let bots = self.bot_ids();
        let offset = bots.len().saturating_sub(rendered_bots);
        bots.get(offset + bot_index).copied()
    }
}
