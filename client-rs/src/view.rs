//! Local message view

use crate::messages::Message;
use std::collections::HashSet;
use uuid::Uuid;

/// Messages seen so far, unique by id and ascending by `created_at`.
///
/// Merging is idempotent: replayed or overlapping batches add nothing new.
#[derive(Debug, Default)]
pub struct MessageView {
    messages: Vec<Message>,
    seen: HashSet<Uuid>,
}

impl MessageView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a batch; returns the messages that were not already present
    pub fn merge(&mut self, batch: impl IntoIterator<Item = Message>) -> Vec<Message> {
        let mut added = Vec::new();

        for message in batch {
            if !self.seen.insert(message.id) {
                continue;
            }

            let in_order = self
                .messages
                .last()
                .map_or(true, |last| last.created_at <= message.created_at);
            if in_order {
                self.messages.push(message.clone());
            } else {
                let at = self
                    .messages
                    .partition_point(|m| m.created_at <= message.created_at);
                self.messages.insert(at, message.clone());
            }
            added.push(message);
        }

        added
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
