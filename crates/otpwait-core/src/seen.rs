use std::collections::HashSet;

use crate::{Message, MessageId};

/// Message identities already observed during one acquisition attempt.
///
/// Seeded from the attempt's baseline read so that codes delivered before the
/// attempt began are never matched. Once an identity is inserted it is never
/// considered again, matched or not.
#[derive(Debug, Default, Clone)]
pub struct SeenSet {
    ids: HashSet<MessageId>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks every message as seen without inspecting bodies.
    pub fn seed(&mut self, messages: &[Message]) {
        self.ids
            .extend(messages.iter().map(|message| message.id.clone()));
    }

    /// Returns `true` when the identity was not seen before.
    pub fn insert(&mut self, id: &MessageId) -> bool {
        !self.ids.contains(id) && self.ids.insert(id.clone())
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
