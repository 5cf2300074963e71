//! Conversation continuation handle.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::ModelMessage;

/// Accumulated dialogue of one conversation, excluding the agent's
/// instructions.
///
/// Each completed turn yields a new handle with the same id and the turn's
/// messages appended; the previous handle is left untouched, so a failed turn
/// never disturbs the handle the caller already holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentThread {
    id: Uuid,
    messages: Vec<ModelMessage>,
}

impl AgentThread {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            messages: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn messages(&self) -> &[ModelMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// The handle after a turn that produced `turn`.
    pub(crate) fn extended(&self, turn: Vec<ModelMessage>) -> Self {
        let mut messages = Vec::with_capacity(self.messages.len() + turn.len());
        messages.extend(self.messages.iter().cloned());
        messages.extend(turn);
        Self {
            id: self.id,
            messages,
        }
    }
}

impl Default for AgentThread {
    fn default() -> Self {
        Self::new()
    }
}
