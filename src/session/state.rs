//! Session lifecycle states and turn-overlap policy.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::agent::AgentThread;

/// What to do with a message that arrives while a turn is still streaming.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum TurnPolicy {
    /// Fail the new turn with `ShimError::ConcurrentTurn`.
    #[default]
    Reject,
    /// Wait for the in-flight turn, first come first served.
    Queue,
}

/// Observable state of one UI session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Never started (or unknown id).
    Uninitialized,
    /// Started; `thread` is `None` until the first turn commits.
    Active {
        thread: Option<AgentThread>,
        streaming: bool,
    },
    /// Ended; agent and thread discarded.
    Terminated,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active { .. })
    }

    pub fn thread(&self) -> Option<&AgentThread> {
        match self {
            Self::Active { thread, .. } => thread.as_ref(),
            _ => None,
        }
    }
}
