//! UI session hosting: per-session agents, threads and streaming turns.

pub mod driver;
pub mod outbound;
pub mod state;

pub use driver::{AgentFactory, SessionDriver, TurnSummary};
pub use outbound::{ChannelOutbound, OutboundEvent, OutboundMessage};
pub use state::{SessionState, TurnPolicy};
