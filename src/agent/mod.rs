//! Agents: instructions + backing service + tools, invoked per turn.

pub mod agent;
pub mod invoke;
pub mod run;
pub mod stream;
pub mod thread;

pub use agent::{AgentLimits, ChatAgent};
pub use invoke::AgentResponse;
pub use run::{run, run_with_limits, FinalAnswer};
pub use stream::AgentStreamItem;
pub use thread::AgentThread;
