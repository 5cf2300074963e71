//! agent-shim: a minimal agent-hosting shim.
//!
//! Tools are registered explicitly in a [`tools::ToolRegistry`], bound with
//! instructions and a backing model service into an [`agent::ChatAgent`],
//! and invoked either for one structured answer or as a stream of fragments
//! threaded through a per-session [`session::SessionDriver`].
//!
//! # Quick Start
//!
//! ```no_run
//! use agent_shim::prelude::*;
//! use agent_shim::tools::builtin::MenuPlugin;
//!
//! # async fn example() -> agent_shim::error::Result<()> {
//! let config = ShimConfig::from_env()?;
//! let answer = agent_shim::agent::run(
//!     create_provider(&config)?,
//!     "You are a helpful assistant.",
//!     ToolRegistry::new().with_plugin(&MenuPlugin)?,
//!     Some(
//!         OutputSchema::new("MenuItem")
//!             .field("price", FieldType::Number)
//!             .field("name", FieldType::String),
//!     ),
//!     "What is the price of the soup special?",
//! )
//! .await?;
//! println!("{:?}", answer.structured);
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod output;
pub mod prelude;
pub mod provider;
pub mod session;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
