//! Utility modules: retry and timeout.

pub mod retry;
pub mod timeout;

pub use retry::RetryPolicy;
pub use timeout::with_timeout;
