//! Agent contract and lifecycle bookkeeping for Orbit.
//!
//! An [`Agent`] is a worker the orchestrator dispatches tasks to. Concrete
//! agents embed an [`AgentState`] for run-state, metrics and attached tools,
//! and can be wrapped in a [`RetryingAgent`] for transient-failure retries.

/// Reference agents: [`EchoAgent`] and [`ToolAgent`].
pub mod echo;
/// Retry decorator.
pub mod retry;
/// Shared run-state bookkeeping.
pub mod state;
/// Capabilities, metrics, options and responses.
pub mod types;

mod agent;

pub use agent::Agent;
pub use echo::{EchoAgent, ToolAgent};
pub use retry::{is_retryable, RetryingAgent};
pub use state::{AgentState, RunTicket};
pub use types::{
    AgentCapabilities, AgentMetrics, AgentResponse, AgentStatus, Backoff, ExecuteOptions,
    ResponseMetadata, RetryStrategy, TokenUsage,
};
