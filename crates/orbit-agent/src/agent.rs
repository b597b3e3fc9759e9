use crate::types::{AgentCapabilities, AgentMetrics, AgentResponse, AgentStatus, ExecuteOptions};
use async_trait::async_trait;
use orbit_core::OrbitResult;
use orbit_tools::Tool;
use std::sync::Arc;

/// Contract every worker backend satisfies.
///
/// Implementations keep their own run-state and metrics (usually through a
/// composed [`crate::AgentState`]); the orchestrator only reads them and
/// tracks its own in-flight bindings on top.
///
/// `execute` has no cancellation hook: a call abandoned by the orchestrator
/// after a timeout or cancel keeps running until the agent finishes it.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Unique registry key.
    fn name(&self) -> &str;

    /// What the agent declares it can do.
    fn capabilities(&self) -> AgentCapabilities;

    /// One-time setup; an error here is unrecoverable.
    async fn initialize(&self) -> OrbitResult<()>;

    /// Run one task input. Called concurrently up to
    /// `capabilities().max_concurrent_tasks` times.
    async fn execute(
        &self,
        input: serde_json::Value,
        options: ExecuteOptions,
    ) -> OrbitResult<AgentResponse>;

    /// Best-effort shutdown. The agent is not reusable afterwards.
    async fn stop(&self) -> OrbitResult<()>;

    /// Attach a tool the agent may call while executing.
    fn add_tool(&self, tool: Arc<dyn Tool>);

    /// Returns whether a tool with that name was attached.
    fn remove_tool(&self, name: &str) -> bool;

    /// Self-reported run-state.
    fn status(&self) -> AgentStatus;

    /// Self-reported execution metrics.
    fn metrics(&self) -> AgentMetrics;
}
