//! Reference agents that need no external backend.

use crate::agent::Agent;
use crate::state::AgentState;
use crate::types::{AgentCapabilities, AgentMetrics, AgentResponse, AgentStatus, ExecuteOptions};
use async_trait::async_trait;
use orbit_core::OrbitResult;
use orbit_tools::Tool;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Returns its input unchanged, optionally after a fixed delay.
pub struct EchoAgent {
    state: AgentState,
    delay: Option<Duration>,
}

impl EchoAgent {
    /// An echo agent with default capabilities.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capabilities(name, AgentCapabilities::default())
    }

    /// An echo agent with the given capabilities.
    pub fn with_capabilities(name: impl Into<String>, capabilities: AgentCapabilities) -> Self {
        Self {
            state: AgentState::new(name, capabilities),
            delay: None,
        }
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay).filter(|d| !d.is_zero());
        self
    }
}

#[async_trait]
impl Agent for EchoAgent {
    fn name(&self) -> &str {
        self.state.name()
    }

    fn capabilities(&self) -> AgentCapabilities {
        self.state.capabilities()
    }

    async fn initialize(&self) -> OrbitResult<()> {
        info!(agent = %self.name(), "Echo agent ready");
        Ok(())
    }

    async fn execute(&self, input: Value, _options: ExecuteOptions) -> OrbitResult<AgentResponse> {
        let ticket = self.state.begin()?;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let latency = ticket.elapsed_ms();
        self.state.finish(ticket, true);
        Ok(AgentResponse::new(input)
            .with_latency(latency)
            .with_model("echo"))
    }

    async fn stop(&self) -> OrbitResult<()> {
        self.state.stop();
        Ok(())
    }

    fn add_tool(&self, tool: Arc<dyn Tool>) {
        self.state.add_tool(tool);
    }

    fn remove_tool(&self, name: &str) -> bool {
        self.state.remove_tool(name)
    }

    fn status(&self) -> AgentStatus {
        self.state.status()
    }

    fn metrics(&self) -> AgentMetrics {
        self.state.metrics()
    }
}

/// Runs one of its attached tools per task.
///
/// Input is `{"tool": <name>, "args": <value>}`. A tool failure does not
/// fail the task: the agent recovers and answers `{"tool", "error"}`
/// instead of `{"tool", "result"}`.
pub struct ToolAgent {
    state: AgentState,
}

impl ToolAgent {
    /// A tool agent with no tools attached.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            state: AgentState::new(name, AgentCapabilities::default()),
        }
    }
}

#[async_trait]
impl Agent for ToolAgent {
    fn name(&self) -> &str {
        self.state.name()
    }

    fn capabilities(&self) -> AgentCapabilities {
        self.state.capabilities()
    }

    async fn initialize(&self) -> OrbitResult<()> {
        Ok(())
    }

    async fn execute(&self, input: Value, _options: ExecuteOptions) -> OrbitResult<AgentResponse> {
        let tool = input
            .get("tool")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                orbit_core::OrbitError::Validation("input needs a string 'tool' field".into())
            })?
            .to_string();
        let args = input.get("args").cloned().unwrap_or_else(|| json!({}));

        let ticket = self.state.begin()?;
        let output = match self.state.use_tool(&tool, args).await {
            Ok(result) => json!({ "tool": tool, "result": result }),
            Err(e) => {
                debug!(agent = %self.name(), tool = %tool, "Recovered from tool error");
                json!({ "tool": tool, "error": e.to_string() })
            }
        };
        let latency = ticket.elapsed_ms();
        self.state.finish(ticket, true);
        Ok(AgentResponse::new(output).with_latency(latency))
    }

    async fn stop(&self) -> OrbitResult<()> {
        self.state.stop();
        Ok(())
    }

    fn add_tool(&self, tool: Arc<dyn Tool>) {
        self.state.add_tool(tool);
    }

    fn remove_tool(&self, name: &str) -> bool {
        self.state.remove_tool(name)
    }

    fn status(&self) -> AgentStatus {
        self.state.status()
    }

    fn metrics(&self) -> AgentMetrics {
        self.state.metrics()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use orbit_tools::{ParameterSchema, ToolDescriptor, ToolSchema};

    struct AddTool {
        descriptor: ToolDescriptor,
    }

    impl AddTool {
        fn new() -> Self {
            let schema = ToolSchema::new("add", "Add two numbers").with_parameters(
                ParameterSchema::object()
                    .with_required("a", ParameterSchema::number())
                    .with_required("b", ParameterSchema::number()),
            );
            Self {
                descriptor: ToolDescriptor::new(schema, "1.0.0"),
            }
        }
    }

    #[async_trait]
    impl Tool for AddTool {
        fn descriptor(&self) -> &ToolDescriptor {
            &self.descriptor
        }

        async fn execute(&self, args: Value) -> OrbitResult<Value> {
            let a = args["a"].as_f64().unwrap_or_default();
            let b = args["b"].as_f64().unwrap_or_default();
            Ok(json!(a + b))
        }
    }

    #[tokio::test]
    async fn test_echo_returns_input() {
        let agent = EchoAgent::new("echo");
        agent.initialize().await.unwrap();
        let resp = agent
            .execute(json!({ "msg": "hi" }), ExecuteOptions::default())
            .await
            .unwrap();
        assert_eq!(resp.output, json!({ "msg": "hi" }));
        assert_eq!(resp.metadata.model.as_deref(), Some("echo"));
        assert_eq!(agent.status(), AgentStatus::Idle);
        assert_eq!(agent.metrics().successful_tasks, 1);
    }

    #[tokio::test]
    async fn test_echo_is_busy_while_delayed() {
        let agent = Arc::new(EchoAgent::new("slow").with_delay(Duration::from_millis(50)));
        let running = {
            let agent = agent.clone();
            tokio::spawn(async move { agent.execute(json!(1), ExecuteOptions::default()).await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(agent.status(), AgentStatus::Busy);
        running.await.unwrap().unwrap();
        assert_eq!(agent.status(), AgentStatus::Idle);
    }

    #[tokio::test]
    async fn test_stopped_echo_refuses_work() {
        let agent = EchoAgent::new("echo");
        agent.stop().await.unwrap();
        assert!(agent
            .execute(json!(1), ExecuteOptions::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_tool_agent_runs_tool() {
        let agent = ToolAgent::new("calc");
        agent.add_tool(Arc::new(AddTool::new()));
        assert_eq!(agent.capabilities().supported_tools, vec!["add".to_string()]);

        let resp = agent
            .execute(
                json!({ "tool": "add", "args": { "a": 2, "b": 3 } }),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(resp.output, json!({ "tool": "add", "result": 5.0 }));
    }

    #[tokio::test]
    async fn test_tool_agent_recovers_from_tool_error() {
        let agent = ToolAgent::new("calc");
        agent.add_tool(Arc::new(AddTool::new()));

        let resp = agent
            .execute(
                json!({ "tool": "add", "args": { "a": "two" } }),
                ExecuteOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(resp.output["tool"], "add");
        assert!(resp.output["error"]
            .as_str()
            .unwrap()
            .contains("Validation error"));
        assert_eq!(agent.status(), AgentStatus::Idle);
    }
}
