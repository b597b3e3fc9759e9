use chrono::{DateTime, Utc};
use orbit_agent::{AgentCapabilities, AgentMetrics, AgentStatus, RetryStrategy};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// One unit of requested work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Caller-assigned; unique among active and stored tasks.
    pub id: String,
    /// Payload handed to the agent.
    pub input: serde_json::Value,
    /// Agent names to try first, in order.
    #[serde(default)]
    pub agent_preference: Vec<String>,
    /// Informational; not used for ordering.
    #[serde(default)]
    pub priority: i32,
    /// Falls back to the orchestrator default when unset.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Overrides the orchestrator default.
    #[serde(default)]
    pub retry_strategy: Option<RetryStrategy>,
    /// Opaque data forwarded to the agent.
    #[serde(default)]
    pub context: Option<serde_json::Value>,
}

impl Task {
    /// A task with default options.
    pub fn new(id: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            input,
            agent_preference: Vec::new(),
            priority: 0,
            timeout_ms: None,
            retry_strategy: None,
            context: None,
        }
    }

    /// A task with a fresh UUID v4 id.
    pub fn with_generated_id(input: serde_json::Value) -> Self {
        Self::new(Uuid::new_v4().to_string(), input)
    }

    /// Set the ordered agent preference.
    pub fn with_preference<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.agent_preference = names.into_iter().map(Into::into).collect();
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set a per-task deadline.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Set a per-task retry strategy.
    pub fn with_retry_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.retry_strategy = Some(strategy);
        self
    }

    /// Attach context forwarded to the agent.
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }
}

/// Orchestrator-side statistics for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentTaskMetrics {
    /// Results attributed to the agent.
    pub total_tasks: u64,
    /// Successful results attributed to the agent.
    pub successful_tasks: u64,
    /// Failed or timed-out results attributed to the agent.
    pub failed_tasks: u64,
    /// Fraction of `total_tasks` that succeeded, in `[0, 1]`.
    pub success_rate: f64,
    /// Running mean of task durations.
    pub average_response_time_ms: f64,
    /// End time of the latest attributed result.
    pub last_active: Option<DateTime<Utc>>,
}

impl Default for AgentTaskMetrics {
    fn default() -> Self {
        Self {
            total_tasks: 0,
            successful_tasks: 0,
            failed_tasks: 0,
            success_rate: 0.0,
            average_response_time_ms: 0.0,
            last_active: None,
        }
    }
}

/// Snapshot of the orchestrator's aggregate statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorMetrics {
    /// Every admitted task.
    pub total_tasks: u64,
    /// Admitted tasks not yet settled.
    pub active_tasks: u64,
    /// Tasks that settled successfully.
    pub completed_tasks: u64,
    /// Failures and timeouts. Cancellations are in neither counter.
    pub failed_tasks: u64,
    /// Mean over completed and failed tasks.
    pub average_task_duration_ms: f64,
    /// Per-agent breakdown keyed by agent name.
    pub agent_metrics: HashMap<String, AgentTaskMetrics>,
}

/// Registry view of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// Agent name.
    pub name: String,
    /// Status as the dispatcher sees it, combining the agent's own report
    /// with its in-flight bindings.
    pub status: AgentStatus,
    /// Tasks currently bound to the agent.
    pub in_flight: usize,
    /// Declared capabilities.
    pub capabilities: AgentCapabilities,
    /// Statistics reported by the agent itself.
    pub metrics: AgentMetrics,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_builder() {
        let task = Task::new("t1", json!("hi"))
            .with_preference(["b", "a"])
            .with_priority(3)
            .with_timeout_ms(50)
            .with_context(json!({ "user": "ana" }));
        assert_eq!(task.agent_preference, vec!["b", "a"]);
        assert_eq!(task.timeout_ms, Some(50));
        assert_eq!(task.context.unwrap()["user"], "ana");
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = Task::with_generated_id(json!(1));
        let b = Task::with_generated_id(json!(1));
        assert_ne!(a.id, b.id);
        assert!(Uuid::parse_str(&a.id).is_ok());
    }

    #[test]
    fn test_task_from_minimal_json() {
        let task: Task = serde_json::from_value(json!({ "id": "t1", "input": "hi" })).unwrap();
        assert!(task.agent_preference.is_empty());
        assert_eq!(task.timeout_ms, None);
        assert_eq!(task.priority, 0);
    }
}
