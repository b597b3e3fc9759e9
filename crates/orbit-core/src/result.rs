use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// The agent resolved with an output.
    Success,
    /// The agent (or agent selection) failed.
    Failure,
    /// The deadline elapsed before the agent settled.
    Timeout,
    /// The task was cancelled while active.
    Cancelled,
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Success => write!(f, "success"),
            TaskStatus::Failure => write!(f, "failure"),
            TaskStatus::Timeout => write!(f, "timeout"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Timing and attribution for one task execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMetrics {
    /// When the task was dispatched.
    pub start_time: DateTime<Utc>,
    /// When the task settled.
    pub end_time: DateTime<Utc>,
    /// Wall-clock milliseconds from dispatch to settlement.
    pub duration_ms: u64,
    /// Retries the agent reported.
    pub retries: u32,
    /// Empty when no agent was bound to the task.
    pub agent_name: String,
}

impl TaskMetrics {
    /// Metrics for a task that never reached an agent.
    pub fn empty() -> Self {
        let now = Utc::now();
        Self {
            start_time: now,
            end_time: now,
            duration_ms: 0,
            retries: 0,
            agent_name: String::new(),
        }
    }
}

/// The terminal record of a task, written exactly once per task id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Id of the task this result belongs to.
    pub task_id: String,
    /// Terminal status.
    pub status: TaskStatus,
    /// Agent output, present on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// Error message, present on any other status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Timing and attribution.
    pub metrics: TaskMetrics,
}

impl TaskResult {
    /// A successful result carrying the agent's output.
    pub fn success(
        task_id: impl Into<String>,
        output: serde_json::Value,
        metrics: TaskMetrics,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Success,
            output: Some(output),
            error: None,
            metrics,
        }
    }

    /// A non-success result with an error description.
    pub fn failed(
        task_id: impl Into<String>,
        status: TaskStatus,
        error: impl Into<String>,
        metrics: TaskMetrics,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            status,
            output: None,
            error: Some(error.into()),
            metrics,
        }
    }

    /// A cancellation record stamped at the current time.
    pub fn cancelled(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Cancelled,
            output: None,
            error: None,
            metrics: TaskMetrics::empty(),
        }
    }

    /// Whether the task succeeded.
    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }
}
