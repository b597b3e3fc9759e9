use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Run-state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Ready for work.
    Idle,
    /// Running as many tasks as it accepts.
    Busy,
    /// Unrecoverable fault; not selectable until reset.
    Error,
    /// Terminal.
    Stopped,
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentStatus::Idle => write!(f, "idle"),
            AgentStatus::Busy => write!(f, "busy"),
            AgentStatus::Error => write!(f, "error"),
            AgentStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// What an agent declares it can do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCapabilities {
    /// Whether the agent can stream partial output.
    #[serde(default)]
    pub can_stream: bool,
    /// Names of attached tools.
    #[serde(default)]
    pub supported_tools: Vec<String>,
    /// Tasks the agent accepts at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_tasks: usize,
    /// Model identifiers the agent can serve.
    #[serde(default)]
    pub supported_models: Vec<String>,
}

fn default_max_concurrent() -> usize {
    1
}

impl Default for AgentCapabilities {
    fn default() -> Self {
        Self {
            can_stream: false,
            supported_tools: Vec::new(),
            max_concurrent_tasks: default_max_concurrent(),
            supported_models: Vec::new(),
        }
    }
}

impl AgentCapabilities {
    /// Set `max_concurrent_tasks`.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = max;
        self
    }

    /// Set `supported_models`.
    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_models = models.into_iter().map(Into::into).collect();
        self
    }
}

/// Self-reported execution statistics of an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentMetrics {
    /// Executions started.
    pub total_tasks: u64,
    /// Executions that finished successfully.
    pub successful_tasks: u64,
    /// Executions that failed.
    pub failed_tasks: u64,
    /// Running mean over finished executions.
    pub average_response_time_ms: f64,
    /// When the agent last finished an execution.
    pub last_active: DateTime<Utc>,
}

impl Default for AgentMetrics {
    fn default() -> Self {
        Self {
            total_tasks: 0,
            successful_tasks: 0,
            failed_tasks: 0,
            average_response_time_ms: 0.0,
            last_active: Utc::now(),
        }
    }
}

/// Backoff shape between retry attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    /// `initial_delay_ms * retry`.
    Linear,
    /// `initial_delay_ms * 2^(retry - 1)`.
    Exponential,
}

/// How often, and how patiently, a failed execution is retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryStrategy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Growth of the delay between attempts.
    pub backoff: Backoff,
    /// Delay before the first retry.
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_delay_ms() -> u64 {
    30_000
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::Exponential,
            initial_delay_ms: 500,
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryStrategy {
    /// Delay before retry number `retry` (1-based).
    pub fn delay_ms(&self, retry: u32) -> u64 {
        let retry = retry.max(1);
        let delay = match self.backoff {
            Backoff::Linear => self.initial_delay_ms.saturating_mul(u64::from(retry)),
            Backoff::Exponential => self
                .initial_delay_ms
                .saturating_mul(2u64.saturating_pow(retry - 1)),
        };
        delay.min(self.max_delay_ms)
    }
}

/// Per-call options handed to [`crate::Agent::execute`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteOptions {
    /// Deadline the orchestrator enforces for this call.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Task priority, informational.
    #[serde(default)]
    pub priority: i32,
    /// Retry policy the agent may apply.
    #[serde(default)]
    pub retry_strategy: Option<RetryStrategy>,
    /// Opaque task context forwarded from the submitter.
    #[serde(default)]
    pub context: Option<serde_json::Value>,
}

/// Token accounting reported by inference-backed agents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub prompt_tokens: u64,
    /// Tokens produced in the completion.
    pub completion_tokens: u64,
    /// Sum of prompt and completion tokens.
    pub total_tokens: u64,
}

/// Optional details an agent reports alongside its output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Token accounting, when the backend reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    /// Wall-clock time of the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// Model that served the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Why generation stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    /// Attempts beyond the first that were needed to produce this response.
    #[serde(default)]
    pub retries: u32,
}

/// The output of one agent execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    /// The agent's result payload.
    pub output: serde_json::Value,
    /// Usage and timing details.
    #[serde(default)]
    pub metadata: ResponseMetadata,
}

impl AgentResponse {
    /// A response with empty metadata.
    pub fn new(output: serde_json::Value) -> Self {
        Self {
            output,
            metadata: ResponseMetadata::default(),
        }
    }

    /// Record the call latency.
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.metadata.latency_ms = Some(latency_ms);
        self
    }

    /// Record the model that served the call.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.metadata.model = Some(model.into());
        self
    }
}
