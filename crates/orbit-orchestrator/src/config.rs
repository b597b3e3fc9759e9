use orbit_agent::RetryStrategy;
use orbit_core::{OrbitError, OrbitResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Which [`crate::Dispatcher`] the orchestrator builds by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPolicy {
    /// Preference list, then registration order.
    #[default]
    Preference,
    /// Preference list, then fewest in-flight and completed tasks.
    LeastLoaded,
}

/// Construction-time settings for [`crate::Orchestrator`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Ceiling on simultaneously active tasks.
    #[serde(default = "default_max_concurrent_tasks")]
    pub max_concurrent_tasks: usize,
    /// Deadline for tasks that do not set their own.
    #[serde(default = "default_timeout_ms")]
    pub default_timeout_ms: u64,
    /// Buffered lifecycle events per subscriber.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Agent selection policy.
    #[serde(default)]
    pub dispatch_policy: DispatchPolicy,
    /// Forwarded to agents for tasks without their own strategy.
    #[serde(default)]
    pub retry_strategy: Option<RetryStrategy>,
}

fn default_max_concurrent_tasks() -> usize {
    10
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_event_capacity() -> usize {
    256
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: default_max_concurrent_tasks(),
            default_timeout_ms: default_timeout_ms(),
            event_capacity: default_event_capacity(),
            dispatch_policy: DispatchPolicy::default(),
            retry_strategy: None,
        }
    }
}

impl OrchestratorConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml(source: &str) -> OrbitResult<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| OrbitError::Config(format!("invalid orchestrator config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> OrbitResult<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&source)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> OrbitResult<()> {
        if self.max_concurrent_tasks == 0 {
            return Err(OrbitError::Config(
                "max_concurrent_tasks must be greater than 0".into(),
            ));
        }
        if self.default_timeout_ms == 0 {
            return Err(OrbitError::Config(
                "default_timeout_ms must be greater than 0".into(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(OrbitError::Config(
                "event_capacity must be greater than 0".into(),
            ));
        }
        if let Some(retry) = &self.retry_strategy {
            if retry.max_attempts == 0 {
                return Err(OrbitError::Config(
                    "retry_strategy.max_attempts must be at least 1".into(),
                ));
            }
        }
        Ok(())
    }

    /// `default_timeout_ms` as a `Duration`.
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}
