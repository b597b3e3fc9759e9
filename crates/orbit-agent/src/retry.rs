use crate::agent::Agent;
use crate::types::{
    AgentCapabilities, AgentMetrics, AgentResponse, AgentStatus, ExecuteOptions, RetryStrategy,
};
use async_trait::async_trait;
use orbit_core::{OrbitError, OrbitResult};
use orbit_tools::Tool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Determines whether an execution error is transient and worth retrying.
///
/// Argument, configuration, lookup and cancellation errors will fail the
/// same way again; everything else is retried.
pub fn is_retryable(err: &OrbitError) -> bool {
    !matches!(
        err.kind(),
        OrbitError::Validation(_)
            | OrbitError::Config(_)
            | OrbitError::NotFound(_)
            | OrbitError::Cancelled(_)
    )
}

/// An [`Agent`] decorator that retries failed executions of the wrapped
/// agent.
///
/// The strategy comes from [`ExecuteOptions::retry_strategy`] when the
/// caller sets one, otherwise from the decorator's default. The number of
/// extra attempts is reported in the response's `metadata.retries`. Every
/// other contract method is forwarded unchanged.
pub struct RetryingAgent {
    inner: Arc<dyn Agent>,
    default_strategy: RetryStrategy,
}

impl RetryingAgent {
    /// Wrap `inner` with the default retry strategy.
    pub fn new(inner: Arc<dyn Agent>) -> Self {
        Self {
            inner,
            default_strategy: RetryStrategy::default(),
        }
    }

    /// Strategy used when a call brings none of its own.
    pub fn with_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }
}

#[async_trait]
impl Agent for RetryingAgent {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn capabilities(&self) -> AgentCapabilities {
        self.inner.capabilities()
    }

    async fn initialize(&self) -> OrbitResult<()> {
        self.inner.initialize().await
    }

    async fn execute(
        &self,
        input: serde_json::Value,
        options: ExecuteOptions,
    ) -> OrbitResult<AgentResponse> {
        let strategy = options
            .retry_strategy
            .clone()
            .unwrap_or_else(|| self.default_strategy.clone());
        let attempts = strategy.max_attempts.max(1);
        let mut last_err: Option<OrbitError> = None;

        for attempt in 1..=attempts {
            match self.inner.execute(input.clone(), options.clone()).await {
                Ok(mut response) => {
                    response.metadata.retries += attempt - 1;
                    return Ok(response);
                }
                Err(e) => {
                    if !is_retryable(&e) {
                        warn!(
                            agent = %self.name(),
                            attempt,
                            error = %e,
                            "Non-retryable error, giving up"
                        );
                        return Err(e);
                    }
                    if attempt < attempts {
                        let delay = strategy.delay_ms(attempt);
                        info!(
                            agent = %self.name(),
                            attempt,
                            delay_ms = delay,
                            error = %e,
                            "Retryable error, backing off"
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                    last_err = Some(e);
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            OrbitError::Execution(format!("agent '{}' exhausted its retries", self.name()))
        }))
    }

    async fn stop(&self) -> OrbitResult<()> {
        self.inner.stop().await
    }

    fn add_tool(&self, tool: Arc<dyn Tool>) {
        self.inner.add_tool(tool);
    }

    fn remove_tool(&self, name: &str) -> bool {
        self.inner.remove_tool(name)
    }

    fn status(&self) -> AgentStatus {
        self.inner.status()
    }

    fn metrics(&self) -> AgentMetrics {
        self.inner.metrics()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::state::AgentState;
    use crate::types::Backoff;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` calls with the given error, then echoes.
    struct FlakyAgent {
        state: AgentState,
        failures: u32,
        calls: AtomicU32,
        error: fn(String) -> OrbitError,
    }

    impl FlakyAgent {
        fn new(failures: u32, error: fn(String) -> OrbitError) -> Self {
            Self {
                state: AgentState::new("flaky", AgentCapabilities::default()),
                failures,
                calls: AtomicU32::new(0),
                error,
            }
        }
    }

    #[async_trait]
    impl Agent for FlakyAgent {
        fn name(&self) -> &str {
            self.state.name()
        }
        fn capabilities(&self) -> AgentCapabilities {
            self.state.capabilities()
        }
        async fn initialize(&self) -> OrbitResult<()> {
            Ok(())
        }
        async fn execute(
            &self,
            input: serde_json::Value,
            _options: ExecuteOptions,
        ) -> OrbitResult<AgentResponse> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err((self.error)(format!("attempt {n} failed")));
            }
            Ok(AgentResponse::new(input))
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

    fn fast(max_attempts: u32) -> RetryStrategy {
        RetryStrategy {
            max_attempts,
            backoff: Backoff::Linear,
            initial_delay_ms: 1,
            max_delay_ms: 5,
        }
    }

    #[test]
    fn test_is_retryable() {
        assert!(is_retryable(&OrbitError::Execution("503".into())));
        assert!(is_retryable(&OrbitError::Timeout("slow".into())));
        assert!(!is_retryable(&OrbitError::Validation("bad".into())));
        assert!(!is_retryable(&OrbitError::Cancelled("t1".into())));
    }

    #[tokio::test]
    async fn test_recovers_and_reports_retries() {
        let flaky = Arc::new(FlakyAgent::new(2, OrbitError::Execution));
        let agent = RetryingAgent::new(flaky.clone()).with_strategy(fast(3));

        let resp = agent
            .execute(serde_json::json!("ping"), ExecuteOptions::default())
            .await
            .unwrap();
        assert_eq!(resp.output, "ping");
        assert_eq!(resp.metadata.retries, 2);
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let flaky = Arc::new(FlakyAgent::new(10, OrbitError::Execution));
        let agent = RetryingAgent::new(flaky.clone()).with_strategy(fast(2));

        let err = agent
            .execute(serde_json::json!(1), ExecuteOptions::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("attempt 1 failed"));
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_stops_immediately() {
        let flaky = Arc::new(FlakyAgent::new(10, OrbitError::Validation));
        let agent = RetryingAgent::new(flaky.clone()).with_strategy(fast(5));

        assert!(agent
            .execute(serde_json::json!(1), ExecuteOptions::default())
            .await
            .is_err());
        assert_eq!(flaky.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_options_strategy_overrides_default() {
        let flaky = Arc::new(FlakyAgent::new(1, OrbitError::Execution));
        let agent = RetryingAgent::new(flaky.clone()).with_strategy(fast(1));

        let options = ExecuteOptions {
            retry_strategy: Some(fast(2)),
            ..ExecuteOptions::default()
        };
        let resp = agent.execute(serde_json::json!(1), options).await.unwrap();
        assert_eq!(resp.metadata.retries, 1);
    }
}
