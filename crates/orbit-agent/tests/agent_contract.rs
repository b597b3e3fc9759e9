#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Contract tests over the public agent API.

use orbit_agent::{
    Agent, AgentStatus, Backoff, EchoAgent, ExecuteOptions, RetryStrategy, RetryingAgent,
};
use serde_json::json;
use std::sync::Arc;

#[tokio::test]
async fn test_retrying_echo_reports_zero_retries() {
    let echo: Arc<dyn Agent> = Arc::new(EchoAgent::new("echo"));
    let agent = RetryingAgent::new(echo).with_strategy(RetryStrategy {
        max_attempts: 3,
        backoff: Backoff::Linear,
        initial_delay_ms: 1,
        max_delay_ms: 1,
    });

    let resp = agent
        .execute(json!("hi"), ExecuteOptions::default())
        .await
        .unwrap();
    assert_eq!(resp.output, "hi");
    assert_eq!(resp.metadata.retries, 0);
    assert_eq!(agent.name(), "echo");
}

#[tokio::test]
async fn test_decorator_forwards_lifecycle() {
    let echo = Arc::new(EchoAgent::new("echo"));
    let agent = RetryingAgent::new(echo.clone());

    agent.initialize().await.unwrap();
    agent.stop().await.unwrap();
    assert_eq!(echo.status(), AgentStatus::Stopped);
    assert_eq!(agent.status(), AgentStatus::Stopped);

    let err = agent
        .execute(json!(1), ExecuteOptions::default())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("stopped"));
}

#[tokio::test]
async fn test_metrics_accumulate_across_calls() {
    let agent = EchoAgent::new("echo");
    for i in 0..4 {
        agent
            .execute(json!(i), ExecuteOptions::default())
            .await
            .unwrap();
    }
    let m = agent.metrics();
    assert_eq!(m.total_tasks, 4);
    assert_eq!(m.successful_tasks, 4);
    assert_eq!(m.failed_tasks, 0);
    assert!(m.average_response_time_ms >= 0.0);
}
