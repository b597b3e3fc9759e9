use crate::registry::Reservation;
use chrono::{DateTime, Utc};
use orbit_agent::{AgentResponse, ExecuteOptions};
use orbit_core::{OrbitError, OrbitResult};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::debug;

/// How a race between an agent call, its deadline and a cancel signal ended.
#[derive(Debug)]
pub enum Outcome {
    /// The agent resolved first.
    Success(AgentResponse),
    /// The agent raised first.
    Failure(OrbitError),
    /// The deadline elapsed first.
    Timeout,
    /// The cancel signal arrived first.
    Cancelled,
}

/// An agent call that lost the race and keeps running detached.
pub type Abandoned = JoinHandle<OrbitResult<AgentResponse>>;

/// The settled race.
#[derive(Debug)]
pub struct Execution {
    /// Which side won.
    pub outcome: Outcome,
    /// Just before dispatch.
    pub start_time: DateTime<Utc>,
    /// When the winner settled.
    pub end_time: DateTime<Utc>,
    /// Wall-clock from just before dispatch to settlement of the winner.
    pub duration_ms: u64,
    /// Set on timeout and cancel; the call's eventual result is the
    /// caller's to discard.
    pub abandoned: Option<Abandoned>,
}

/// Run the reserved agent on `input`, racing it against `timeout` and
/// `cancel`.
///
/// The agent call runs on its own task and holds `reservation` until it
/// really settles, so an abandoned call keeps its agent slot occupied.
pub async fn execute(
    reservation: Reservation,
    input: serde_json::Value,
    options: ExecuteOptions,
    timeout: Duration,
    cancel: oneshot::Receiver<()>,
) -> Execution {
    let start_time = Utc::now();
    let started = Instant::now();
    let agent = reservation.agent().clone();

    let mut call: Abandoned = tokio::spawn(async move {
        let result = agent.execute(input, options).await;
        drop(reservation);
        result
    });

    // A dropped sender means nobody can cancel any more, not a cancel.
    let cancelled = async move {
        if cancel.await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    let (outcome, abandoned) = tokio::select! {
        joined = &mut call => {
            let outcome = match joined {
                Ok(Ok(response)) => Outcome::Success(response),
                Ok(Err(e)) => Outcome::Failure(e),
                Err(join_err) => Outcome::Failure(OrbitError::Execution(format!(
                    "agent call aborted: {join_err}"
                ))),
            };
            (outcome, None)
        }
        _ = tokio::time::sleep(timeout) => (Outcome::Timeout, Some(call)),
        _ = cancelled => (Outcome::Cancelled, Some(call)),
    };

    let duration_ms = started.elapsed().as_millis() as u64;
    debug!(duration_ms, abandoned = abandoned.is_some(), "Agent race settled");
    Execution {
        outcome,
        start_time,
        end_time: Utc::now(),
        duration_ms,
        abandoned,
    }
}
