use crate::types::{AgentCapabilities, AgentMetrics, AgentStatus};
use chrono::Utc;
use orbit_core::stats::running_mean;
use orbit_core::{OrbitError, OrbitResult};
use orbit_tools::{Tool, ToolRegistry};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

struct Inner {
    status: AgentStatus,
    running: usize,
    metrics: AgentMetrics,
    capabilities: AgentCapabilities,
    tools: ToolRegistry,
}

/// Run-state, metrics and attached tools of one agent.
///
/// Agent implementations embed this and forward the bookkeeping parts of
/// the [`crate::Agent`] contract to it. Transitions:
///
/// - `idle → busy` on [`begin`](Self::begin), back to `idle` when the last
///   running call [`finish`](Self::finish)es.
/// - `idle | busy → error` on [`fault`](Self::fault); only
///   [`reset`](Self::reset) leaves it.
/// - `any → stopped` on [`stop`](Self::stop); terminal.
///
/// Tool changes never touch the run-state.
pub struct AgentState {
    name: String,
    inner: Mutex<Inner>,
}

/// Proof that a run was started; hand it back to [`AgentState::finish`].
#[derive(Debug)]
pub struct RunTicket {
    started: Instant,
}

impl RunTicket {
    /// Milliseconds since the run began.
    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

impl AgentState {
    /// Fresh state in `Idle` with empty metrics.
    pub fn new(name: impl Into<String>, capabilities: AgentCapabilities) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(Inner {
                status: AgentStatus::Idle,
                running: 0,
                metrics: AgentMetrics::default(),
                capabilities,
                tools: ToolRegistry::new(),
            }),
        }
    }

    /// The agent's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current run-state.
    pub fn status(&self) -> AgentStatus {
        self.inner.lock().status
    }

    /// Snapshot of the agent's own metrics.
    pub fn metrics(&self) -> AgentMetrics {
        self.inner.lock().metrics.clone()
    }

    /// Declared capabilities, including attached tool names.
    pub fn capabilities(&self) -> AgentCapabilities {
        self.inner.lock().capabilities.clone()
    }

    /// Start a run. Fails when the agent is stopped, faulted, or already
    /// running `max_concurrent_tasks` calls.
    pub fn begin(&self) -> OrbitResult<RunTicket> {
        let mut inner = self.inner.lock();
        match inner.status {
            AgentStatus::Stopped | AgentStatus::Error => {
                return Err(OrbitError::Execution(format!(
                    "agent '{}' is {}",
                    self.name, inner.status
                )));
            }
            AgentStatus::Idle | AgentStatus::Busy => {}
        }
        if inner.running >= inner.capabilities.max_concurrent_tasks.max(1) {
            return Err(OrbitError::Execution(format!(
                "agent '{}' is at its concurrency limit",
                self.name
            )));
        }
        inner.running += 1;
        inner.status = AgentStatus::Busy;
        Ok(RunTicket {
            started: Instant::now(),
        })
    }

    /// Finish a run and fold its duration into the metrics.
    pub fn finish(&self, ticket: RunTicket, success: bool) {
        let duration_ms = ticket.elapsed_ms();
        let mut inner = self.inner.lock();
        inner.running = inner.running.saturating_sub(1);

        let m = &mut inner.metrics;
        m.total_tasks += 1;
        if success {
            m.successful_tasks += 1;
        } else {
            m.failed_tasks += 1;
        }
        m.average_response_time_ms =
            running_mean(m.average_response_time_ms, m.total_tasks, duration_ms as f64);
        m.last_active = Utc::now();

        if inner.running == 0 && inner.status == AgentStatus::Busy {
            inner.status = AgentStatus::Idle;
        }
        debug!(agent = %self.name, duration_ms, success, "Run finished");
    }

    /// Mark an unrecoverable fault.
    pub fn fault(&self, reason: &str) {
        let mut inner = self.inner.lock();
        if inner.status == AgentStatus::Stopped {
            return;
        }
        inner.status = AgentStatus::Error;
        error!(agent = %self.name, reason = %reason, "Agent faulted");
    }

    /// Leave the `error` state.
    pub fn reset(&self) -> OrbitResult<()> {
        let mut inner = self.inner.lock();
        match inner.status {
            AgentStatus::Error => {
                inner.status = if inner.running > 0 {
                    AgentStatus::Busy
                } else {
                    AgentStatus::Idle
                };
                info!(agent = %self.name, "Agent reset");
                Ok(())
            }
            AgentStatus::Stopped => Err(OrbitError::Execution(format!(
                "agent '{}' is stopped",
                self.name
            ))),
            AgentStatus::Idle | AgentStatus::Busy => Ok(()),
        }
    }

    /// Mark the agent stopped; later runs are refused.
    pub fn stop(&self) {
        let mut inner = self.inner.lock();
        if inner.status != AgentStatus::Stopped {
            inner.status = AgentStatus::Stopped;
            info!(agent = %self.name, "Agent stopped");
        }
    }

    /// Attach a tool and list it in `supported_tools`.
    pub fn add_tool(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        let mut inner = self.inner.lock();
        inner.tools.register(tool);
        if !inner.capabilities.supported_tools.contains(&name) {
            inner.capabilities.supported_tools.push(name);
        }
    }

    /// Detach a tool; returns whether it was attached.
    pub fn remove_tool(&self, name: &str) -> bool {
        let mut inner = self.inner.lock();
        if inner.tools.unregister(name).is_err() {
            return false;
        }
        inner.capabilities.supported_tools.retain(|t| t != name);
        true
    }

    /// Look up an attached tool by name.
    pub fn tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.inner.lock().tools.get(name).cloned()
    }

    /// Validate and run an attached tool. Errors are logged and returned to
    /// the calling agent, which owns its tool-error recovery.
    pub async fn use_tool(&self, name: &str, args: Value) -> OrbitResult<Value> {
        let tool = self
            .tool(name)
            .ok_or_else(|| OrbitError::NotFound(format!("tool '{name}' on agent '{}'", self.name)))?;
        debug!(agent = %self.name, tool = %name, "Using tool");
        match orbit_tools::invoke(tool.as_ref(), args).await {
            Ok(v) => Ok(v),
            Err(e) => {
                warn!(agent = %self.name, tool = %name, error = %e, "Tool call failed");
                Err(e)
            }
        }
    }
}
