use crate::config::OrchestratorConfig;
use crate::dispatcher::{self, Dispatcher};
use crate::events::{EventBus, OrchestratorEvent};
use crate::executor::{self, Abandoned, Outcome};
use crate::metrics::MetricsAggregator;
use crate::registry::AgentRegistry;
use crate::types::{AgentSnapshot, OrchestratorMetrics, Task};
use chrono::Utc;
use futures_util::future::join_all;
use orbit_agent::{Agent, ExecuteOptions};
use orbit_context::{ContextProvider, EpisodeKind, MemoryEpisode, MemoryUpdate};
use orbit_core::{OrbitError, OrbitResult, TaskMetrics, TaskResult, TaskStatus};
use orbit_tools::{Tool, ToolRegistry};
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error, info, warn};

struct ActiveTask {
    started: chrono::DateTime<Utc>,
    cancel: oneshot::Sender<()>,
}

/// Cancels an admitted task whose submitter went away before it settled.
struct AdmissionGuard<'a> {
    orchestrator: &'a Orchestrator,
    task_id: &'a str,
    armed: bool,
}

impl<'a> AdmissionGuard<'a> {
    fn new(orchestrator: &'a Orchestrator, task_id: &'a str) -> Self {
        Self {
            orchestrator,
            task_id,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        // NotFound here means the task already settled or was cancelled.
        if self.armed && self.orchestrator.cancel_task(self.task_id).is_ok() {
            warn!(task_id = %self.task_id, "Submitter dropped before the task settled");
        }
    }
}

/// Active tasks, stored results and counters, guarded together so the
/// admission check and the counters can never disagree.
#[derive(Default)]
struct Ledger {
    active: HashMap<String, ActiveTask>,
    results: HashMap<String, TaskResult>,
    metrics: MetricsAggregator,
}

/// The coordination façade: registries, dispatcher, executor and metrics
/// behind one API.
///
/// All methods take `&self`; share it behind an `Arc` to submit from many
/// tasks at once.
pub struct Orchestrator {
    config: OrchestratorConfig,
    agents: Arc<AgentRegistry>,
    tools: RwLock<ToolRegistry>,
    ledger: Mutex<Ledger>,
    dispatcher: Box<dyn Dispatcher>,
    events: EventBus,
    context: Option<Arc<dyn ContextProvider>>,
}

impl Orchestrator {
    /// Build an orchestrator with the dispatcher named by
    /// `config.dispatch_policy`.
    pub fn new(config: OrchestratorConfig) -> OrbitResult<Self> {
        config.validate()?;
        Ok(Self {
            dispatcher: dispatcher::for_policy(config.dispatch_policy),
            events: EventBus::new(config.event_capacity),
            agents: Arc::new(AgentRegistry::new()),
            tools: RwLock::new(ToolRegistry::new()),
            ledger: Mutex::new(Ledger::default()),
            context: None,
            config,
        })
    }

    /// Replace the dispatcher chosen from the config.
    pub fn with_dispatcher(mut self, dispatcher: Box<dyn Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Record each task's input and outcome as episodes in its memory.
    pub fn with_context(mut self, context: Arc<dyn ContextProvider>) -> Self {
        self.context = Some(context);
        self
    }

    /// The validated configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Initialize every registered agent in parallel. The first failure
    /// aborts startup.
    pub async fn initialize(&self) -> OrbitResult<()> {
        let agents = self.agents.agents();
        info!(agents = agents.len(), "Initializing orchestrator");

        let results = join_all(agents.iter().map(|a| a.initialize())).await;
        for (agent, result) in agents.iter().zip(results) {
            if let Err(e) = result {
                error!(agent = %agent.name(), error = %e, "Agent failed to initialize");
                self.events.emit(OrchestratorEvent::AgentError {
                    agent: agent.name().to_string(),
                    error: e.to_string(),
                });
                return Err(e);
            }
        }

        info!("Orchestrator initialized");
        self.events.emit(OrchestratorEvent::Ready);
        Ok(())
    }

    /// Cancel every active task, then stop every agent in parallel. Stop
    /// failures are logged and swallowed.
    pub async fn shutdown(&self) {
        info!("Shutting down orchestrator");

        let active: Vec<String> = self.ledger.lock().active.keys().cloned().collect();
        for task_id in active {
            // A task may settle between the snapshot and the cancel.
            if let Err(e) = self.cancel_task(&task_id) {
                debug!(task_id = %task_id, error = %e, "Task settled before shutdown cancel");
            }
        }

        let agents = self.agents.agents();
        let results = join_all(agents.iter().map(|a| a.stop())).await;
        for (agent, result) in agents.iter().zip(results) {
            if let Err(e) = result {
                self.report_stop_failure(agent.as_ref(), &e);
            }
        }

        info!("Orchestrator shut down");
        self.events.emit(OrchestratorEvent::Stopped);
    }

    fn report_stop_failure(&self, agent: &dyn Agent, e: &OrbitError) {
        warn!(agent = %agent.name(), error = %e, "Failed to stop agent");
        self.events.emit(OrchestratorEvent::AgentError {
            agent: agent.name().to_string(),
            error: e.to_string(),
        });
    }

    // ---------------------------------------------------------------------
    // Agents and tools
    // ---------------------------------------------------------------------

    /// Register an agent; an agent of the same name is replaced and its
    /// orchestrator metrics reset.
    pub fn add_agent(&self, agent: Arc<dyn Agent>) {
        let name = agent.name().to_string();
        if self.agents.add(agent).is_some() {
            warn!(agent = %name, "Agent replaced");
        }
        self.ledger.lock().metrics.register_agent(&name);
        info!(agent = %name, "Agent added");
        self.events.emit(OrchestratorEvent::AgentAdded { name });
    }

    /// Deregister an agent, stop it best-effort and drop its metrics.
    pub async fn remove_agent(&self, name: &str) -> OrbitResult<()> {
        let agent = self.agents.remove(name)?;
        self.ledger.lock().metrics.remove_agent(name);
        if let Err(e) = agent.stop().await {
            self.report_stop_failure(agent.as_ref(), &e);
        }
        info!(agent = %name, "Agent removed");
        self.events.emit(OrchestratorEvent::AgentRemoved {
            name: name.to_string(),
        });
        Ok(())
    }

    /// Snapshots of every registered agent, in registration order.
    pub fn agents(&self) -> Vec<AgentSnapshot> {
        self.agents.snapshots()
    }

    /// Look up an agent by name.
    pub fn agent(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(name)
    }

    /// Register a tool; a tool of the same name is overwritten.
    pub fn add_tool(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.write().register(tool).is_some() {
            debug!(tool = %name, "Tool overwritten");
        }
        info!(tool = %name, "Tool added");
    }

    /// Deregister a tool.
    pub fn remove_tool(&self, name: &str) -> OrbitResult<()> {
        self.tools.write().unregister(name)?;
        info!(tool = %name, "Tool removed");
        Ok(())
    }

    /// Names of registered tools, sorted.
    pub fn tool_names(&self) -> Vec<String> {
        self.tools.read().names()
    }

    /// Validate `args` against the tool's schema and run it. Failures are
    /// reported as [`OrchestratorEvent::ToolError`] and returned.
    pub async fn call_tool(
        &self,
        name: &str,
        args: serde_json::Value,
    ) -> OrbitResult<serde_json::Value> {
        let tool = self
            .tools
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| OrbitError::NotFound(format!("tool '{name}'")))?;

        match orbit_tools::invoke(tool.as_ref(), args).await {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(tool = %name, error = %e, "Tool call failed");
                self.events.emit(OrchestratorEvent::ToolError {
                    tool: name.to_string(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    // ---------------------------------------------------------------------
    // Tasks
    // ---------------------------------------------------------------------

    /// Admit, dispatch and run `task`, returning its recorded result.
    ///
    /// Admission errors (`Capacity`, `DuplicateTask`) leave no trace. Every
    /// other failure is recorded first and returned as an
    /// [`OrbitError::Task`] carrying that record.
    ///
    /// Dropping the returned future before it completes cancels the task.
    pub async fn submit_task(&self, task: Task) -> OrbitResult<TaskResult> {
        let cancel = self.admit(&task)?;
        let guard = AdmissionGuard::new(self, &task.id);
        info!(task_id = %task.id, priority = task.priority, "Task submitted");
        self.events.emit(OrchestratorEvent::TaskSubmitted {
            task_id: task.id.clone(),
        });

        let outcome = self.run_admitted(&task, cancel).await;
        guard.disarm();
        outcome
    }

    /// Dispatch and execute an admitted task, then record its result.
    async fn run_admitted(
        &self,
        task: &Task,
        cancel: oneshot::Receiver<()>,
    ) -> OrbitResult<TaskResult> {
        let reservation = match self.agents.reserve(task, self.dispatcher.as_ref()) {
            Ok(r) => r,
            Err(e) => {
                let result = TaskResult::failed(
                    &task.id,
                    TaskStatus::Failure,
                    e.to_string(),
                    TaskMetrics::empty(),
                );
                return self.settle(task, result, Some(e), None).await;
            }
        };
        let agent_name = reservation.agent_name().to_string();
        debug!(task_id = %task.id, agent = %agent_name, "Task dispatched");

        let timeout_ms = task.timeout_ms.unwrap_or(self.config.default_timeout_ms);
        let options = ExecuteOptions {
            timeout_ms: Some(timeout_ms),
            priority: task.priority,
            retry_strategy: task
                .retry_strategy
                .clone()
                .or_else(|| self.config.retry_strategy.clone()),
            context: task.context.clone(),
        };

        let exec = executor::execute(
            reservation,
            task.input.clone(),
            options,
            Duration::from_millis(timeout_ms),
            cancel,
        )
        .await;

        let mut metrics = TaskMetrics {
            start_time: exec.start_time,
            end_time: exec.end_time,
            duration_ms: exec.duration_ms,
            retries: 0,
            agent_name,
        };
        let (result, err) = match exec.outcome {
            Outcome::Success(response) => {
                metrics.retries = response.metadata.retries;
                (TaskResult::success(&task.id, response.output, metrics), None)
            }
            Outcome::Failure(e) => (
                TaskResult::failed(&task.id, TaskStatus::Failure, e.to_string(), metrics),
                Some(e),
            ),
            Outcome::Timeout => {
                let e = OrbitError::Timeout(format!(
                    "task '{}' exceeded {timeout_ms} ms",
                    task.id
                ));
                (
                    TaskResult::failed(&task.id, TaskStatus::Timeout, e.to_string(), metrics),
                    Some(e),
                )
            }
            Outcome::Cancelled => {
                // cancel_task already recorded the result.
                if let Some(call) = exec.abandoned {
                    self.discard_late(&task.id, &metrics.agent_name, call);
                }
                return Err(self.cancelled_error(&task.id));
            }
        };

        self.settle(task, result, err, exec.abandoned).await
    }

    /// Reserve a ledger slot for `task`, returning its cancel receiver.
    fn admit(&self, task: &Task) -> OrbitResult<oneshot::Receiver<()>> {
        let mut ledger = self.ledger.lock();
        if ledger.active.contains_key(&task.id) || ledger.results.contains_key(&task.id) {
            return Err(OrbitError::DuplicateTask(format!(
                "task '{}' is active or has a stored result",
                task.id
            )));
        }
        let limit = self.config.max_concurrent_tasks;
        if ledger.active.len() >= limit {
            warn!(task_id = %task.id, limit, "Task rejected at capacity");
            return Err(OrbitError::Capacity(format!(
                "maximum of {limit} concurrent tasks reached"
            )));
        }

        let (tx, rx) = oneshot::channel();
        ledger.active.insert(
            task.id.clone(),
            ActiveTask {
                started: Utc::now(),
                cancel: tx,
            },
        );
        ledger.metrics.admit();
        Ok(rx)
    }

    /// Record the terminal result of an admitted task, exactly once.
    ///
    /// `err` is returned (wrapped with the result) unless the result is a
    /// success. If the task was cancelled meanwhile, the cancel record stands
    /// and this result is discarded.
    async fn settle(
        &self,
        task: &Task,
        result: TaskResult,
        err: Option<OrbitError>,
        abandoned: Option<Abandoned>,
    ) -> OrbitResult<TaskResult> {
        if let Some(call) = abandoned {
            self.discard_late(&task.id, &result.metrics.agent_name, call);
        }

        {
            let mut ledger = self.ledger.lock();
            if ledger.active.remove(&task.id).is_none() {
                drop(ledger);
                warn!(
                    task_id = %task.id,
                    status = %result.status,
                    "Result lost the race with cancel, discarded"
                );
                return Err(self.cancelled_error(&task.id));
            }
            ledger.metrics.complete(&result);
            ledger.results.insert(task.id.clone(), result.clone());
        }

        match result.status {
            TaskStatus::Success => info!(
                task_id = %task.id,
                agent = %result.metrics.agent_name,
                duration_ms = result.metrics.duration_ms,
                "Task completed"
            ),
            status => error!(
                task_id = %task.id,
                agent = %result.metrics.agent_name,
                status = %status,
                error = result.error.as_deref().unwrap_or_default(),
                "Task failed"
            ),
        }
        self.events.emit(OrchestratorEvent::TaskCompleted {
            result: result.clone(),
        });
        self.remember(task, &result).await;

        if result.is_success() {
            return Ok(result);
        }
        let err = err.unwrap_or_else(|| {
            OrbitError::Execution(result.error.clone().unwrap_or_default())
        });
        Err(err.with_result(result))
    }

    fn cancelled_error(&self, task_id: &str) -> OrbitError {
        let result = self
            .task_status(task_id)
            .unwrap_or_else(|| TaskResult::cancelled(task_id));
        OrbitError::Cancelled(format!("task '{task_id}' was cancelled")).with_result(result)
    }

    /// Watch an abandoned agent call and drop whatever it eventually returns.
    fn discard_late(&self, task_id: &str, agent: &str, call: Abandoned) {
        let events = self.events.clone();
        let task_id = task_id.to_string();
        let agent = agent.to_string();
        tokio::spawn(async move {
            let success = matches!(call.await, Ok(Ok(_)));
            warn!(task_id = %task_id, agent = %agent, success, "Late agent result discarded");
            events.emit(OrchestratorEvent::LateResultDiscarded {
                task_id,
                agent,
                success,
            });
        });
    }

    /// Append the task's input and outcome to its memory. Failures are
    /// logged, never raised.
    async fn remember(&self, task: &Task, result: &TaskResult) {
        let Some(ctx) = &self.context else {
            return;
        };
        let outcome = match &result.output {
            Some(output) => MemoryEpisode::new(EpisodeKind::Output, output.clone()),
            None => MemoryEpisode::new(EpisodeKind::Error, json!(result.error)),
        }
        .with_metadata("status", json!(result.status))
        .with_metadata("agent", json!(result.metrics.agent_name));

        let input = MemoryEpisode::new(EpisodeKind::Input, task.input.clone());
        let update = MemoryUpdate::episode(input).with_episode(outcome);
        if let Err(e) = ctx.update_memory(&task.id, update).await {
            warn!(task_id = %task.id, error = %e, "Failed to record task memory");
        }
    }

    /// Cancel an active task. Its result is recorded as `cancelled` at once;
    /// the agent call is not interrupted, and the submitter is released with
    /// [`OrbitError::Cancelled`].
    pub fn cancel_task(&self, task_id: &str) -> OrbitResult<()> {
        let active = {
            let mut ledger = self.ledger.lock();
            let active = ledger
                .active
                .remove(task_id)
                .ok_or_else(|| OrbitError::NotFound(format!("active task '{task_id}'")))?;

            let end_time = Utc::now();
            let metrics = TaskMetrics {
                start_time: active.started,
                end_time,
                duration_ms: (end_time - active.started).num_milliseconds().max(0) as u64,
                ..TaskMetrics::empty()
            };
            let mut result = TaskResult::cancelled(task_id);
            result.metrics = metrics;
            ledger.results.insert(task_id.to_string(), result);
            ledger.metrics.cancel();
            active
        };

        // The submitter may already be gone.
        let _ = active.cancel.send(());
        info!(task_id = %task_id, "Task cancelled");
        self.events.emit(OrchestratorEvent::TaskCancelled {
            task_id: task_id.to_string(),
        });
        Ok(())
    }

    /// The stored result of a task, if it has settled.
    pub fn task_status(&self, task_id: &str) -> Option<TaskResult> {
        self.ledger.lock().results.get(task_id).cloned()
    }

    /// Whether the task is admitted and not yet settled.
    pub fn is_active(&self, task_id: &str) -> bool {
        self.ledger.lock().active.contains_key(task_id)
    }

    /// Drop a stored result so its id can be submitted again.
    pub fn evict_result(&self, task_id: &str) -> Option<TaskResult> {
        self.ledger.lock().results.remove(task_id)
    }

    /// All stored results, oldest settlement first.
    pub fn results(&self) -> Vec<TaskResult> {
        let mut results: Vec<TaskResult> = self.ledger.lock().results.values().cloned().collect();
        results.sort_by(|a, b| {
            a.metrics
                .end_time
                .cmp(&b.metrics.end_time)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        results
    }

    /// Snapshot of the aggregate metrics.
    pub fn metrics(&self) -> OrchestratorMetrics {
        self.ledger.lock().metrics.snapshot()
    }

    // ---------------------------------------------------------------------
    // Events
    // ---------------------------------------------------------------------

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    /// Subscribe to lifecycle events as a `Stream`.
    pub fn event_stream(&self) -> BroadcastStream<OrchestratorEvent> {
        self.events.stream()
    }
}
