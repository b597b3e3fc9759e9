use orbit_core::TaskResult;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

/// Lifecycle notifications emitted by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    /// Every agent initialized.
    Ready,
    /// Shutdown finished.
    Stopped,
    /// An agent was registered.
    AgentAdded {
        /// Name of the agent.
        name: String,
    },
    /// An agent was deregistered.
    AgentRemoved {
        /// Name of the agent.
        name: String,
    },
    /// An agent failed to initialize or stop.
    AgentError {
        /// Name of the failing agent.
        agent: String,
        /// The failure message.
        error: String,
    },
    /// A task passed admission.
    TaskSubmitted {
        /// Id of the admitted task.
        task_id: String,
    },
    /// A result was recorded for an admitted task (any status but cancelled).
    TaskCompleted {
        /// The stored result.
        result: TaskResult,
    },
    /// An active task was cancelled.
    TaskCancelled {
        /// Id of the cancelled task.
        task_id: String,
    },
    /// A tool call through the orchestrator failed.
    ToolError {
        /// Name of the tool.
        tool: String,
        /// The failure message.
        error: String,
    },
    /// An abandoned agent call settled after its task was already decided.
    LateResultDiscarded {
        /// Id of the task the call belonged to.
        task_id: String,
        /// Agent that ran the call.
        agent: String,
        /// Whether the discarded call succeeded.
        success: bool,
    },
}

/// Fan-out of [`OrchestratorEvent`]s to any number of subscribers.
///
/// Emitting never blocks; subscribers that fall more than the channel
/// capacity behind observe a lag error and skip ahead.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<OrchestratorEvent>,
}

impl EventBus {
    /// A bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to events emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.tx.subscribe()
    }

    /// Subscribe as a `Stream`; lag shows up as `Err` items.
    pub fn stream(&self) -> BroadcastStream<OrchestratorEvent> {
        BroadcastStream::new(self.tx.subscribe())
    }

    /// Returns the number of subscribers that received the event.
    pub fn emit(&self, event: OrchestratorEvent) -> usize {
        // No subscribers is not an error.
        self.tx.send(event).unwrap_or(0)
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
