use crate::result::TaskResult;

/// A convenience `Result` alias using [`OrbitError`].
pub type OrbitResult<T> = Result<T, OrbitError>;

/// Top-level error type for the Orbit engine.
///
/// Admission and lookup failures (`Capacity`, `NotFound`, `DuplicateTask`)
/// are raised before any state is touched. Failures that happen after a task
/// was admitted are wrapped in [`OrbitError::Task`] together with the
/// [`TaskResult`] that was recorded for it.
#[derive(Debug, thiserror::Error)]
pub enum OrbitError {
    /// The orchestrator is already running its maximum number of tasks.
    #[error("Capacity error: {0}")]
    Capacity(String),

    /// No registered agent is idle and eligible for the task.
    #[error("No available agent: {0}")]
    NoAvailableAgent(String),

    /// An unknown task, agent, or tool id was referenced.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A tool argument bundle failed its schema check.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The deadline elapsed before the agent settled.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// An agent or tool raised during normal operation.
    #[error("Execution error: {0}")]
    Execution(String),

    /// The task was removed by an explicit cancel.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// A task id is already active or already has a stored result.
    #[error("Duplicate task: {0}")]
    DuplicateTask(String),

    /// An error in configuration parsing or validation, including
    /// malformed tool schemas.
    #[error("Config error: {0}")]
    Config(String),

    /// An error from the context/memory provider.
    #[error("Context error: {0}")]
    Context(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An execution-phase failure together with the result recorded for it.
    #[error("{source}")]
    Task {
        /// The terminal result stored for the task.
        result: Box<TaskResult>,
        /// The underlying failure kind.
        source: Box<OrbitError>,
    },
}

impl OrbitError {
    /// Wrap an execution-phase error with the result that was recorded.
    pub fn with_result(self, result: TaskResult) -> Self {
        OrbitError::Task {
            result: Box::new(result),
            source: Box::new(self),
        }
    }

    /// The underlying error kind, looking through [`OrbitError::Task`].
    pub fn kind(&self) -> &OrbitError {
        match self {
            OrbitError::Task { source, .. } => source.kind(),
            other => other,
        }
    }

    /// The recorded task result, if this error carries one.
    pub fn task_result(&self) -> Option<&TaskResult> {
        match self {
            OrbitError::Task { result, .. } => Some(result),
            _ => None,
        }
    }

    /// Whether this error represents an elapsed deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(self.kind(), OrbitError::Timeout(_))
    }

    /// Whether this error represents an explicit cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.kind(), OrbitError::Cancelled(_))
    }
}
