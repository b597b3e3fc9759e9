//! Task orchestration engine: admission control, agent selection,
//! timeout-bounded execution, cancellation and metrics.
//!
//! # Main types
//!
//! - [`Orchestrator`]: The façade: submit, cancel, query, lifecycle.
//! - [`Task`]: One unit of requested work.
//! - [`Dispatcher`]: Agent selection policy ([`PreferenceDispatcher`],
//!   [`LeastLoadedDispatcher`]).
//! - [`AgentRegistry`]: Named agents with in-flight bookkeeping.
//! - [`MetricsAggregator`]: Running counts and averages.
//! - [`EventBus`]: Broadcast of [`OrchestratorEvent`]s.

/// Orchestrator configuration.
pub mod config;
/// Agent selection policies.
pub mod dispatcher;
/// The orchestrator façade.
pub mod engine;
/// Lifecycle event broadcast.
pub mod events;
/// Deadline and cancel race around one agent call.
pub mod executor;
/// Aggregate statistics.
pub mod metrics;
/// Agent registry and reservations.
pub mod registry;
/// Task, metrics and snapshot types.
pub mod types;

pub use config::{DispatchPolicy, OrchestratorConfig};
pub use dispatcher::{Candidate, Dispatcher, LeastLoadedDispatcher, PreferenceDispatcher};
pub use engine::Orchestrator;
pub use events::{EventBus, OrchestratorEvent};
pub use executor::{Execution, Outcome};
pub use metrics::MetricsAggregator;
pub use registry::{AgentRegistry, Reservation};
pub use types::{AgentSnapshot, AgentTaskMetrics, OrchestratorMetrics, Task};
