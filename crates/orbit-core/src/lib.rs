//! Core types and error definitions for the Orbit orchestration engine.
//!
//! This crate provides the foundational types shared across all Orbit crates:
//! the unified error enum and the terminal task result record.
//!
//! # Main types
//!
//! - [`OrbitError`]: Unified error enum for all Orbit subsystems.
//! - [`OrbitResult`]: Convenience alias for `Result<T, OrbitError>`.
//! - [`TaskResult`]: The terminal record written once per task.
//! - [`TaskStatus`]: Success, failure, timeout or cancelled.
//! - [`TaskMetrics`]: Timing and agent attribution of a task run.
//! - [`stats::running_mean`]: Incremental mean used by every metrics record.

/// Error types.
pub mod error;
/// Terminal task result types.
pub mod result;
/// Running statistics helpers.
pub mod stats;

pub use error::{OrbitError, OrbitResult};
pub use result::{TaskMetrics, TaskResult, TaskStatus};
