use crate::types::{AgentTaskMetrics, OrchestratorMetrics};
use chrono::Utc;
use orbit_core::stats::running_mean;
use orbit_core::{TaskResult, TaskStatus};

/// Running aggregate statistics for the orchestrator and its agents.
///
/// Not synchronized on its own; the orchestrator keeps it inside the task
/// ledger so admission and counting happen atomically.
#[derive(Debug, Default)]
pub struct MetricsAggregator {
    metrics: OrchestratorMetrics,
}

impl MetricsAggregator {
    /// An aggregator with no agents and zero counts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking an agent, resetting any previous entry of that name.
    pub fn register_agent(&mut self, name: &str) {
        self.metrics
            .agent_metrics
            .insert(name.to_string(), AgentTaskMetrics::default());
    }

    /// Drop an agent's entry.
    pub fn remove_agent(&mut self, name: &str) {
        self.metrics.agent_metrics.remove(name);
    }

    /// A task was admitted.
    pub fn admit(&mut self) {
        self.metrics.total_tasks += 1;
        self.metrics.active_tasks += 1;
    }

    /// A task was cancelled while active. Completion counters are untouched.
    pub fn cancel(&mut self) {
        self.metrics.active_tasks = self.metrics.active_tasks.saturating_sub(1);
    }

    /// A task settled with `result`. Call exactly once per admitted,
    /// non-cancelled task.
    pub fn complete(&mut self, result: &TaskResult) {
        let m = &mut self.metrics;
        m.active_tasks = m.active_tasks.saturating_sub(1);

        let success = result.status == TaskStatus::Success;
        if success {
            m.completed_tasks += 1;
        } else {
            m.failed_tasks += 1;
        }
        let settled = m.completed_tasks + m.failed_tasks;
        let duration = result.metrics.duration_ms as f64;
        m.average_task_duration_ms = running_mean(m.average_task_duration_ms, settled, duration);

        let agent = &result.metrics.agent_name;
        if agent.is_empty() {
            return;
        }
        // Agents removed while their task ran are no longer tracked.
        if let Some(a) = m.agent_metrics.get_mut(agent) {
            a.total_tasks += 1;
            if success {
                a.successful_tasks += 1;
            } else {
                a.failed_tasks += 1;
            }
            a.success_rate = a.successful_tasks as f64 / a.total_tasks as f64;
            a.average_response_time_ms =
                running_mean(a.average_response_time_ms, a.total_tasks, duration);
            a.last_active = Some(Utc::now());
        }
    }

    /// Admitted tasks not yet settled or cancelled.
    pub fn active_tasks(&self) -> u64 {
        self.metrics.active_tasks
    }

    /// A copy of the current figures.
    pub fn snapshot(&self) -> OrchestratorMetrics {
        self.metrics.clone()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use orbit_core::TaskMetrics;
    use serde_json::json;

    fn result(status: TaskStatus, agent: &str, duration_ms: u64) -> TaskResult {
        let metrics = TaskMetrics {
            duration_ms,
            agent_name: agent.to_string(),
            ..TaskMetrics::empty()
        };
        match status {
            TaskStatus::Success => TaskResult::success("t", json!(null), metrics),
            other => TaskResult::failed("t", other, "err", metrics),
        }
    }

    #[test]
    fn test_admit_and_complete() {
        let mut agg = MetricsAggregator::new();
        agg.register_agent("a");
        agg.admit();
        agg.admit();
        assert_eq!(agg.active_tasks(), 2);

        agg.complete(&result(TaskStatus::Success, "a", 10));
        agg.complete(&result(TaskStatus::Timeout, "a", 30));

        let m = agg.snapshot();
        assert_eq!(m.total_tasks, 2);
        assert_eq!(m.active_tasks, 0);
        assert_eq!(m.completed_tasks, 1);
        assert_eq!(m.failed_tasks, 1);
        assert!((m.average_task_duration_ms - 20.0).abs() < 1e-9);

        let a = &m.agent_metrics["a"];
        assert_eq!(a.total_tasks, 2);
        assert!((a.success_rate - 0.5).abs() < 1e-9);
        assert!((a.average_response_time_ms - 20.0).abs() < 1e-9);
        assert!(a.last_active.is_some());
    }

    #[test]
    fn test_average_matches_arithmetic_mean() {
        let mut agg = MetricsAggregator::new();
        agg.register_agent("a");
        let durations = [3u64, 17, 4, 120, 9, 55];
        for d in durations {
            agg.admit();
            agg.complete(&result(TaskStatus::Success, "a", d));
        }
        let mean = durations.iter().sum::<u64>() as f64 / durations.len() as f64;
        let m = agg.snapshot();
        assert!((m.agent_metrics["a"].average_response_time_ms - mean).abs() < 1e-9);
        assert!((m.average_task_duration_ms - mean).abs() < 1e-9);
    }

    #[test]
    fn test_cancel_only_touches_active() {
        let mut agg = MetricsAggregator::new();
        agg.admit();
        agg.cancel();
        let m = agg.snapshot();
        assert_eq!(m.total_tasks, 1);
        assert_eq!(m.active_tasks, 0);
        assert_eq!(m.completed_tasks + m.failed_tasks, 0);
    }

    #[test]
    fn test_unbound_failure_counts_without_agent_entry() {
        let mut agg = MetricsAggregator::new();
        agg.register_agent("a");
        agg.admit();
        agg.complete(&result(TaskStatus::Failure, "", 0));
        let m = agg.snapshot();
        assert_eq!(m.failed_tasks, 1);
        assert_eq!(m.agent_metrics["a"].total_tasks, 0);
    }

    #[test]
    fn test_removed_agent_is_not_recreated() {
        let mut agg = MetricsAggregator::new();
        agg.register_agent("a");
        agg.admit();
        agg.remove_agent("a");
        agg.complete(&result(TaskStatus::Success, "a", 5));
        let m = agg.snapshot();
        assert!(!m.agent_metrics.contains_key("a"));
        assert_eq!(m.completed_tasks, 1);
    }
}
