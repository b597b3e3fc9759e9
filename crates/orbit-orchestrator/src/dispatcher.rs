use crate::config::DispatchPolicy;
use crate::types::Task;

/// An idle agent offered to a [`Dispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate<'a> {
    /// Agent name.
    pub name: &'a str,
    /// Tasks currently bound to the agent by this orchestrator.
    pub in_flight: usize,
    /// Tasks the agent reports having finished.
    pub completed: u64,
    /// Registration order, 0-based.
    pub position: usize,
}

/// Agent selection policy.
///
/// Called with the registry's write lock held, so implementations must be
/// quick and must not block.
pub trait Dispatcher: Send + Sync {
    /// Policy name for logs.
    fn name(&self) -> &'static str;

    /// Pick one of `idle` (never empty, in registration order) and return
    /// its index.
    fn select(&self, task: &Task, idle: &[Candidate<'_>]) -> Option<usize>;
}

/// First idle agent from the task's preference list.
fn preferred(task: &Task, idle: &[Candidate<'_>]) -> Option<usize> {
    task.agent_preference
        .iter()
        .find_map(|want| idle.iter().position(|c| c.name == want.as_str()))
}

/// Preference list first, otherwise the first idle agent in registration
/// order.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreferenceDispatcher;

impl Dispatcher for PreferenceDispatcher {
    fn name(&self) -> &'static str {
        "preference"
    }

    fn select(&self, task: &Task, idle: &[Candidate<'_>]) -> Option<usize> {
        preferred(task, idle).or_else(|| (!idle.is_empty()).then_some(0))
    }
}

/// Preference list first, otherwise the idle agent with the fewest
/// in-flight tasks, then the fewest completed tasks, then the earliest
/// registered.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastLoadedDispatcher;

impl Dispatcher for LeastLoadedDispatcher {
    fn name(&self) -> &'static str {
        "least_loaded"
    }

    fn select(&self, task: &Task, idle: &[Candidate<'_>]) -> Option<usize> {
        preferred(task, idle).or_else(|| {
            idle.iter()
                .enumerate()
                .min_by_key(|(_, c)| (c.in_flight, c.completed, c.position))
                .map(|(i, _)| i)
        })
    }
}

/// The dispatcher configured by `policy`.
pub fn for_policy(policy: DispatchPolicy) -> Box<dyn Dispatcher> {
    match policy {
        DispatchPolicy::Preference => Box::new(PreferenceDispatcher),
        DispatchPolicy::LeastLoaded => Box::new(LeastLoadedDispatcher),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidates<'a>(specs: &[(&'a str, usize, u64)]) -> Vec<Candidate<'a>> {
        specs
            .iter()
            .enumerate()
            .map(|(position, &(name, in_flight, completed))| Candidate {
                name,
                in_flight,
                completed,
                position,
            })
            .collect()
    }

    #[test]
    fn test_preference_order_wins() {
        let idle = candidates(&[("a", 0, 0), ("b", 0, 0)]);
        let task = Task::new("t", json!(null)).with_preference(["b", "a"]);
        assert_eq!(PreferenceDispatcher.select(&task, &idle), Some(1));
    }

    #[test]
    fn test_skips_unavailable_preference() {
        let idle = candidates(&[("a", 0, 0)]);
        let task = Task::new("t", json!(null)).with_preference(["b", "a"]);
        assert_eq!(PreferenceDispatcher.select(&task, &idle), Some(0));
    }

    #[test]
    fn test_falls_back_to_registration_order() {
        let idle = candidates(&[("x", 3, 9), ("y", 0, 0)]);
        let task = Task::new("t", json!(null)).with_preference(["gone"]);
        assert_eq!(PreferenceDispatcher.select(&task, &idle), Some(0));
        assert_eq!(PreferenceDispatcher.select(&task, &[]), None);
    }

    #[test]
    fn test_least_loaded() {
        let idle = candidates(&[("a", 1, 0), ("b", 0, 7), ("c", 0, 2), ("d", 0, 2)]);
        let task = Task::new("t", json!(null));
        assert_eq!(LeastLoadedDispatcher.select(&task, &idle), Some(2));

        let task = task.with_preference(["a"]);
        assert_eq!(LeastLoadedDispatcher.select(&task, &idle), Some(0));
    }

    #[test]
    fn test_for_policy() {
        assert_eq!(for_policy(DispatchPolicy::Preference).name(), "preference");
        assert_eq!(for_policy(DispatchPolicy::LeastLoaded).name(), "least_loaded");
    }
}
