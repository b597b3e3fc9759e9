use crate::dispatcher::{Candidate, Dispatcher};
use crate::types::{AgentSnapshot, Task};
use orbit_agent::{Agent, AgentStatus};
use orbit_core::{OrbitError, OrbitResult};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

struct AgentEntry {
    /// Distinguishes a re-registered agent from the one it replaced.
    id: u64,
    agent: Arc<dyn Agent>,
    in_flight: usize,
}

impl AgentEntry {
    fn effective_status(&self) -> AgentStatus {
        let reported = self.agent.status();
        match reported {
            AgentStatus::Error | AgentStatus::Stopped => reported,
            _ => {
                let limit = self.agent.capabilities().max_concurrent_tasks.max(1);
                // An agent busy with work of its own is not ours to book.
                if self.in_flight >= limit
                    || (reported == AgentStatus::Busy && self.in_flight == 0)
                {
                    AgentStatus::Busy
                } else {
                    AgentStatus::Idle
                }
            }
        }
    }
}

#[derive(Default)]
struct Inner {
    entries: Vec<AgentEntry>,
    next_id: u64,
}

/// Named agents in registration order, with the orchestrator's own
/// in-flight count per agent.
#[derive(Default)]
pub struct AgentRegistry {
    inner: RwLock<Inner>,
}

/// An agent bound to one task. Dropping it releases the binding.
pub struct Reservation {
    registry: Arc<AgentRegistry>,
    entry_id: u64,
    agent: Arc<dyn Agent>,
}

impl Reservation {
    /// The reserved agent.
    pub fn agent(&self) -> &Arc<dyn Agent> {
        &self.agent
    }

    /// Name of the reserved agent.
    pub fn agent_name(&self) -> &str {
        self.agent.name()
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.registry.release(self.entry_id);
    }
}

impl AgentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent. A previous agent of the same name is replaced in
    /// place and returned.
    pub fn add(&self, agent: Arc<dyn Agent>) -> Option<Arc<dyn Agent>> {
        let mut inner = self.inner.write();
        let id = inner.next_id;
        inner.next_id += 1;
        let entry = AgentEntry {
            id,
            agent,
            in_flight: 0,
        };
        let name = entry.agent.name().to_string();
        match inner.entries.iter_mut().find(|e| e.agent.name() == name) {
            Some(slot) => Some(std::mem::replace(slot, entry).agent),
            None => {
                inner.entries.push(entry);
                None
            }
        }
    }

    /// Deregister an agent. Outstanding reservations stay valid.
    pub fn remove(&self, name: &str) -> OrbitResult<Arc<dyn Agent>> {
        let mut inner = self.inner.write();
        let idx = inner
            .entries
            .iter()
            .position(|e| e.agent.name() == name)
            .ok_or_else(|| OrbitError::NotFound(format!("agent '{name}'")))?;
        Ok(inner.entries.remove(idx).agent)
    }

    /// Look up an agent by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Agent>> {
        self.inner
            .read()
            .entries
            .iter()
            .find(|e| e.agent.name() == name)
            .map(|e| e.agent.clone())
    }

    /// All agents in registration order.
    pub fn agents(&self) -> Vec<Arc<dyn Agent>> {
        self.inner
            .read()
            .entries
            .iter()
            .map(|e| e.agent.clone())
            .collect()
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// Whether no agents are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshots with effective status, in registration order.
    pub fn snapshots(&self) -> Vec<AgentSnapshot> {
        self.inner
            .read()
            .entries
            .iter()
            .map(|e| AgentSnapshot {
                name: e.agent.name().to_string(),
                status: e.effective_status(),
                in_flight: e.in_flight,
                capabilities: e.agent.capabilities(),
                metrics: e.agent.metrics(),
            })
            .collect()
    }

    /// Select an idle agent for `task` and bind it, atomically.
    pub fn reserve(
        self: &Arc<Self>,
        task: &Task,
        dispatcher: &dyn Dispatcher,
    ) -> OrbitResult<Reservation> {
        let mut inner = self.inner.write();

        let idle: Vec<(usize, AgentStatus)> = inner
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, e.effective_status()))
            .filter(|(_, s)| *s == AgentStatus::Idle)
            .collect();
        if idle.is_empty() {
            return Err(OrbitError::NoAvailableAgent(format!(
                "no idle agent for task '{}' ({} registered)",
                task.id,
                inner.entries.len()
            )));
        }

        let picked = {
            let candidates: Vec<Candidate<'_>> = idle
                .iter()
                .map(|&(i, _)| {
                    let e = &inner.entries[i];
                    Candidate {
                        name: e.agent.name(),
                        in_flight: e.in_flight,
                        completed: e.agent.metrics().total_tasks,
                        position: i,
                    }
                })
                .collect();
            dispatcher
                .select(task, &candidates)
                .and_then(|c| idle.get(c))
                .map(|&(i, _)| i)
        };
        let Some(idx) = picked else {
            return Err(OrbitError::NoAvailableAgent(format!(
                "dispatcher '{}' declined task '{}'",
                dispatcher.name(),
                task.id
            )));
        };

        let entry = &mut inner.entries[idx];
        entry.in_flight += 1;
        debug!(
            task_id = %task.id,
            agent = %entry.agent.name(),
            in_flight = entry.in_flight,
            dispatcher = dispatcher.name(),
            "Agent reserved"
        );
        Ok(Reservation {
            registry: Arc::clone(self),
            entry_id: entry.id,
            agent: entry.agent.clone(),
        })
    }

    fn release(&self, entry_id: u64) {
        let mut inner = self.inner.write();
        // The entry is gone if the agent was removed or replaced meanwhile.
        if let Some(e) = inner.entries.iter_mut().find(|e| e.id == entry_id) {
            e.in_flight = e.in_flight.saturating_sub(1);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::dispatcher::PreferenceDispatcher;
    use orbit_agent::{AgentCapabilities, EchoAgent};
    use serde_json::json;

    fn registry_with(names: &[&str]) -> Arc<AgentRegistry> {
        let registry = Arc::new(AgentRegistry::new());
        for name in names {
            registry.add(Arc::new(EchoAgent::new(*name)));
        }
        registry
    }

    #[test]
    fn test_single_slot_agent_never_double_booked() {
        let registry = registry_with(&["a"]);
        let task = Task::new("t", json!(null));

        let held = registry.reserve(&task, &PreferenceDispatcher).unwrap();
        assert_eq!(held.agent_name(), "a");
        assert!(matches!(
            registry.reserve(&task, &PreferenceDispatcher),
            Err(OrbitError::NoAvailableAgent(_))
        ));
        assert_eq!(registry.snapshots()[0].status, AgentStatus::Busy);

        drop(held);
        assert_eq!(registry.snapshots()[0].in_flight, 0);
        assert!(registry.reserve(&task, &PreferenceDispatcher).is_ok());
    }

    #[test]
    fn test_multi_slot_agent_accepts_up_to_limit() {
        let registry = Arc::new(AgentRegistry::new());
        registry.add(Arc::new(EchoAgent::with_capabilities(
            "pool",
            AgentCapabilities::default().with_max_concurrent(2),
        )));
        let task = Task::new("t", json!(null));
        let _a = registry.reserve(&task, &PreferenceDispatcher).unwrap();
        let _b = registry.reserve(&task, &PreferenceDispatcher).unwrap();
        assert!(registry.reserve(&task, &PreferenceDispatcher).is_err());
    }

    #[test]
    fn test_preference_then_registration_order() {
        let registry = registry_with(&["a", "b"]);
        let prefer_b = Task::new("t", json!(null)).with_preference(["b", "a"]);

        let first = registry.reserve(&prefer_b, &PreferenceDispatcher).unwrap();
        assert_eq!(first.agent_name(), "b");
        let second = registry.reserve(&prefer_b, &PreferenceDispatcher).unwrap();
        assert_eq!(second.agent_name(), "a");
    }

    #[tokio::test]
    async fn test_stopped_agent_is_ineligible() {
        let registry = registry_with(&["a"]);
        registry.get("a").unwrap().stop().await.unwrap();
        assert!(registry
            .reserve(&Task::new("t", json!(null)), &PreferenceDispatcher)
            .is_err());
        assert_eq!(registry.snapshots()[0].status, AgentStatus::Stopped);
    }

    #[test]
    fn test_replace_keeps_position_and_ignores_stale_release() {
        let registry = registry_with(&["a", "b"]);
        let task = Task::new("t", json!(null));
        let stale = registry.reserve(&task, &PreferenceDispatcher).unwrap();

        let old = registry.add(Arc::new(EchoAgent::new("a")));
        assert!(old.is_some());
        let names: Vec<_> = registry.snapshots().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["a", "b"]);

        let fresh = registry.reserve(&task, &PreferenceDispatcher).unwrap();
        assert_eq!(fresh.agent_name(), "a");
        drop(stale);
        assert_eq!(registry.snapshots()[0].in_flight, 1);
    }

    #[test]
    fn test_remove_unknown_is_not_found() {
        let registry = registry_with(&["a"]);
        assert!(matches!(registry.remove("zzz"), Err(OrbitError::NotFound(_))));
        assert!(registry.remove("a").is_ok());
        assert!(registry.is_empty());
    }
}
