use crate::memory::{MemoryUpdate, TaskMemory};
use async_trait::async_trait;
use orbit_core::OrbitResult;
use serde_json::Value;
use tokio::sync::broadcast;

/// Key under which a task's memory is stored.
pub fn memory_key(task_id: &str) -> String {
    format!("memory:{task_id}")
}

/// Shared key-value context with per-task memory and named event topics.
///
/// Keys are caller-relative; implementations namespace them.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    /// Read a live entry.
    async fn get(&self, key: &str) -> OrbitResult<Option<Value>>;

    /// Write an entry, restarting its lifetime.
    async fn set(&self, key: &str, value: Value) -> OrbitResult<()>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> OrbitResult<()>;

    /// Drop every entry; topics stay open.
    async fn clear(&self) -> OrbitResult<()>;

    /// The task's memory, or an empty one if nothing was stored yet.
    async fn get_memory(&self, task_id: &str) -> OrbitResult<TaskMemory> {
        match self.get(&memory_key(task_id)).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(TaskMemory::default()),
        }
    }

    /// Merge `update` into the task's memory.
    async fn update_memory(&self, task_id: &str, update: MemoryUpdate) -> OrbitResult<()> {
        let mut memory = self.get_memory(task_id).await?;
        memory.merge(update);
        self.set(&memory_key(task_id), serde_json::to_value(&memory)?)
            .await
    }

    /// Receive everything published on `topic` from now on.
    fn subscribe(&self, topic: &str) -> broadcast::Receiver<Value>;

    /// Returns how many subscribers received the message.
    fn publish(&self, topic: &str, data: Value) -> usize;

    /// Drop all entries and close every topic.
    async fn dispose(&self) -> OrbitResult<()>;
}
