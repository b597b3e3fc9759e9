use crate::memory::{MemoryUpdate, TaskMemory};
use crate::provider::{memory_key, ContextProvider};
use async_trait::async_trait;
use orbit_core::OrbitResult;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info};

const KEY_PREFIX: &str = "orbit:context:";

/// Settings for [`InMemoryContextProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Lifetime of an entry from its last write.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Buffered messages per topic before slow subscribers lag.
    #[serde(default = "default_topic_capacity")]
    pub topic_capacity: usize,
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_topic_capacity() -> usize {
    64
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            topic_capacity: default_topic_capacity(),
        }
    }
}

struct Entry {
    value: Value,
    /// `None` when the lifetime reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Process-local [`ContextProvider`] with per-entry expiry.
///
/// Expired entries are dropped lazily on read; call
/// [`purge_expired`](Self::purge_expired) to reclaim them eagerly.
pub struct InMemoryContextProvider {
    ttl: Duration,
    topic_capacity: usize,
    entries: Mutex<HashMap<String, Entry>>,
    topics: Mutex<HashMap<String, broadcast::Sender<Value>>>,
}

impl InMemoryContextProvider {
    /// An empty provider using `config`.
    pub fn new(config: ContextConfig) -> Self {
        Self {
            ttl: Duration::from_secs(config.ttl_secs),
            topic_capacity: config.topic_capacity.max(1),
            entries: Mutex::new(HashMap::new()),
            topics: Mutex::new(HashMap::new()),
        }
    }

    /// Override the entry lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    fn expiry(&self, now: Instant) -> Option<Instant> {
        now.checked_add(self.ttl)
    }

    fn full_key(key: &str) -> String {
        format!("{KEY_PREFIX}{key}")
    }

    fn live_value(&self, full_key: &str) -> Option<Value> {
        let mut entries = self.entries.lock();
        match entries.get(full_key) {
            Some(entry) if entry.is_live(Instant::now()) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(full_key);
                debug!(key = %full_key, "Context entry expired");
                None
            }
            None => None,
        }
    }

    fn store(&self, full_key: String, value: Value) {
        let expires_at = self.expiry(Instant::now());
        self.entries
            .lock()
            .insert(full_key, Entry { value, expires_at });
    }

    /// Remove every expired entry. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        before - entries.len()
    }

    /// Number of stored entries, including not yet purged expired ones.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryContextProvider {
    fn default() -> Self {
        Self::new(ContextConfig::default())
    }
}

#[async_trait]
impl ContextProvider for InMemoryContextProvider {
    async fn get(&self, key: &str) -> OrbitResult<Option<Value>> {
        Ok(self.live_value(&Self::full_key(key)))
    }

    async fn set(&self, key: &str, value: Value) -> OrbitResult<()> {
        self.store(Self::full_key(key), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> OrbitResult<()> {
        self.entries.lock().remove(&Self::full_key(key));
        Ok(())
    }

    async fn clear(&self) -> OrbitResult<()> {
        self.entries.lock().clear();
        Ok(())
    }

    async fn update_memory(&self, task_id: &str, update: MemoryUpdate) -> OrbitResult<()> {
        let full_key = Self::full_key(&memory_key(task_id));
        // Read-modify-write under one lock; concurrent updates must not lose episodes.
        let mut entries = self.entries.lock();
        let now = Instant::now();
        let mut memory = match entries.get(&full_key) {
            Some(e) if e.is_live(now) => serde_json::from_value(e.value.clone())?,
            _ => TaskMemory::default(),
        };
        memory.merge(update);
        entries.insert(
            full_key,
            Entry {
                value: serde_json::to_value(&memory)?,
                expires_at: self.expiry(now),
            },
        );
        Ok(())
    }

    fn subscribe(&self, topic: &str) -> broadcast::Receiver<Value> {
        let mut topics = self.topics.lock();
        topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.topic_capacity).0)
            .subscribe()
    }

    fn publish(&self, topic: &str, data: Value) -> usize {
        let topics = self.topics.lock();
        match topics.get(topic) {
            // A send error only means nobody is listening right now.
            Some(tx) => tx.send(data).unwrap_or(0),
            None => 0,
        }
    }

    async fn dispose(&self) -> OrbitResult<()> {
        let closed = {
            let mut topics = self.topics.lock();
            let n = topics.len();
            topics.clear();
            n
        };
        self.entries.lock().clear();
        info!(topics = closed, "Context provider disposed");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::memory::{EpisodeKind, MemoryEpisode};
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_delete() {
        let ctx = InMemoryContextProvider::default();
        ctx.set("user", json!({ "name": "ana" })).await.unwrap();
        assert_eq!(ctx.get("user").await.unwrap(), Some(json!({ "name": "ana" })));

        ctx.delete("user").await.unwrap();
        assert_eq!(ctx.get("user").await.unwrap(), None);
        ctx.delete("never-set").await.unwrap();
    }

    #[tokio::test]
    async fn test_keys_are_prefixed() {
        let ctx = InMemoryContextProvider::default();
        ctx.set("k", json!(1)).await.unwrap();
        assert!(ctx.entries.lock().contains_key("orbit:context:k"));
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let ctx = InMemoryContextProvider::default().with_ttl(Duration::from_millis(20));
        ctx.set("a", json!(1)).await.unwrap();
        ctx.set("b", json!(2)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(ctx.get("a").await.unwrap(), None);
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.purge_expired(), 1);
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn test_huge_ttl_never_expires() {
        let ctx = InMemoryContextProvider::new(ContextConfig {
            ttl_secs: u64::MAX,
            ..ContextConfig::default()
        });
        ctx.set("k", json!(1)).await.unwrap();
        ctx.update_memory("t1", MemoryUpdate::default().with_short_term("a", json!(1)))
            .await
            .unwrap();

        assert_eq!(ctx.purge_expired(), 0);
        assert_eq!(ctx.get("k").await.unwrap(), Some(json!(1)));
        assert_eq!(ctx.get_memory("t1").await.unwrap().short_term["a"], json!(1));
    }

    #[tokio::test]
    async fn test_memory_defaults_then_accumulates() {
        let ctx = InMemoryContextProvider::default();
        assert_eq!(ctx.get_memory("t1").await.unwrap(), TaskMemory::default());

        ctx.update_memory(
            "t1",
            MemoryUpdate::episode(MemoryEpisode::new(EpisodeKind::Input, json!("hi"))),
        )
        .await
        .unwrap();
        ctx.update_memory(
            "t1",
            MemoryUpdate::episode(MemoryEpisode::new(EpisodeKind::Output, json!("hi")))
                .with_long_term("lang", json!("en")),
        )
        .await
        .unwrap();

        let memory = ctx.get_memory("t1").await.unwrap();
        assert_eq!(memory.episodic.len(), 2);
        assert_eq!(memory.long_term["lang"], "en");
        assert!(ctx.get("memory:t1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let ctx = InMemoryContextProvider::default();
        assert_eq!(ctx.publish("updates", json!(0)), 0);

        let mut rx1 = ctx.subscribe("updates");
        let mut rx2 = ctx.subscribe("updates");
        assert_eq!(ctx.publish("updates", json!({ "n": 1 })), 2);
        assert_eq!(rx1.recv().await.unwrap(), json!({ "n": 1 }));
        assert_eq!(rx2.recv().await.unwrap(), json!({ "n": 1 }));
    }

    #[tokio::test]
    async fn test_dispose_closes_topics() {
        let ctx = InMemoryContextProvider::default();
        let mut rx = ctx.subscribe("updates");
        ctx.set("k", json!(1)).await.unwrap();

        ctx.dispose().await.unwrap();
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Closed)
        ));
        assert!(ctx.is_empty());
    }
}
