use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What an episodic memory entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EpisodeKind {
    /// Data given to the task.
    Input,
    /// Data the task produced.
    Output,
    /// A failure the task ended with.
    Error,
    /// Anything else worth remembering.
    Event,
}

/// One timestamped entry in a task's episodic memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEpisode {
    /// When the episode was recorded.
    pub timestamp: DateTime<Utc>,
    /// What the episode records.
    #[serde(rename = "type")]
    pub kind: EpisodeKind,
    /// Episode payload.
    pub content: Value,
    /// Free-form annotations.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl MemoryEpisode {
    /// An episode stamped with the current time.
    pub fn new(kind: EpisodeKind, content: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            content,
            metadata: Map::new(),
        }
    }

    /// Add one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Per-task memory: two scratch maps and an append-only episode log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMemory {
    /// Scratch values for the current run.
    #[serde(default)]
    pub short_term: Map<String, Value>,
    /// Values kept across runs.
    #[serde(default)]
    pub long_term: Map<String, Value>,
    /// Append-only history, oldest first.
    #[serde(default)]
    pub episodic: Vec<MemoryEpisode>,
}

/// A partial [`TaskMemory`] applied with [`TaskMemory::merge`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryUpdate {
    /// Entries merged into `short_term`.
    pub short_term: Map<String, Value>,
    /// Entries merged into `long_term`.
    pub long_term: Map<String, Value>,
    /// Episodes appended to `episodic`.
    pub episodic: Vec<MemoryEpisode>,
}

impl MemoryUpdate {
    /// An update appending a single episode.
    pub fn episode(episode: MemoryEpisode) -> Self {
        Self {
            episodic: vec![episode],
            ..Self::default()
        }
    }

    /// Append another episode.
    pub fn with_episode(mut self, episode: MemoryEpisode) -> Self {
        self.episodic.push(episode);
        self
    }

    /// Set a short-term entry.
    pub fn with_short_term(mut self, key: impl Into<String>, value: Value) -> Self {
        self.short_term.insert(key.into(), value);
        self
    }

    /// Set a long-term entry.
    pub fn with_long_term(mut self, key: impl Into<String>, value: Value) -> Self {
        self.long_term.insert(key.into(), value);
        self
    }
}

impl TaskMemory {
    /// Overwrite map keys present in `update` and append its episodes.
    pub fn merge(&mut self, update: MemoryUpdate) {
        self.short_term.extend(update.short_term);
        self.long_term.extend(update.long_term);
        self.episodic.extend(update.episodic);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_keeps_untouched_keys_and_appends() {
        let mut memory = TaskMemory::default();
        memory.merge(
            MemoryUpdate::episode(MemoryEpisode::new(EpisodeKind::Input, json!("hi")))
                .with_short_term("step", json!(1))
                .with_long_term("user", json!("ana")),
        );
        memory.merge(
            MemoryUpdate::episode(MemoryEpisode::new(EpisodeKind::Output, json!("hi")))
                .with_short_term("step", json!(2)),
        );

        assert_eq!(memory.short_term["step"], 2);
        assert_eq!(memory.long_term["user"], "ana");
        let kinds: Vec<_> = memory.episodic.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EpisodeKind::Input, EpisodeKind::Output]);
    }

    #[test]
    fn test_episode_wire_shape() {
        let ep = MemoryEpisode::new(EpisodeKind::Error, json!("boom"))
            .with_metadata("agent", json!("a"));
        let v = serde_json::to_value(&ep).unwrap();
        assert_eq!(v["type"], "error");
        assert_eq!(v["metadata"]["agent"], "a");

        let back: MemoryEpisode = serde_json::from_value(v).unwrap();
        assert_eq!(back, ep);
    }

    #[test]
    fn test_missing_fields_default() {
        let memory: TaskMemory = serde_json::from_str("{}").unwrap();
        assert!(memory.episodic.is_empty());
    }
}
