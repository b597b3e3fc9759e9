//! Shared context for Orbit: a namespaced key-value store with expiry,
//! per-task memory, and named pub/sub topics.

/// In-process provider with TTL expiry.
pub mod in_memory;
/// Task memory types.
pub mod memory;
/// The provider trait.
pub mod provider;

pub use in_memory::{ContextConfig, InMemoryContextProvider};
pub use memory::{EpisodeKind, MemoryEpisode, MemoryUpdate, TaskMemory};
pub use provider::{memory_key, ContextProvider};
