//! Storage trait definitions.

use crate::{StorageError, StorageResult};
use async_trait::async_trait;
use tokio::sync::broadcast;

/// A change observed on a storage backend.
///
/// Emitted by backends that support change notification, e.g. so that
/// sibling SDK instances sharing a backend can observe a logout signal.
#[derive(Debug, Clone)]
pub struct StorageEvent {
    /// The key that changed.
    pub key: String,
    /// The new value, or `None` if the key was removed.
    pub value: Option<String>,
}

/// Trait for client storage backends.
///
/// Every operation is async: backends may be an in-process map, a file,
/// or something network-backed. Callers must not assume ordering beyond
/// "a `get` issued after an awaited `set` to the same key observes the
/// new value".
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// Retrieve a value.
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Store a value.
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Delete a value.
    async fn remove(&self, key: &str) -> StorageResult<()>;

    /// Remove every key. Optional capability.
    async fn clear(&self) -> StorageResult<()> {
        Err(StorageError::Unsupported("clear"))
    }

    /// Subscribe to change notifications. Optional capability.
    ///
    /// Returns `None` when the backend cannot observe changes; callers
    /// degrade gracefully (cross-instance sync is simply unavailable).
    fn watch(&self) -> Option<broadcast::Receiver<StorageEvent>> {
        None
    }
}
