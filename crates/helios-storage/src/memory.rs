//! In-memory storage backend.

use crate::{ClientStorage, StorageEvent, StorageResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::broadcast;

/// Capacity of the change-notification channel.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// In-memory storage.
///
/// The default backend for server-side rendering contexts and tests.
/// Values live for the process lifetime only. Supports change
/// notification, so two SDK instances sharing one `MemoryStorage` (via
/// `Arc`) observe each other's logout signal.
pub struct MemoryStorage {
    data: Mutex<HashMap<String, String>>,
    events: broadcast::Sender<StorageEvent>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            data: Mutex::new(HashMap::new()),
            events,
        }
    }

    fn emit(&self, key: &str, value: Option<&str>) {
        // Nobody listening is fine.
        let _ = self.events.send(StorageEvent {
            key: key.to_string(),
            value: value.map(String::from),
        });
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClientStorage for MemoryStorage {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let data = self.data.lock().expect("storage lock poisoned");
        Ok(data.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        {
            let mut data = self.data.lock().expect("storage lock poisoned");
            data.insert(key.to_string(), value.to_string());
        }
        self.emit(key, Some(value));
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let removed = {
            let mut data = self.data.lock().expect("storage lock poisoned");
            data.remove(key).is_some()
        };
        if removed {
            self.emit(key, None);
        }
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        let keys: Vec<String> = {
            let mut data = self.data.lock().expect("storage lock poisoned");
            let keys = data.keys().cloned().collect();
            data.clear();
            keys
        };
        for key in keys {
            self.emit(&key, None);
        }
        Ok(())
    }

    fn watch(&self) -> Option<broadcast::Receiver<StorageEvent>> {
        Some(self.events.subscribe())
    }
}
