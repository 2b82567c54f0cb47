//! File-backed storage backend.

use crate::{ClientStorage, StorageError, StorageEvent, StorageResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::{broadcast, Mutex};

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Storage backed by a single JSON document on disk.
///
/// The document is a flat string-to-string map. Writes go through a
/// temporary file followed by a rename, so a crash mid-write never
/// leaves a truncated document behind. All operations serialize on an
/// internal lock; the file is re-read on every access so separate
/// processes pointing at the same path converge on the same contents.
pub struct FileStorage {
    path: PathBuf,
    io_lock: Mutex<()>,
    events: broadcast::Sender<StorageEvent>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            path: path.into(),
            io_lock: Mutex::new(()),
            events,
        }
    }

    /// The path of the backing document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> StorageResult<HashMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| StorageError::Encoding(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, data: &HashMap<String, String>) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents =
            serde_json::to_string_pretty(data).map_err(|e| StorageError::Encoding(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    fn emit(&self, key: &str, value: Option<&str>) {
        let _ = self.events.send(StorageEvent {
            key: key.to_string(),
            value: value.map(String::from),
        });
    }
}

#[async_trait]
impl ClientStorage for FileStorage {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let _guard = self.io_lock.lock().await;
        Ok(self.load().await?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let _guard = self.io_lock.lock().await;
        let mut data = self.load().await?;
        data.insert(key.to_string(), value.to_string());
        self.store(&data).await?;
        drop(_guard);
        self.emit(key, Some(value));
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        let _guard = self.io_lock.lock().await;
        let mut data = self.load().await?;
        let removed = data.remove(key).is_some();
        if removed {
            self.store(&data).await?;
        }
        drop(_guard);
        if removed {
            self.emit(key, None);
        }
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        let _guard = self.io_lock.lock().await;
        let data = self.load().await?;
        self.store(&HashMap::new()).await?;
        drop(_guard);
        for key in data.keys() {
            self.emit(key, None);
        }
        Ok(())
    }

    fn watch(&self) -> Option<broadcast::Receiver<StorageEvent>> {
        Some(self.events.subscribe())
    }
}
