//! Typed, best-effort access to the SDK's persisted credentials.

use crate::{ClientStorage, StorageEvent, StorageKeys};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::broadcast;
use tracing::warn;

/// High-level wrapper over a [`ClientStorage`] backend.
///
/// Persistence is best-effort: any storage failure is logged and
/// swallowed, and the in-memory session remains authoritative for the
/// current process lifetime. A backend without a capability simply
/// degrades (no persistence, or no cross-instance signal).
#[derive(Clone)]
pub struct CredentialStore {
    storage: Arc<dyn ClientStorage>,
}

impl CredentialStore {
    pub fn new(storage: Arc<dyn ClientStorage>) -> Self {
        Self { storage }
    }

    /// The underlying backend.
    pub fn storage(&self) -> &Arc<dyn ClientStorage> {
        &self.storage
    }

    /// Read the persisted refresh token, if any.
    pub async fn refresh_token(&self) -> Option<String> {
        match self.storage.get(StorageKeys::REFRESH_TOKEN).await {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read persisted refresh token");
                None
            }
        }
    }

    /// Persist the refresh token.
    pub async fn set_refresh_token(&self, token: &str) {
        if let Err(e) = self.storage.set(StorageKeys::REFRESH_TOKEN, token).await {
            warn!(error = %e, "Failed to persist refresh token");
        }
    }

    /// Remove the persisted refresh token.
    pub async fn clear_refresh_token(&self) {
        if let Err(e) = self.storage.remove(StorageKeys::REFRESH_TOKEN).await {
            warn!(error = %e, "Failed to clear persisted refresh token");
        }
    }

    /// Write the logout signal other instances sharing this backend
    /// observe through [`CredentialStore::watch`].
    pub async fn signal_logout(&self) {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis().to_string())
            .unwrap_or_else(|_| "0".to_string());
        if let Err(e) = self.storage.set(StorageKeys::LOGOUT_SIGNAL, &stamp).await {
            warn!(error = %e, "Failed to write logout signal");
        }
    }

    /// Subscribe to backend change notifications, if supported.
    pub fn watch(&self) -> Option<broadcast::Receiver<StorageEvent>> {
        self.storage.watch()
    }
}
