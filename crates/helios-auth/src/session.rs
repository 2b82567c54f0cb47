//! The current session and its derived claims.

use crate::claims::Claims;
use crate::transport::SessionPayload;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;
use std::time::Duration;

/// Profile of the authenticated user, as reported by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// User ID.
    pub id: String,
    /// User email, if known.
    #[serde(default)]
    pub email: Option<String>,
    /// Display name, if set.
    #[serde(default)]
    pub display_name: Option<String>,
    /// Avatar URL, if set.
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// An established session.
///
/// Replaced wholesale on every successful renewal; never patched in
/// place.
#[derive(Debug, Clone)]
pub struct Session {
    /// Short-lived bearer credential.
    pub access_token: String,
    /// Access token lifetime reported at issuance.
    pub expires_in: Duration,
    /// Wall-clock expiry computed at establishment.
    pub expires_at: DateTime<Utc>,
    /// Long-lived credential. `None` exactly when cookie credential
    /// transport is configured.
    pub refresh_token: Option<String>,
    /// The associated user.
    pub user: UserRecord,
}

impl Session {
    pub(crate) fn from_payload(payload: &SessionPayload, refresh_token: Option<String>) -> Self {
        let expires_in = Duration::from_secs(payload.expires_in_seconds);
        Self {
            access_token: payload.access_token.clone(),
            expires_in,
            expires_at: Utc::now() + chrono::Duration::seconds(payload.expires_in_seconds as i64),
            refresh_token,
            user: payload.user.clone(),
        }
    }
}

/// Holder of the current session and the claims derived from it.
///
/// The two are stored together so the "claims exist iff a session
/// exists" invariant cannot be violated by a partial update.
pub(crate) struct SessionCell {
    current: Mutex<Option<(Session, Claims)>>,
}

impl SessionCell {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(None),
        }
    }

    /// Replace the session and its claims.
    pub fn replace(&self, session: Session, claims: Claims) {
        let mut current = self.current.lock().expect("session lock poisoned");
        *current = Some((session, claims));
    }

    /// Drop the session and its claims.
    pub fn clear(&self) {
        let mut current = self.current.lock().expect("session lock poisoned");
        *current = None;
    }

    pub fn session(&self) -> Option<Session> {
        let current = self.current.lock().expect("session lock poisoned");
        current.as_ref().map(|(session, _)| session.clone())
    }

    pub fn access_token(&self) -> Option<String> {
        let current = self.current.lock().expect("session lock poisoned");
        current
            .as_ref()
            .map(|(session, _)| session.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        let current = self.current.lock().expect("session lock poisoned");
        current
            .as_ref()
            .and_then(|(session, _)| session.refresh_token.clone())
    }

    pub fn claim(&self, name: &str) -> Option<Value> {
        let current = self.current.lock().expect("session lock poisoned");
        current
            .as_ref()
            .and_then(|(_, claims)| claims.get(name).cloned())
    }
}
