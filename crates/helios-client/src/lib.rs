//! The Helios SDK facade.
//!
//! [`HeliosClient`] wires configuration, storage, the auth session
//! manager, and the file-storage client together:
//!
//! ```no_run
//! # async fn example() -> Result<(), helios_auth::AuthError> {
//! use helios_client::{ClientConfig, HeliosClient};
//!
//! let client = HeliosClient::connect(ClientConfig::new("https://backend.example.com")).await?;
//! client.auth.login("user@example.com", "password").await?;
//! # Ok(())
//! # }
//! ```

mod files;

pub use files::FilesClient;
pub use helios_auth::{
    AuthClient, AuthError, AuthResult, CredentialTransport, LoginOutcome, RegisterOutcome,
};

use helios_auth::AuthConfig;
use helios_storage::{ClientStorage, FileStorage, MemoryStorage};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// SDK configuration.
#[derive(Clone)]
pub struct ClientConfig {
    /// Base address of the backend. Required.
    pub base_url: String,
    /// Credential transport mode.
    pub credential_transport: CredentialTransport,
    /// Fixed renewal interval override.
    pub refresh_interval: Option<Duration>,
    /// Storage backend. Defaults to a file-backed document in the
    /// local data directory, or in-memory storage server-side.
    pub storage: Option<Arc<dyn ClientStorage>>,
    /// Restore a persisted session on connect.
    pub auto_login: bool,
    /// Server-side rendering context.
    pub server_side: bool,
    /// Refresh token delivered via a redirect callback, consumed once.
    pub initial_refresh_token: Option<String>,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            credential_transport: CredentialTransport::default(),
            refresh_interval: None,
            storage: None,
            auto_login: true,
            server_side: false,
            initial_refresh_token: None,
        }
    }

    pub fn with_credential_transport(mut self, transport: CredentialTransport) -> Self {
        self.credential_transport = transport;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = Some(interval);
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn ClientStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_auto_login(mut self, auto_login: bool) -> Self {
        self.auto_login = auto_login;
        self
    }

    pub fn with_server_side(mut self, server_side: bool) -> Self {
        self.server_side = server_side;
        self
    }

    pub fn with_initial_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.initial_refresh_token = Some(token.into());
        self
    }
}

/// The SDK entry point: an auth session manager plus a file-storage
/// client sharing its credential.
///
/// Explicitly constructed; instances share no state with each other.
pub struct HeliosClient {
    pub auth: AuthClient,
    pub files: FilesClient,
}

impl HeliosClient {
    /// Construct the client and, unless `auto_login` is disabled,
    /// restore a persisted session.
    pub async fn connect(config: ClientConfig) -> AuthResult<Self> {
        let base_url = Url::parse(&config.base_url)?;
        let storage = config
            .storage
            .unwrap_or_else(|| default_storage(config.server_side));

        let mut auth_config = AuthConfig::new(base_url.clone())
            .with_credential_transport(config.credential_transport)
            .with_storage(storage)
            .with_auto_login(config.auto_login)
            .with_server_side(config.server_side);
        auth_config.refresh_interval = config.refresh_interval;
        auth_config.initial_refresh_token = config.initial_refresh_token;

        let auth = AuthClient::new(auth_config)?;
        auth.start().await;

        let files = FilesClient::new(&base_url, config.credential_transport, auth.clone())?;

        Ok(Self { auth, files })
    }
}

fn default_storage(server_side: bool) -> Arc<dyn ClientStorage> {
    if server_side {
        return Arc::new(MemoryStorage::new());
    }
    match dirs::data_local_dir() {
        Some(dir) => Arc::new(FileStorage::new(dir.join("helios").join("storage.json"))),
        None => {
            warn!("No local data directory, falling back to in-memory storage");
            Arc::new(MemoryStorage::new())
        }
    }
}
