//! Client configuration.

use crate::AuthResult;
use helios_storage::ClientStorage;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Default JWT namespace the server nests custom claims under.
pub const DEFAULT_CLAIMS_NAMESPACE: &str = "https://helios.dev/jwt/claims";

/// How the refresh credential travels between client and server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialTransport {
    /// The client holds the refresh token and sends it explicitly; API
    /// calls carry a bearer header derived from the access token.
    #[default]
    BearerToken,
    /// An HTTP-only cookie carries the refresh credential; the client
    /// never sees a refresh token and sends no bearer header.
    Cookie,
}

/// Configuration for [`AuthClient`](crate::AuthClient).
#[derive(Clone)]
pub struct AuthConfig {
    /// Base address of the backend (the `/auth` prefix is appended).
    pub base_url: Url,
    /// Credential transport mode.
    pub credential_transport: CredentialTransport,
    /// Fixed renewal interval. When unset the interval is computed from
    /// the access token lifetime reported at issuance.
    pub refresh_interval: Option<Duration>,
    /// Storage backend for the persisted refresh token. Defaults to
    /// in-memory storage.
    pub storage: Option<Arc<dyn ClientStorage>>,
    /// Attempt to restore a session on startup.
    pub auto_login: bool,
    /// Server-side rendering context: no ambient storage, the first
    /// renewal attempt is skipped and login state stays unresolved.
    pub server_side: bool,
    /// JWT namespace to read claims from.
    pub claims_namespace: String,
    /// Refresh token delivered out-of-band, e.g. extracted from an
    /// OAuth provider's redirect URL. Consumed once on startup.
    pub initial_refresh_token: Option<String>,
}

impl AuthConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            credential_transport: CredentialTransport::default(),
            refresh_interval: None,
            storage: None,
            auto_login: true,
            server_side: false,
            claims_namespace: DEFAULT_CLAIMS_NAMESPACE.to_string(),
            initial_refresh_token: None,
        }
    }

    /// Parse the base address from a string.
    pub fn parse(base_url: &str) -> AuthResult<Self> {
        Ok(Self::new(Url::parse(base_url)?))
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

    pub fn with_claims_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.claims_namespace = namespace.into();
        self
    }

    pub fn with_initial_refresh_token(mut self, token: impl Into<String>) -> Self {
        self.initial_refresh_token = Some(token.into());
        self
    }
}
