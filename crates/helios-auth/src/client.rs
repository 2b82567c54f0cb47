//! The auth client: login/logout/renewal orchestration.

use crate::claims::decode_claims;
use crate::config::{AuthConfig, CredentialTransport};
use crate::http::HttpTransport;
use crate::machine::{LoginMachine, LoginMachineInput, LoginState};
use crate::scheduler::{refresh_interval, RefreshScheduler, RefreshTrigger};
use crate::session::{Session, SessionCell};
use crate::subscribers::{Registry, SubscriptionId};
use crate::transport::{
    AuthTransport, LoginResponse, MfaSecret, RegisterOptions, RegisterRequest, SessionPayload,
};
use crate::AuthResult;
use helios_storage::{ClientStorage, CredentialStore, MemoryStorage, StorageKeys};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of a password login.
#[derive(Debug, Clone)]
pub enum LoginOutcome {
    /// Session established.
    LoggedIn,
    /// A second factor is required; complete with
    /// [`AuthClient::login_totp`].
    MfaRequired { ticket: String },
}

/// Outcome of a registration.
#[derive(Debug, Clone)]
pub enum RegisterOutcome {
    /// The account activated immediately and a session was established.
    LoggedIn,
    /// The account needs activation (e.g. an emailed ticket) before it
    /// can log in.
    ActivationPending,
}

/// Client-side authentication session manager.
///
/// Owns the session credential lifecycle: establishes sessions from
/// login/register exchanges, keeps the access token fresh through a
/// background renewal schedule, persists the refresh token through the
/// configured storage backend, and notifies subscribers on auth-state
/// and token changes.
///
/// The client is cheap to clone; clones share one underlying state.
/// Separate instances share nothing.
#[derive(Clone)]
pub struct AuthClient {
    inner: Arc<AuthInner>,
}

struct AuthInner {
    transport: Arc<dyn AuthTransport>,
    credentials: CredentialStore,
    session: SessionCell,
    machine: Mutex<LoginMachine>,
    auth_subscribers: Registry<bool>,
    token_subscribers: Registry<()>,
    scheduler: RefreshScheduler,
    /// At most one renewal exchange in flight; extra triggers are
    /// dropped so a one-time-use refresh token is never sent twice.
    renewal_lock: tokio::sync::Mutex<()>,
    credential_transport: CredentialTransport,
    claims_namespace: String,
    fixed_refresh_interval: Option<Duration>,
    auto_login: bool,
    server_side: bool,
    /// Refresh token handed in out-of-band, consumed on startup.
    initial_refresh_token: Mutex<Option<String>>,
    /// Cross-instance logout observer.
    observer: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for AuthInner {
    fn drop(&mut self) {
        if let Some(observer) = self.observer.lock().expect("observer lock poisoned").take() {
            observer.abort();
        }
    }
}

impl AuthClient {
    /// Create a client using the HTTP transport against
    /// `config.base_url`.
    pub fn new(config: AuthConfig) -> AuthResult<Self> {
        let transport = Arc::new(HttpTransport::new(
            &config.base_url,
            config.credential_transport,
        )?);
        Ok(Self::with_transport(config, transport))
    }

    /// Create a client with an injected transport.
    pub fn with_transport(config: AuthConfig, transport: Arc<dyn AuthTransport>) -> Self {
        let storage: Arc<dyn ClientStorage> = config
            .storage
            .unwrap_or_else(|| Arc::new(MemoryStorage::new()));

        Self {
            inner: Arc::new(AuthInner {
                transport,
                credentials: CredentialStore::new(storage),
                session: SessionCell::new(),
                machine: Mutex::new(LoginMachine::new()),
                auth_subscribers: Registry::new(),
                token_subscribers: Registry::new(),
                scheduler: RefreshScheduler::new(),
                renewal_lock: tokio::sync::Mutex::new(()),
                credential_transport: config.credential_transport,
                claims_namespace: config.claims_namespace,
                fixed_refresh_interval: config.refresh_interval,
                auto_login: config.auto_login,
                server_side: config.server_side,
                initial_refresh_token: Mutex::new(config.initial_refresh_token),
                observer: Mutex::new(None),
            }),
        }
    }

    /// Resolve the initial login state.
    ///
    /// Consumes the out-of-band refresh token if one was configured,
    /// falls back to the persisted one, and attempts a first renewal.
    /// In a server-side context the attempt is skipped and the state
    /// stays unresolved until the client rehydrates. Also spawns the
    /// cross-instance logout observer when the storage backend supports
    /// change notification.
    pub async fn start(&self) {
        self.spawn_logout_observer();

        if self.inner.server_side {
            debug!("Server-side context, leaving login state unresolved");
            return;
        }
        if !self.inner.auto_login {
            debug!("Auto-login disabled");
            return;
        }

        let initial = self
            .inner
            .initial_refresh_token
            .lock()
            .expect("initial token lock poisoned")
            .take();
        self.try_refresh_with(initial, RefreshTrigger::Startup).await;
    }

    // ----------------------------------------------------------------
    // Reads
    // ----------------------------------------------------------------

    /// Current login state.
    pub fn login_state(&self) -> LoginState {
        let machine = self.inner.machine.lock().expect("machine lock poisoned");
        LoginState::from(machine.state())
    }

    /// `Some(true)` when a session is established, `Some(false)` when
    /// there is none, `None` before the first renewal attempt resolves.
    pub fn is_authenticated(&self) -> Option<bool> {
        self.login_state().as_bool()
    }

    /// Resolve once the login state is known.
    pub async fn wait_authenticated(&self) -> bool {
        let (tx, rx) = oneshot::channel();
        let tx = Mutex::new(Some(tx));
        let id = self.inner.auth_subscribers.subscribe(move |authenticated| {
            if let Some(tx) = tx.lock().expect("waiter lock poisoned").take() {
                let _ = tx.send(authenticated);
            }
        });

        // Subscribe-then-check so a resolution between the two cannot
        // be missed.
        if let Some(known) = self.is_authenticated() {
            self.inner.auth_subscribers.unsubscribe(id);
            return known;
        }

        let authenticated = rx.await.unwrap_or(false);
        self.inner.auth_subscribers.unsubscribe(id);
        authenticated
    }

    /// The current session, if any.
    pub fn session(&self) -> Option<Session> {
        self.inner.session.session()
    }

    /// The current access token, if any.
    pub fn access_token(&self) -> Option<String> {
        self.inner.session.access_token()
    }

    /// A claim of the current access token; `None` when unauthenticated
    /// or when the claim is absent.
    pub fn claim(&self, name: &str) -> Option<Value> {
        self.inner.session.claim(name)
    }

    /// The bearer credential for API calls: the current access token,
    /// or `None` in cookie mode (the cookie jar carries the credential).
    pub fn bearer_token(&self) -> Option<String> {
        match self.inner.credential_transport {
            CredentialTransport::Cookie => None,
            CredentialTransport::BearerToken => self.access_token(),
        }
    }

    // ----------------------------------------------------------------
    // Subscriptions
    // ----------------------------------------------------------------

    /// Subscribe to login-state changes. The callback receives the new
    /// authenticated flag; it fires on transitions only, never on a
    /// routine renewal.
    pub fn on_auth_state_changed(
        &self,
        callback: impl Fn(bool) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.inner.auth_subscribers.subscribe(callback)
    }

    pub fn unsubscribe_auth_state(&self, id: SubscriptionId) -> bool {
        self.inner.auth_subscribers.unsubscribe(id)
    }

    /// Subscribe to access-token changes; fires on every session
    /// establishment and renewal.
    pub fn on_token_changed(
        &self,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.inner.token_subscribers.subscribe(move |()| callback())
    }

    pub fn unsubscribe_token(&self, id: SubscriptionId) -> bool {
        self.inner.token_subscribers.unsubscribe(id)
    }

    // ----------------------------------------------------------------
    // Session lifecycle operations
    // ----------------------------------------------------------------

    /// Register an account.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        user_data: Option<Value>,
        options: Option<RegisterOptions>,
    ) -> AuthResult<RegisterOutcome> {
        let request = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            user_data,
            register_options: options,
        };

        match self.inner.transport.register(&request).await? {
            Some(payload) => {
                self.establish_session(payload).await?;
                info!("Registration complete, session established");
                Ok(RegisterOutcome::LoggedIn)
            }
            None => {
                info!("Registration complete, activation pending");
                Ok(RegisterOutcome::ActivationPending)
            }
        }
    }

    /// Log in with email and password.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<LoginOutcome> {
        match self.inner.transport.login(email, password).await {
            Ok(LoginResponse::Session(payload)) => {
                self.establish_session(payload).await?;
                info!("Login successful");
                Ok(LoginOutcome::LoggedIn)
            }
            Ok(LoginResponse::MfaRequired { ticket }) => {
                debug!("Login requires a second factor");
                Ok(LoginOutcome::MfaRequired { ticket })
            }
            Err(e) => {
                // A rejected login must not leave a stale persisted
                // credential behind.
                self.inner.credentials.clear_refresh_token().await;
                Err(e)
            }
        }
    }

    /// Complete an MFA login with a TOTP code and the challenge ticket.
    pub async fn login_totp(&self, code: &str, ticket: &str) -> AuthResult<()> {
        let payload = self.inner.transport.login_totp(code, ticket).await?;
        self.establish_session(payload).await?;
        info!("MFA login successful");
        Ok(())
    }

    /// Log out.
    ///
    /// Always succeeds locally: the transport call is best-effort, the
    /// in-memory session and persisted credential are cleared
    /// regardless, and the logout signal is written for sibling
    /// instances. Logging out twice is a no-op the second time.
    pub async fn logout(&self, all: bool) {
        let refresh_token = match self.inner.credential_transport {
            CredentialTransport::Cookie => None,
            CredentialTransport::BearerToken => match self.inner.session.refresh_token() {
                Some(token) => Some(token),
                None => self.inner.credentials.refresh_token().await,
            },
        };

        if let Err(e) = self
            .inner
            .transport
            .logout(refresh_token.as_deref(), all)
            .await
        {
            debug!(error = %e, "Ignoring logout transport failure");
        }

        self.sign_out_locally(&LoginMachineInput::SignedOut, true)
            .await;
        info!("Logged out");
    }

    /// Request an out-of-band renewal. Dropped when a renewal is
    /// already in flight; the next scheduled tick corrects a dropped
    /// one.
    pub async fn refresh_session(&self) {
        self.try_refresh_with(None, RefreshTrigger::Manual).await;
    }

    // ----------------------------------------------------------------
    // Pass-through endpoints
    // ----------------------------------------------------------------

    /// Activate a registered account.
    pub async fn activate(&self, ticket: &str) -> AuthResult<()> {
        self.inner.transport.activate(ticket).await
    }

    pub async fn change_email(&self, new_email: &str) -> AuthResult<()> {
        self.inner
            .transport
            .change_email(new_email, self.bearer_token().as_deref())
            .await
    }

    pub async fn change_email_request(&self, new_email: &str) -> AuthResult<()> {
        self.inner
            .transport
            .change_email_request(new_email, self.bearer_token().as_deref())
            .await
    }

    pub async fn change_email_confirm(&self, ticket: &str) -> AuthResult<()> {
        self.inner.transport.change_email_confirm(ticket).await
    }

    pub async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
    ) -> AuthResult<()> {
        self.inner
            .transport
            .change_password(old_password, new_password, self.bearer_token().as_deref())
            .await
    }

    pub async fn change_password_request(&self, email: &str) -> AuthResult<()> {
        self.inner.transport.change_password_request(email).await
    }

    pub async fn change_password_confirm(
        &self,
        new_password: &str,
        ticket: &str,
    ) -> AuthResult<()> {
        self.inner
            .transport
            .change_password_confirm(new_password, ticket)
            .await
    }

    pub async fn mfa_generate(&self) -> AuthResult<MfaSecret> {
        self.inner
            .transport
            .mfa_generate(self.bearer_token().as_deref())
            .await
    }

    pub async fn mfa_enable(&self, code: &str) -> AuthResult<()> {
        self.inner
            .transport
            .mfa_enable(code, self.bearer_token().as_deref())
            .await
    }

    pub async fn mfa_disable(&self, code: &str) -> AuthResult<()> {
        self.inner
            .transport
            .mfa_disable(code, self.bearer_token().as_deref())
            .await
    }

    // ----------------------------------------------------------------
    // Internals
    // ----------------------------------------------------------------

    /// Apply a machine input. Notifies auth-state subscribers when (and
    /// only when) the state actually changed. Undefined transitions at
    /// idempotent edges (e.g. a second sign-out) are no-ops.
    fn transition(&self, input: &LoginMachineInput) -> bool {
        let (old_state, new_state) = {
            let mut machine = self.inner.machine.lock().expect("machine lock poisoned");
            let old_state = LoginState::from(machine.state());
            if machine.consume(input).is_err() {
                return false;
            }
            (old_state, LoginState::from(machine.state()))
        };

        if old_state == new_state {
            return false;
        }

        debug!(?old_state, ?new_state, "Login state transition");
        self.inner
            .auth_subscribers
            .notify(new_state.is_authenticated());
        true
    }

    /// Install a session from a server payload: derive claims, persist
    /// the rotated refresh token, reschedule renewal, and notify.
    async fn establish_session(&self, payload: SessionPayload) -> AuthResult<()> {
        let claims = decode_claims(&payload.access_token, &self.inner.claims_namespace)?;
        let refresh_token = match self.inner.credential_transport {
            CredentialTransport::Cookie => None,
            CredentialTransport::BearerToken => payload.refresh_token.clone(),
        };

        let session = Session::from_payload(&payload, refresh_token.clone());
        let expires_in = session.expires_in;
        self.inner.session.replace(session, claims);

        if let Some(token) = refresh_token.as_deref() {
            self.inner.credentials.set_refresh_token(token).await;
        }

        self.inner.scheduler.set_interval(refresh_interval(
            expires_in,
            self.inner.fixed_refresh_interval,
        ));
        if self.transition(&LoginMachineInput::SessionEstablished) {
            self.start_scheduler();
        }
        self.inner.token_subscribers.notify(());
        Ok(())
    }

    /// Tear down local session state. The machine input distinguishes
    /// an explicit sign-out from a rejected credential; the logout
    /// signal is only written for explicit sign-outs so observers do
    /// not re-broadcast each other.
    ///
    /// The scheduler stops last: when this runs inside the renewal task
    /// itself, aborting the task takes effect at its next await, and
    /// everything up to that point must already be cleaned up.
    async fn sign_out_locally(&self, input: &LoginMachineInput, write_signal: bool) {
        self.inner.session.clear();
        self.inner.credentials.clear_refresh_token().await;
        if write_signal {
            self.inner.credentials.signal_logout().await;
        }
        self.transition(input);
        self.inner.scheduler.stop();
    }

    fn start_scheduler(&self) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.scheduler.start(move |trigger| {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(inner) => {
                        AuthClient { inner }.try_refresh_with(None, trigger).await;
                        true
                    }
                    None => false,
                }
            }
        });
    }

    /// Renewal entry point shared by every trigger. Drops the attempt
    /// when one is already in flight.
    async fn try_refresh_with(&self, initial_token: Option<String>, trigger: RefreshTrigger) {
        let Ok(_guard) = self.inner.renewal_lock.try_lock() else {
            debug!(?trigger, "Renewal already in flight, dropping trigger");
            return;
        };

        if self.login_state() == LoginState::Unauthenticated {
            debug!(?trigger, "Not authenticated, skipping renewal");
            return;
        }

        let refresh_token = match self.inner.credential_transport {
            CredentialTransport::Cookie => None,
            CredentialTransport::BearerToken => {
                let token = match self.inner.session.refresh_token() {
                    Some(token) => Some(token),
                    None => match initial_token {
                        Some(token) => Some(token),
                        None => self.inner.credentials.refresh_token().await,
                    },
                };
                match token {
                    Some(token) => Some(token),
                    None => {
                        debug!("No refresh credential available");
                        self.transition(&LoginMachineInput::NoCredential);
                        return;
                    }
                }
            }
        };

        match self.inner.transport.refresh(refresh_token.as_deref()).await {
            Ok(payload) => {
                if let Err(e) = self.establish_session(payload).await {
                    warn!(error = %e, "Renewal produced an unusable session");
                }
            }
            Err(e) if e.is_credential_rejected() => {
                info!("Refresh credential rejected, signing out locally");
                self.sign_out_locally(&LoginMachineInput::CredentialRejected, false)
                    .await;
            }
            Err(e) if e.is_transient() => {
                debug!(error = %e, ?trigger, "Transient renewal failure, retrying on next tick");
            }
            Err(e) => {
                // Unexpected but not a credential rejection; keep the
                // session and let the next tick retry.
                warn!(error = %e, ?trigger, "Renewal failed");
            }
        }
    }

    /// Observe the shared storage backend for a logout signal written
    /// by a sibling instance.
    fn spawn_logout_observer(&self) {
        let Some(mut events) = self.inner.credentials.watch() else {
            debug!("Storage backend has no change feed, cross-instance sync disabled");
            return;
        };

        let weak = Arc::downgrade(&self.inner);
        let observer = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event)
                        if event.key == StorageKeys::LOGOUT_SIGNAL && event.value.is_some() =>
                    {
                        let Some(inner) = weak.upgrade() else { break };
                        let client = AuthClient { inner };
                        if client.login_state() != LoginState::Authenticated {
                            continue;
                        }
                        info!("Observed logout signal from another instance");
                        // Best-effort server-side logout for this
                        // instance, then clear local state without
                        // re-writing the signal.
                        let token = client.inner.session.refresh_token();
                        if let Err(e) =
                            client.inner.transport.logout(token.as_deref(), false).await
                        {
                            debug!(error = %e, "Ignoring logout transport failure");
                        }
                        client
                            .sign_out_locally(&LoginMachineInput::SignedOut, false)
                            .await;
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Storage change feed lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        let mut slot = self
            .inner
            .observer
            .lock()
            .expect("observer lock poisoned");
        if let Some(previous) = slot.replace(observer) {
            previous.abort();
        }
    }
}
