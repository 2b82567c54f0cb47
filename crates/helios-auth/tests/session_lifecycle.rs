//! End-to-end session lifecycle tests against a mock transport, memory
//! storage, and paused timers.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use helios_auth::{
    AuthClient, AuthConfig, AuthError, AuthResult, AuthTransport, CredentialTransport,
    LoginOutcome, LoginResponse, MfaSecret, RegisterOutcome, RegisterRequest, SessionPayload,
    UserRecord, DEFAULT_CLAIMS_NAMESPACE,
};
use helios_storage::{ClientStorage, MemoryStorage, StorageKeys};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Token lifetime the mock reports; renewal interval is 855 s.
const EXPIRES_IN: u64 = 900;
const RENEWAL_INTERVAL: u64 = 855;

fn jwt_for(user_id: &str, serial: usize) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(
        serde_json::to_vec(&json!({
            DEFAULT_CLAIMS_NAMESPACE: {
                "x-helios-user-id": user_id,
                "x-helios-token-serial": serial,
            },
        }))
        .unwrap(),
    );
    format!("{header}.{payload}.signature")
}

#[derive(Clone, Copy, PartialEq)]
enum Behavior {
    Succeed,
    Rejected,
    Transient,
}

struct MockTransport {
    issued: AtomicUsize,
    refresh_behavior: Mutex<Behavior>,
    login_behavior: Mutex<Behavior>,
    mfa_ticket: Mutex<Option<String>>,
    register_activates: Mutex<bool>,
    refresh_delay: Mutex<Duration>,
    refresh_calls: AtomicUsize,
    logout_calls: AtomicUsize,
    refresh_tokens_seen: Mutex<Vec<Option<String>>>,
}

impl MockTransport {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            issued: AtomicUsize::new(0),
            refresh_behavior: Mutex::new(Behavior::Succeed),
            login_behavior: Mutex::new(Behavior::Succeed),
            mfa_ticket: Mutex::new(None),
            register_activates: Mutex::new(false),
            refresh_delay: Mutex::new(Duration::ZERO),
            refresh_calls: AtomicUsize::new(0),
            logout_calls: AtomicUsize::new(0),
            refresh_tokens_seen: Mutex::new(Vec::new()),
        })
    }

    fn issue_payload(&self) -> SessionPayload {
        let serial = self.issued.fetch_add(1, Ordering::SeqCst);
        SessionPayload {
            access_token: jwt_for("user-1", serial),
            expires_in_seconds: EXPIRES_IN,
            refresh_token: Some(format!("refresh-{serial}")),
            user: UserRecord {
                id: "user-1".to_string(),
                email: Some("user-1@example.com".to_string()),
                display_name: None,
                avatar_url: None,
            },
        }
    }

    fn set_refresh_behavior(&self, behavior: Behavior) {
        *self.refresh_behavior.lock().unwrap() = behavior;
    }

    fn set_refresh_delay(&self, delay: Duration) {
        *self.refresh_delay.lock().unwrap() = delay;
    }

    fn refresh_calls(&self) -> usize {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    fn rejected() -> AuthError {
        AuthError::Api {
            status: 401,
            message: "invalid refresh token".to_string(),
        }
    }

    fn unavailable() -> AuthError {
        AuthError::Api {
            status: 503,
            message: "service unavailable".to_string(),
        }
    }
}

#[async_trait]
impl AuthTransport for MockTransport {
    async fn register(&self, _request: &RegisterRequest) -> AuthResult<Option<SessionPayload>> {
        if *self.register_activates.lock().unwrap() {
            Ok(Some(self.issue_payload()))
        } else {
            Ok(None)
        }
    }

    async fn login(&self, _email: &str, _password: &str) -> AuthResult<LoginResponse> {
        if let Some(ticket) = self.mfa_ticket.lock().unwrap().clone() {
            return Ok(LoginResponse::MfaRequired { ticket });
        }
        match *self.login_behavior.lock().unwrap() {
            Behavior::Succeed => Ok(LoginResponse::Session(self.issue_payload())),
            Behavior::Rejected => Err(Self::rejected()),
            Behavior::Transient => Err(Self::unavailable()),
        }
    }

    async fn login_totp(&self, _code: &str, _ticket: &str) -> AuthResult<SessionPayload> {
        Ok(self.issue_payload())
    }

    async fn refresh(&self, refresh_token: Option<&str>) -> AuthResult<SessionPayload> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        self.refresh_tokens_seen
            .lock()
            .unwrap()
            .push(refresh_token.map(String::from));

        let delay = *self.refresh_delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match *self.refresh_behavior.lock().unwrap() {
            Behavior::Succeed => Ok(self.issue_payload()),
            Behavior::Rejected => Err(Self::rejected()),
            Behavior::Transient => Err(Self::unavailable()),
        }
    }

    async fn logout(&self, _refresh_token: Option<&str>, _all: bool) -> AuthResult<()> {
        self.logout_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn activate(&self, _ticket: &str) -> AuthResult<()> {
        Ok(())
    }

    async fn change_email(&self, _new_email: &str, _bearer: Option<&str>) -> AuthResult<()> {
        Ok(())
    }

    async fn change_email_request(
        &self,
        _new_email: &str,
        _bearer: Option<&str>,
    ) -> AuthResult<()> {
        Ok(())
    }

    async fn change_email_confirm(&self, _ticket: &str) -> AuthResult<()> {
        Ok(())
    }

    async fn change_password(
        &self,
        _old_password: &str,
        _new_password: &str,
        _bearer: Option<&str>,
    ) -> AuthResult<()> {
        Ok(())
    }

    async fn change_password_request(&self, _email: &str) -> AuthResult<()> {
        Ok(())
    }

    async fn change_password_confirm(&self, _new_password: &str, _ticket: &str) -> AuthResult<()> {
        Ok(())
    }

    async fn mfa_generate(&self, _bearer: Option<&str>) -> AuthResult<MfaSecret> {
        Err(AuthError::Api {
            status: 501,
            message: "not wired in this mock".to_string(),
        })
    }

    async fn mfa_enable(&self, _code: &str, _bearer: Option<&str>) -> AuthResult<()> {
        Ok(())
    }

    async fn mfa_disable(&self, _code: &str, _bearer: Option<&str>) -> AuthResult<()> {
        Ok(())
    }
}

fn base_config() -> AuthConfig {
    AuthConfig::parse("https://backend.example.com").unwrap()
}

fn client_with(mock: &Arc<MockTransport>, config: AuthConfig) -> AuthClient {
    let transport: Arc<dyn AuthTransport> = mock.clone();
    AuthClient::with_transport(config, transport)
}

/// Record every auth-state notification delivered to a subscriber.
fn record_auth_states(client: &AuthClient) -> Arc<Mutex<Vec<bool>>> {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    client.on_auth_state_changed(move |authenticated| {
        sink.lock().unwrap().push(authenticated);
    });
    log
}

fn count_token_changes(client: &AuthClient) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = count.clone();
    client.on_token_changed(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    count
}

#[tokio::test(start_paused = true)]
async fn login_establishes_session_and_claims() {
    let mock = MockTransport::new();
    let client = client_with(&mock, base_config());
    let states = record_auth_states(&client);

    assert!(matches!(
        client.login("user-1@example.com", "password-1").await,
        Ok(LoginOutcome::LoggedIn)
    ));

    assert_eq!(client.is_authenticated(), Some(true));
    assert!(client.access_token().is_some());
    assert_eq!(client.claim("x-helios-user-id"), Some(json!("user-1")));
    assert_eq!(client.claim("x-helios-missing"), None);
    assert_eq!(client.session().unwrap().user.id, "user-1");
    assert_eq!(*states.lock().unwrap(), vec![true]);

    client.logout(false).await;

    assert_eq!(client.is_authenticated(), Some(false));
    assert_eq!(client.access_token(), None);
    assert_eq!(client.claim("x-helios-user-id"), None);
    assert_eq!(*states.lock().unwrap(), vec![true, false]);
}

#[tokio::test(start_paused = true)]
async fn renewals_keep_session_fresh_and_logout_notifies_once() {
    let mock = MockTransport::new();
    let client = client_with(&mock, base_config());
    let states = record_auth_states(&client);
    let token_changes = count_token_changes(&client);

    client.login("user-1@example.com", "password-1").await.unwrap();
    let first_token = client.access_token().unwrap();

    // Three renewal ticks.
    tokio::time::sleep(Duration::from_secs(RENEWAL_INTERVAL * 3 + 10)).await;

    assert_eq!(mock.refresh_calls(), 3);
    assert_eq!(client.is_authenticated(), Some(true));
    assert_ne!(client.access_token().unwrap(), first_token);
    // Login plus three renewals.
    assert_eq!(token_changes.load(Ordering::SeqCst), 4);
    // Authenticated throughout: no auth-state notification after login.
    assert_eq!(*states.lock().unwrap(), vec![true]);

    client.logout(false).await;
    assert_eq!(*states.lock().unwrap(), vec![true, false]);

    // Renewed tokens rotate the refresh credential they present.
    let seen = mock.refresh_tokens_seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            Some("refresh-0".to_string()),
            Some("refresh-1".to_string()),
            Some("refresh-2".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn concurrent_renewal_triggers_are_dropped() {
    let mock = MockTransport::new();
    let client = client_with(&mock, base_config());

    client.login("user-1@example.com", "password-1").await.unwrap();
    mock.set_refresh_delay(Duration::from_secs(10));

    // Land just after the first scheduled tick, while its exchange is
    // still in flight.
    tokio::time::sleep(Duration::from_secs(RENEWAL_INTERVAL + 1)).await;
    assert_eq!(mock.refresh_calls(), 1);

    client.refresh_session().await;
    assert_eq!(mock.refresh_calls(), 1, "manual trigger must be dropped");

    // Let the in-flight exchange finish; still a single call.
    tokio::time::sleep(Duration::from_secs(20)).await;
    assert_eq!(mock.refresh_calls(), 1);
    assert_eq!(client.is_authenticated(), Some(true));

    // With nothing in flight a manual renewal goes through.
    mock.set_refresh_delay(Duration::ZERO);
    client.refresh_session().await;
    assert_eq!(mock.refresh_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn rejected_refresh_credential_signs_out() {
    let mock = MockTransport::new();
    let storage = Arc::new(MemoryStorage::new());
    let config = base_config().with_storage(storage.clone() as Arc<dyn ClientStorage>);
    let client = client_with(&mock, config);
    let states = record_auth_states(&client);

    client.login("user-1@example.com", "password-1").await.unwrap();
    assert!(storage
        .get(StorageKeys::REFRESH_TOKEN)
        .await
        .unwrap()
        .is_some());

    mock.set_refresh_behavior(Behavior::Rejected);
    tokio::time::sleep(Duration::from_secs(RENEWAL_INTERVAL + 5)).await;

    assert_eq!(client.is_authenticated(), Some(false));
    assert_eq!(client.access_token(), None);
    assert_eq!(*states.lock().unwrap(), vec![true, false]);
    assert_eq!(
        storage.get(StorageKeys::REFRESH_TOKEN).await.unwrap(),
        None
    );

    // Timers are gone: no further exchanges even if the server
    // recovers.
    mock.set_refresh_behavior(Behavior::Succeed);
    tokio::time::sleep(Duration::from_secs(RENEWAL_INTERVAL * 4)).await;
    assert_eq!(mock.refresh_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_refresh_failure_keeps_session() {
    let mock = MockTransport::new();
    let client = client_with(&mock, base_config());
    let states = record_auth_states(&client);

    client.login("user-1@example.com", "password-1").await.unwrap();
    let token = client.access_token().unwrap();

    mock.set_refresh_behavior(Behavior::Transient);
    tokio::time::sleep(Duration::from_secs(RENEWAL_INTERVAL + 5)).await;

    // Swallowed: session intact, no notification.
    assert_eq!(mock.refresh_calls(), 1);
    assert_eq!(client.is_authenticated(), Some(true));
    assert_eq!(client.access_token().unwrap(), token);
    assert_eq!(*states.lock().unwrap(), vec![true]);

    // The next tick retries and succeeds.
    mock.set_refresh_behavior(Behavior::Succeed);
    tokio::time::sleep(Duration::from_secs(RENEWAL_INTERVAL)).await;
    assert_eq!(mock.refresh_calls(), 2);
    assert_ne!(client.access_token().unwrap(), token);
}

#[tokio::test(start_paused = true)]
async fn double_logout_notifies_once() {
    let mock = MockTransport::new();
    let client = client_with(&mock, base_config());
    let states = record_auth_states(&client);

    client.login("user-1@example.com", "password-1").await.unwrap();
    client.logout(false).await;
    client.logout(false).await;

    assert_eq!(*states.lock().unwrap(), vec![true, false]);
    assert_eq!(client.is_authenticated(), Some(false));
}

#[tokio::test(start_paused = true)]
async fn startup_restores_persisted_session() {
    let mock = MockTransport::new();
    let storage = Arc::new(MemoryStorage::new());
    storage
        .set(StorageKeys::REFRESH_TOKEN, "persisted-token")
        .await
        .unwrap();

    let config = base_config().with_storage(storage.clone() as Arc<dyn ClientStorage>);
    let client = client_with(&mock, config);

    client.start().await;

    assert_eq!(client.is_authenticated(), Some(true));
    assert_eq!(client.claim("x-helios-user-id"), Some(json!("user-1")));
    assert_eq!(
        *mock.refresh_tokens_seen.lock().unwrap(),
        vec![Some("persisted-token".to_string())]
    );
    // The rotated credential replaced the persisted one.
    assert_eq!(
        storage.get(StorageKeys::REFRESH_TOKEN).await.unwrap(),
        Some("refresh-0".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn startup_without_credential_resolves_unauthenticated() {
    let mock = MockTransport::new();
    let client = client_with(&mock, base_config());
    let states = record_auth_states(&client);

    client.start().await;

    assert_eq!(client.is_authenticated(), Some(false));
    assert_eq!(mock.refresh_calls(), 0);
    assert_eq!(*states.lock().unwrap(), vec![false]);
}

#[tokio::test(start_paused = true)]
async fn server_side_startup_stays_unresolved() {
    let mock = MockTransport::new();
    let client = client_with(&mock, base_config().with_server_side(true));

    client.start().await;

    assert_eq!(client.is_authenticated(), None);
    assert_eq!(mock.refresh_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn redirect_token_is_consumed_once() {
    let mock = MockTransport::new();
    let config = base_config().with_initial_refresh_token("redirect-token");
    let client = client_with(&mock, config);

    client.start().await;
    assert_eq!(client.is_authenticated(), Some(true));

    // The next renewal presents the rotated credential, not the
    // redirect one again.
    tokio::time::sleep(Duration::from_secs(RENEWAL_INTERVAL + 5)).await;
    let seen = mock.refresh_tokens_seen.lock().unwrap();
    assert_eq!(
        *seen,
        vec![
            Some("redirect-token".to_string()),
            Some("refresh-0".to_string()),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn failed_login_clears_persisted_credential() {
    let mock = MockTransport::new();
    let storage = Arc::new(MemoryStorage::new());
    storage
        .set(StorageKeys::REFRESH_TOKEN, "stale-token")
        .await
        .unwrap();

    let config = base_config().with_storage(storage.clone() as Arc<dyn ClientStorage>);
    let client = client_with(&mock, config);

    *mock.login_behavior.lock().unwrap() = Behavior::Rejected;
    let result = client.login("user-1@example.com", "wrong-password").await;

    assert!(matches!(result, Err(AuthError::Api { status: 401, .. })));
    assert_eq!(
        storage.get(StorageKeys::REFRESH_TOKEN).await.unwrap(),
        None
    );
}

#[tokio::test(start_paused = true)]
async fn mfa_challenge_passes_through_without_a_session() {
    let mock = MockTransport::new();
    let client = client_with(&mock, base_config());

    *mock.mfa_ticket.lock().unwrap() = Some("mfa-ticket-1".to_string());
    let outcome = client.login("user-1@example.com", "password-1").await.unwrap();

    match outcome {
        LoginOutcome::MfaRequired { ticket } => assert_eq!(ticket, "mfa-ticket-1"),
        other => panic!("expected MFA challenge, got {other:?}"),
    }
    assert_eq!(client.is_authenticated(), None);
    assert!(client.access_token().is_none());

    client.login_totp("123456", "mfa-ticket-1").await.unwrap();
    assert_eq!(client.is_authenticated(), Some(true));
}

#[tokio::test(start_paused = true)]
async fn register_outcomes() {
    let mock = MockTransport::new();
    let client = client_with(&mock, base_config());

    let outcome = client
        .register("user-2@example.com", "password-2", None, None)
        .await
        .unwrap();
    assert!(matches!(outcome, RegisterOutcome::ActivationPending));
    assert_eq!(client.is_authenticated(), None);

    *mock.register_activates.lock().unwrap() = true;
    let outcome = client
        .register("user-3@example.com", "password-3", None, None)
        .await
        .unwrap();
    assert!(matches!(outcome, RegisterOutcome::LoggedIn));
    assert_eq!(client.is_authenticated(), Some(true));
}

#[tokio::test(start_paused = true)]
async fn logout_signal_clears_sibling_instances() {
    let storage = Arc::new(MemoryStorage::new());

    let mock_a = MockTransport::new();
    let client_a = client_with(
        &mock_a,
        base_config().with_storage(storage.clone() as Arc<dyn ClientStorage>),
    );
    let mock_b = MockTransport::new();
    let client_b = client_with(
        &mock_b,
        base_config().with_storage(storage.clone() as Arc<dyn ClientStorage>),
    );

    client_a.start().await;
    client_b.start().await;
    client_a.login("user-1@example.com", "password-1").await.unwrap();
    client_b.login("user-1@example.com", "password-1").await.unwrap();
    let states_b = record_auth_states(&client_b);

    client_a.logout(false).await;

    // The signal is delivered asynchronously.
    for _ in 0..100 {
        if client_b.is_authenticated() == Some(false) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(client_b.is_authenticated(), Some(false));
    assert_eq!(client_b.access_token(), None);
    assert_eq!(*states_b.lock().unwrap(), vec![false]);
    // The sibling independently requested a server-side logout.
    assert_eq!(mock_b.logout_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn wait_authenticated_resolves_once_state_is_known() {
    let mock = MockTransport::new();
    let client = client_with(&mock, base_config());

    let waiter = {
        let client = client.clone();
        tokio::spawn(async move { client.wait_authenticated().await })
    };

    // Let the waiter subscribe before resolving the state.
    tokio::task::yield_now().await;
    client.start().await;

    assert!(!waiter.await.unwrap());
    // Once resolved, the answer is immediate.
    assert!(!client.wait_authenticated().await);
}

#[tokio::test(start_paused = true)]
async fn cookie_mode_never_holds_a_refresh_token() {
    let mock = MockTransport::new();
    let storage = Arc::new(MemoryStorage::new());
    let config = base_config()
        .with_credential_transport(CredentialTransport::Cookie)
        .with_storage(storage.clone() as Arc<dyn ClientStorage>);
    let client = client_with(&mock, config);

    client.login("user-1@example.com", "password-1").await.unwrap();

    assert_eq!(client.is_authenticated(), Some(true));
    assert!(client.session().unwrap().refresh_token.is_none());
    assert!(client.bearer_token().is_none());
    assert!(client.access_token().is_some());
    assert_eq!(
        storage.get(StorageKeys::REFRESH_TOKEN).await.unwrap(),
        None
    );

    // Renewal goes through the cookie jar: no token parameter.
    tokio::time::sleep(Duration::from_secs(RENEWAL_INTERVAL + 5)).await;
    assert_eq!(*mock.refresh_tokens_seen.lock().unwrap(), vec![None]);
}

#[tokio::test(start_paused = true)]
async fn fixed_renewal_interval_overrides_computed() {
    let mock = MockTransport::new();
    let config = base_config().with_refresh_interval(Duration::from_secs(60));
    let client = client_with(&mock, config);

    client.login("user-1@example.com", "password-1").await.unwrap();

    tokio::time::sleep(Duration::from_secs(125)).await;
    assert_eq!(mock.refresh_calls(), 2);
}
