//! Transport boundary consumed by the auth client.

use crate::session::UserRecord;
use crate::AuthResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A full session payload as reported by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionPayload {
    /// Access token (JWT).
    #[serde(rename = "jwt_token")]
    pub access_token: String,
    /// Access token lifetime in seconds.
    #[serde(rename = "jwt_expires_in")]
    pub expires_in_seconds: u64,
    /// Rotated refresh token. Absent when the server relies on an
    /// HTTP-only cookie instead.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// The authenticated user.
    pub user: UserRecord,
}

/// Outcome of a login exchange.
#[derive(Debug, Clone)]
pub enum LoginResponse {
    /// Credentials accepted, session issued.
    Session(SessionPayload),
    /// Credentials accepted but a second factor is required; the ticket
    /// is passed to the TOTP completion call.
    MfaRequired { ticket: String },
}

/// Registration options forwarded to the server.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegisterOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_roles: Option<Vec<String>>,
}

/// A registration request.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    /// Free-form profile data stored alongside the account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub register_options: Option<RegisterOptions>,
}

/// MFA enrollment secret returned by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct MfaSecret {
    /// QR code image for authenticator apps.
    pub image_url: String,
    /// The TOTP secret itself.
    pub totp_secret: String,
}

/// Request/response exchanges against the auth backend.
///
/// Implementations attach credentials according to the configured
/// credential transport: `bearer` carries the current access token for
/// endpoints that require one, and is `None` in cookie mode (the cookie
/// jar supplies the credential instead).
#[async_trait]
pub trait AuthTransport: Send + Sync {
    /// Register an account. Returns a session payload when the account
    /// activated immediately, `None` when activation is pending.
    async fn register(&self, request: &RegisterRequest) -> AuthResult<Option<SessionPayload>>;

    /// Exchange email/password credentials for a session or an MFA
    /// challenge.
    async fn login(&self, email: &str, password: &str) -> AuthResult<LoginResponse>;

    /// Complete an MFA login with a TOTP code and the challenge ticket.
    async fn login_totp(&self, code: &str, ticket: &str) -> AuthResult<SessionPayload>;

    /// Exchange the refresh credential for a fresh session.
    async fn refresh(&self, refresh_token: Option<&str>) -> AuthResult<SessionPayload>;

    /// Invalidate the refresh credential server-side; `all` invalidates
    /// every session of the user.
    async fn logout(&self, refresh_token: Option<&str>, all: bool) -> AuthResult<()>;

    /// Activate a registered account with an emailed ticket.
    async fn activate(&self, ticket: &str) -> AuthResult<()>;

    /// Change the email of the authenticated user directly.
    async fn change_email(&self, new_email: &str, bearer: Option<&str>) -> AuthResult<()>;

    /// Request an email change confirmation for the authenticated user.
    async fn change_email_request(&self, new_email: &str, bearer: Option<&str>)
        -> AuthResult<()>;

    /// Complete an email change with an emailed ticket.
    async fn change_email_confirm(&self, ticket: &str) -> AuthResult<()>;

    /// Change the password of the authenticated user.
    async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
        bearer: Option<&str>,
    ) -> AuthResult<()>;

    /// Request a password reset email.
    async fn change_password_request(&self, email: &str) -> AuthResult<()>;

    /// Complete a password reset with an emailed ticket.
    async fn change_password_confirm(&self, new_password: &str, ticket: &str) -> AuthResult<()>;

    /// Generate an MFA secret for the authenticated user.
    async fn mfa_generate(&self, bearer: Option<&str>) -> AuthResult<MfaSecret>;

    /// Enable MFA with a code from the authenticator app.
    async fn mfa_enable(&self, code: &str, bearer: Option<&str>) -> AuthResult<()>;

    /// Disable MFA with a code from the authenticator app.
    async fn mfa_disable(&self, code: &str, bearer: Option<&str>) -> AuthResult<()>;
}
