//! reqwest implementation of the transport boundary.

use crate::config::CredentialTransport;
use crate::transport::{
    AuthTransport, LoginResponse, MfaSecret, RegisterRequest, SessionPayload,
};
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Request timeout for auth endpoints.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP transport against `{base_url}/auth`.
pub struct HttpTransport {
    client: reqwest::Client,
    base: String,
    /// Ask the server to deliver the refresh credential as an HTTP-only
    /// cookie instead of in the response body.
    cookie_mode: bool,
}

impl HttpTransport {
    pub fn new(base_url: &Url, credential_transport: CredentialTransport) -> AuthResult<Self> {
        let cookie_mode = matches!(credential_transport, CredentialTransport::Cookie);
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .cookie_store(cookie_mode)
            .build()?;

        Ok(Self {
            client,
            base: format!("{}/auth", base_url.as_str().trim_end_matches('/')),
            cookie_mode,
        })
    }

    fn authorize(&self, request: RequestBuilder, bearer: Option<&str>) -> RequestBuilder {
        match bearer {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Map non-2xx responses onto [`AuthError::Api`].
    async fn expect_success(response: Response) -> AuthResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        warn!(status = %status, "Auth API call failed");
        Err(AuthError::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn post_empty(&self, path: &str, body: Value, bearer: Option<&str>) -> AuthResult<()> {
        let request = self
            .authorize(self.client.post(format!("{}{path}", self.base)), bearer)
            .json(&body);
        Self::expect_success(request.send().await?).await?;
        Ok(())
    }
}

/// Split a login response body into its session or MFA-challenge form.
fn parse_login(body: Value) -> AuthResult<LoginResponse> {
    if body.get("mfa").is_some() {
        let ticket = body
            .get("ticket")
            .and_then(Value::as_str)
            .ok_or_else(|| AuthError::Api {
                status: 200,
                message: "MFA challenge without a ticket".to_string(),
            })?
            .to_string();
        return Ok(LoginResponse::MfaRequired { ticket });
    }
    Ok(LoginResponse::Session(serde_json::from_value(body)?))
}

/// A register response carries a session payload only when the account
/// activated immediately.
fn parse_register(body: Value) -> AuthResult<Option<SessionPayload>> {
    if body.get("jwt_token").is_some() {
        return Ok(Some(serde_json::from_value(body)?));
    }
    Ok(None)
}

#[async_trait]
impl AuthTransport for HttpTransport {
    async fn register(&self, request: &RegisterRequest) -> AuthResult<Option<SessionPayload>> {
        debug!(email = %request.email, "Registering account");
        let response = self
            .client
            .post(format!("{}/register", self.base))
            .json(request)
            .send()
            .await?;
        let body: Value = Self::expect_success(response).await?.json().await?;
        parse_register(body)
    }

    async fn login(&self, email: &str, password: &str) -> AuthResult<LoginResponse> {
        debug!(email = %email, "Logging in");
        let response = self
            .client
            .post(format!("{}/login", self.base))
            .json(&json!({ "email": email, "password": password, "cookie": self.cookie_mode }))
            .send()
            .await?;
        let body: Value = Self::expect_success(response).await?.json().await?;
        parse_login(body)
    }

    async fn login_totp(&self, code: &str, ticket: &str) -> AuthResult<SessionPayload> {
        let response = self
            .client
            .post(format!("{}/mfa/totp", self.base))
            .json(&json!({ "code": code, "ticket": ticket, "cookie": self.cookie_mode }))
            .send()
            .await?;
        Ok(Self::expect_success(response).await?.json().await?)
    }

    async fn refresh(&self, refresh_token: Option<&str>) -> AuthResult<SessionPayload> {
        let mut request = self.client.get(format!("{}/token/refresh", self.base));
        if let Some(token) = refresh_token {
            request = request.query(&[("refresh_token", token)]);
        }
        Ok(Self::expect_success(request.send().await?)
            .await?
            .json()
            .await?)
    }

    async fn logout(&self, refresh_token: Option<&str>, all: bool) -> AuthResult<()> {
        let mut request = self
            .client
            .post(format!("{}/logout", self.base))
            .json(&json!({ "all": all }));
        if let Some(token) = refresh_token {
            request = request.query(&[("refresh_token", token)]);
        }
        Self::expect_success(request.send().await?).await?;
        Ok(())
    }

    async fn activate(&self, ticket: &str) -> AuthResult<()> {
        let request = self
            .client
            .get(format!("{}/activate", self.base))
            .query(&[("ticket", ticket)]);
        Self::expect_success(request.send().await?).await?;
        Ok(())
    }

    async fn change_email(&self, new_email: &str, bearer: Option<&str>) -> AuthResult<()> {
        self.post_empty("/change-email", json!({ "new_email": new_email }), bearer)
            .await
    }

    async fn change_email_request(
        &self,
        new_email: &str,
        bearer: Option<&str>,
    ) -> AuthResult<()> {
        self.post_empty(
            "/change-email/request",
            json!({ "new_email": new_email }),
            bearer,
        )
        .await
    }

    async fn change_email_confirm(&self, ticket: &str) -> AuthResult<()> {
        self.post_empty("/change-email/change", json!({ "ticket": ticket }), None)
            .await
    }

    async fn change_password(
        &self,
        old_password: &str,
        new_password: &str,
        bearer: Option<&str>,
    ) -> AuthResult<()> {
        self.post_empty(
            "/change-password",
            json!({ "old_password": old_password, "new_password": new_password }),
            bearer,
        )
        .await
    }

    async fn change_password_request(&self, email: &str) -> AuthResult<()> {
        self.post_empty("/change-password/request", json!({ "email": email }), None)
            .await
    }

    async fn change_password_confirm(&self, new_password: &str, ticket: &str) -> AuthResult<()> {
        self.post_empty(
            "/change-password/change",
            json!({ "new_password": new_password, "ticket": ticket }),
            None,
        )
        .await
    }

    async fn mfa_generate(&self, bearer: Option<&str>) -> AuthResult<MfaSecret> {
        let request = self
            .authorize(self.client.post(format!("{}/mfa/generate", self.base)), bearer)
            .json(&json!({}));
        Ok(Self::expect_success(request.send().await?)
            .await?
            .json()
            .await?)
    }

    async fn mfa_enable(&self, code: &str, bearer: Option<&str>) -> AuthResult<()> {
        self.post_empty("/mfa/enable", json!({ "code": code }), bearer)
            .await
    }

    async fn mfa_disable(&self, code: &str, bearer: Option<&str>) -> AuthResult<()> {
        self.post_empty("/mfa/disable", json!({ "code": code }), bearer)
            .await
    }
}
