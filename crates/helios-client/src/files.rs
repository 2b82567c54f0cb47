//! File-storage client.
//!
//! Plain request/response plumbing against the backend's storage
//! endpoints, consuming the session's current credential. No
//! state-machine behavior of its own.

use helios_auth::{AuthClient, AuthResult, CredentialTransport};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Uploads can be large; allow far more than the auth timeout.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

/// Client for the file-storage endpoints.
pub struct FilesClient {
    client: reqwest::Client,
    base: String,
    auth: AuthClient,
}

impl FilesClient {
    pub(crate) fn new(
        base_url: &Url,
        credential_transport: CredentialTransport,
        auth: AuthClient,
    ) -> AuthResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(UPLOAD_TIMEOUT)
            .cookie_store(matches!(credential_transport, CredentialTransport::Cookie))
            .build()?;

        Ok(Self {
            client,
            base: format!("{}/storage", base_url.as_str().trim_end_matches('/')),
            auth,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth.bearer_token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn expect_success(response: Response) -> AuthResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(helios_auth::AuthError::Api {
            status: status.as_u16(),
            message,
        })
    }

    /// Upload a file to `path` (e.g. `/public/avatar.png`).
    pub async fn upload(
        &self,
        path: &str,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> AuthResult<Value> {
        debug!(path, file_name, "Uploading file");
        let part = Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)?;
        let form = Form::new().part("file", part);

        let request = self
            .authorize(self.client.post(format!("{}/o{path}", self.base)))
            .multipart(form);
        Ok(Self::expect_success(request.send().await?)
            .await?
            .json()
            .await?)
    }

    /// Delete the file at `path`.
    pub async fn delete(&self, path: &str) -> AuthResult<()> {
        debug!(path, "Deleting file");
        let request = self
            .authorize(self.client.delete(format!("{}/o{path}", self.base)));
        Self::expect_success(request.send().await?).await?;
        Ok(())
    }

    /// Fetch the metadata of the file at `path`.
    pub async fn metadata(&self, path: &str) -> AuthResult<Value> {
        let request = self
            .authorize(self.client.get(format!("{}/m{path}", self.base)));
        Ok(Self::expect_success(request.send().await?)
            .await?
            .json()
            .await?)
    }
}
