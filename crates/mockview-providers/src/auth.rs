//! Authentication backend over HTTP.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::instrument;

use mockview_core::error::AuthError;
use mockview_core::traits::{AuthBackend, Credentials, LoginResponse};

use crate::error::{auth_send_error, error_reason};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Logs in against `{base_url}/auth/login` and refreshes via `/auth/refresh`.
pub struct HttpAuthBackend {
    base_url: String,
    client: reqwest::Client,
}

impl HttpAuthBackend {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    async fn exchange(&self, request: reqwest::RequestBuilder) -> Result<LoginResponse, AuthError> {
        let response = request.send().await.map_err(auth_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected(error_reason(status, &body)));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::InvalidResponse(format!("failed to parse response: {e}")))?;
        body.into_login()
    }
}

/// Wire shape of a login/refresh response. The token may arrive as `token`
/// or `access_token`, and expiry either as a timestamp or a lifetime.
#[derive(Deserialize)]
struct TokenResponse {
    user_id: String,
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    email: String,
    #[serde(alias = "access_token")]
    token: String,
    #[serde(default)]
    expires_at: Option<DateTime<Utc>>,
    /// Lifetime in seconds.
    #[serde(default)]
    expires_in: Option<i64>,
}

impl TokenResponse {
    fn into_login(self) -> Result<LoginResponse, AuthError> {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(at), _) => at,
            (None, Some(secs)) => chrono::TimeDelta::try_seconds(secs)
                .and_then(|ttl| Utc::now().checked_add_signed(ttl))
                .ok_or_else(|| {
                    AuthError::InvalidResponse(format!("token lifetime out of range: {secs}s"))
                })?,
            (None, None) => {
                return Err(AuthError::InvalidResponse(
                    "response carries no token expiry".into(),
                ))
            }
        };
        Ok(LoginResponse {
            user_id: self.user_id,
            full_name: self.full_name,
            email: self.email,
            token: self.token,
            expires_at,
        })
    }
}

#[async_trait]
impl AuthBackend for HttpAuthBackend {
    #[instrument(skip(self, credentials), fields(email = %credentials.email))]
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, AuthError> {
        let request = self
            .client
            .post(format!("{}/auth/login", self.base_url))
            .json(credentials);
        self.exchange(request).await
    }

    #[instrument(skip_all)]
    async fn refresh(&self, token: &str) -> Result<LoginResponse, AuthError> {
        let request = self
            .client
            .post(format!("{}/auth/refresh", self.base_url))
            .bearer_auth(token);
        self.exchange(request).await
    }
}
