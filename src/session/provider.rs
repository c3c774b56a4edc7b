//! Identity provider client.
//!
//! The gateway never inspects token contents. Establishing a session means
//! asking the provider whether the access token is currently valid; signing
//! out means asking it to revoke the session behind the token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;
use url::Url;

use crate::config::schema::ProviderConfig;

/// Error type for identity provider calls.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider rejected the request with status {0}")]
    Rejected(u16),

    #[error("invalid provider URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl ProviderError {
    /// True when the HTTP client gave up waiting for the provider.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Http(e) if e.is_timeout())
    }
}

/// Session accepted by the provider, ready to be written as cookies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstablishedSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime reported by the provider, in seconds.
    pub expires_in: Option<u64>,
}

/// Session operations the relay delegates to the identity provider.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn establish(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<EstablishedSession, ProviderError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError>;
}

/// Provider speaking the hosted auth REST API (`/auth/v1/...`).
#[derive(Debug, Clone)]
pub struct HttpSessionProvider {
    client: reqwest::Client,
    base_url: Url,
    api_key: String,
}

#[derive(Debug, serde::Deserialize)]
struct UserResponse {
    #[serde(default)]
    id: Option<String>,
}

impl HttpSessionProvider {
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("edge-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // A trailing slash keeps `join` from replacing the last path segment.
        let mut base = config.url.trim_end_matches('/').to_string();
        base.push('/');

        Ok(Self {
            client,
            base_url: Url::parse(&base)?,
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        Ok(self.base_url.join(path)?)
    }
}

#[async_trait]
impl SessionProvider for HttpSessionProvider {
    async fn establish(
        &self,
        access_token: &str,
        refresh_token: &str,
    ) -> Result<EstablishedSession, ProviderError> {
        let response = self
            .client
            .get(self.endpoint("auth/v1/user")?)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::Rejected(status.as_u16()));
        }

        let user: UserResponse = response.json().await?;
        tracing::debug!(user_id = ?user.id, "Provider accepted session");

        Ok(EstablishedSession {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_in: None,
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .post(self.endpoint("auth/v1/logout")?)
            .header("apikey", &self.api_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        match response.status() {
            s if s.is_success() => Ok(()),
            // The session is already gone on the provider side.
            StatusCode::UNAUTHORIZED | StatusCode::NOT_FOUND => Ok(()),
            s => Err(ProviderError::Rejected(s.as_u16())),
        }
    }
}
