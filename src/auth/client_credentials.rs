//! Client-credentials token provider
//!
//! Exchanges tenant id, client id and secret for a bearer token at the
//! identity platform's token endpoint and caches it.
//!
//! # Example
//!
//! ```no_run
//! use sharepoint_router::auth::{ClientCredentialsProvider, TokenProvider};
//! use sharepoint_router::config::Config;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let provider = ClientCredentialsProvider::from_config(&config)?;
//!
//! // First call hits the token endpoint, later calls reuse the cached token
//! let token = provider.get_token().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Limitations
//!
//! The token's expiry is not tracked. A long-running process keeps using the
//! cached token until a downstream 401 triggers [`TokenProvider::invalidate`].

use super::{AuthError, TokenProvider};
use crate::config::Config;
use crate::metrics;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Default timeout for token requests (30 seconds)
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Client-credentials grant with a single-slot token cache
pub struct ClientCredentialsProvider {
    token_url: String,
    client_id: String,
    client_secret: String,
    scope: String,
    timeout: Duration,
    client: reqwest::Client,
    cache: Arc<RwLock<Option<String>>>,
}

impl ClientCredentialsProvider {
    /// Create a provider for the given tenant.
    ///
    /// `login_base` is the identity platform root, e.g.
    /// `https://login.microsoftonline.com`.
    pub fn new(
        login_base: &str,
        tenant_id: &str,
        client_id: &str,
        client_secret: &str,
        scope: &str,
    ) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| AuthError::RequestFailed(e.to_string()))?;

        Ok(Self {
            token_url: format!(
                "{}/{}/oauth2/v2.0/token",
                login_base.trim_end_matches('/'),
                tenant_id
            ),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            scope: scope.to_string(),
            timeout: DEFAULT_TIMEOUT,
            client,
            cache: Arc::new(RwLock::new(None)),
        })
    }

    /// Create a provider from validated configuration
    pub fn from_config(config: &Config) -> Result<Self, AuthError> {
        let provider = Self::new(
            &config.graph.login_base,
            &config.credentials.tenant_id,
            &config.credentials.client_id,
            &config.credentials.client_secret,
            &config.graph.scope,
        )?;
        Ok(provider.with_timeout(config.upload.metadata_timeout()))
    }

    /// Set the request timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn token_url(&self) -> &str {
        &self.token_url
    }

    /// Whether a token is currently cached
    pub async fn is_cached(&self) -> bool {
        self.cache.read().await.is_some()
    }

    #[tracing::instrument(
        name = "auth.token",
        skip(self),
        fields(http.status_code = tracing::field::Empty),
        err
    )]
    async fn fetch_token(&self) -> Result<String, AuthError> {
        let form = [
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("grant_type", "client_credentials"),
            ("scope", self.scope.as_str()),
        ];

        let response = self
            .client
            .post(&self.token_url)
            .timeout(self.timeout)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                metrics::record_token_request(false);
                AuthError::RequestFailed(e.to_string())
            })?;

        let status = response.status();
        tracing::Span::current().record("http.status_code", status.as_u16());

        if !status.is_success() {
            metrics::record_token_request(false);
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            metrics::record_token_request(false);
            AuthError::MalformedResponse(e.to_string())
        })?;

        if token.access_token.trim().is_empty() {
            metrics::record_token_request(false);
            return Err(AuthError::MalformedResponse("empty access_token".into()));
        }

        metrics::record_token_request(true);
        tracing::info!(expires_in = ?token.expires_in, "Acquired access token");

        Ok(token.access_token)
    }
}

#[async_trait]
impl TokenProvider for ClientCredentialsProvider {
    async fn get_token(&self) -> Result<String, AuthError> {
        if let Some(token) = self.cache.read().await.as_ref() {
            tracing::trace!("Access token cache hit");
            return Ok(token.clone());
        }

        let mut cache = self.cache.write().await;
        // Another caller may have filled the slot while we waited for the lock
        if let Some(token) = cache.as_ref() {
            return Ok(token.clone());
        }

        let token = self.fetch_token().await?;
        *cache = Some(token.clone());
        Ok(token)
    }

    async fn invalidate(&self) {
        let mut cache = self.cache.write().await;
        if cache.take().is_some() {
            tracing::info!("Access token invalidated");
        }
    }
}
