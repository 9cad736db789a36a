//! Authentication module
//!
//! Provides bearer tokens for the remote API. The production provider performs
//! a single client-credentials exchange and caches the token for the rest of
//! the session; a 401 from any downstream call invalidates the cache.

use async_trait::async_trait;
use thiserror::Error;

pub mod client_credentials;

pub use client_credentials::ClientCredentialsProvider;

/// Authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Token request failed: {0}")]
    RequestFailed(String),

    #[error("Token endpoint returned HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Malformed token response: {0}")]
    MalformedResponse(String),
}

/// Source of bearer tokens
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a bearer token, fetching one if none is cached
    async fn get_token(&self) -> Result<String, AuthError>;

    /// Drop any cached token so the next call re-authenticates
    async fn invalidate(&self);
}

/// Fixed token, for tests and pre-issued tokens
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self) -> Result<String, AuthError> {
        Ok(self.token.clone())
    }

    async fn invalidate(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticTokenProvider::new("abc");
        assert_eq!(provider.get_token().await.unwrap(), "abc");
        provider.invalidate().await;
        assert_eq!(provider.get_token().await.unwrap(), "abc");
    }

    #[test]
    fn test_rejected_error_message() {
        let err = AuthError::Rejected {
            status: 401,
            body: "invalid_client".into(),
        };
        assert_eq!(
            err.to_string(),
            "Token endpoint returned HTTP 401: invalid_client"
        );
    }
}
