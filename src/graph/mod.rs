//! Graph client module
//!
//! Thin client over the document-storage REST API: site and drive resolution,
//! item metadata lookup, content upload and upload-session primitives.
//! Upload protocol decisions (which primitive to use, how to drive a session)
//! live in [`crate::upload`].
//!
//! # Tracing
//!
//! | Operation | Span Name | Attributes |
//! |-----------|-----------|------------|
//! | Site lookup | `graph.resolve_site` | site host, status_code |
//! | Drive lookup | `graph.resolve_drive` | site id, status_code |
//! | Existence check | `graph.check_exists` | drive id, path, exists, status_code |
//! | Content PUT | `graph.put_content` | drive id, path, bytes, status_code |
//! | Session create | `graph.create_upload_session` | drive id, path, status_code |
//! | Chunk PUT | `graph.upload_chunk` | range, bytes, status_code |

use crate::auth::{AuthError, TokenProvider};
use crate::config::Config;
use crate::upload::session::ChunkRange;
use bytes::Bytes;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod path;

pub use path::{encode_path, item_path};

/// Header used to correlate requests with provider-side logs
pub const CLIENT_REQUEST_ID: &str = "client-request-id";

/// Graph client errors
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Not authorized (HTTP {status}): {body}")]
    Unauthorized { status: u16, body: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unexpected HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    #[error("Request error: {0}")]
    RequestError(String),

    #[error("Response error: {0}")]
    ResponseError(String),
}

impl GraphError {
    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized { status, .. } | Self::UnexpectedStatus { status, .. } => {
                Some(*status)
            }
            Self::Auth(AuthError::Rejected { status, .. }) => Some(*status),
            Self::NotFound(_) => Some(404),
            _ => None,
        }
    }

    /// Whether this is an authentication/authorization failure
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_) | Self::Unauthorized { .. })
    }
}

/// A file or folder in a drive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Server-side resumable upload session
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSession {
    pub upload_url: String,
    #[serde(default)]
    pub expiration_date_time: Option<String>,
}

/// Result of sending one chunk to an upload session
#[derive(Debug, Clone)]
pub enum ChunkOutcome {
    /// 202: chunk stored, more expected
    Accepted { next_expected_ranges: Vec<String> },
    /// 200/201: the session is complete and the item exists
    Completed(DriveItem),
    /// Anything else
    Failed { status: u16, body: String },
}

#[derive(Debug, Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionProgress {
    #[serde(default)]
    next_expected_ranges: Vec<String>,
}

/// Timeouts per call class
#[derive(Debug, Clone, Copy)]
pub struct Timeouts {
    pub metadata: Duration,
    pub content: Duration,
    pub chunk: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            metadata: Duration::from_secs(30),
            content: Duration::from_secs(60),
            chunk: Duration::from_secs(120),
        }
    }
}

/// Graph API client
pub struct GraphClient {
    api_base: String,
    site_host: String,
    site_path: String,
    tokens: Arc<dyn TokenProvider>,
    http: reqwest::Client,
    timeouts: Timeouts,
}

impl GraphClient {
    /// Create a new client
    pub fn new(
        api_base: &str,
        site_host: &str,
        site_path: &str,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, GraphError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| GraphError::RequestError(e.to_string()))?;

        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            site_host: site_host.to_string(),
            site_path: site_path.to_string(),
            tokens,
            http,
            timeouts: Timeouts::default(),
        })
    }

    /// Create a client from validated configuration
    pub fn from_config(config: &Config, tokens: Arc<dyn TokenProvider>) -> Result<Self, GraphError> {
        let client = Self::new(
            &config.graph.api_base,
            &config.credentials.site_host,
            &config.credentials.site_path,
            tokens,
        )?;
        Ok(client.with_timeouts(Timeouts {
            metadata: config.upload.metadata_timeout(),
            content: config.upload.content_timeout(),
            chunk: config.upload.chunk_timeout(),
        }))
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// URL of the site lookup, e.g. `/sites/contoso.sharepoint.com:/sites/Ops`
    pub fn site_url(&self) -> String {
        let site_path = format!("/{}", self.site_path.trim_start_matches('/'));
        format!(
            "{}/sites/{}:{}",
            self.api_base,
            self.site_host,
            encode_path(&site_path)
        )
    }

    fn item_url(&self, drive_id: &str, item_path: &str) -> String {
        format!(
            "{}/drives/{}/root:/{}",
            self.api_base,
            drive_id,
            encode_path(item_path)
        )
    }

    /// Build a bearer-authorized request
    async fn authorized(
        &self,
        method: Method,
        url: &str,
        timeout: Duration,
    ) -> Result<RequestBuilder, GraphError> {
        let token = self.tokens.get_token().await?;
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(token)
            .timeout(timeout)
            .header(CLIENT_REQUEST_ID, uuid::Uuid::new_v4().to_string()))
    }

    async fn send(request: RequestBuilder) -> Result<Response, GraphError> {
        let response = request
            .send()
            .await
            .map_err(|e| GraphError::RequestError(e.to_string()))?;
        tracing::Span::current().record("http.status_code", response.status().as_u16());
        Ok(response)
    }

    /// Map 401/403 to `Unauthorized`; a 401 also drops the cached token
    async fn reject_unauthorized(&self, response: Response) -> Result<Response, GraphError> {
        let status = response.status();
        if status != StatusCode::UNAUTHORIZED && status != StatusCode::FORBIDDEN {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            self.tokens.invalidate().await;
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), "Request not authorized");
        Err(GraphError::Unauthorized {
            status: status.as_u16(),
            body,
        })
    }

    async fn unexpected(response: Response) -> GraphError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        GraphError::UnexpectedStatus { status, body }
    }

    async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, GraphError> {
        response
            .json()
            .await
            .map_err(|e| GraphError::ResponseError(e.to_string()))
    }

    /// Resolve the configured site host and path to a site id
    #[tracing::instrument(
        name = "graph.resolve_site",
        skip(self),
        fields(site.host = %self.site_host, http.status_code = tracing::field::Empty),
        err
    )]
    pub async fn resolve_site(&self) -> Result<String, GraphError> {
        let url = self.site_url();
        let request = self
            .authorized(Method::GET, &url, self.timeouts.metadata)
            .await?;
        let response = self.reject_unauthorized(Self::send(request).await?).await?;

        match response.status() {
            s if s.is_success() => {
                let site: IdResponse = Self::decode(response).await?;
                tracing::debug!(site_id = %site.id, "Resolved site");
                Ok(site.id)
            }
            StatusCode::NOT_FOUND => Err(GraphError::NotFound(format!(
                "site {}:{}",
                self.site_host, self.site_path
            ))),
            _ => Err(Self::unexpected(response).await),
        }
    }

    /// Resolve the default document library of a site
    #[tracing::instrument(
        name = "graph.resolve_drive",
        skip(self),
        fields(site.id = %site_id, http.status_code = tracing::field::Empty),
        err
    )]
    pub async fn resolve_default_drive(&self, site_id: &str) -> Result<String, GraphError> {
        let url = format!("{}/sites/{}/drive", self.api_base, site_id);
        let request = self
            .authorized(Method::GET, &url, self.timeouts.metadata)
            .await?;
        let response = self.reject_unauthorized(Self::send(request).await?).await?;

        match response.status() {
            s if s.is_success() => {
                let drive: IdResponse = Self::decode(response).await?;
                tracing::debug!(drive_id = %drive.id, "Resolved default drive");
                Ok(drive.id)
            }
            StatusCode::NOT_FOUND => Err(GraphError::NotFound(format!("drive of site {site_id}"))),
            _ => Err(Self::unexpected(response).await),
        }
    }

    /// Look up an item by drive-relative path.
    ///
    /// A 404 is a normal outcome and yields `(false, None)`.
    #[tracing::instrument(
        name = "graph.check_exists",
        skip(self),
        fields(
            drive.id = %drive_id,
            item.path = %item_path,
            item.exists = tracing::field::Empty,
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    pub async fn check_exists(
        &self,
        drive_id: &str,
        item_path: &str,
    ) -> Result<(bool, Option<DriveItem>), GraphError> {
        let url = self.item_url(drive_id, item_path);
        let request = self
            .authorized(Method::GET, &url, self.timeouts.metadata)
            .await?;
        let response = self.reject_unauthorized(Self::send(request).await?).await?;

        let (exists, item) = match response.status() {
            StatusCode::NOT_FOUND => (false, None),
            s if s.is_success() => (true, Some(Self::decode::<DriveItem>(response).await?)),
            _ => return Err(Self::unexpected(response).await),
        };

        tracing::Span::current().record("item.exists", exists);
        Ok((exists, item))
    }

    /// Write the full content of a small file in one request.
    ///
    /// Any 2xx is success; anything else is returned as an error.
    #[tracing::instrument(
        name = "graph.put_content",
        skip(self, body),
        fields(
            drive.id = %drive_id,
            item.path = %item_path,
            upload.bytes = body.len(),
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    pub async fn put_content(
        &self,
        drive_id: &str,
        item_path: &str,
        body: Bytes,
    ) -> Result<DriveItem, GraphError> {
        let url = format!("{}:/content", self.item_url(drive_id, item_path));
        let request = self
            .authorized(Method::PUT, &url, self.timeouts.content)
            .await?
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body);
        let response = self.reject_unauthorized(Self::send(request).await?).await?;

        if !response.status().is_success() {
            return Err(Self::unexpected(response).await);
        }
        Self::decode(response).await
    }

    /// Open a resumable upload session for an item path
    #[tracing::instrument(
        name = "graph.create_upload_session",
        skip(self),
        fields(
            drive.id = %drive_id,
            item.path = %item_path,
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    pub async fn create_upload_session(
        &self,
        drive_id: &str,
        item_path: &str,
    ) -> Result<UploadSession, GraphError> {
        let url = format!("{}:/createUploadSession", self.item_url(drive_id, item_path));
        let request = self
            .authorized(Method::POST, &url, self.timeouts.metadata)
            .await?
            .json(&serde_json::json!({}));
        let response = self.reject_unauthorized(Self::send(request).await?).await?;

        if !response.status().is_success() {
            return Err(Self::unexpected(response).await);
        }
        let session: UploadSession = Self::decode(response).await?;
        tracing::info!(expires = ?session.expiration_date_time, "Created upload session");
        Ok(session)
    }

    /// Send one byte range to an upload session.
    ///
    /// The session URL is pre-authorized, so no bearer token is attached.
    #[tracing::instrument(
        name = "graph.upload_chunk",
        skip(self, upload_url, body),
        fields(
            upload.range = %range.content_range(total),
            upload.bytes = body.len(),
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    pub async fn upload_chunk(
        &self,
        upload_url: &str,
        range: ChunkRange,
        total: usize,
        body: Bytes,
    ) -> Result<ChunkOutcome, GraphError> {
        let request = self
            .http
            .put(upload_url)
            .timeout(self.timeouts.chunk)
            .header(reqwest::header::CONTENT_LENGTH, range.byte_count().to_string())
            .header(reqwest::header::CONTENT_RANGE, range.content_range(total))
            .body(body);
        let response = Self::send(request).await?;

        let outcome = match response.status() {
            StatusCode::ACCEPTED => {
                let progress: SessionProgress = response.json().await.unwrap_or_default();
                ChunkOutcome::Accepted {
                    next_expected_ranges: progress.next_expected_ranges,
                }
            }
            StatusCode::OK | StatusCode::CREATED => ChunkOutcome::Completed(Self::decode(response).await?),
            status => ChunkOutcome::Failed {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            },
        };
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenProvider;

    fn client(site_path: &str) -> GraphClient {
        GraphClient::new(
            "https://graph.microsoft.com/v1.0/",
            "contoso.sharepoint.com",
            site_path,
            Arc::new(StaticTokenProvider::new("token")),
        )
        .unwrap()
    }

    #[test]
    fn test_site_url() {
        assert_eq!(
            client("/sites/Ops Team").site_url(),
            "https://graph.microsoft.com/v1.0/sites/contoso.sharepoint.com:/sites/Ops%20Team"
        );
    }

    #[test]
    fn test_site_url_adds_leading_slash() {
        assert_eq!(
            client("sites/Ops").site_url(),
            "https://graph.microsoft.com/v1.0/sites/contoso.sharepoint.com:/sites/Ops"
        );
    }

    #[test]
    fn test_item_url_is_escaped() {
        assert_eq!(
            client("/sites/Ops").item_url("drive-1", "Shared Documents/a b.pdf"),
            "https://graph.microsoft.com/v1.0/drives/drive-1/root:/Shared%20Documents/a%20b.pdf"
        );
    }

    #[test]
    fn test_drive_item_deserialize() {
        let item: DriveItem = serde_json::from_str(
            r#"{"id":"01ABC","name":"a.pdf","webUrl":"https://contoso/a.pdf","size":12,"file":{}}"#,
        )
        .unwrap();
        assert_eq!(item.id, "01ABC");
        assert_eq!(item.web_url.as_deref(), Some("https://contoso/a.pdf"));
        assert_eq!(item.size, Some(12));
    }

    #[test]
    fn test_error_status() {
        let err = GraphError::UnexpectedStatus {
            status: 500,
            body: "boom".into(),
        };
        assert_eq!(err.status(), Some(500));
        assert!(!err.is_auth());
        assert!(GraphError::Unauthorized {
            status: 401,
            body: String::new()
        }
        .is_auth());
    }
}
