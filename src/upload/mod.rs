//! Upload module
//!
//! Chooses the wire protocol by payload size:
//! - content up to the simple-upload limit (4 MiB) goes out as a single PUT
//! - anything larger goes through a resumable upload session in fixed-size chunks
//!
//! Uploads are never retried. A failed session is abandoned, not resumed.

use crate::config::UploadConfig;
use crate::graph::{item_path, DriveItem, GraphClient, GraphError};
use crate::metrics;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

pub mod session;
pub mod simple;

pub use session::{chunk_ranges, ChunkRange, SessionUploadHandler};
pub use simple::SimpleUploadHandler;

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Transfer failed with HTTP {status}: {body}")]
    Transfer { status: u16, body: String },

    #[error("Upload session ended without completion after sending {sent} of {total} bytes")]
    SessionIncomplete { sent: usize, total: usize },

    #[error("Chunk size must be positive")]
    InvalidChunkSize,
}

impl UploadError {
    /// Treat a non-success status from a transfer call as a transfer failure
    pub(crate) fn from_transfer(err: GraphError) -> Self {
        match err {
            GraphError::UnexpectedStatus { status, body } => Self::Transfer { status, body },
            other => Self::Graph(other),
        }
    }

    /// Short label for the errors metric
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Graph(_) => "graph",
            Self::Transfer { .. } => "transfer",
            Self::SessionIncomplete { .. } => "session_incomplete",
            Self::InvalidChunkSize => "invalid_chunk_size",
        }
    }
}

/// Upload result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadResult {
    pub id: String,
    pub web_url: Option<String>,
    pub size: u64,
}

impl UploadResult {
    pub(crate) fn from_item(item: DriveItem, bytes_sent: usize) -> Self {
        Self {
            size: item.size.unwrap_or(bytes_sent as u64),
            id: item.id,
            web_url: item.web_url,
        }
    }
}

/// Upload handler trait
#[async_trait]
pub trait UploadHandler: Send + Sync {
    /// Protocol label used in logs and metrics
    fn protocol(&self) -> &'static str;

    /// Upload `body` to a drive-relative item path
    async fn upload(
        &self,
        drive_id: &str,
        item_path: &str,
        body: Bytes,
    ) -> Result<UploadResult, UploadError>;
}

/// Size-dispatching uploader
pub struct Uploader {
    simple_upload_limit: usize,
    simple: SimpleUploadHandler,
    session: SessionUploadHandler,
}

impl Uploader {
    pub fn new(client: Arc<GraphClient>, config: &UploadConfig) -> Self {
        Self {
            simple_upload_limit: config.simple_upload_limit,
            simple: SimpleUploadHandler::new(client.clone()),
            session: SessionUploadHandler::new(client, config.chunk_size),
        }
    }

    /// Handler that would be used for a payload of `len` bytes
    pub fn handler_for(&self, len: usize) -> &dyn UploadHandler {
        if len <= self.simple_upload_limit {
            &self.simple
        } else {
            &self.session
        }
    }

    /// Upload content into `folder_path/filename` on the given drive
    #[tracing::instrument(
        name = "upload",
        skip(self, content),
        fields(
            upload.bytes = content.len(),
            upload.protocol = tracing::field::Empty,
            item.id = tracing::field::Empty
        ),
        err
    )]
    pub async fn upload(
        &self,
        drive_id: &str,
        folder_path: &str,
        filename: &str,
        content: Bytes,
    ) -> Result<UploadResult, UploadError> {
        let path = item_path(folder_path, filename);
        let bytes = content.len() as u64;
        let handler = self.handler_for(content.len());
        let protocol = handler.protocol();
        let span = tracing::Span::current();
        span.record("upload.protocol", protocol);

        let start_time = Instant::now();
        let result = handler.upload(drive_id, &path, content).await;
        let duration = start_time.elapsed();
        metrics::record_upload_duration(protocol, duration.as_secs_f64());

        match result {
            Ok(result) => {
                metrics::record_upload_success(protocol, bytes);
                span.record("item.id", result.id.as_str());
                tracing::info!(
                    path = %path,
                    id = %result.id,
                    size = result.size,
                    duration_ms = duration.as_millis(),
                    "Upload completed"
                );
                Ok(result)
            }
            Err(e) => {
                metrics::record_upload_failure(protocol);
                metrics::record_error(e.kind());
                tracing::error!(
                    path = %path,
                    error = %e,
                    duration_ms = duration.as_millis(),
                    "Upload failed"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticTokenProvider;

    fn uploader(limit: usize) -> Uploader {
        let client = GraphClient::new(
            "http://localhost",
            "contoso.sharepoint.com",
            "/sites/Ops",
            Arc::new(StaticTokenProvider::new("token")),
        )
        .unwrap();
        let config = UploadConfig {
            simple_upload_limit: limit,
            ..UploadConfig::default()
        };
        Uploader::new(Arc::new(client), &config)
    }

    #[test]
    fn test_dispatch_by_size() {
        let uploader = uploader(4 * 1024 * 1024);
        assert_eq!(uploader.handler_for(0).protocol(), "simple");
        assert_eq!(uploader.handler_for(4 * 1024 * 1024).protocol(), "simple");
        assert_eq!(uploader.handler_for(4 * 1024 * 1024 + 1).protocol(), "session");
    }

    #[test]
    fn test_result_size_falls_back_to_bytes_sent() {
        let item = DriveItem {
            id: "1".into(),
            name: None,
            web_url: None,
            size: None,
        };
        assert_eq!(UploadResult::from_item(item, 42).size, 42);
    }

    #[test]
    fn test_transfer_mapping() {
        let err = UploadError::from_transfer(GraphError::UnexpectedStatus {
            status: 507,
            body: "quota".into(),
        });
        assert!(matches!(err, UploadError::Transfer { status: 507, .. }));

        let err = UploadError::from_transfer(GraphError::NotFound("x".into()));
        assert!(matches!(err, UploadError::Graph(_)));
    }

    #[test]
    fn test_error_kind_labels() {
        let transfer = UploadError::Transfer {
            status: 500,
            body: String::new(),
        };
        assert_eq!(transfer.kind(), "transfer");
        assert_eq!(
            UploadError::SessionIncomplete { sent: 4, total: 10 }.kind(),
            "session_incomplete"
        );
        assert_eq!(
            UploadError::Graph(GraphError::RequestError("timeout".into())).kind(),
            "graph"
        );
        assert_eq!(UploadError::InvalidChunkSize.kind(), "invalid_chunk_size");
    }
}
