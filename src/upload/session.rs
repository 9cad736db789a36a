//! Resumable upload session handler
//!
//! Handles large files by creating an upload session and sending the content
//! in ordered, fixed-size byte ranges:
//!
//! 1. `POST .../createUploadSession` returns a pre-authorized session URL
//! 2. each chunk is `PUT` with `Content-Range: bytes <start>-<end>/<total>`
//! 3. `202 Accepted` advances to the next chunk, `200`/`201` completes the
//!    upload, any other status aborts it
//!
//! Running out of chunks without a completing response is a protocol
//! violation and is reported as [`UploadError::SessionIncomplete`].

use super::{UploadError, UploadHandler, UploadResult};
use crate::graph::{ChunkOutcome, GraphClient};
use crate::metrics;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// Inclusive byte range of one chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub start: usize,
    /// Inclusive
    pub end: usize,
}

impl ChunkRange {
    /// Number of bytes in the chunk
    pub fn byte_count(&self) -> usize {
        self.end - self.start + 1
    }

    /// `Content-Range` header value for this chunk
    pub fn content_range(&self, total: usize) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, total)
    }
}

/// Partition `[0, total)` into consecutive chunks of `chunk_size` bytes.
///
/// The last chunk ends at `total - 1`. Empty content yields no chunks.
pub fn chunk_ranges(total: usize, chunk_size: usize) -> Result<Vec<ChunkRange>, UploadError> {
    if chunk_size == 0 {
        return Err(UploadError::InvalidChunkSize);
    }

    let mut ranges = Vec::with_capacity(total.div_ceil(chunk_size));
    let mut start = 0;
    while start < total {
        let end = (start + chunk_size).min(total) - 1;
        ranges.push(ChunkRange { start, end });
        start = end + 1;
    }
    Ok(ranges)
}

pub struct SessionUploadHandler {
    client: Arc<GraphClient>,
    chunk_size: usize,
}

impl SessionUploadHandler {
    pub fn new(client: Arc<GraphClient>, chunk_size: usize) -> Self {
        Self { client, chunk_size }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

#[async_trait]
impl UploadHandler for SessionUploadHandler {
    fn protocol(&self) -> &'static str {
        "session"
    }

    #[tracing::instrument(
        name = "upload.session",
        skip(self, body),
        fields(
            item.path = %item_path,
            upload.bytes = body.len(),
            upload.chunk_size = self.chunk_size,
            upload.chunks_sent = tracing::field::Empty
        ),
        err
    )]
    async fn upload(
        &self,
        drive_id: &str,
        item_path: &str,
        body: Bytes,
    ) -> Result<UploadResult, UploadError> {
        let total = body.len();
        let ranges = chunk_ranges(total, self.chunk_size)?;

        let session = self
            .client
            .create_upload_session(drive_id, item_path)
            .await
            .map_err(UploadError::from_transfer)?;

        let span = tracing::Span::current();
        let mut sent = 0;

        for (index, range) in ranges.iter().enumerate() {
            let chunk = body.slice(range.start..=range.end);
            let outcome = self
                .client
                .upload_chunk(&session.upload_url, *range, total, chunk)
                .await?;

            span.record("upload.chunks_sent", index + 1);

            match outcome {
                ChunkOutcome::Accepted {
                    next_expected_ranges,
                } => {
                    sent = range.end + 1;
                    tracing::debug!(
                        chunk = index + 1,
                        of = ranges.len(),
                        sent,
                        total,
                        next = ?next_expected_ranges,
                        "Chunk accepted"
                    );
                }
                ChunkOutcome::Completed(item) => {
                    metrics::record_session_chunks(index + 1);
                    if index + 1 < ranges.len() {
                        tracing::warn!(
                            chunk = index + 1,
                            of = ranges.len(),
                            "Session completed before the final chunk"
                        );
                    }
                    return Ok(UploadResult::from_item(item, total));
                }
                ChunkOutcome::Failed { status, body } => {
                    // The session is abandoned; it expires on the server side
                    tracing::error!(
                        chunk = index + 1,
                        status,
                        sent,
                        total,
                        "Chunk rejected, abandoning upload session"
                    );
                    return Err(UploadError::Transfer { status, body });
                }
            }
        }

        Err(UploadError::SessionIncomplete { sent, total })
    }
}
