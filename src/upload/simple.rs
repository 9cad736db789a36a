//! Single-request upload handler
//!
//! Sends the whole payload with one PUT to the item's content endpoint.

use super::{UploadError, UploadHandler, UploadResult};
use crate::graph::GraphClient;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

pub struct SimpleUploadHandler {
    client: Arc<GraphClient>,
}

impl SimpleUploadHandler {
    pub fn new(client: Arc<GraphClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UploadHandler for SimpleUploadHandler {
    fn protocol(&self) -> &'static str {
        "simple"
    }

    #[tracing::instrument(
        name = "upload.simple",
        skip(self, body),
        fields(item.path = %item_path, upload.bytes = body.len()),
        err
    )]
    async fn upload(
        &self,
        drive_id: &str,
        item_path: &str,
        body: Bytes,
    ) -> Result<UploadResult, UploadError> {
        let bytes_sent = body.len();
        let item = self
            .client
            .put_content(drive_id, item_path, body)
            .await
            .map_err(UploadError::from_transfer)?;
        Ok(UploadResult::from_item(item, bytes_sent))
    }
}
