//! Upload service
//!
//! Ties the pieces together in the order the flow requires:
//! route the filename, resolve site and drive, check the destination,
//! resolve the checkpoint, then transfer.
//!
//! The existence check always precedes the destination write, so a file is
//! only ever overwritten through an explicit `VERSIONING` decision. A
//! `RENAME` target is checked as well and is never written if taken.
//!
//! # Example
//!
//! ```no_run
//! use sharepoint_router::config::Config;
//! use sharepoint_router::service::UploadService;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env()?;
//! let service = UploadService::new(config)?;
//!
//! let content = std::fs::read("Invoice_March.pdf")?;
//! let report = service.upload("Invoice_March.pdf", content.into(), None).await?;
//! println!("{} -> {:?}", report.final_filename, report.result.web_url);
//! # Ok(())
//! # }
//! ```

use crate::auth::{AuthError, ClientCredentialsProvider, TokenProvider};
use crate::checkpoint::{self, CheckpointAction, CheckpointDecision, CheckpointStrategy};
use crate::config::Config;
use crate::graph::{item_path, DriveItem, GraphClient, GraphError};
use crate::router::{FolderRouter, RouteDecision, RouteMatch};
use crate::upload::{UploadError, UploadResult, Uploader};
use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

/// Service errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Renamed destination already exists: {0}")]
    RenameTargetExists(String),
}

/// Everything decided before any bytes are sent
#[derive(Debug, Clone, Serialize)]
pub struct UploadPlan {
    pub original_name: String,
    pub route: RouteDecision,
    pub drive_id: String,
    pub exists: bool,
    pub existing_item: Option<DriveItem>,
    pub checkpoint: CheckpointDecision,
}

impl UploadPlan {
    pub fn folder(&self) -> &str {
        &self.route.folder
    }

    pub fn final_name(&self) -> &str {
        &self.checkpoint.final_name
    }
}

/// Summary of a completed upload
#[derive(Debug, Clone, Serialize)]
pub struct UploadReport {
    pub folder: String,
    pub final_filename: String,
    pub checkpoint: CheckpointStrategy,
    pub size_bytes: usize,
    pub result: UploadResult,
}

/// Upload service
pub struct UploadService {
    router: FolderRouter,
    client: Arc<GraphClient>,
    uploader: Uploader,
    strategy: CheckpointStrategy,
}

impl UploadService {
    /// Build the service from validated configuration
    pub fn new(config: Config) -> Result<Self, ServiceError> {
        let tokens = Arc::new(ClientCredentialsProvider::from_config(&config)?);
        Self::with_token_provider(config, tokens)
    }

    /// Build the service with an injected token provider
    pub fn with_token_provider(
        config: Config,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, ServiceError> {
        let client = Arc::new(GraphClient::from_config(&config, tokens)?);
        Ok(Self {
            router: FolderRouter::from_config(&config.routing),
            uploader: Uploader::new(client.clone(), &config.upload),
            client,
            strategy: config.checkpoint,
        })
    }

    /// Override the configured checkpoint strategy
    #[must_use]
    pub fn with_strategy(mut self, strategy: CheckpointStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn router(&self) -> &FolderRouter {
        &self.router
    }

    pub fn strategy(&self) -> CheckpointStrategy {
        self.strategy
    }

    /// Decide folder and final name for `filename`.
    ///
    /// `folder_override` replaces the routed folder when given.
    #[tracing::instrument(name = "service.plan", skip(self), err)]
    pub async fn plan(
        &self,
        filename: &str,
        folder_override: Option<&str>,
    ) -> Result<UploadPlan, ServiceError> {
        let route = match folder_override {
            Some(folder) => RouteDecision {
                folder: folder.to_string(),
                matched: RouteMatch::Override,
            },
            None => self.router.decide(filename),
        };
        tracing::info!(filename = %filename, folder = %route.folder, "Routing decision");

        let site_id = self.client.resolve_site().await?;
        let drive_id = self.client.resolve_default_drive(&site_id).await?;

        let (exists, existing_item) = self
            .client
            .check_exists(&drive_id, &item_path(&route.folder, filename))
            .await?;
        if exists {
            tracing::warn!(filename = %filename, folder = %route.folder, "File already exists in that folder");
        }

        let checkpoint = checkpoint::resolve(filename, exists, self.strategy);

        // The renamed path is a new destination and gets its own check
        if checkpoint.action == CheckpointAction::Renamed {
            let renamed = item_path(&route.folder, &checkpoint.final_name);
            let (taken, _) = self.client.check_exists(&drive_id, &renamed).await?;
            if taken {
                tracing::warn!(path = %renamed, "Renamed destination is already taken");
                return Err(ServiceError::RenameTargetExists(renamed));
            }
        }

        Ok(UploadPlan {
            original_name: filename.to_string(),
            route,
            drive_id,
            exists,
            existing_item,
            checkpoint,
        })
    }

    /// Transfer content according to a plan
    #[tracing::instrument(
        name = "service.execute",
        skip(self, plan, content),
        fields(final_name = %plan.final_name()),
        err
    )]
    pub async fn execute(
        &self,
        plan: &UploadPlan,
        content: Bytes,
    ) -> Result<UploadReport, ServiceError> {
        let size_bytes = content.len();
        let result = self
            .uploader
            .upload(&plan.drive_id, plan.folder(), plan.final_name(), content)
            .await?;

        Ok(UploadReport {
            folder: plan.folder().to_string(),
            final_filename: plan.final_name().to_string(),
            checkpoint: plan.checkpoint.strategy,
            size_bytes,
            result,
        })
    }

    /// Plan and execute in one call
    pub async fn upload(
        &self,
        filename: &str,
        content: Bytes,
        folder_override: Option<&str>,
    ) -> Result<UploadReport, ServiceError> {
        let plan = self.plan(filename, folder_override).await?;
        self.execute(&plan, content).await
    }
}
