//! SharePoint Router Library
//!
//! Uploads a file to a SharePoint document library, choosing the destination
//! folder from filename keywords and never silently clobbering an existing
//! file.
//!
//! # Features
//!
//! - **Keyword Routing**: ordered, first-match-wins folder rules with a default
//! - **Checkpointing**: rename with a timestamp, or rely on library versioning
//! - **Size-Aware Uploads**: single PUT up to 4 MiB, resumable sessions above
//! - **Cached Auth**: one client-credentials exchange per session
//!
//! # Example
//!
//! ```no_run
//! use sharepoint_router::{config::Config, service::UploadService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let service = UploadService::new(config)?;
//!     let content = std::fs::read("Invoice_March.pdf")?;
//!     let report = service.upload("Invoice_March.pdf", content.into(), None).await?;
//!     println!("Uploaded to {}/{}", report.folder, report.final_filename);
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod checkpoint;
pub mod config;
pub mod graph;
pub mod metrics;
pub mod router;
pub mod service;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use service::UploadService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
