//! SharePoint Router - keyword-routed uploads with checkpointing
//!
//! Routes a local file to a SharePoint folder and uploads it.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use sharepoint_router::checkpoint::CheckpointStrategy;
use sharepoint_router::config::{Config, ConfigLoader, RoutingConfig};
use sharepoint_router::router::FolderRouter;
use sharepoint_router::service::{UploadPlan, UploadService};
use sharepoint_router::metrics;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// SharePoint Router - route a file to a SharePoint folder and upload it
#[derive(Parser, Debug)]
#[command(name = "sharepoint-router")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a YAML configuration file (environment variables are used when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Print collected metrics to stderr before exiting
    #[arg(long, global = true)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the folder a filename routes to (no network access)
    Route {
        /// Filename to route
        filename: String,
    },
    /// Show the routing and checkpoint decision for a file without uploading
    Plan {
        /// File to upload
        file: PathBuf,
        /// Upload into this folder instead of the routed one
        #[arg(long)]
        folder: Option<String>,
        /// Checkpoint strategy override (RENAME or VERSIONING)
        #[arg(long)]
        strategy: Option<String>,
    },
    /// Route and upload a file
    Upload {
        /// File to upload
        file: PathBuf,
        /// Upload into this folder instead of the routed one
        #[arg(long)]
        folder: Option<String>,
        /// Checkpoint strategy override (RENAME or VERSIONING)
        #[arg(long)]
        strategy: Option<String>,
    },
}

fn init_logging(level: &str, format: LogFormat) -> anyhow::Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // RUST_LOG takes precedence over --log-level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
        LogFormat::Text => tracing::subscriber::set_global_default(builder.finish())?,
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::from_env().context("Failed to load configuration from environment")?,
    };
    Ok(config)
}

fn load_routing(path: Option<&Path>) -> anyhow::Result<RoutingConfig> {
    match path {
        Some(path) => Ok(load_config(Some(path))?.routing),
        None => Ok(ConfigLoader::routing_from_env()?),
    }
}

fn file_name(file: &Path) -> anyhow::Result<String> {
    file.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .with_context(|| format!("{} has no file name", file.display()))
}

fn build_service(
    config_path: Option<&Path>,
    strategy: Option<&str>,
) -> anyhow::Result<UploadService> {
    let config = load_config(config_path)?;
    let mut service = UploadService::new(config)?;
    if let Some(strategy) = strategy {
        service = service.with_strategy(CheckpointStrategy::from_config_value(strategy));
    }
    info!(checkpoint = %service.strategy(), "Checkpoint strategy");
    Ok(service)
}

fn describe_plan(plan: &UploadPlan) {
    eprintln!("File:            {}", plan.original_name);
    eprintln!("Redirect folder: {}", plan.folder());
    if plan.exists {
        eprintln!("File already exists in that folder.");
    }
    if let Some(message) = plan.checkpoint.message() {
        eprintln!("{message}");
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config_path = args.config.as_deref();

    match args.command {
        Command::Route { filename } => {
            let router = FolderRouter::from_config(&load_routing(config_path)?);
            println!("{}", router.route(&filename));
        }
        Command::Plan {
            file,
            folder,
            strategy,
        } => {
            let service = build_service(config_path, strategy.as_deref())?;
            let plan = service.plan(&file_name(&file)?, folder.as_deref()).await?;
            describe_plan(&plan);
            println!("{}", serde_json::to_string_pretty(&plan)?);
        }
        Command::Upload {
            file,
            folder,
            strategy,
        } => {
            let service = build_service(config_path, strategy.as_deref())?;
            let content = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let plan = service.plan(&file_name(&file)?, folder.as_deref()).await?;
            describe_plan(&plan);

            let report = service.execute(&plan, content.into()).await?;
            eprintln!("Uploaded successfully");
            if let Some(url) = &report.result.web_url {
                eprintln!("Open in SharePoint: {url}");
            }
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_logging(&args.log_level, args.log_format)?;

    info!("Starting SharePoint Router v{}", env!("CARGO_PKG_VERSION"));

    let print_metrics = args.print_metrics;
    let is_upload = matches!(args.command, Command::Upload { .. });
    let result = run(args).await;

    if print_metrics {
        eprint!("{}", metrics::gather());
    }

    if let Err(e) = result {
        if is_upload {
            eprintln!("Upload failed: {e:#}");
        } else {
            eprintln!("Error: {e:#}");
        }
        std::process::exit(1);
    }

    Ok(())
}
