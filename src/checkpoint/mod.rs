//! Checkpoint Resolver
//!
//! Decides the final filename of an upload when the destination may already
//! hold a file with the same name:
//!
//! | exists | strategy     | final name                         |
//! |--------|--------------|------------------------------------|
//! | no     | any          | original                           |
//! | yes    | `RENAME`     | `<base>_<YYYY-MM-DD_HHMM>.<ext>`   |
//! | yes    | `VERSIONING` | original (provider keeps history)  |

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Timestamp token inserted by the rename strategy
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H%M";

/// Policy for handling a name collision at the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CheckpointStrategy {
    /// Upload under a timestamped name, leaving the existing file untouched
    Rename,
    /// Overwrite the path and rely on the document library's version history
    #[default]
    Versioning,
}

impl CheckpointStrategy {
    /// Parse a configured value. Unknown values fall back to `Versioning`.
    pub fn from_config_value(value: &str) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "RENAME" => Self::Rename,
            "VERSIONING" => Self::Versioning,
            other => {
                tracing::warn!(
                    value = %other,
                    "Unknown checkpoint strategy, falling back to VERSIONING"
                );
                Self::Versioning
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rename => "RENAME",
            Self::Versioning => "VERSIONING",
        }
    }
}

impl std::fmt::Display for CheckpointStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for CheckpointStrategy {
    fn from(value: String) -> Self {
        Self::from_config_value(&value)
    }
}

impl From<CheckpointStrategy> for String {
    fn from(value: CheckpointStrategy) -> Self {
        value.as_str().to_string()
    }
}

/// What the resolver decided to do about a collision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointAction {
    /// Destination is free
    None,
    /// Incoming file renamed away from the existing one
    Renamed,
    /// Same path is written; the provider versions the previous revision
    Versioned,
}

/// Outcome of [`resolve`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckpointDecision {
    pub final_name: String,
    pub strategy: CheckpointStrategy,
    pub action: CheckpointAction,
}

impl CheckpointDecision {
    /// Advisory message for display, if a checkpoint was applied
    pub fn message(&self) -> Option<String> {
        match self.action {
            CheckpointAction::None => None,
            CheckpointAction::Renamed => Some(format!(
                "File already exists. Checkpoint applied: renamed to {}",
                self.final_name
            )),
            CheckpointAction::Versioned => Some(
                "File already exists. Checkpoint applied: uploading a new version".to_string(),
            ),
        }
    }
}

/// Resolve the final name using the local clock
pub fn resolve(original_name: &str, exists: bool, strategy: CheckpointStrategy) -> CheckpointDecision {
    resolve_at(original_name, exists, strategy, Local::now().naive_local())
}

/// Resolve the final name at a fixed point in time
pub fn resolve_at(
    original_name: &str,
    exists: bool,
    strategy: CheckpointStrategy,
    now: NaiveDateTime,
) -> CheckpointDecision {
    let (final_name, action) = match (exists, strategy) {
        (false, _) => (original_name.to_string(), CheckpointAction::None),
        (true, CheckpointStrategy::Rename) => (
            timestamped_name_at(original_name, now),
            CheckpointAction::Renamed,
        ),
        (true, CheckpointStrategy::Versioning) => {
            (original_name.to_string(), CheckpointAction::Versioned)
        }
    };

    if action != CheckpointAction::None {
        tracing::info!(
            original = %original_name,
            final_name = %final_name,
            strategy = %strategy,
            "Checkpoint applied"
        );
    }

    CheckpointDecision {
        final_name,
        strategy,
        action,
    }
}

/// `report.pdf` -> `report_2026-01-05_1530.pdf`; `report` -> `report_2026-01-05_1530`
pub fn timestamped_name_at(filename: &str, now: NaiveDateTime) -> String {
    let ts = now.format(TIMESTAMP_FORMAT);
    match filename.rsplit_once('.') {
        Some((base, ext)) => format!("{base}_{ts}.{ext}"),
        None => format!("{filename}_{ts}"),
    }
}
