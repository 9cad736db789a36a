//! Folder Router
//!
//! Maps an uploaded filename to a destination folder using an ordered list of
//! keyword rules. The first rule with a keyword contained in the lower-cased
//! filename wins; otherwise the configured default folder is used.
//!
//! Rule order is priority and is never re-sorted.

use crate::config::RoutingConfig;
use serde::{Deserialize, Serialize};

/// A keyword set and the folder it routes to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub keywords: Vec<String>,
    pub folder: String,
}

impl RouteRule {
    pub fn new<I, S>(keywords: I, folder: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            folder: folder.to_string(),
        }
    }

    /// Returns the first keyword of this rule found in `lowered`
    fn matching_keyword(&self, lowered: &str) -> Option<&str> {
        self.keywords
            .iter()
            .map(|k| k.trim())
            // An empty keyword would match every filename
            .filter(|k| !k.is_empty())
            .find(|k| lowered.contains(&k.to_lowercase()))
    }
}

/// Built-in routing table
pub fn default_rules() -> Vec<RouteRule> {
    vec![
        RouteRule::new(
            ["invoice", "bill", "payment", "receipt"],
            "Shared Documents/Finance",
        ),
        RouteRule::new(["resume", "cv", "offerletter"], "Shared Documents/HR"),
        RouteRule::new(
            ["assignment", "homework", "projectreport"],
            "Shared Documents/University",
        ),
        RouteRule::new(["legal", "court", "notice", "claim"], "Shared Documents/Legal"),
    ]
}

/// Why a folder was chosen
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RouteMatch {
    /// Rule at `index` matched on `keyword`
    Rule { index: usize, keyword: String },
    /// No rule matched
    Default,
    /// Folder supplied by the caller
    Override,
}

/// Routing decision for a filename
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDecision {
    pub folder: String,
    pub matched: RouteMatch,
}

/// Folder Router
///
/// Linear scan over the configured rules, in configured order.
#[derive(Debug, Clone)]
pub struct FolderRouter {
    rules: Vec<RouteRule>,
    default_folder: String,
}

impl FolderRouter {
    pub fn new(rules: Vec<RouteRule>, default_folder: &str) -> Self {
        Self {
            rules,
            default_folder: default_folder.to_string(),
        }
    }

    pub fn from_config(config: &RoutingConfig) -> Self {
        Self::new(config.rules.clone(), &config.default_folder)
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn default_folder(&self) -> &str {
        &self.default_folder
    }

    /// Route a filename to its destination folder. Never fails.
    pub fn route(&self, filename: &str) -> String {
        self.decide(filename).folder
    }

    /// Route a filename and report which rule (if any) matched
    pub fn decide(&self, filename: &str) -> RouteDecision {
        let lowered = filename.to_lowercase();

        for (index, rule) in self.rules.iter().enumerate() {
            if let Some(keyword) = rule.matching_keyword(&lowered) {
                tracing::debug!(
                    filename = %filename,
                    rule = index,
                    keyword = %keyword,
                    folder = %rule.folder,
                    "Route rule matched"
                );
                return RouteDecision {
                    folder: rule.folder.clone(),
                    matched: RouteMatch::Rule {
                        index,
                        keyword: keyword.to_string(),
                    },
                };
            }
        }

        tracing::debug!(
            filename = %filename,
            folder = %self.default_folder,
            "No route rule matched, using default folder"
        );
        RouteDecision {
            folder: self.default_folder.clone(),
            matched: RouteMatch::Default,
        }
    }
}

impl Default for FolderRouter {
    fn default() -> Self {
        Self::from_config(&RoutingConfig::default())
    }
}
