//! Hourbook configuration system.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{HourbookError, Result};
use crate::types::{Category, UserId, Venue};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourbookConfig {
    /// Role pinged by new announcements.
    #[serde(default)]
    pub gardener_role: Option<u64>,
    #[serde(default)]
    pub markers: MarkerConfig,
    /// Identity → label registry. Order is the report order.
    #[serde(default)]
    pub gardeners: Vec<GardenerEntry>,
    /// Scheduled-event venue keyed by category token.
    #[serde(default)]
    pub venues: BTreeMap<String, Venue>,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub pages: PageConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for HourbookConfig {
    fn default() -> Self {
        Self {
            gardener_role: None,
            markers: MarkerConfig::default(),
            gardeners: Vec::new(),
            venues: BTreeMap::new(),
            timeouts: TimeoutConfig::default(),
            pages: PageConfig::default(),
            database: DatabaseConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl HourbookConfig {
    /// Load config from the default path (~/.hourbook/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            tracing::debug!("📄 No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HourbookError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| HourbookError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        tracing::debug!(
            "📄 Loaded config from {} ({} gardener(s))",
            path.display(),
            config.gardeners.len()
        );
        Ok(config)
    }

    /// Reject registries the workflows cannot use unambiguously.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for g in &self.gardeners {
            if !seen.insert(g.id) {
                return Err(HourbookError::Config(format!(
                    "Gardener {} is registered twice",
                    g.id
                )));
            }
            if g.label.trim().is_empty() {
                return Err(HourbookError::Config(format!(
                    "Gardener {} has an empty label",
                    g.id
                )));
            }
        }
        if self.pages.page_size == 0 {
            return Err(HourbookError::Config("pages.page_size must be > 0".into()));
        }
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Hourbook home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".hourbook")
    }

    /// Registry label for an identity.
    pub fn gardener_label(&self, id: UserId) -> Option<&str> {
        self.gardeners
            .iter()
            .find(|g| g.id == id)
            .map(|g| g.label.as_str())
    }

    pub fn venue(&self, category: Category) -> Option<&Venue> {
        self.venues.get(category.token())
    }
}

/// One entry of the identity → label registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GardenerEntry {
    pub id: UserId,
    pub label: String,
}

/// Reaction markers used as boolean flags on artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkerConfig {
    /// Members react with this to sign up.
    #[serde(default = "default_signup_marker")]
    pub signup: String,
    /// How the signup marker renders inside message text.
    #[serde(default = "default_signup_display")]
    pub signup_display: String,
    /// Applied by the bot once an assignment is persisted.
    #[serde(default = "default_processed_marker")]
    pub processed: String,
}

fn default_signup_marker() -> String { "OGpeepoYes:730890894814740541".into() }
fn default_signup_display() -> String { "<:OGpeepoYes:730890894814740541>".into() }
fn default_processed_marker() -> String { "OGwecoo:787697278190223370".into() }

impl Default for MarkerConfig {
    fn default() -> Self {
        Self {
            signup: default_signup_marker(),
            signup_display: default_signup_display(),
            processed: default_processed_marker(),
        }
    }
}

/// Upper bounds for every wait, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_two_minutes")]
    pub confirm_secs: u64,
    #[serde(default = "default_two_minutes")]
    pub selection_secs: u64,
    #[serde(default = "default_two_minutes")]
    pub modal_secs: u64,
    #[serde(default = "default_report_session")]
    pub report_session_secs: u64,
    #[serde(default = "default_two_minutes")]
    pub leaderboard_session_secs: u64,
    #[serde(default = "default_query_secs")]
    pub query_secs: u64,
}

fn default_two_minutes() -> u64 { 120 }
fn default_report_session() -> u64 { 600 }
fn default_query_secs() -> u64 { 5 }

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            confirm_secs: default_two_minutes(),
            selection_secs: default_two_minutes(),
            modal_secs: default_two_minutes(),
            report_session_secs: default_report_session(),
            leaderboard_session_secs: default_two_minutes(),
            query_secs: default_query_secs(),
        }
    }
}

/// Resolved wait bounds handed to the workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub confirm: Duration,
    pub selection: Duration,
    pub modal: Duration,
    pub report_session: Duration,
    pub leaderboard_session: Duration,
    pub query: Duration,
}

impl From<&TimeoutConfig> for Timeouts {
    fn from(c: &TimeoutConfig) -> Self {
        Self {
            confirm: Duration::from_secs(c.confirm_secs),
            selection: Duration::from_secs(c.selection_secs),
            modal: Duration::from_secs(c.modal_secs),
            report_session: Duration::from_secs(c.report_session_secs),
            leaderboard_session: Duration::from_secs(c.leaderboard_session_secs),
            query: Duration::from_secs(c.query_secs),
        }
    }
}

impl Timeouts {
    /// Every bound set to the same duration.
    pub fn uniform(d: Duration) -> Self {
        Self {
            confirm: d,
            selection: d,
            modal: d,
            report_session: d,
            leaderboard_session: d,
            query: d,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

fn default_page_size() -> usize { 10 }

impl Default for PageConfig {
    fn default() -> Self {
        Self { page_size: default_page_size() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String { "~/.hourbook/hourbook.db".into() }

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: default_db_path() }
    }
}

impl DatabaseConfig {
    /// Path with `~` expanded.
    pub fn resolved_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.path).to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `text` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String { "info".into() }
fn default_log_format() -> String { "text".into() }

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
