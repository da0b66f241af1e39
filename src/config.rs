//! Configuration loading for regharvest.
//!
//! Everything deployment-specific lives here: source URLs, selector sets,
//! store locations, and pagination limits are configuration, never
//! compiled in.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::scrape::extract::{CardExtractor, ExtractRecords, ParseError, TableExtractor};
use crate::scrape::{ScrapeLimits, DEFAULT_IDENTITY_FIELD};

/// Top-level configuration, loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Logical sources keyed by entity type name.
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Resolved document database path, with `~` expanded.
    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.store.database).into_owned())
    }

    /// Resolved snapshot directory, with `~` expanded.
    pub fn snapshot_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.store.snapshots).into_owned())
    }
}

/// Document and blob store locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file for upserted records.
    #[serde(default = "default_database")]
    pub database: String,
    /// Directory for per-source JSON snapshot objects.
    #[serde(default = "default_snapshots")]
    pub snapshots: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            snapshots: default_snapshots(),
        }
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("regharvest")
}

fn default_database() -> String {
    data_dir().join("registry.db").to_string_lossy().into_owned()
}

fn default_snapshots() -> String {
    data_dir().join("snapshots").to_string_lossy().into_owned()
}

/// Fetch and pagination limits shared by all sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Politeness delay between page fetches in milliseconds.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    /// Hard page ceiling per source.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    /// Extra fetch attempts per page.
    #[serde(default = "default_retry_budget")]
    pub retry_budget: u32,
    /// Overall run deadline in seconds; unset means no deadline.
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            max_pages: default_max_pages(),
            retry_budget: default_retry_budget(),
            deadline_secs: None,
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_request_delay_ms() -> u64 {
    500
}

fn default_max_pages() -> u32 {
    500
}

fn default_retry_budget() -> u32 {
    1
}

impl LimitsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }

    pub fn scrape_limits(&self) -> ScrapeLimits {
        ScrapeLimits {
            max_pages: self.max_pages,
            retry_budget: self.retry_budget,
        }
    }
}

/// One logical source: a registry listing scraped to exhaustion per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base listing URL; the page number parameter is appended per page.
    pub url: String,
    /// Query parameter carrying the page number.
    #[serde(default = "default_page_param")]
    pub page_param: String,
    /// Page layout: "cards" (label/value card views) or "table".
    #[serde(default = "default_layout")]
    pub layout: String,
    /// Normalized field name holding the identity value.
    #[serde(default = "default_identity_field")]
    pub identity_field: String,
    /// Custom user agent; unset uses the built-in browser user agent.
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub selectors: SelectorsConfig,
}

fn default_page_param() -> String {
    "page".to_string()
}

fn default_layout() -> String {
    "cards".to_string()
}

fn default_identity_field() -> String {
    DEFAULT_IDENTITY_FIELD.to_string()
}

impl SourceConfig {
    /// Build the record extractor for this source's configured layout.
    pub fn extractor(&self) -> Result<Box<dyn ExtractRecords>, ParseError> {
        let s = &self.selectors;
        match self.layout.to_lowercase().as_str() {
            "table" => Ok(Box::new(TableExtractor::new(&s.table, &s.next_link)?)),
            _ => Ok(Box::new(CardExtractor::new(
                &s.record,
                &s.item,
                &s.label,
                &s.value,
                &s.next_link,
            )?)),
        }
    }
}

/// Source-specific CSS selectors. The defaults match the card-view layout
/// of the SEBI intermediary registry and will need to be adapted for other
/// sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorsConfig {
    /// Element containing one record.
    #[serde(default = "default_record_selector")]
    pub record: String,
    /// Label/value pair element within a record.
    #[serde(default = "default_item_selector")]
    pub item: String,
    /// Label element within a pair.
    #[serde(default = "default_label_selector")]
    pub label: String,
    /// Value element within a pair.
    #[serde(default = "default_value_selector")]
    pub value: String,
    /// Table element, for the "table" layout.
    #[serde(default = "default_table_selector")]
    pub table: String,
    /// Element whose presence means a further page exists.
    #[serde(default = "default_next_link_selector")]
    pub next_link: String,
}

impl Default for SelectorsConfig {
    fn default() -> Self {
        Self {
            record: default_record_selector(),
            item: default_item_selector(),
            label: default_label_selector(),
            value: default_value_selector(),
            table: default_table_selector(),
            next_link: default_next_link_selector(),
        }
    }
}

fn default_record_selector() -> String {
    "div.fixed-table-body.card-table".to_string()
}

fn default_item_selector() -> String {
    "div.card-view".to_string()
}

fn default_label_selector() -> String {
    "div.title".to_string()
}

fn default_value_selector() -> String {
    "div.value".to_string()
}

fn default_table_selector() -> String {
    "table.table-striped".to_string()
}

fn default_next_link_selector() -> String {
    "a[title=\"Next\"]".to_string()
}
