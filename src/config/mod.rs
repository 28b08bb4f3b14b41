use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scraper: ScraperConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub crawl: CrawlConfig,
}

/// Scraper configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScraperConfig {
    #[serde(default = "default_fbref_base_url")]
    pub fbref_base_url: String,

    #[serde(default = "default_football_data_base_url")]
    pub football_data_base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Fixed pause after every fetch. The only rate limiting we do.
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    S3,
    Local,
}

/// Object storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,

    /// DuckDB file used by the `local` backend.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub region: Option<String>,

    /// S3-compatible endpoint override (MinIO, localstack).
    #[serde(default)]
    pub endpoint_url: Option<String>,

    #[serde(default = "default_misc_bucket")]
    pub misc_bucket: String,

    #[serde(default = "default_ledger_key")]
    pub ledger_key: String,

    #[serde(default = "default_xg_results_bucket")]
    pub xg_results_bucket: String,

    #[serde(default = "default_xg_results_clean_bucket")]
    pub xg_results_clean_bucket: String,

    #[serde(default = "default_football_data_raw_bucket")]
    pub football_data_raw_bucket: String,

    #[serde(default = "default_football_data_clean_bucket")]
    pub football_data_clean_bucket: String,

    #[serde(default = "default_lineups_bucket")]
    pub lineups_bucket: String,
}

/// Pending queue configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QueueConfig {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_max_messages")]
    pub max_messages: i32,

    #[serde(default = "default_wait_time_secs")]
    pub wait_time_secs: i32,

    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: i64,
}

/// Which seasons a crawl enumerates
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrawlConfig {
    /// Finish year of the newest season to enumerate. Defaults to this year.
    #[serde(default)]
    pub latest_year: Option<i32>,

    #[serde(default = "default_lookback_years")]
    pub lookback_years: u32,
}

impl CrawlConfig {
    /// Finish years, newest first.
    pub fn years(&self) -> Vec<i32> {
        let latest = self.latest_year.unwrap_or_else(|| Utc::now().year());
        (0..self.lookback_years as i32).map(|i| latest - i).collect()
    }
}

// ── Defaults ─────────────────────────────────────────────────────────────────

fn default_fbref_base_url() -> String {
    "https://fbref.com".to_string()
}
fn default_football_data_base_url() -> String {
    "https://www.football-data.co.uk".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_request_delay_ms() -> u64 {
    3200
}
fn default_user_agent() -> String {
    "football-etl/0.1 (batch results collection for analytics)".to_string()
}
fn default_backend() -> StorageBackend {
    StorageBackend::S3
}
fn default_db_path() -> PathBuf {
    PathBuf::from("data/football.duckdb")
}
fn default_misc_bucket() -> String {
    "football-misc".to_string()
}
fn default_ledger_key() -> String {
    "scraped_links.txt".to_string()
}
fn default_xg_results_bucket() -> String {
    "football-xg-results".to_string()
}
fn default_xg_results_clean_bucket() -> String {
    "football-xg-results-clean".to_string()
}
fn default_football_data_raw_bucket() -> String {
    "football-data-co-uk-raw".to_string()
}
fn default_football_data_clean_bucket() -> String {
    "football-data-co-uk-clean".to_string()
}
fn default_lineups_bucket() -> String {
    "football-lineups-and-managers".to_string()
}
fn default_max_messages() -> i32 {
    10
}
fn default_wait_time_secs() -> i32 {
    20
}
fn default_visibility_timeout_secs() -> i64 {
    30
}
fn default_lookback_years() -> u32 {
    10
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            fbref_base_url: default_fbref_base_url(),
            football_data_base_url: default_football_data_base_url(),
            timeout_secs: default_timeout_secs(),
            request_delay_ms: default_request_delay_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            db_path: default_db_path(),
            region: None,
            endpoint_url: None,
            misc_bucket: default_misc_bucket(),
            ledger_key: default_ledger_key(),
            xg_results_bucket: default_xg_results_bucket(),
            xg_results_clean_bucket: default_xg_results_clean_bucket(),
            football_data_raw_bucket: default_football_data_raw_bucket(),
            football_data_clean_bucket: default_football_data_clean_bucket(),
            lineups_bucket: default_lineups_bucket(),
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_messages: default_max_messages(),
            wait_time_secs: default_wait_time_secs(),
            visibility_timeout_secs: default_visibility_timeout_secs(),
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            latest_year: None,
            lookback_years: default_lookback_years(),
        }
    }
}

// ── Loader ───────────────────────────────────────────────────────────────────

impl AppConfig {
    /// Load configuration from file + environment overrides
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        let cfg = config::Config::builder()
            .add_source(
                config::File::with_name("config/default")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::File::with_name("config/local")
                    .required(false)
                    .format(config::FileFormat::Toml),
            )
            .add_source(
                config::Environment::with_prefix("FOOTBALL")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        cfg.try_deserialize().context("Invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_years_newest_first() {
        let crawl = CrawlConfig {
            latest_year: Some(2024),
            lookback_years: 3,
        };
        assert_eq!(crawl.years(), vec![2024, 2023, 2022]);
    }

    #[test]
    fn test_empty_source_gives_defaults() {
        let cfg: AppConfig = config::Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.storage.ledger_key, "scraped_links.txt");
        assert_eq!(cfg.storage.backend, StorageBackend::S3);
        assert_eq!(cfg.scraper.request_delay_ms, 3200);
        assert_eq!(cfg.queue.max_messages, 10);
    }
}
