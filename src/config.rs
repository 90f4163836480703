use crate::errors::{DiscoveryError, Result};
use crate::models::ConstraintSet;
use crate::sampler::StrategyBudget;
use crate::shuffle::ShufflePolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const APP_DIR_NAME: &str = "deepcut";
pub const CONFIG_FILE_NAME: &str = "config.json";
pub const HISTORY_DB_NAME: &str = "history.db";

pub const DEFAULT_BASE_URL: &str = "https://api.spotify.com/v1";
pub const REQUEST_TIMEOUT_SECONDS: u64 = 10;
/// Upper bound on a server-requested back-off.
pub const MAX_RETRY_AFTER_MS: u64 = 2000;

pub const OFFSET_CEILING: u32 = 2000;
pub const COLLECTION_OFFSET_CEILING: u32 = 100;
pub const PAGE_LIMIT: u32 = 50;
pub const COLLECTION_PAGE_LIMIT: u32 = 20;
pub const RECOMMENDATION_LIMIT: u32 = 50;
pub const COLLECTION_SUBSET_MAX: usize = 5;
pub const MIN_DELAY_MS: u64 = 150;
pub const MAX_DELAY_MS: u64 = 600;

pub const DEFAULT_TARGET_COUNT: usize = 50;
pub const PREFETCH_THRESHOLD: usize = 3;
pub const HISTORY_CAP: usize = 100;

pub fn get_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

pub fn get_config_file_path() -> PathBuf {
    get_config_dir().join(CONFIG_FILE_NAME)
}

pub fn get_default_history_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join(HISTORY_DB_NAME)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_retry_after_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: REQUEST_TIMEOUT_SECONDS,
            user_agent: format!("{}/{}", APP_DIR_NAME, env!("CARGO_PKG_VERSION")),
            max_retry_after_ms: MAX_RETRY_AFTER_MS,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub offset_ceiling: u32,
    pub collection_offset_ceiling: u32,
    pub page_limit: u32,
    pub collection_page_limit: u32,
    pub recommendation_limit: u32,
    pub subset_max: usize,
    pub min_delay_ms: u64,
    pub max_delay_ms: u64,
    pub budget: StrategyBudget,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            offset_ceiling: OFFSET_CEILING,
            collection_offset_ceiling: COLLECTION_OFFSET_CEILING,
            page_limit: PAGE_LIMIT,
            collection_page_limit: COLLECTION_PAGE_LIMIT,
            recommendation_limit: RECOMMENDATION_LIMIT,
            subset_max: COLLECTION_SUBSET_MAX,
            min_delay_ms: MIN_DELAY_MS,
            max_delay_ms: MAX_DELAY_MS,
            budget: StrategyBudget::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub target_count: usize,
    pub prefetch_threshold: usize,
    pub history_cap: usize,
    pub policy: ShufflePolicy,
    /// Exclude recently consumed ids from sampling entirely, not just
    /// deprioritize them.
    pub exclude_recent: bool,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            target_count: DEFAULT_TARGET_COUNT,
            prefetch_threshold: PREFETCH_THRESHOLD,
            history_cap: HISTORY_CAP,
            policy: ShufflePolicy::default(),
            exclude_recent: false,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepcutConfig {
    pub catalog: CatalogConfig,
    pub sampler: SamplerConfig,
    pub queue: QueueConfig,
    pub constraints: ConstraintSet,
    /// ISO 639-1 language preference used to pick a search market.
    pub language: Option<String>,
    /// SQLite history location; `None` keeps history in memory only.
    pub history_db: Option<PathBuf>,
}

impl DeepcutConfig {
    /// Load from the default location, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&get_config_file_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let text = fs::read_to_string(path)?;
        let config: DeepcutConfig = serde_json::from_str(&text).map_err(|e| {
            DiscoveryError::Config(format!("Invalid config file {:?}: {}", path, e))
        })?;
        config.validate()?;

        log::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let c = &self.constraints;
        if c.min_duration_ms > c.max_duration_ms {
            return Err(DiscoveryError::Config(format!(
                "min_duration_ms ({}) exceeds max_duration_ms ({})",
                c.min_duration_ms, c.max_duration_ms
            )));
        }
        if let Some(range) = c.year_range {
            if range.from > range.to {
                return Err(DiscoveryError::Config(format!(
                    "year range {}..{} is inverted",
                    range.from, range.to
                )));
            }
        }
        if c.max_popularity > 100 {
            return Err(DiscoveryError::Config(format!(
                "max_popularity {} above 100",
                c.max_popularity
            )));
        }
        if self.sampler.min_delay_ms > self.sampler.max_delay_ms {
            return Err(DiscoveryError::Config(
                "sampler min_delay_ms exceeds max_delay_ms".to_string(),
            ));
        }
        if self.sampler.page_limit == 0 {
            return Err(DiscoveryError::Config("page_limit must be positive".to_string()));
        }
        Ok(())
    }
}
