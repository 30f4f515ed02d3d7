use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub player: PlayerConfig,
}

/// Where and how often the station directory is queried.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Minimum delay between two outbound requests.
    #[serde(default = "default_request_interval_ms")]
    pub request_interval_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_popular_limit")]
    pub popular_limit: u32,
    #[serde(default = "default_search_limit")]
    pub search_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    /// Responses younger than this are served without touching the network.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

/// User-configurable locations for persisted state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_favorites_file")]
    pub favorites_file: PathBuf,
    /// JSON `{ "volume": N }`, rewritten on every volume change.
    #[serde(default = "default_player_settings_file")]
    pub player_settings_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Volume used when no player settings file exists yet (0-100).
    #[serde(default = "default_volume")]
    pub default_volume: u8,
}

impl DirectoryConfig {
    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: default_user_agent(),
            request_interval_ms: default_request_interval_ms(),
            timeout_secs: default_timeout_secs(),
            popular_limit: default_popular_limit(),
            search_limit: default_search_limit(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            favorites_file: default_favorites_file(),
            player_settings_file: default_player_settings_file(),
        }
    }
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
        }
    }
}

fn default_base_url() -> String {
    "https://de1.api.radio-browser.info/json/stations".to_string()
}

fn default_user_agent() -> String {
    format!("worldradio/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_interval_ms() -> u64 {
    1000
}

fn default_timeout_secs() -> u64 {
    15
}

fn default_popular_limit() -> u32 {
    200
}

fn default_search_limit() -> u32 {
    100
}

fn default_cache_dir() -> PathBuf {
    platform::cache_dir()
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_favorites_file() -> PathBuf {
    platform::data_dir().join("favorites.json")
}

fn default_player_settings_file() -> PathBuf {
    platform::data_dir().join("player_config.json")
}

fn default_volume() -> u8 {
    70
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(&config_path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
