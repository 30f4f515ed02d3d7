//! Station directory client (radio-browser.info JSON API).
//!
//! Requests are throttled to one per configured interval and their raw bodies
//! cached on disk, one entry per query.

use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::{query_fragment, ResponseCache};
use crate::config::Config;
use crate::model::Station;

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("directory returned HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("response is not a JSON array")]
    NotAnArray,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// What to ask the directory for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryQuery {
    /// Most-clicked stations first.
    Popular { limit: u32 },
    ByName { name: String, limit: u32 },
    ByCountry { country: String, limit: u32 },
    ByLanguage { language: String, limit: u32 },
    ByTag { tag: String, limit: u32 },
}

impl DirectoryQuery {
    pub fn limit(&self) -> u32 {
        match self {
            Self::Popular { limit }
            | Self::ByName { limit, .. }
            | Self::ByCountry { limit, .. }
            | Self::ByLanguage { limit, .. }
            | Self::ByTag { limit, .. } => *limit,
        }
    }

    /// Query-string parameters sent with the request.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("limit", self.limit().to_string())];
        match self {
            Self::Popular { .. } => {
                params.push(("order", "clickcount".to_string()));
                params.push(("reverse", "true".to_string()));
            }
            Self::ByName { name, .. } => params.push(("name", name.clone())),
            Self::ByCountry { country, .. } => params.push(("country", country.clone())),
            Self::ByLanguage { language, .. } => params.push(("language", language.clone())),
            Self::ByTag { tag, .. } => params.push(("tag", tag.clone())),
        }
        params
    }

    /// Cache file stem; distinct queries never share an entry.
    pub fn cache_key(&self) -> String {
        match self {
            Self::Popular { limit } => format!("popular_{}", limit),
            Self::ByName { name, limit } => format!("name_{}_{}", query_fragment(name), limit),
            Self::ByCountry { country, limit } => {
                format!("country_{}_{}", query_fragment(country), limit)
            }
            Self::ByLanguage { language, limit } => {
                format!("language_{}_{}", query_fragment(language), limit)
            }
            Self::ByTag { tag, limit } => format!("tag_{}_{}", query_fragment(tag), limit),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Popular { .. } => "popular stations".to_string(),
            Self::ByName { name, .. } => format!("name \"{}\"", name),
            Self::ByCountry { country, .. } => format!("country \"{}\"", country),
            Self::ByLanguage { language, .. } => format!("language \"{}\"", language),
            Self::ByTag { tag, .. } => format!("tag \"{}\"", tag),
        }
    }
}

/// Fixed minimum delay between two outbound requests.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    /// Sleep until `interval` has passed since the previous call returned.
    pub async fn wait(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.interval {
                let pause = self.interval - elapsed;
                debug!("throttle: sleeping {}ms", pause.as_millis());
                tokio::time::sleep(pause).await;
            }
        }
        *last = Some(Instant::now());
    }
}

pub struct DirectoryClient {
    http: Client,
    base_url: String,
    cache: ResponseCache,
    throttle: Throttle,
    popular_limit: u32,
    search_limit: u32,
}

impl DirectoryClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = Client::builder()
            .user_agent(config.directory.user_agent.clone())
            .timeout(config.directory.timeout())
            .build()?;
        Ok(Self {
            http,
            base_url: config.directory.base_url.clone(),
            cache: ResponseCache::new(config.cache.dir.clone(), config.cache.ttl()),
            throttle: Throttle::new(config.directory.request_interval()),
            popular_limit: config.directory.popular_limit,
            search_limit: config.directory.search_limit,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn popular(&self) -> DirectoryQuery {
        DirectoryQuery::Popular {
            limit: self.popular_limit,
        }
    }

    pub fn by_name(&self, name: impl Into<String>) -> DirectoryQuery {
        DirectoryQuery::ByName {
            name: name.into(),
            limit: self.search_limit,
        }
    }

    pub fn by_country(&self, country: impl Into<String>) -> DirectoryQuery {
        DirectoryQuery::ByCountry {
            country: country.into(),
            limit: self.search_limit,
        }
    }

    pub fn by_language(&self, language: impl Into<String>) -> DirectoryQuery {
        DirectoryQuery::ByLanguage {
            language: language.into(),
            limit: self.search_limit,
        }
    }

    pub fn by_tag(&self, tag: impl Into<String>) -> DirectoryQuery {
        DirectoryQuery::ByTag {
            tag: tag.into(),
            limit: self.search_limit,
        }
    }

    /// Stations for `query`, or an empty list on any failure.
    pub async fn fetch(&self, query: &DirectoryQuery) -> Vec<Station> {
        match self.try_fetch(query).await {
            Ok(stations) => stations,
            Err(e) => {
                warn!("directory: {} failed: {}", query.describe(), e);
                Vec::new()
            }
        }
    }

    /// Like [`fetch`](Self::fetch) but without records that cannot be shown
    /// or played (no name or no resolved URL).
    pub async fn fetch_playable(&self, query: &DirectoryQuery) -> Vec<Station> {
        let stations = self.fetch(query).await;
        let total = stations.len();
        let playable: Vec<Station> = stations.into_iter().filter(Station::is_playable).collect();
        if playable.len() < total {
            debug!(
                "directory: dropped {} unplayable records",
                total - playable.len()
            );
        }
        playable
    }

    pub async fn try_fetch(&self, query: &DirectoryQuery) -> Result<Vec<Station>, DirectoryError> {
        let key = query.cache_key();
        if let Some(body) = self.cache.load_fresh(&key) {
            match parse_stations(&body) {
                Ok(stations) => {
                    info!(
                        "directory: {} served from cache ({} stations)",
                        query.describe(),
                        stations.len()
                    );
                    return Ok(stations);
                }
                Err(e) => warn!("directory: cached {} unreadable: {}", key, e),
            }
        }

        self.throttle.wait().await;
        debug!("directory: GET {} {:?}", self.base_url, query.params());
        let resp = self
            .http
            .get(&self.base_url)
            .query(&query.params())
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(DirectoryError::Status(status));
        }
        let body = resp.text().await?;
        let stations = parse_stations(&body)?;

        if let Err(e) = self.cache.store(&key, &body) {
            warn!("directory: failed to cache {}: {}", key, e);
        }
        info!(
            "directory: {} fetched ({} stations)",
            query.describe(),
            stations.len()
        );
        Ok(stations)
    }
}

/// Decode a directory response body; anything but a JSON array is an error.
/// Records that do not decode are skipped, not fatal.
pub fn parse_stations(body: &str) -> Result<Vec<Station>, DirectoryError> {
    let value: serde_json::Value = serde_json::from_str(body)?;
    let serde_json::Value::Array(records) = value else {
        return Err(DirectoryError::NotAnArray);
    };
    let total = records.len();
    let stations: Vec<Station> = records
        .into_iter()
        .enumerate()
        .filter_map(|(i, record)| match serde_json::from_value(record) {
            Ok(station) => Some(station),
            Err(e) => {
                warn!("directory: skipping record {}: {}", i, e);
                None
            }
        })
        .collect();
    if stations.len() < total {
        debug!("directory: {} of {} records decoded", stations.len(), total);
    }
    Ok(stations)
}
