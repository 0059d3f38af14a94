use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://hacker-news.firebaseio.com/v0";
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Settings supplied when a client is constructed
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub max_concurrent_requests: usize,
    pub timeout: Duration,
    pub user_agent: String,
    /// No cache is opened when this is `None`
    pub cache_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: concat!("hacker_news_tree/", env!("CARGO_PKG_VERSION")).to_string(),
            cache_path: None,
        }
    }
}

impl ClientConfig {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Capacity of the shared request limiter, never below 1
    pub fn max_concurrent_requests(mut self, limit: usize) -> Self {
        self.max_concurrent_requests = limit.max(1);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_path = Some(path.into());
        self
    }

    /// `~/.hn_reader/hn_cache.sqlite3`
    pub fn default_cache_path() -> Result<PathBuf> {
        let home_dir = dirs_next::home_dir()
            .ok_or_else(|| Error::Cache("could not find home directory".to_string()))?;
        Ok(home_dir.join(".hn_reader").join("hn_cache.sqlite3"))
    }

    pub(crate) fn top_stories_url(&self) -> String {
        format!("{}/topstories.json", self.base_url)
    }

    pub(crate) fn item_url(&self, id: i64) -> String {
        format!("{}/item/{}.json", self.base_url, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_public_api() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.max_concurrent_requests, 5);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.cache_path.is_none());
    }

    #[test]
    fn builds_endpoint_urls_without_double_slash() {
        let config = ClientConfig::default().base_url("http://localhost:8080/v0/");
        assert_eq!(config.top_stories_url(), "http://localhost:8080/v0/topstories.json");
        assert_eq!(config.item_url(42), "http://localhost:8080/v0/item/42.json");
    }

    #[test]
    fn concurrency_is_clamped_to_one() {
        let config = ClientConfig::default().max_concurrent_requests(0);
        assert_eq!(config.max_concurrent_requests, 1);
    }
}
