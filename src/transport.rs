use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::{Error, Result};

/// Performs one JSON GET against the API
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<Value>;
}

/// HTTP transport; the inner client keeps a connection pool across calls
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout.min(Duration::from_secs(10)))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| Error::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("GET {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Transport(format!("GET {}: HTTP {}", url, status)));
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_decode() {
                Error::Decode(format!("GET {}: {}", url, e))
            } else {
                Error::Transport(format!("GET {}: {}", url, e))
            }
        })
    }
}
