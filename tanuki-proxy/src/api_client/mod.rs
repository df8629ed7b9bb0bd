//! Client for the management API.
//!
//! Used by the CLI binary; the types module defines the wire contract
//! shared with the server side.

pub mod types;

pub use types::{ProxyState, RoundState, UpstreamState};

use crate::error::Result;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:7785";

pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(base_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn health(&self) -> Result<String> {
        let text = self
            .http
            .get(format!("{}/v0/health", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(text)
    }

    pub async fn get_proxy(&self) -> Result<ProxyState> {
        let state = self
            .http
            .get(format!("{}/v0/proxy", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(state)
    }

    pub async fn get_upstreams(&self) -> Result<Vec<UpstreamState>> {
        let upstreams = self
            .http
            .get(format!("{}/v0/upstreams", self.base_url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(upstreams)
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}
