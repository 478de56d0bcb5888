//! Remote service configuration loaded from environment variables.

use anyhow::{Context, Result};
use std::env;

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Connection settings for [`HttpRemoteChatService`](crate::HttpRemoteChatService).
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    /// CHAT_API_URL
    pub base_url: String,
    /// CHAT_API_TOKEN (sent as a bearer token when set)
    pub api_token: Option<String>,
    /// CHAT_API_TIMEOUT_SECS
    pub timeout_secs: u64,
}

impl RemoteConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Load from environment variables. `base_url` overrides CHAT_API_URL if provided.
    pub fn from_env(base_url: Option<String>) -> Result<Self> {
        let base_url = match base_url {
            Some(url) => url,
            None => env::var("CHAT_API_URL").context("CHAT_API_URL not set")?,
        };
        let api_token = env::var("CHAT_API_TOKEN")
            .ok()
            .filter(|s| !s.trim().is_empty());
        let timeout_secs = env::var("CHAT_API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        Ok(Self {
            base_url,
            api_token,
            timeout_secs,
        })
    }

    /// Validate config (base URL must parse as an absolute http(s) URL).
    pub fn validate(&self) -> Result<()> {
        let url = reqwest::Url::parse(&self.base_url)
            .with_context(|| format!("CHAT_API_URL is not a valid URL: {}", self.base_url))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            anyhow::bail!("CHAT_API_URL must use http or https: {}", self.base_url);
        }
        Ok(())
    }
}
