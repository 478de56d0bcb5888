//! App config: remote service, cache backend, refresh policy, local author, logging. Loaded from env.

use std::env;
use std::fmt;
use std::str::FromStr;

use anyhow::{Context, Result};
use chat_core::Author;
use remote_client::RemoteConfig;
use sync_engine::RefreshPolicy;

const DEFAULT_DATABASE_URL: &str = "sqlite://./chat_cache.db";
const DEFAULT_LOG_FILE: &str = "logs/chatsync.log";
const DEFAULT_AUTHOR_ID: &str = "local-user";
const DEFAULT_AUTHOR_NAME: &str = "Me";

/// Where the local message cache lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheBackend {
    /// Volatile; gone when the process exits.
    Memory,
    #[default]
    Sqlite,
}

impl fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheBackend::Memory => f.write_str("memory"),
            CacheBackend::Sqlite => f.write_str("sqlite"),
        }
    }
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(CacheBackend::Memory),
            "sqlite" => Ok(CacheBackend::Sqlite),
            other => Err(format!("unknown cache backend: {}", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// CHAT_API_URL, CHAT_API_TOKEN, CHAT_API_TIMEOUT_SECS
    pub remote: RemoteConfig,
    /// CACHE_BACKEND
    pub cache_backend: CacheBackend,
    /// DATABASE_URL (sqlite backend only)
    pub database_url: String,
    /// REFRESH_POLICY
    pub refresh_policy: RefreshPolicy,
    /// AUTHOR_ID / AUTHOR_NAME
    pub author: Author,
    /// LOG_FILE
    pub log_file: String,
}

impl AppConfig {
    /// Load from environment variables. `api_url` and `database_url` override CHAT_API_URL and
    /// DATABASE_URL if provided.
    pub fn load(api_url: Option<String>, database_url: Option<String>) -> Result<Self> {
        let remote = RemoteConfig::from_env(api_url)?;
        let cache_backend = match env::var("CACHE_BACKEND") {
            Ok(s) => s
                .parse::<CacheBackend>()
                .map_err(anyhow::Error::msg)
                .context("Invalid CACHE_BACKEND")?,
            Err(_) => CacheBackend::default(),
        };
        let refresh_policy = match env::var("REFRESH_POLICY") {
            Ok(s) => s
                .parse::<RefreshPolicy>()
                .map_err(anyhow::Error::msg)
                .context("Invalid REFRESH_POLICY")?,
            Err(_) => RefreshPolicy::default(),
        };
        let database_url = database_url
            .or_else(|| env::var("DATABASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let author = Author::new(
            env::var("AUTHOR_ID").unwrap_or_else(|_| DEFAULT_AUTHOR_ID.to_string()),
            env::var("AUTHOR_NAME").unwrap_or_else(|_| DEFAULT_AUTHOR_NAME.to_string()),
        );
        let log_file = env::var("LOG_FILE").unwrap_or_else(|_| DEFAULT_LOG_FILE.to_string());

        Ok(Self {
            remote,
            cache_backend,
            database_url,
            refresh_policy,
            author,
            log_file,
        })
    }

    /// Validate config (API URL, database URL for the sqlite backend, author identity).
    pub fn validate(&self) -> Result<()> {
        self.remote.validate()?;
        if self.cache_backend == CacheBackend::Sqlite && self.database_url.trim().is_empty() {
            anyhow::bail!("DATABASE_URL must not be empty when CACHE_BACKEND=sqlite");
        }
        if self.author.id.trim().is_empty() {
            anyhow::bail!("AUTHOR_ID must not be empty");
        }
        if self.author.is_ai() {
            anyhow::bail!("AUTHOR_ID {} is reserved for AI-authored messages", self.author.id);
        }
        Ok(())
    }
}
