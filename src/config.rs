//! read client configuration from a file, the environment, or explicit values

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;

use crate::errors::Error;
use crate::store::{FileTokenStore, MemoryTokenStore, TokenStore};

const DEFAULT_REFRESH_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_USER_AGENT: &str = "marketplace-session/0.1.0";

#[derive(Clone, Debug, serde::Deserialize)]
pub struct Config {
    pub base_url: String,
    #[serde(default)]
    pub token_store_path: Option<PathBuf>,
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,
    #[serde(default = "default_refresh_timeout_ms")]
    pub refresh_timeout_ms: u64,
    #[serde(default)]
    pub user_agent: Option<String>,
}

fn default_refresh_timeout_ms() -> u64 {
    DEFAULT_REFRESH_TIMEOUT_MS
}

impl Config {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        Ok(config)
    }

    /// # ENV Vars
    /// * `MARKETPLACE_API_URL` - base address of the marketplace API (required)
    /// * `MARKETPLACE_TOKEN_STORE` - path of the persisted token file
    /// * `MARKETPLACE_REQUEST_TIMEOUT_MS` - per-request timeout
    /// * `MARKETPLACE_REFRESH_TIMEOUT_MS` - bound on the refresh-token exchange
    /// * `MARKETPLACE_USER_AGENT` - overrides the default User-Agent
    pub fn from_env() -> Result<Self, Error> {
        let base_url = std::env::var("MARKETPLACE_API_URL")
            .map_err(|_| Error::Config("Missing MARKETPLACE_API_URL env var".to_string()))?;
        let token_store_path = std::env::var("MARKETPLACE_TOKEN_STORE")
            .ok()
            .map(PathBuf::from);
        let request_timeout_ms = parse_env_millis("MARKETPLACE_REQUEST_TIMEOUT_MS")?;
        let refresh_timeout_ms = parse_env_millis("MARKETPLACE_REFRESH_TIMEOUT_MS")?
            .unwrap_or(DEFAULT_REFRESH_TIMEOUT_MS);
        Ok(Config {
            base_url,
            token_store_path,
            request_timeout_ms,
            refresh_timeout_ms,
            user_agent: std::env::var("MARKETPLACE_USER_AGENT").ok(),
        })
    }

    pub fn from_values(
        base_url: impl Into<String>,
        token_store_path: Option<PathBuf>,
        request_timeout_ms: Option<u64>,
        refresh_timeout_ms: Option<u64>,
        user_agent: Option<String>,
    ) -> Self {
        Config {
            base_url: base_url.into(),
            token_store_path,
            request_timeout_ms,
            refresh_timeout_ms: refresh_timeout_ms.unwrap_or(DEFAULT_REFRESH_TIMEOUT_MS),
            user_agent,
        }
    }

    /// Validated base address; a bare host gets `https://` prepended.
    pub fn base_url(&self) -> Result<Url, Error> {
        let raw = self.base_url.trim().trim_end_matches('/');
        if raw.is_empty() {
            return Err(Error::Config("base_url must not be empty".to_string()));
        }
        let candidate = if raw.starts_with("http://") || raw.starts_with("https://") {
            raw.to_string()
        } else {
            format!("https://{raw}")
        };
        Url::parse(&candidate)
            .map_err(|e| Error::Config(format!("Invalid base URL '{}': {}", candidate, e)))
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }

    /// Opens the durable store when a path is configured, otherwise an in-memory one.
    pub fn open_store(&self) -> Result<Arc<dyn TokenStore>, Error> {
        match &self.token_store_path {
            Some(path) => Ok(Arc::new(FileTokenStore::open(path)?)),
            None => Ok(Arc::new(MemoryTokenStore::new())),
        }
    }

    pub(crate) fn http_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder().user_agent(self.user_agent());
        if let Some(timeout) = self.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(builder.build()?)
    }
}

fn parse_env_millis(name: &str) -> Result<Option<u64>, Error> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{name} must be an integer number of milliseconds"))),
        Err(_) => Ok(None),
    }
}
