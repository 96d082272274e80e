use crate::core::currency::CurrencyCode;
use crate::core::rates::CachePolicy;
use crate::core::retry::RetryPolicy;
use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

/// Where cached rates live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Process memory, gone when the command exits
    #[default]
    Memory,
    /// Embedded key/value store under the data directory
    Disk,
    /// HTTP key/value cache server shared between processes
    Remote,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: Backend,
    pub ttl_secs: u64,
    pub max_stale_secs: u64,
    pub wait_timeout_secs: Option<u64>,
    pub url: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            backend: Backend::Memory,
            ttl_secs: 300,
            max_stale_secs: 24 * 60 * 60,
            wait_timeout_secs: None,
            url: "http://127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RetryConfig {
    pub retries: usize,
    pub delay_ms: u64,
    pub backoff: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            retries: 3,
            delay_ms: 500,
            backoff: 2,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FrankfurterProviderConfig {
    pub base_url: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub frankfurter: Option<FrankfurterProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            frankfurter: Some(FrankfurterProviderConfig {
                base_url: "https://api.frankfurter.app".to_string(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    /// Quote currency used when the input names only one currency
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub allow_negative: bool,
    #[serde(default)]
    pub data_path: Option<String>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            currency: default_currency(),
            precision: None,
            allow_negative: false,
            data_path: None,
            cache: CacheConfig::default(),
            retry: RetryConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(
                "No config at {}, using built-in defaults",
                config_path.display()
            );
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    /// Loads from `path` when given, which must exist, else from the default location.
    pub fn load_or_default(path: Option<&str>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "curconv", "curconv")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("org", "curconv", "curconv")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn default_quote(&self) -> Result<CurrencyCode> {
        self.currency
            .parse()
            .with_context(|| format!("Invalid default currency in config: {}", self.currency))
    }

    pub fn frankfurter_url(&self) -> &str {
        self.providers
            .frankfurter
            .as_ref()
            .map_or("https://api.frankfurter.app", |p| &p.base_url)
    }

    /// Builds the cache policy handed to the rate cache.
    pub fn policy(&self) -> Result<CachePolicy> {
        if self.cache.ttl_secs == 0 {
            bail!("cache.ttl_secs must be greater than zero");
        }
        Ok(CachePolicy {
            ttl: Duration::from_secs(self.cache.ttl_secs),
            max_stale: Duration::from_secs(self.cache.max_stale_secs),
            retry: RetryPolicy {
                retries: self.retry.retries,
                delay: Duration::from_millis(self.retry.delay_ms),
                backoff: self.retry.backoff,
            },
            wait_timeout: self.cache.wait_timeout_secs.map(Duration::from_secs),
        })
    }
}
