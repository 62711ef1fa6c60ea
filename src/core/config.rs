use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const QUOTES: &str = "quotes";
pub const HISTORICAL: &str = "historical";

/// Largest freshness window chrono can represent, in seconds.
pub const MAX_FRESHNESS_WINDOW_SECS: u64 = i64::MAX as u64 / 1_000;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct UpstreamConfig {
    pub base_url: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_read_timeout_ms() -> u64 {
    10_000
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        UpstreamConfig {
            base_url: "http://localhost:7071/api".to_string(),
            connect_timeout_ms: default_connect_timeout_ms(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

impl UpstreamConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    pub freshness_window_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            freshness_window_secs: 3_600,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub capacity: u32,
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            capacity: 60,
            window_ms: 60_000,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Number of most recent calls the failure count is taken over.
    pub window_size: u32,
    /// Failures within the window that open the circuit.
    pub failure_threshold: u32,
    pub cooldown_ms: u64,
    pub half_open_trials: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        BreakerConfig {
            window_size: 10,
            failure_threshold: 5,
            cooldown_ms: 30_000,
            half_open_trials: 1,
        }
    }
}

impl BreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Disk,
    Memory,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BackendConfig {
    pub name: String,
    pub kind: BackendKind,
    /// Directory for disk backends; defaults to `<data dir>/store/<name>`.
    pub path: Option<String>,
}

fn default_backends() -> Vec<BackendConfig> {
    ["primary", "replica"]
        .into_iter()
        .map(|name| BackendConfig {
            name: name.to_string(),
            kind: BackendKind::Disk,
            path: None,
        })
        .collect()
}

fn default_tickers() -> Vec<String> {
    vec!["SPY".to_string(), "ES=F".to_string()]
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub rate_limits: BTreeMap<String, RateLimitConfig>,
    #[serde(default)]
    pub circuit_breakers: BTreeMap<String, BreakerConfig>,
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendConfig>,
    #[serde(default = "default_tickers")]
    pub tickers: Vec<String>,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            upstream: UpstreamConfig::default(),
            cache: CacheConfig::default(),
            rate_limits: BTreeMap::new(),
            circuit_breakers: BTreeMap::new(),
            backends: default_backends(),
            tickers: default_tickers(),
            data_path: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("dev", "marketgate", "marketgate")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("dev", "marketgate", "marketgate")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache.freshness_window_secs > MAX_FRESHNESS_WINDOW_SECS {
            bail!(
                "freshness window of {}s exceeds the maximum of {MAX_FRESHNESS_WINDOW_SECS}s",
                self.cache.freshness_window_secs
            );
        }
        if self.backends.is_empty() {
            bail!("at least one storage backend must be configured");
        }
        let mut names = HashSet::new();
        for backend in &self.backends {
            if !names.insert(backend.name.as_str()) {
                bail!("duplicate storage backend name: {}", backend.name);
            }
        }
        for (name, limit) in &self.rate_limits {
            if limit.capacity == 0 || limit.window_ms == 0 {
                bail!("rate limit '{name}' needs a capacity and window above zero");
            }
        }
        for (name, breaker) in &self.circuit_breakers {
            if breaker.failure_threshold == 0 || breaker.half_open_trials == 0 {
                bail!("circuit '{name}' needs a failure threshold and trial count above zero");
            }
            if breaker.window_size < breaker.failure_threshold {
                bail!("circuit '{name}' window size is smaller than its failure threshold");
            }
        }
        Ok(())
    }

    pub fn rate_limit(&self, name: &str) -> RateLimitConfig {
        self.rate_limits.get(name).copied().unwrap_or_default()
    }

    pub fn breaker(&self, name: &str) -> BreakerConfig {
        self.circuit_breakers.get(name).copied().unwrap_or_default()
    }

    /// Saturates at the largest representable window.
    pub fn freshness_window(&self) -> chrono::Duration {
        i64::try_from(self.cache.freshness_window_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}
