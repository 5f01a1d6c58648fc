//! Configuration loading for muninnd.
//!
//! Configuration is loaded from TOML files with the following resolution order:
//! 1. `--config <path>` (CLI flag)
//! 2. `~/.muninn/config.toml` (user)
//! 3. `/etc/muninn/config.toml` (system)
//!
//! Durations are plain integer-second fields (`*_secs`) with accessor
//! methods returning [`Duration`].

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{ProxyError, Result};

/// Top-level proxy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address the proxy listens on (default: 0.0.0.0:8080).
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Configured upstream products. At least one is required.
    #[serde(default)]
    pub upstreams: Vec<UpstreamConfig>,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

fn default_listen() -> String {
    "0.0.0.0:8080".to_string()
}

/// Cache lifetime and controller cadence.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Freshness lifetime of a cached entry in seconds (default: 6h).
    #[serde(default = "default_lifetime_secs")]
    pub default_lifetime_secs: u64,
    /// Inactivity horizon after which an entry is evicted (default: 24h).
    /// Independent of the freshness lifetime and much larger.
    #[serde(default = "default_evict_after_secs")]
    pub evict_after_secs: u64,
    /// Tick interval of the refresh and cleanup controllers (default: 5m).
    #[serde(default = "default_controller_cycle_secs")]
    pub controller_cycle_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            default_lifetime_secs: default_lifetime_secs(),
            evict_after_secs: default_evict_after_secs(),
            controller_cycle_secs: default_controller_cycle_secs(),
        }
    }
}

impl CacheConfig {
    /// Freshness lifetime as a [`Duration`].
    pub fn default_lifetime(&self) -> Duration {
        Duration::from_secs(self.default_lifetime_secs)
    }

    /// Eviction horizon as a [`Duration`].
    pub fn evict_after(&self) -> Duration {
        Duration::from_secs(self.evict_after_secs)
    }

    /// Controller tick interval as a [`Duration`].
    pub fn controller_cycle(&self) -> Duration {
        Duration::from_secs(self.controller_cycle_secs)
    }
}

fn default_lifetime_secs() -> u64 {
    6 * 60 * 60
}

fn default_evict_after_secs() -> u64 {
    24 * 60 * 60
}

fn default_controller_cycle_secs() -> u64 {
    5 * 60
}

/// One upstream update-graph endpoint ("product").
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    /// Metrics label for this product. Defaults to the path without
    /// its leading slash.
    #[serde(default)]
    pub name: Option<String>,
    /// Path prefix this product is served under (e.g. "/ocp").
    pub path: String,
    /// Upstream update-graph URL.
    pub endpoint: String,
    /// Skip TLS certificate verification for this upstream only.
    #[serde(default)]
    pub insecure: bool,
    /// Per-request timeout in seconds (default: 30).
    #[serde(default = "default_upstream_timeout_secs")]
    pub timeout_secs: u64,
}

impl UpstreamConfig {
    /// The product label used in logs and metrics.
    pub fn label(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => self.path.trim_start_matches('/'),
        }
    }

    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_upstream_timeout_secs() -> u64 {
    30
}

/// Liveness probing configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
    /// Whether the probe loop and liveness endpoint are active (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Path the liveness endpoint is served under (default: "/healthz").
    #[serde(default = "default_health_path")]
    pub path: String,
    /// Dedicated probe URL. Empty/absent means the first upstream
    /// endpoint is probed instead.
    #[serde(default)]
    pub url: Option<String>,
    /// Skip TLS certificate verification for the probe client only.
    #[serde(default)]
    pub insecure: bool,
    /// Coarse probing interval in seconds (default: 60).
    #[serde(default = "default_health_interval_secs")]
    pub interval_secs: u64,
    /// Consecutive probe failures required to report degraded (default: 3).
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Probe timeout in seconds (default: 10).
    #[serde(default = "default_health_timeout_secs")]
    pub timeout_secs: u64,
    /// Tight retry interval during a failure streak in seconds (default: 10).
    #[serde(default = "default_retry_interval_secs")]
    pub retry_interval_secs: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: default_health_path(),
            url: None,
            insecure: false,
            interval_secs: default_health_interval_secs(),
            failure_threshold: default_failure_threshold(),
            timeout_secs: default_health_timeout_secs(),
            retry_interval_secs: default_retry_interval_secs(),
        }
    }
}

impl HealthConfig {
    /// Coarse probing interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Probe timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Failure-streak retry interval as a [`Duration`].
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }
}

fn default_true() -> bool {
    true
}

fn default_health_path() -> String {
    "/healthz".to_string()
}

fn default_health_interval_secs() -> u64 {
    60
}

fn default_failure_threshold() -> u32 {
    3
}

fn default_health_timeout_secs() -> u64 {
    10
}

fn default_retry_interval_secs() -> u64 {
    10
}

/// Metrics exposition configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    /// Whether the prometheus exporter is installed (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Address the exporter listens on (default: 127.0.0.1:9100).
    #[serde(default = "default_metrics_listen")]
    pub listen: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: default_metrics_listen(),
        }
    }
}

fn default_metrics_listen() -> String {
    "127.0.0.1:9100".to_string()
}

impl Config {
    /// Load configuration from the standard locations.
    ///
    /// Resolution order:
    /// 1. Explicit path (if provided)
    /// 2. `~/.muninn/config.toml`
    /// 3. `/etc/muninn/config.toml`
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = Self::resolve_config_path(explicit_path)?;
        let content = fs::read_to_string(&path).map_err(|e| {
            ProxyError::Configuration(format!("Failed to read config file {path:?}: {e}"))
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            ProxyError::Configuration(format!("Failed to parse config file {path:?}: {e}"))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config file path.
    fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
        if let Some(path) = explicit {
            if path.exists() {
                return Ok(path.to_path_buf());
            }
            return Err(ProxyError::Configuration(format!(
                "Config file not found: {path:?}"
            )));
        }

        // User config
        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".muninn").join("config.toml");
            if user_config.exists() {
                return Ok(user_config);
            }
        }

        // System config
        let system_config = PathBuf::from("/etc/muninn/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }

        Err(ProxyError::Configuration(
            "No config file found. Create ~/.muninn/config.toml or /etc/muninn/config.toml"
                .to_string(),
        ))
    }

    /// Check cross-field consistency: at least one upstream, well-formed
    /// non-colliding paths.
    pub fn validate(&self) -> Result<()> {
        if self.listen.is_empty() {
            return Err(ProxyError::Configuration(
                "listen address must not be empty".to_string(),
            ));
        }

        if self.upstreams.is_empty() {
            return Err(ProxyError::Configuration(
                "cannot find any upstream endpoint".to_string(),
            ));
        }

        if self.health.enabled && !self.health.path.starts_with('/') {
            return Err(ProxyError::Configuration(format!(
                "health path {:?} must start with '/'",
                self.health.path
            )));
        }

        for upstream in &self.upstreams {
            if !upstream.path.starts_with('/') || upstream.path.len() < 2 {
                return Err(ProxyError::Configuration(format!(
                    "upstream path {:?} must start with '/' and must not be empty",
                    upstream.path
                )));
            }
            if upstream.endpoint.is_empty() {
                return Err(ProxyError::Configuration(format!(
                    "upstream {:?} has no endpoint",
                    upstream.label()
                )));
            }
        }

        for (i, upstream) in self.upstreams.iter().enumerate() {
            let path = upstream.path.to_lowercase();
            for inner in self.upstreams.iter().skip(i + 1) {
                if path == inner.path.to_lowercase() {
                    return Err(ProxyError::Configuration(format!(
                        "duplicate upstream path {:?}",
                        upstream.path
                    )));
                }
            }
            if self.health.enabled && path == self.health.path.to_lowercase() {
                return Err(ProxyError::Configuration(format!(
                    "upstream path {:?} collides with the health path",
                    upstream.path
                )));
            }
        }

        Ok(())
    }
}
