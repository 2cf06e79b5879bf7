//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// SECURITY: When enabled, ensure this endpoint is network-restricted
    /// to authorized Prometheus scraper IPs only at the infrastructure level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// Post store backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StoreConfig {
    /// In-memory store (recommended for testing and single-node development).
    Memory,
    /// Redis-backed store.
    Redis {
        /// Connection URL (e.g., "redis://127.0.0.1:6379/0").
        url: String,
        /// Optional prefix prepended to every key.
        prefix: Option<String>,
        /// Per-operation timeout in seconds.
        #[serde(default = "default_op_timeout_secs")]
        op_timeout_secs: u64,
    },
}

fn default_op_timeout_secs() -> u64 {
    5
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::Memory
    }
}

impl StoreConfig {
    /// Validate store configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StoreConfig::Memory => Ok(()),
            StoreConfig::Redis {
                url,
                op_timeout_secs,
                ..
            } => {
                if url.is_empty() {
                    return Err("redis config requires a non-empty 'url'".to_string());
                }
                if *op_timeout_secs == 0 {
                    return Err("store.op_timeout_secs cannot be 0".to_string());
                }
                Ok(())
            }
        }
    }
}

/// Board policy configuration: lifetimes, thresholds and page limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BoardConfig {
    /// Initial post lifetime in seconds.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: u64,
    /// Lifetime added when a recommendation crosses an extension threshold.
    #[serde(default = "default_extension_ttl_secs")]
    pub extension_ttl_secs: u64,
    /// A post's lifetime is extended at every exact multiple of this
    /// recommendation count.
    #[serde(default = "default_extension_threshold")]
    pub extension_threshold: u64,
    /// Reports at or above this count blind the post.
    #[serde(default = "default_blind_threshold")]
    pub blind_threshold: u64,
    /// Upper bound on the page size clients may request.
    #[serde(default = "default_page_size_cap")]
    pub page_size_cap: u64,
    /// Page size used when the client does not specify one.
    #[serde(default = "default_page_size")]
    pub default_page_size: u64,
    /// Upper bound on the ranking limit clients may request.
    #[serde(default = "default_ranking_limit_cap")]
    pub ranking_limit_cap: u64,
    /// Ranking limit used when the client does not specify one.
    #[serde(default = "default_ranking_limit")]
    pub default_ranking_limit: u64,
}

fn default_ttl_secs() -> u64 {
    600 // 10 minutes
}

fn default_extension_ttl_secs() -> u64 {
    300 // 5 minutes
}

fn default_extension_threshold() -> u64 {
    100
}

fn default_blind_threshold() -> u64 {
    50
}

fn default_page_size_cap() -> u64 {
    100
}

fn default_page_size() -> u64 {
    20
}

fn default_ranking_limit_cap() -> u64 {
    50
}

fn default_ranking_limit() -> u64 {
    10
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: default_ttl_secs(),
            extension_ttl_secs: default_extension_ttl_secs(),
            extension_threshold: default_extension_threshold(),
            blind_threshold: default_blind_threshold(),
            page_size_cap: default_page_size_cap(),
            default_page_size: default_page_size(),
            ranking_limit_cap: default_ranking_limit_cap(),
            default_ranking_limit: default_ranking_limit(),
        }
    }
}

impl BoardConfig {
    /// Get the initial lifetime as a Duration.
    pub fn default_lifetime(&self) -> Duration {
        // Saturate at i64::MAX to prevent overflow wrapping to negative
        let secs = i64::try_from(self.default_ttl_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs)
    }

    /// Get the extension amount as a Duration.
    pub fn extension(&self) -> Duration {
        let secs = i64::try_from(self.extension_ttl_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs)
    }

    /// Validate board configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.default_ttl_secs == 0 {
            return Err("board.default_ttl_secs cannot be 0".to_string());
        }
        if self.extension_ttl_secs == 0 {
            return Err("board.extension_ttl_secs cannot be 0".to_string());
        }
        if self.extension_threshold == 0 {
            return Err("board.extension_threshold cannot be 0".to_string());
        }
        if self.blind_threshold == 0 {
            return Err("board.blind_threshold cannot be 0".to_string());
        }
        if self.page_size_cap == 0 || self.default_page_size == 0 {
            return Err("board page sizes cannot be 0".to_string());
        }
        if self.default_page_size > self.page_size_cap {
            return Err(format!(
                "board.default_page_size {} exceeds page_size_cap {}",
                self.default_page_size, self.page_size_cap
            ));
        }
        if self.ranking_limit_cap == 0 || self.default_ranking_limit == 0 {
            return Err("board ranking limits cannot be 0".to_string());
        }
        if self.default_ranking_limit > self.ranking_limit_cap {
            return Err(format!(
                "board.default_ranking_limit {} exceeds ranking_limit_cap {}",
                self.default_ranking_limit, self.ranking_limit_cap
            ));
        }
        if self.default_ttl_secs > i64::MAX as u64 || self.extension_ttl_secs > i64::MAX as u64 {
            return Err("board lifetime seconds exceed maximum value (would overflow)".to_string());
        }
        Ok(())
    }
}

/// Expiry sweeper configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Enable the background sweeper (default: true).
    #[serde(default = "default_sweep_enabled")]
    pub enabled: bool,
    /// Interval in seconds between sweeps.
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,
}

fn default_sweep_enabled() -> bool {
    true
}

fn default_sweep_interval_secs() -> u64 {
    30
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            enabled: default_sweep_enabled(),
            interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl SweepConfig {
    /// Get the sweep interval as a std::time::Duration.
    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs)
    }

    /// Validate sweeper configuration for dangerous settings.
    pub fn validate(&self) -> Result<(), String> {
        // Zero would cause a panic when creating the tokio interval timer
        if self.enabled && self.interval_secs == 0 {
            return Err("sweep.interval_secs cannot be 0 when the sweeper is enabled".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Post store backend configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Board policy configuration.
    #[serde(default)]
    pub board: BoardConfig,
    /// Expiry sweeper configuration.
    #[serde(default)]
    pub sweep: SweepConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            board: BoardConfig::default(),
            sweep: SweepConfig::default(),
        }
    }
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses the in-memory store.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::Memory,
            board: BoardConfig::default(),
            sweep: SweepConfig::default(),
        }
    }
}
