//! Configuration loading
//!
//! One TOML file with a section per component; every field has a default
//! so an empty file is a valid config. Environment variables prefixed
//! `TOKENPULSE__` override file values.

use crate::error::{BotError, Result};
use serde::Deserialize;

pub use crate::ingester::QueueConfig;
pub use crate::notify::{DeliveryConfig, WebhookConfig};
pub use crate::signals::{CorrelationConfig, KellyConfig, SignalConfig, TrackerConfig};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/tokenpulse.db".to_string(),
        }
    }
}

/// Send-rate gate settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Minimum seconds between any two sends on a channel
    pub min_send_interval_secs: i64,
    /// Minimum seconds between sends for the same token on a channel
    pub token_send_cooldown_secs: i64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            min_send_interval_secs: 5,
            token_send_cooldown_secs: 600,
        }
    }
}

/// Endpoints of the external collaborator services
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    /// Token analysis service base URL
    pub analysis_url: Option<String>,
    /// Market data service base URL
    pub market_data_url: Option<String>,
    /// Rug-model scoring endpoint; the heuristic fallback is used when unset
    pub model_url: Option<String>,
    pub request_timeout_secs: u64,
}

/// Discovery feed polling
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveryConfig {
    pub url: String,
    #[serde(default = "default_discovery_source")]
    pub source: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_discovery_source() -> String {
    "discovery".to_string()
}

fn default_poll_interval() -> u64 {
    15
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub queue: QueueConfig,
    pub signals: SignalConfig,
    pub kelly: KellyConfig,
    pub correlation: CorrelationConfig,
    pub tracker: TrackerConfig,
    pub delivery: DeliveryConfig,
    pub gate: GateConfig,
    pub services: ServicesConfig,
    pub discovery: Option<DiscoveryConfig>,
    /// Endpoints seeded at startup; runtime CRUD and persistence take over
    pub webhooks: Vec<WebhookConfig>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let path = shellexpand::tilde(path).to_string();

        let settings = config::Config::builder()
            .add_source(config::File::from(std::path::PathBuf::from(&path)))
            .add_source(config::Environment::with_prefix("TOKENPULSE").separator("__"))
            .build()
            .map_err(|e| BotError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| BotError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Constructor-time sanity checks; violations are programmer errors,
    /// not runtime conditions.
    pub fn validate(&self) -> Result<()> {
        self.signals.validate()?;
        self.correlation.validate().map_err(BotError::Config)?;
        if self.queue.concurrency == 0 {
            return Err(BotError::Config(
                "queue.concurrency must be at least 1".to_string(),
            ));
        }
        if self.delivery.max_attempts == 0 {
            return Err(BotError::Config(
                "delivery.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            analysis_url: None,
            market_data_url: None,
            model_url: None,
            request_timeout_secs: 15,
        }
    }
}
