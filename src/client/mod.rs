//! Clients for the external analysis and market-data services
//!
//! Enrichment (liquidity, holders, contract, social) and price data are
//! produced by separate services; this module consumes them over narrow
//! HTTP interfaces and exposes the traits the rest of the pipeline uses.

use crate::error::{BotError, Result};
use crate::types::{MarketSnapshot, TokenAnalysis};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

/// Enrichment collaborator: full token analysis or a not-found indication
#[async_trait]
pub trait TokenAnalyzer: Send + Sync {
    async fn analyze(&self, mint: &str) -> Result<Option<TokenAnalysis>>;
}

/// Market-data collaborator: current price and short-window changes/volumes
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn snapshot(&self, mint: &str) -> Result<Option<MarketSnapshot>>;
}

/// HTTP client for the analysis service
#[derive(Clone)]
pub struct AnalysisClient {
    http: Client,
    base_url: String,
}

impl AnalysisClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl TokenAnalyzer for AnalysisClient {
    async fn analyze(&self, mint: &str) -> Result<Option<TokenAnalysis>> {
        let url = format!("{}/tokens/{}/analysis", self.base_url, mint);
        let resp = self.http.get(&url).send().await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            debug!("No analysis available for {}", mint);
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(BotError::Api(format!(
                "Analysis service returned {} for {}",
                resp.status(),
                mint
            )));
        }

        Ok(Some(resp.json::<TokenAnalysis>().await?))
    }
}

/// HTTP client for the market-data service
#[derive(Clone)]
pub struct MarketDataClient {
    http: Client,
    base_url: String,
}

impl MarketDataClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl MarketDataProvider for MarketDataClient {
    async fn snapshot(&self, mint: &str) -> Result<Option<MarketSnapshot>> {
        let url = format!("{}/tokens/{}/market", self.base_url, mint);
        let resp = self.http.get(&url).send().await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(BotError::Api(format!(
                "Market-data service returned {} for {}",
                resp.status(),
                mint
            )));
        }

        Ok(Some(resp.json::<MarketSnapshot>().await?))
    }
}
