//! Discovery-event intake
//!
//! New liquidity pools arrive here from external monitors, either pushed
//! through `QueueProcessor::enqueue` or pulled by the `DiscoveryFeed`
//! poller. The processor dedups, bounds and drains the pending work into
//! the analysis pipeline.

pub mod processor;


pub use processor::{QueueConfig, QueueProcessor, QueueStats, QueueWorker};

use crate::error::Result;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, warn};

/// A freshly discovered pool/token waiting for analysis.
/// Owned by the queue while pending; dropped on dequeue.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub mint: String,
    /// Origin monitor, e.g. "pumpfun" or "raydium"
    pub source: String,
    pub discovered_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn new(mint: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            mint: mint.into(),
            source: source.into(),
            discovered_at: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DiscoveredPool {
    mint: String,
    #[serde(default)]
    source: Option<String>,
}

/// Polls an external discovery endpoint for new pools and enqueues them.
///
/// The chain monitors themselves live in a separate service; this is just
/// the consumer side of their feed.
pub struct DiscoveryFeed {
    http: Client,
    url: String,
    source: String,
    poll_interval: std::time::Duration,
}

impl DiscoveryFeed {
    pub fn new(url: String, source: String, poll_interval_secs: u64) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            url,
            source,
            poll_interval: std::time::Duration::from_secs(poll_interval_secs),
        })
    }

    /// Poll until the processor is stopped
    pub async fn run(&self, processor: Arc<QueueProcessor>) -> Result<()> {
        let mut interval = tokio::time::interval(self.poll_interval);

        loop {
            interval.tick().await;

            if !processor.is_running() {
                debug!("Queue processor stopped, ending discovery poll");
                return Ok(());
            }

            match self.fetch_new_pools().await {
                Ok(pools) => {
                    let mut accepted = 0;
                    for pool in pools {
                        let source = pool.source.unwrap_or_else(|| self.source.clone());
                        if processor.enqueue(QueueItem::new(pool.mint, source)) {
                            accepted += 1;
                        }
                    }
                    if accepted > 0 {
                        debug!("Enqueued {} new pools from discovery feed", accepted);
                    }
                }
                Err(e) => {
                    warn!("Discovery feed poll failed: {}", e);
                }
            }
        }
    }

    async fn fetch_new_pools(&self) -> Result<Vec<DiscoveredPool>> {
        let resp = self.http.get(&self.url).send().await?;
        if !resp.status().is_success() {
            return Err(crate::error::BotError::Api(format!(
                "Discovery feed returned {}",
                resp.status()
            )));
        }
        Ok(resp.json().await?)
    }
}
