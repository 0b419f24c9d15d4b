//! Rug-probability scoring
//!
//! The trained model runs as an external service; this module only defines
//! the scoring seam and a heuristic fallback derived from contract-safety
//! facts for when no model endpoint is configured.

use crate::error::{BotError, Result};
use crate::types::{MarketSnapshot, TokenAnalysis};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Scorer verdict for a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Avoid,
    Neutral,
    Consider,
}

/// Output of the rug-probability scorer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlScore {
    /// Probability the token is a rug, 0-1
    pub rug_probability: f64,
    /// Scorer's own confidence in the estimate, 0-1
    pub confidence: f64,
    pub recommendation: Recommendation,
}

/// Trait for rug-probability scorers
#[async_trait]
pub trait RugScorer: Send + Sync {
    async fn score(&self, analysis: &TokenAnalysis, market: &MarketSnapshot) -> Result<MlScore>;

    /// Scorer name for logging
    fn name(&self) -> &str;
}

/// Remote model service client
pub struct RemoteScorer {
    http: reqwest::Client,
    url: String,
}

#[derive(Serialize)]
struct ScoreRequest<'a> {
    analysis: &'a TokenAnalysis,
    market: &'a MarketSnapshot,
}

impl RemoteScorer {
    pub fn new(url: String, timeout_secs: u64) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl RugScorer for RemoteScorer {
    async fn score(&self, analysis: &TokenAnalysis, market: &MarketSnapshot) -> Result<MlScore> {
        let resp = self
            .http
            .post(&self.url)
            .json(&ScoreRequest { analysis, market })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(BotError::Api(format!(
                "Model service returned {}",
                resp.status()
            )));
        }

        Ok(resp.json::<MlScore>().await?)
    }

    fn name(&self) -> &str {
        "remote"
    }
}

/// Fallback scorer built from contract-safety facts.
///
/// Starts from a neutral prior and moves it on the strongest public rug
/// indicators: mint/freeze authority, LP burn, and holder concentration.
pub struct HeuristicScorer;

#[async_trait]
impl RugScorer for HeuristicScorer {
    async fn score(&self, analysis: &TokenAnalysis, _market: &MarketSnapshot) -> Result<MlScore> {
        let mut prob: f64 = 0.5;

        if analysis.mint_revoked {
            prob -= 0.15;
        } else {
            prob += 0.20;
        }
        if analysis.freeze_revoked {
            prob -= 0.10;
        } else {
            prob += 0.15;
        }
        // LP burn above 90% is the norm for legitimate launches
        if analysis.lp_burned_percent >= 90.0 {
            prob -= 0.15;
        } else if analysis.lp_burned_percent < 50.0 {
            prob += 0.15;
        }
        if analysis.top10_holder_percent > 50.0 {
            prob += 0.10;
        }

        let rug_probability = prob.clamp(0.0, 1.0);
        let recommendation = if rug_probability >= 0.6 {
            Recommendation::Avoid
        } else if rug_probability <= 0.3 {
            Recommendation::Consider
        } else {
            Recommendation::Neutral
        };

        Ok(MlScore {
            rug_probability,
            // Heuristic estimates are deliberately low-confidence
            confidence: 0.4,
            recommendation,
        })
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}
