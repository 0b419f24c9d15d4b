//! Kelly-criterion position sizing from realized signal outcomes
//!
//! Kelly = (b*p - q) / b
//! where:
//!   b = win/loss ratio (avg win % over avg |loss| %)
//!   p = probability of winning (historical win rate)
//!   q = probability of losing (1 - p)
//!
//! The optimal fraction is damped by a safety multiplier (half Kelly by
//! default) and optionally by signal confidence, then clamped to the
//! configured position bounds. Anything that makes the estimate
//! unreliable falls back to a zero-size result with a reason instead of
//! erroring.

use crate::types::SignalOutcome;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KellyConfig {
    pub enabled: bool,
    /// Safety multiplier applied to the optimal fraction (0.5 = half Kelly)
    pub fraction: f64,
    /// How many recent recorded trades to look at
    pub lookback_trades: usize,
    /// Minimum recorded trades before Kelly is trusted
    pub min_trades_required: usize,
    /// Minimum historical win rate before Kelly is trusted
    pub min_win_rate: f64,
    pub min_position_percent: f64,
    pub max_position_percent: f64,
    /// Scale the fraction by signal confidence
    pub confidence_adjustment: bool,
}

impl Default for KellyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fraction: 0.5,
            lookback_trades: 50,
            min_trades_required: 20,
            min_win_rate: 0.40,
            min_position_percent: 0.5,
            max_position_percent: 10.0,
            confidence_adjustment: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KellyResult {
    /// Suggested position as percent of bankroll; 0 when Kelly is unused
    pub suggested_position_percent: f64,
    pub optimal_fraction: f64,
    pub adjusted_fraction: f64,
    pub win_rate: f64,
    pub win_loss_ratio: f64,
    pub trades_analyzed: usize,
    pub kelly_used: bool,
    pub fallback_reason: Option<String>,
}

impl KellyResult {
    fn fallback(trades_analyzed: usize, win_rate: f64, reason: impl Into<String>) -> Self {
        Self {
            suggested_position_percent: 0.0,
            optimal_fraction: 0.0,
            adjusted_fraction: 0.0,
            win_rate,
            win_loss_ratio: 0.0,
            trades_analyzed,
            kelly_used: false,
            fallback_reason: Some(reason.into()),
        }
    }
}

pub struct KellyCalculator {
    config: RwLock<KellyConfig>,
}

impl KellyCalculator {
    pub fn new(config: KellyConfig) -> Self {
        Self {
            config: RwLock::new(config),
        }
    }

    pub fn config(&self) -> KellyConfig {
        self.config.read().clone()
    }

    pub fn set_config(&self, config: KellyConfig) {
        *self.config.write() = config;
    }

    /// Compute the optimal position from recorded outcomes. `confidence` is
    /// the candidate signal's 0-100 score, used for the optional damping.
    pub fn calculate(&self, outcomes: &[SignalOutcome], confidence: Option<u8>) -> KellyResult {
        let config = self.config.read().clone();

        if !config.enabled {
            return KellyResult::fallback(0, 0.0, "Kelly sizing disabled");
        }

        // Most recent first, recorded outcomes only
        let mut recorded: Vec<&SignalOutcome> =
            outcomes.iter().filter(|o| o.is_recorded()).collect();
        recorded.sort_by_key(|o| std::cmp::Reverse(o.recorded_at));
        recorded.truncate(config.lookback_trades);

        let total = recorded.len();
        if total < config.min_trades_required {
            return KellyResult::fallback(
                total,
                0.0,
                format!(
                    "Insufficient trade history ({} of {} required)",
                    total, config.min_trades_required
                ),
            );
        }

        let pnls: Vec<f64> = recorded
            .iter()
            .filter_map(|o| o.profit_loss_percent)
            .collect();
        let wins: Vec<f64> = pnls.iter().copied().filter(|p| *p > 0.0).collect();
        let losses: Vec<f64> = pnls.iter().copied().filter(|p| *p < 0.0).collect();

        let win_rate = wins.len() as f64 / total as f64;
        if win_rate < config.min_win_rate {
            return KellyResult::fallback(
                total,
                win_rate,
                format!(
                    "Win rate {:.0}% below minimum {:.0}%",
                    win_rate * 100.0,
                    config.min_win_rate * 100.0
                ),
            );
        }

        let avg_win = mean(&wins);
        let avg_loss = mean(&losses).abs();
        // No recorded losses yet: treat the loss side as 1% so the ratio
        // stays finite
        let win_loss_ratio = if avg_loss > 0.0 {
            avg_win / avg_loss
        } else {
            avg_win.max(1.0)
        };

        if win_loss_ratio <= 0.0 {
            return KellyResult::fallback(total, win_rate, "Non-positive win/loss ratio");
        }

        let p = win_rate;
        let b = win_loss_ratio;
        let optimal_fraction = (b * p - (1.0 - p)) / b;

        if optimal_fraction <= 0.0 {
            return KellyResult::fallback(total, win_rate, "No positive edge in trade history");
        }

        let mut adjusted_fraction = optimal_fraction * config.fraction;
        if config.confidence_adjustment {
            if let Some(conf) = confidence {
                adjusted_fraction *= f64::from(conf) / 100.0;
            }
        }

        let suggested_position_percent = (adjusted_fraction * 100.0)
            .clamp(config.min_position_percent, config.max_position_percent);

        debug!(
            "Kelly: p={:.2} b={:.2} optimal={:.3} adjusted={:.3} -> {:.2}%",
            p, b, optimal_fraction, adjusted_fraction, suggested_position_percent
        );

        KellyResult {
            suggested_position_percent,
            optimal_fraction,
            adjusted_fraction,
            win_rate,
            win_loss_ratio,
            trades_analyzed: total,
            kelly_used: true,
            fallback_reason: None,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}
