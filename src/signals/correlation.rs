//! Pairwise correlation between a candidate and the active signal set
//!
//! Over-concentrated exposure (five near-identical memecoins pumping off
//! the same narrative) is the main way a signal book blows up. Each new
//! candidate is compared against every active signal across four factors;
//! pairs scoring past the threshold are recorded, and enough of them
//! blocks the signal outright.

use crate::types::TradingSignal;
use parking_lot::{Mutex, RwLock};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use uuid::Uuid;

/// Points of stored price history kept per token
const PRICE_HISTORY_CAP: usize = 50;
/// Minimum overlapping points before Pearson is meaningful
const MIN_HISTORY_POINTS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Factor weights; must sum to 1.0
    pub price_weight: f64,
    pub liquidity_weight: f64,
    pub holder_weight: f64,
    pub risk_weight: f64,
    /// Pairwise score at or above which a pair counts as correlated
    pub correlation_threshold: f64,
    /// Correlated pairs at or above which the candidate is blocked.
    /// 0 disables blocking (warn-only).
    pub max_correlated_signals: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            price_weight: 0.40,
            liquidity_weight: 0.20,
            holder_weight: 0.20,
            risk_weight: 0.20,
            correlation_threshold: 0.70,
            max_correlated_signals: 3,
        }
    }
}

impl CorrelationConfig {
    pub fn validate(&self) -> Result<(), String> {
        let sum = self.price_weight + self.liquidity_weight + self.holder_weight + self.risk_weight;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(format!("correlation factor weights sum to {sum}, expected 1.0"));
        }
        if !(0.0..=1.0).contains(&self.correlation_threshold) {
            return Err("correlation_threshold must be within [0, 1]".to_string());
        }
        Ok(())
    }
}

/// One active signal the candidate correlates with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelatedSignal {
    pub signal_id: Uuid,
    pub symbol: String,
    pub score: f64,
    /// Factors that individually crossed the threshold
    pub factors: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CorrelationResult {
    pub is_correlated: bool,
    pub should_block: bool,
    pub correlated: Vec<CorrelatedSignal>,
}

/// Token facts the analyzer compares. Built from a candidate's input or an
/// active signal's stored snapshot.
#[derive(Debug, Clone)]
pub struct TokenProfile {
    pub mint: String,
    pub symbol: String,
    pub risk_score: f64,
    pub momentum_score: f64,
    pub price_change_1h: f64,
    pub liquidity_usd: f64,
    pub holder_count: u64,
    pub top10_holder_percent: f64,
}

impl TokenProfile {
    pub fn from_signal(signal: &TradingSignal) -> Self {
        Self {
            mint: signal.mint.clone(),
            symbol: signal.symbol.clone(),
            risk_score: signal.risk_score,
            momentum_score: signal.momentum_score,
            price_change_1h: signal.price_change_1h,
            liquidity_usd: signal.liquidity_usd.to_f64().unwrap_or(0.0),
            holder_count: signal.holder_count,
            top10_holder_percent: signal.top10_holder_percent,
        }
    }
}

pub struct CorrelationAnalyzer {
    config: RwLock<CorrelationConfig>,
    /// mint -> recent prices, newest last
    history: Mutex<HashMap<String, VecDeque<f64>>>,
}

impl CorrelationAnalyzer {
    pub fn new(config: CorrelationConfig) -> Self {
        Self {
            config: RwLock::new(config),
            history: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> CorrelationConfig {
        self.config.read().clone()
    }

    pub fn set_config(&self, config: CorrelationConfig) {
        *self.config.write() = config;
    }

    /// Append a price observation for a token
    pub fn record_price(&self, mint: &str, price: f64) {
        let mut history = self.history.lock();
        let series = history.entry(mint.to_string()).or_default();
        series.push_back(price);
        while series.len() > PRICE_HISTORY_CAP {
            series.pop_front();
        }
    }

    /// Compare a candidate against the active signals
    pub fn analyze(
        &self,
        candidate: &TokenProfile,
        active: &[TradingSignal],
    ) -> CorrelationResult {
        let config = self.config.read().clone();
        let mut correlated = Vec::new();

        for signal in active {
            if signal.mint == candidate.mint {
                continue;
            }
            let other = TokenProfile::from_signal(signal);
            let (score, factors) = self.pair_score(candidate, &other, &config);
            if score >= config.correlation_threshold {
                correlated.push(CorrelatedSignal {
                    signal_id: signal.id,
                    symbol: signal.symbol.clone(),
                    score,
                    factors,
                });
            }
        }

        let should_block = config.max_correlated_signals > 0
            && correlated.len() >= config.max_correlated_signals;

        CorrelationResult {
            is_correlated: !correlated.is_empty(),
            should_block,
            correlated,
        }
    }

    /// Portfolio-wide diversification: 100 x (1 - mean pairwise score) over
    /// all active-signal pairs. 100 when under two signals are active.
    pub fn diversification_score(&self, active: &[TradingSignal]) -> f64 {
        if active.len() < 2 {
            return 100.0;
        }
        let config = self.config.read().clone();
        let profiles: Vec<TokenProfile> =
            active.iter().map(TokenProfile::from_signal).collect();

        let mut total = 0.0;
        let mut pairs = 0usize;
        for i in 0..profiles.len() {
            for j in (i + 1)..profiles.len() {
                let (score, _) = self.pair_score(&profiles[i], &profiles[j], &config);
                total += score;
                pairs += 1;
            }
        }
        100.0 * (1.0 - total / pairs as f64)
    }

    fn pair_score(
        &self,
        a: &TokenProfile,
        b: &TokenProfile,
        config: &CorrelationConfig,
    ) -> (f64, Vec<String>) {
        let price = self.price_similarity(a, b);
        let liquidity = liquidity_similarity(a.liquidity_usd, b.liquidity_usd);
        let holder = holder_similarity(a, b);
        let risk = risk_similarity(a.risk_score, b.risk_score);

        let score = price * config.price_weight
            + liquidity * config.liquidity_weight
            + holder * config.holder_weight
            + risk * config.risk_weight;

        let mut factors = Vec::new();
        for (name, value) in [
            ("price_movement", price),
            ("liquidity", liquidity),
            ("holders", holder),
            ("risk", risk),
        ] {
            if value >= config.correlation_threshold {
                factors.push(name.to_string());
            }
        }

        (score.clamp(0.0, 1.0), factors)
    }

    /// Pearson over stored history when both tokens have enough points;
    /// otherwise a same-direction/magnitude blend of the 1h change; if
    /// neither token has moved, momentum-score similarity.
    fn price_similarity(&self, a: &TokenProfile, b: &TokenProfile) -> f64 {
        {
            let history = self.history.lock();
            if let (Some(sa), Some(sb)) = (history.get(&a.mint), history.get(&b.mint)) {
                if let Some(r) = pearson(sa, sb) {
                    // Only positive co-movement concentrates exposure
                    return r.max(0.0);
                }
            }
        }

        let ca = a.price_change_1h;
        let cb = b.price_change_1h;
        if ca.abs() < f64::EPSILON && cb.abs() < f64::EPSILON {
            return 1.0 - (a.momentum_score - b.momentum_score).abs();
        }

        let magnitude = 1.0 - ((ca - cb).abs() / 50.0).min(1.0);
        if ca.signum() == cb.signum() {
            0.4 + 0.6 * magnitude
        } else {
            0.2 * magnitude
        }
    }
}

/// Decay over the ratio of the larger to the smaller liquidity; a 10x gap
/// counts as fully dissimilar.
fn liquidity_similarity(a: f64, b: f64) -> f64 {
    if a <= 0.0 || b <= 0.0 {
        return if a == b { 1.0 } else { 0.0 };
    }
    let ratio = a.max(b) / a.min(b);
    (1.0 - (ratio - 1.0) / 10.0).clamp(0.0, 1.0)
}

/// Holder-base shape: log-scale count difference blended with top-10
/// concentration difference (30-point tolerance).
fn holder_similarity(a: &TokenProfile, b: &TokenProfile) -> f64 {
    let count_a = (a.holder_count.max(1) as f64).log10();
    let count_b = (b.holder_count.max(1) as f64).log10();
    let count_sim = (1.0 - (count_a - count_b).abs() / 2.0).clamp(0.0, 1.0);

    let conc_sim =
        (1.0 - (a.top10_holder_percent - b.top10_holder_percent).abs() / 30.0).clamp(0.0, 1.0);

    (count_sim + conc_sim) / 2.0
}

/// 30-point tolerance window on the 0-100 safety score
fn risk_similarity(a: f64, b: f64) -> f64 {
    (1.0 - (a - b).abs() / 30.0).clamp(0.0, 1.0)
}

/// Pearson coefficient over the overlapping tail of two series.
/// None when either series is too short or has zero variance.
fn pearson(a: &VecDeque<f64>, b: &VecDeque<f64>) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < MIN_HISTORY_POINTS {
        return None;
    }
    let xs: Vec<f64> = a.iter().skip(a.len() - n).copied().collect();
    let ys: Vec<f64> = b.iter().skip(b.len() - n).copied().collect();

    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for i in 0..n {
        let dx = xs[i] - mean_x;
        let dy = ys[i] - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x <= f64::EPSILON || var_y <= f64::EPSILON {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}
