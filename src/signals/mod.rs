//! Signal generation
//!
//! Scores an analyzed token into a 0-100 confidence, picks a signal type,
//! sizes the position (Kelly with a confidence/risk fallback) and prices
//! the targets. Correlation against the active book and a per-token
//! cooldown gate what actually gets emitted.

pub mod correlation;
pub mod kelly;
pub mod tracker;

#[cfg(test)]
mod tests;
#[cfg(test)]
mod kelly_tests;
#[cfg(test)]
mod correlation_tests;

pub use correlation::{
    CorrelatedSignal, CorrelationAnalyzer, CorrelationConfig, CorrelationResult, TokenProfile,
};
pub use kelly::{KellyCalculator, KellyConfig, KellyResult};
pub use tracker::{SignalEvent, SignalTracker, TrackerConfig};

use crate::error::{BotError, Result};
use crate::model::MlScore;
use crate::types::{
    MarketSnapshot, PositionSizeKind, SignalOutcome, SignalStatus, SignalType, TokenAnalysis,
    TradingSignal,
};
use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

/// Everything the generator needs about one candidate token
#[derive(Debug, Clone)]
pub struct SignalInput {
    pub analysis: TokenAnalysis,
    pub ml: MlScore,
    pub market: MarketSnapshot,
}

/// Confidence component weights; must sum to 1.0
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub rug: f64,
    pub risk: f64,
    pub smart_money: f64,
    pub momentum: f64,
    pub holders: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            rug: 0.30,
            risk: 0.15,
            smart_money: 0.25,
            momentum: 0.20,
            holders: 0.10,
        }
    }
}

impl ConfidenceWeights {
    fn sum(&self) -> f64 {
        self.rug + self.risk + self.smart_money + self.momentum + self.holders
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub weights: ConfidenceWeights,
    /// BUY floor on composite confidence
    pub min_buy_confidence: u8,
    /// BUY ceiling on rug probability
    pub max_rug_probability: f64,
    /// BUY floor on the safety score
    pub min_risk_score: f64,
    /// SELL floor on composite confidence (threshold path only)
    pub min_sell_confidence: u8,
    /// SELL trigger: rug probability above this
    pub sell_rug_probability: f64,
    /// SELL trigger: safety score below this
    pub sell_risk_score: f64,
    /// SELL trigger: 1h price change below this, regardless of confidence
    pub crash_change_1h: f64,
    /// Minimum seconds between signals for the same token
    pub token_cooldown_secs: i64,
    /// Signal lifetime until expiry
    pub signal_ttl_secs: i64,
    /// Base percent for the non-Kelly fallback size
    pub fallback_base_percent: f64,
    /// When set, fallback sizing uses this fixed unit amount instead
    pub fixed_position_units: Option<Decimal>,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            weights: ConfidenceWeights::default(),
            min_buy_confidence: 60,
            max_rug_probability: 0.30,
            min_risk_score: 40.0,
            min_sell_confidence: 50,
            sell_rug_probability: 0.7,
            sell_risk_score: 20.0,
            crash_change_1h: -30.0,
            token_cooldown_secs: 1800,
            signal_ttl_secs: 21_600,
            fallback_base_percent: 5.0,
            fixed_position_units: None,
        }
    }
}

impl SignalConfig {
    pub fn validate(&self) -> Result<()> {
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(BotError::Config(format!(
                "confidence weights sum to {sum}, expected 1.0"
            )));
        }
        if !(0.0..=1.0).contains(&self.max_rug_probability) {
            return Err(BotError::Config(
                "max_rug_probability must be within [0, 1]".to_string(),
            ));
        }
        if self.signal_ttl_secs <= 0 {
            return Err(BotError::Config(
                "signal_ttl_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Component sub-scores feeding the composite confidence
#[derive(Debug, Clone, Copy)]
pub struct ComponentScores {
    pub smart_money: f64,
    pub momentum: f64,
    pub holder: f64,
}

pub struct SignalGenerator {
    config: RwLock<SignalConfig>,
    kelly: KellyCalculator,
    correlation: CorrelationAnalyzer,
    /// mint -> last signal time
    cooldowns: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl SignalGenerator {
    pub fn new(
        config: SignalConfig,
        kelly_config: KellyConfig,
        correlation_config: CorrelationConfig,
    ) -> Result<Self> {
        config.validate()?;
        correlation_config.validate().map_err(BotError::Config)?;

        Ok(Self {
            config: RwLock::new(config),
            kelly: KellyCalculator::new(kelly_config),
            correlation: CorrelationAnalyzer::new(correlation_config),
            cooldowns: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> SignalConfig {
        self.config.read().clone()
    }

    pub fn set_config(&self, config: SignalConfig) -> Result<()> {
        config.validate()?;
        *self.config.write() = config;
        Ok(())
    }

    pub fn kelly(&self) -> &KellyCalculator {
        &self.kelly
    }

    pub fn correlation(&self) -> &CorrelationAnalyzer {
        &self.correlation
    }

    /// Composite confidence in [0, 100].
    ///
    /// Weighted blend of rug inverse, safety score, smart-money flow,
    /// momentum and holder distribution. Sub-scores sit at a neutral 0.5
    /// when the underlying data is unavailable.
    pub fn calculate_confidence(&self, input: &SignalInput) -> u8 {
        let scores = self.component_scores(input);
        self.blend_confidence(input, &scores)
    }

    fn blend_confidence(&self, input: &SignalInput, scores: &ComponentScores) -> u8 {
        let w = self.config.read().weights.clone();
        let rug_component = (1.0 - input.ml.rug_probability).clamp(0.0, 1.0);
        let risk_component = (input.analysis.risk_score / 100.0).clamp(0.0, 1.0);

        let raw = rug_component * w.rug
            + risk_component * w.risk
            + scores.smart_money * w.smart_money
            + scores.momentum * w.momentum
            + scores.holder * w.holders;

        (raw * 100.0).round().clamp(0.0, 100.0) as u8
    }

    fn component_scores(&self, input: &SignalInput) -> ComponentScores {
        ComponentScores {
            smart_money: smart_money_score(&input.analysis),
            momentum: momentum_score(&input.market),
            holder: holder_score(&input.analysis),
        }
    }

    /// Evaluate one candidate against the active book. Returns None when
    /// the token is cooling down, no type qualifies, or correlation blocks.
    pub fn generate(
        &self,
        input: &SignalInput,
        active_signals: &[TradingSignal],
        outcomes: &[SignalOutcome],
    ) -> Option<TradingSignal> {
        let config = self.config.read().clone();
        let mint = &input.analysis.mint;
        let now = Utc::now();

        if let Some(last) = self.cooldowns.lock().get(mint) {
            if now - *last < Duration::seconds(config.token_cooldown_secs) {
                debug!("{} still in signal cooldown, skipping", mint);
                return None;
            }
        }

        let scores = self.component_scores(input);
        let confidence = self.blend_confidence(input, &scores);

        let signal_type = self.select_type(input, confidence, &config)?;

        // Re-check the chosen type against its full threshold set
        if !self.meets_thresholds(signal_type, input, confidence, &config) {
            debug!(
                "{} passed selection but failed threshold re-check for {}",
                mint, signal_type
            );
            return None;
        }

        let profile = TokenProfile {
            mint: mint.clone(),
            symbol: input.analysis.symbol.clone(),
            risk_score: input.analysis.risk_score,
            momentum_score: scores.momentum,
            price_change_1h: input.market.price_change_1h,
            liquidity_usd: decimal_to_f64(input.analysis.liquidity_usd),
            holder_count: input.analysis.holder_count,
            top10_holder_percent: input.analysis.top10_holder_percent,
        };
        let correlation = self.correlation.analyze(&profile, active_signals);
        if correlation.should_block {
            info!(
                "Signal for {} blocked: correlated with {} active signals",
                mint,
                correlation.correlated.len()
            );
            return None;
        }

        let (position_size, position_size_kind) =
            self.position_size(outcomes, confidence, input, &config);

        let entry_price = input.market.price_usd;
        let (target_price, stop_loss_price) = match signal_type {
            SignalType::Buy => price_targets(entry_price, input.analysis.risk_score),
            _ => (None, None),
        };

        let reasons = build_reasons(input, signal_type, &config);
        let warnings = build_warnings(input, &correlation);

        let signal = TradingSignal {
            id: Uuid::new_v4(),
            mint: mint.clone(),
            symbol: input.analysis.symbol.clone(),
            name: input.analysis.name.clone(),
            signal_type,
            confidence,
            position_size,
            position_size_kind,
            rug_probability: input.ml.rug_probability,
            smart_money_score: scores.smart_money,
            momentum_score: scores.momentum,
            holder_score: scores.holder,
            risk_score: input.analysis.risk_score,
            entry_price,
            target_price,
            stop_loss_price,
            liquidity_usd: input.analysis.liquidity_usd,
            holder_count: input.analysis.holder_count,
            top10_holder_percent: input.analysis.top10_holder_percent,
            price_change_1h: input.market.price_change_1h,
            reasons,
            warnings,
            generated_at: now,
            expires_at: now + Duration::seconds(config.signal_ttl_secs),
            status: SignalStatus::Active,
        };

        self.cooldowns.lock().insert(mint.clone(), now);
        info!(
            "Generated {} signal for {} (confidence {})",
            signal_type, input.analysis.symbol, confidence
        );
        Some(signal)
    }

    fn select_type(
        &self,
        input: &SignalInput,
        confidence: u8,
        config: &SignalConfig,
    ) -> Option<SignalType> {
        // A collapsing price interrupts regardless of smoothed confidence;
        // unlike the threshold SELL path below, no confidence floor applies.
        if input.market.price_change_1h < config.crash_change_1h {
            return Some(SignalType::Sell);
        }

        if confidence >= config.min_buy_confidence
            && input.ml.rug_probability < config.max_rug_probability
            && input.analysis.risk_score >= config.min_risk_score
        {
            return Some(SignalType::Buy);
        }

        if (input.ml.rug_probability > config.sell_rug_probability
            || input.analysis.risk_score < config.sell_risk_score)
            && confidence >= config.min_sell_confidence
        {
            return Some(SignalType::Sell);
        }

        None
    }

    fn meets_thresholds(
        &self,
        signal_type: SignalType,
        input: &SignalInput,
        confidence: u8,
        config: &SignalConfig,
    ) -> bool {
        match signal_type {
            SignalType::Buy => {
                confidence >= config.min_buy_confidence
                    && input.ml.rug_probability < config.max_rug_probability
                    && input.analysis.risk_score >= config.min_risk_score
            }
            SignalType::Sell => {
                input.market.price_change_1h < config.crash_change_1h
                    || ((input.ml.rug_probability > config.sell_rug_probability
                        || input.analysis.risk_score < config.sell_risk_score)
                        && confidence >= config.min_sell_confidence)
            }
            // Generator never emits these directly
            SignalType::TakeProfit | SignalType::StopLoss => false,
        }
    }

    fn position_size(
        &self,
        outcomes: &[SignalOutcome],
        confidence: u8,
        input: &SignalInput,
        config: &SignalConfig,
    ) -> (Decimal, PositionSizeKind) {
        let kelly = self.kelly.calculate(outcomes, Some(confidence));
        if kelly.kelly_used {
            let pct = Decimal::from_f64(kelly.suggested_position_percent)
                .unwrap_or(Decimal::ZERO)
                .round_dp(2);
            return (pct, PositionSizeKind::PercentOfBankroll);
        }

        if let Some(reason) = &kelly.fallback_reason {
            debug!("Kelly unavailable ({}), using fallback sizing", reason);
        }

        if let Some(units) = config.fixed_position_units {
            return (units, PositionSizeKind::FixedUnits);
        }

        // Scale the base percent by confidence and safety
        let pct = config.fallback_base_percent
            * (f64::from(confidence) / 100.0)
            * (input.analysis.risk_score / 100.0).clamp(0.0, 1.0);
        let pct = Decimal::from_f64(pct.max(0.25))
            .unwrap_or(Decimal::ZERO)
            .round_dp(2);
        (pct, PositionSizeKind::PercentOfBankroll)
    }
}

/// Smart-money sub-score: average of net tracked-wallet buys (normalized
/// over +-10) and distinct-wallet participation (10 wallets saturates).
/// Neutral 0.5 without data.
fn smart_money_score(analysis: &TokenAnalysis) -> f64 {
    match &analysis.smart_money {
        Some(sm) => {
            let net = ((sm.net_buys as f64 + 10.0) / 20.0).clamp(0.0, 1.0);
            let breadth = (f64::from(sm.unique_wallets) / 10.0).clamp(0.0, 1.0);
            (net + breadth) / 2.0
        }
        None => 0.5,
    }
}

/// Momentum sub-score from price changes (1h over +-50, 24h over +-100)
/// and 1h volume acceleration against the 24h average.
fn momentum_score(market: &MarketSnapshot) -> f64 {
    let mut factors = vec![
        ((market.price_change_1h + 50.0) / 100.0).clamp(0.0, 1.0),
        ((market.price_change_24h + 100.0) / 200.0).clamp(0.0, 1.0),
    ];

    if market.volume_24h > Decimal::ZERO {
        let hourly_avg = decimal_to_f64(market.volume_24h) / 24.0;
        if hourly_avg > 0.0 {
            // 2x the average hourly volume saturates the factor
            let accel = decimal_to_f64(market.volume_1h) / hourly_avg / 2.0;
            factors.push(accel.clamp(0.0, 1.0));
        }
    }

    factors.iter().sum::<f64>() / factors.len() as f64
}

/// Holder sub-score: log10 holder count (1000 holders saturates) averaged
/// with inverse top-10 concentration.
fn holder_score(analysis: &TokenAnalysis) -> f64 {
    let count = ((analysis.holder_count.max(1) as f64).log10() / 3.0).clamp(0.0, 1.0);
    let spread = (1.0 - analysis.top10_holder_percent / 100.0).clamp(0.0, 1.0);
    (count + spread) / 2.0
}

/// BUY targets by safety tier: safe tokens get tight targets, risky ones
/// wide ones.
fn price_targets(entry: Decimal, risk_score: f64) -> (Option<Decimal>, Option<Decimal>) {
    let (target_mult, stop_mult) = if risk_score >= 70.0 {
        (dec!(1.3), dec!(0.85))
    } else if risk_score < 40.0 {
        (dec!(2.0), dec!(0.7))
    } else {
        (dec!(1.5), dec!(0.8))
    };
    (Some(entry * target_mult), Some(entry * stop_mult))
}

/// Reason strings in fixed evaluation order
fn build_reasons(input: &SignalInput, signal_type: SignalType, config: &SignalConfig) -> Vec<String> {
    let mut reasons = Vec::new();
    let analysis = &input.analysis;

    match signal_type {
        SignalType::Buy => {
            if input.ml.rug_probability < 0.15 {
                reasons.push(format!(
                    "Very low rug probability ({:.0}%)",
                    input.ml.rug_probability * 100.0
                ));
            } else if input.ml.rug_probability < config.max_rug_probability {
                reasons.push(format!(
                    "Low rug probability ({:.0}%)",
                    input.ml.rug_probability * 100.0
                ));
            }
            if analysis.risk_score >= 70.0 {
                reasons.push(format!("Strong safety score ({:.0}/100)", analysis.risk_score));
            }
            if let Some(sm) = &analysis.smart_money {
                if sm.net_buys > 0 {
                    reasons.push(format!("Smart money accumulating ({} net buys)", sm.net_buys));
                }
            }
            if input.market.price_change_1h > 20.0 {
                reasons.push(format!(
                    "Strong 1h momentum (+{:.1}%)",
                    input.market.price_change_1h
                ));
            }
            if analysis.holder_count >= 500 {
                reasons.push(format!("Broad holder base ({} holders)", analysis.holder_count));
            }
            if analysis.lp_burned_percent >= 90.0 {
                reasons.push(format!("{:.0}% of LP burned", analysis.lp_burned_percent));
            }
            if analysis.mint_revoked && analysis.freeze_revoked {
                reasons.push("Mint and freeze authorities revoked".to_string());
            }
        }
        SignalType::Sell => {
            if input.market.price_change_1h < config.crash_change_1h {
                reasons.push(format!(
                    "1h price down {:.1}%",
                    input.market.price_change_1h
                ));
            }
            if input.ml.rug_probability > config.sell_rug_probability {
                reasons.push(format!(
                    "High rug probability ({:.0}%)",
                    input.ml.rug_probability * 100.0
                ));
            }
            if analysis.risk_score < config.sell_risk_score {
                reasons.push(format!("Critical safety score ({:.0}/100)", analysis.risk_score));
            }
        }
        SignalType::TakeProfit | SignalType::StopLoss => {}
    }

    reasons
}

/// Warning strings in fixed evaluation order
fn build_warnings(input: &SignalInput, correlation: &CorrelationResult) -> Vec<String> {
    let mut warnings = Vec::new();
    let analysis = &input.analysis;

    if analysis.liquidity_usd < dec!(10000) {
        warnings.push(format!("Low liquidity (${:.0})", analysis.liquidity_usd));
    }
    if analysis.top10_holder_percent > 40.0 {
        warnings.push(format!(
            "Top-10 wallets hold {:.0}% of supply",
            analysis.top10_holder_percent
        ));
    }
    if !analysis.mint_revoked {
        warnings.push("Mint authority still active".to_string());
    }
    if !analysis.freeze_revoked {
        warnings.push("Freeze authority still active".to_string());
    }
    if analysis.lp_burned_percent < 50.0 {
        warnings.push(format!(
            "Only {:.0}% of LP burned",
            analysis.lp_burned_percent
        ));
    }
    if !analysis.socials_present {
        warnings.push("No social presence found".to_string());
    }
    if input.ml.confidence < 0.5 {
        warnings.push("Model confidence is low".to_string());
    }
    if correlation.is_correlated {
        warnings.push(format!(
            "Correlated with {} active signal(s)",
            correlation.correlated.len()
        ));
    }

    warnings
}

fn decimal_to_f64(value: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    value.to_f64().unwrap_or(0.0)
}
