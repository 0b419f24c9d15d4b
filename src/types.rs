//! Core domain types shared across the pipeline

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Signal direction / kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalType {
    Buy,
    Sell,
    TakeProfit,
    StopLoss,
}

impl std::fmt::Display for SignalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalType::Buy => write!(f, "BUY"),
            SignalType::Sell => write!(f, "SELL"),
            SignalType::TakeProfit => write!(f, "TAKE_PROFIT"),
            SignalType::StopLoss => write!(f, "STOP_LOSS"),
        }
    }
}

/// Signal lifecycle state
///
/// One-way transitions: `active -> {acknowledged, expired, executed}`,
/// `acknowledged -> {expired, executed}`. A signal never returns to active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStatus {
    Active,
    Acknowledged,
    Expired,
    Executed,
}

impl SignalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SignalStatus::Expired | SignalStatus::Executed)
    }
}

/// How `position_size` should be interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSizeKind {
    /// Percentage of bankroll (e.g. 2.5 = 2.5%)
    PercentOfBankroll,
    /// Fixed number of quote units (e.g. SOL)
    FixedUnits,
}

/// Smart-money flow observed for a token
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SmartMoneyActivity {
    /// Buys minus sells from tracked wallets over the last hour
    pub net_buys: i64,
    pub unique_wallets: u32,
}

/// Enrichment output for a token, produced by the external analysis service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenAnalysis {
    pub mint: String,
    pub symbol: String,
    pub name: String,
    /// Composite safety score, 0-100. Higher is safer.
    pub risk_score: f64,
    pub liquidity_usd: Decimal,
    pub holder_count: u64,
    /// Share of supply held by the top 10 wallets, 0-100
    pub top10_holder_percent: f64,
    pub mint_revoked: bool,
    pub freeze_revoked: bool,
    pub lp_burned_percent: f64,
    #[serde(default)]
    pub smart_money: Option<SmartMoneyActivity>,
    #[serde(default)]
    pub socials_present: bool,
}

/// Point-in-time market data for a token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub price_usd: Decimal,
    /// Percent change, e.g. -30.0 means -30%
    pub price_change_1h: f64,
    pub price_change_24h: f64,
    pub volume_1h: Decimal,
    pub volume_24h: Decimal,
}

/// A generated trading signal. Immutable after creation except for `status`,
/// which only the tracker mutates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSignal {
    pub id: Uuid,
    pub mint: String,
    pub symbol: String,
    pub name: String,
    pub signal_type: SignalType,
    /// Composite confidence, 0-100
    pub confidence: u8,
    pub position_size: Decimal,
    pub position_size_kind: PositionSizeKind,
    pub rug_probability: f64,
    pub smart_money_score: f64,
    pub momentum_score: f64,
    pub holder_score: f64,
    pub risk_score: f64,
    pub entry_price: Decimal,
    pub target_price: Option<Decimal>,
    pub stop_loss_price: Option<Decimal>,
    // Token facts captured at generation time; the correlation analyzer
    // compares new candidates against these.
    pub liquidity_usd: Decimal,
    pub holder_count: u64,
    pub top10_holder_percent: f64,
    pub price_change_1h: f64,
    pub reasons: Vec<String>,
    pub warnings: Vec<String>,
    pub generated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: SignalStatus,
}

impl TradingSignal {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Realized result of a signal, one-to-one with `TradingSignal`.
///
/// Predicted fields are copied at creation; actuals are filled in once by
/// the tracker when the outcome is recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalOutcome {
    pub signal_id: Uuid,
    pub mint: String,
    pub signal_type: SignalType,
    pub predicted_entry: Decimal,
    pub predicted_target: Option<Decimal>,
    pub predicted_stop: Option<Decimal>,
    pub actual_entry: Option<Decimal>,
    pub actual_exit: Option<Decimal>,
    /// Realized P/L percent, positive for profit
    pub profit_loss_percent: Option<f64>,
    /// Whether the signal called the direction correctly
    pub accurate: Option<bool>,
    pub target_hit: Option<bool>,
    pub stop_hit: Option<bool>,
    pub created_at: DateTime<Utc>,
    pub recorded_at: Option<DateTime<Utc>>,
}

impl SignalOutcome {
    /// Outcome stub registered alongside a new signal
    pub fn pending(signal: &TradingSignal) -> Self {
        Self {
            signal_id: signal.id,
            mint: signal.mint.clone(),
            signal_type: signal.signal_type,
            predicted_entry: signal.entry_price,
            predicted_target: signal.target_price,
            predicted_stop: signal.stop_loss_price,
            actual_entry: None,
            actual_exit: None,
            profit_loss_percent: None,
            accurate: None,
            target_hit: None,
            stop_hit: None,
            created_at: signal.generated_at,
            recorded_at: None,
        }
    }

    pub fn is_recorded(&self) -> bool {
        self.recorded_at.is_some()
    }
}

/// Query filter for stored signals
#[derive(Debug, Clone, Default)]
pub struct SignalFilter {
    pub signal_type: Option<SignalType>,
    pub status: Option<SignalStatus>,
    pub mint: Option<String>,
    pub min_confidence: Option<u8>,
    pub since: Option<DateTime<Utc>>,
}

impl SignalFilter {
    pub fn matches(&self, signal: &TradingSignal) -> bool {
        if let Some(t) = self.signal_type {
            if signal.signal_type != t {
                return false;
            }
        }
        if let Some(s) = self.status {
            if signal.status != s {
                return false;
            }
        }
        if let Some(mint) = &self.mint {
            if &signal.mint != mint {
                return false;
            }
        }
        if let Some(min) = self.min_confidence {
            if signal.confidence < min {
                return false;
            }
        }
        if let Some(since) = self.since {
            if signal.generated_at < since {
                return false;
            }
        }
        true
    }
}

/// Per-signal-type slice of the performance projection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypeStats {
    pub count: usize,
    pub recorded: usize,
    pub wins: usize,
    pub win_rate: f64,
}

/// Aggregate performance, projected from tracked signals and outcomes.
/// Never stored; recomputed on demand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_signals: usize,
    pub active_signals: usize,
    pub outcomes_recorded: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub avg_profit_percent: f64,
    pub avg_loss_percent: f64,
    pub total_pnl_percent: f64,
    /// Share of recorded outcomes where the called direction was right
    pub accuracy: f64,
    pub target_hits: usize,
    pub stop_hits: usize,
    pub by_type: HashMap<SignalType, TypeStats>,
}
