//! Signal lifecycle tracking
//!
//! The tracker owns the authoritative signal and outcome maps. Signals
//! enter as `active`, can be acknowledged, and leave through the expiry
//! sweep or an outcome record. Everything else in the pipeline reads
//! snapshots; only tracker methods mutate.

use crate::error::{BotError, Result};
use crate::types::{
    PerformanceMetrics, SignalFilter, SignalOutcome, SignalStatus, SignalType, TradingSignal,
    TypeStats,
};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Cap on concurrently tracked non-terminal signals
    pub max_active_signals: usize,
    pub sweep_interval_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            max_active_signals: 10,
            sweep_interval_secs: 60,
        }
    }
}

/// Lifecycle notifications, fanned out on a broadcast channel
#[derive(Debug, Clone)]
pub enum SignalEvent {
    Added { signal: TradingSignal },
    Expired { signal_id: Uuid, mint: String },
    OutcomeRecorded { signal_id: Uuid, profit_loss_percent: f64 },
}

struct TrackerState {
    signals: HashMap<Uuid, TradingSignal>,
    outcomes: HashMap<Uuid, SignalOutcome>,
    /// mint -> signal ids, newest last
    by_mint: HashMap<String, Vec<Uuid>>,
}

pub struct SignalTracker {
    config: TrackerConfig,
    state: RwLock<TrackerState>,
    events: broadcast::Sender<SignalEvent>,
    running: AtomicBool,
    sweep_handle: Mutex<Option<JoinHandle<()>>>,
}

impl SignalTracker {
    pub fn new(config: TrackerConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            config,
            state: RwLock::new(TrackerState {
                signals: HashMap::new(),
                outcomes: HashMap::new(),
                by_mint: HashMap::new(),
            }),
            events,
            running: AtomicBool::new(false),
            sweep_handle: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SignalEvent> {
        self.events.subscribe()
    }

    /// Register a new signal and its outcome stub. Rejects when the active
    /// set is at capacity.
    pub fn add_signal(&self, signal: TradingSignal) -> bool {
        let mut state = self.state.write();

        let active = state
            .signals
            .values()
            .filter(|s| !s.status.is_terminal())
            .count();
        if active >= self.config.max_active_signals {
            warn!(
                "Rejecting signal for {}: {} active signals at cap",
                signal.symbol, active
            );
            return false;
        }

        let outcome = SignalOutcome::pending(&signal);
        state
            .by_mint
            .entry(signal.mint.clone())
            .or_default()
            .push(signal.id);
        state.outcomes.insert(signal.id, outcome);
        state.signals.insert(signal.id, signal.clone());
        drop(state);

        let _ = self.events.send(SignalEvent::Added { signal });
        true
    }

    pub fn get_signal(&self, id: Uuid) -> Option<TradingSignal> {
        self.state.read().signals.get(&id).cloned()
    }

    /// Non-terminal signals that have not passed their expiry
    pub fn get_active_signals(&self) -> Vec<TradingSignal> {
        let now = Utc::now();
        self.state
            .read()
            .signals
            .values()
            .filter(|s| !s.status.is_terminal() && !s.is_expired_at(now))
            .cloned()
            .collect()
    }

    pub fn get_signals(&self, filter: &SignalFilter) -> Vec<TradingSignal> {
        let mut signals: Vec<TradingSignal> = self
            .state
            .read()
            .signals
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        signals.sort_by_key(|s| std::cmp::Reverse(s.generated_at));
        signals
    }

    /// Mark an active signal as seen by an operator
    pub fn acknowledge_signal(&self, id: Uuid) -> bool {
        let mut state = self.state.write();
        match state.signals.get_mut(&id) {
            Some(signal) if signal.status == SignalStatus::Active => {
                signal.status = SignalStatus::Acknowledged;
                true
            }
            _ => false,
        }
    }

    /// Expire non-terminal signals past their deadline. Returns the ids
    /// transitioned this pass.
    pub fn sweep_once(&self) -> Vec<Uuid> {
        let now = Utc::now();
        let mut expired = Vec::new();
        {
            let mut state = self.state.write();
            for signal in state.signals.values_mut() {
                if !signal.status.is_terminal() && signal.is_expired_at(now) {
                    signal.status = SignalStatus::Expired;
                    expired.push((signal.id, signal.mint.clone()));
                }
            }
        }

        let ids: Vec<Uuid> = expired.iter().map(|(id, _)| *id).collect();
        for (signal_id, mint) in expired {
            debug!("Signal {} for {} expired", signal_id, mint);
            let _ = self.events.send(SignalEvent::Expired { signal_id, mint });
        }
        ids
    }

    /// Record the realized entry/exit for a signal. Computes P/L, accuracy
    /// and target/stop hits, and marks the signal executed. Recording twice
    /// overwrites the previous outcome.
    pub fn record_outcome(
        &self,
        id: Uuid,
        actual_entry: Decimal,
        actual_exit: Decimal,
    ) -> Result<SignalOutcome> {
        let mut state = self.state.write();

        let signal = state
            .signals
            .get_mut(&id)
            .ok_or(BotError::SignalNotFound(id))?;

        let pnl_percent = if actual_entry.is_zero() {
            0.0
        } else {
            ((actual_exit - actual_entry) / actual_entry * Decimal::ONE_HUNDRED)
                .to_f64()
                .unwrap_or(0.0)
        };

        // BUY calls are right when price went up; SELL calls when it declined
        let accurate = match signal.signal_type {
            SignalType::Buy | SignalType::TakeProfit => pnl_percent > 0.0,
            SignalType::Sell | SignalType::StopLoss => actual_exit < actual_entry,
        };

        let target_hit = signal.target_price.map(|t| actual_exit >= t);
        let stop_hit = signal.stop_loss_price.map(|s| actual_exit <= s);

        signal.status = SignalStatus::Executed;
        let signal_type = signal.signal_type;
        let mint = signal.mint.clone();

        let outcome = state
            .outcomes
            .get_mut(&id)
            .ok_or(BotError::SignalNotFound(id))?;
        if outcome.is_recorded() {
            warn!("Outcome for signal {} already recorded, overwriting", id);
        }
        outcome.actual_entry = Some(actual_entry);
        outcome.actual_exit = Some(actual_exit);
        outcome.profit_loss_percent = Some(pnl_percent);
        outcome.accurate = Some(accurate);
        outcome.target_hit = target_hit;
        outcome.stop_hit = stop_hit;
        outcome.recorded_at = Some(Utc::now());
        let recorded = outcome.clone();
        drop(state);

        info!(
            "Outcome recorded for {} ({}): {:+.1}%",
            mint, signal_type, pnl_percent
        );
        let _ = self.events.send(SignalEvent::OutcomeRecorded {
            signal_id: id,
            profit_loss_percent: pnl_percent,
        });
        Ok(recorded)
    }

    /// Outcomes with recorded results, for Kelly sizing
    pub fn recorded_outcomes(&self) -> Vec<SignalOutcome> {
        self.state
            .read()
            .outcomes
            .values()
            .filter(|o| o.is_recorded())
            .cloned()
            .collect()
    }

    /// Replace tracker state from persistence
    pub fn restore(&self, signals: Vec<TradingSignal>, outcomes: Vec<SignalOutcome>) {
        let mut state = self.state.write();
        state.signals.clear();
        state.outcomes.clear();
        state.by_mint.clear();
        for signal in signals {
            state
                .by_mint
                .entry(signal.mint.clone())
                .or_default()
                .push(signal.id);
            state.signals.insert(signal.id, signal);
        }
        for outcome in outcomes {
            state.outcomes.insert(outcome.signal_id, outcome);
        }
        info!(
            "Restored {} signals and {} outcomes",
            state.signals.len(),
            state.outcomes.len()
        );
    }

    /// Full copy of tracked state, for persistence
    pub fn snapshot(&self) -> (Vec<TradingSignal>, Vec<SignalOutcome>) {
        let state = self.state.read();
        (
            state.signals.values().cloned().collect(),
            state.outcomes.values().cloned().collect(),
        )
    }

    /// Aggregate performance projected from stored state
    pub fn calculate_metrics(&self) -> PerformanceMetrics {
        let now = Utc::now();
        let state = self.state.read();

        let mut metrics = PerformanceMetrics {
            total_signals: state.signals.len(),
            ..Default::default()
        };
        metrics.active_signals = state
            .signals
            .values()
            .filter(|s| !s.status.is_terminal() && !s.is_expired_at(now))
            .count();

        let mut profits = Vec::new();
        let mut losses = Vec::new();
        let mut accurate = 0usize;

        for signal in state.signals.values() {
            let entry = metrics.by_type.entry(signal.signal_type).or_default();
            entry.count += 1;
        }

        for outcome in state.outcomes.values().filter(|o| o.is_recorded()) {
            metrics.outcomes_recorded += 1;
            let by_type: &mut TypeStats = metrics.by_type.entry(outcome.signal_type).or_default();
            by_type.recorded += 1;

            if let Some(pnl) = outcome.profit_loss_percent {
                metrics.total_pnl_percent += pnl;
                if pnl > 0.0 {
                    metrics.wins += 1;
                    by_type.wins += 1;
                    profits.push(pnl);
                } else if pnl < 0.0 {
                    metrics.losses += 1;
                    losses.push(pnl);
                }
            }
            if outcome.accurate == Some(true) {
                accurate += 1;
            }
            if outcome.target_hit == Some(true) {
                metrics.target_hits += 1;
            }
            if outcome.stop_hit == Some(true) {
                metrics.stop_hits += 1;
            }
        }

        if metrics.outcomes_recorded > 0 {
            metrics.win_rate = metrics.wins as f64 / metrics.outcomes_recorded as f64;
            metrics.accuracy = accurate as f64 / metrics.outcomes_recorded as f64;
        }
        if !profits.is_empty() {
            metrics.avg_profit_percent = profits.iter().sum::<f64>() / profits.len() as f64;
        }
        if !losses.is_empty() {
            // Mean of losing P/L, a negative number
            metrics.avg_loss_percent = losses.iter().sum::<f64>() / losses.len() as f64;
        }
        for stats in metrics.by_type.values_mut() {
            if stats.recorded > 0 {
                stats.win_rate = stats.wins as f64 / stats.recorded as f64;
            }
        }

        metrics
    }

    /// Spawn the periodic expiry sweep
    pub fn start_sweeper(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let this = self.clone();
        let interval_secs = self.config.sweep_interval_secs;
        let handle = tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            interval.tick().await; // first tick fires immediately
            while this.running.load(Ordering::SeqCst) {
                interval.tick().await;
                let expired = this.sweep_once();
                if !expired.is_empty() {
                    info!("Expired {} signals", expired.len());
                }
            }
        });
        *self.sweep_handle.lock() = Some(handle);
    }

    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        let handle = self.sweep_handle.lock().take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
        }
    }
}
