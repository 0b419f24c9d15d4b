//! Unit tests for Kelly position sizing

use super::kelly::{KellyCalculator, KellyConfig};
use crate::types::{SignalOutcome, SignalType};
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

fn outcome(pnl: f64, secs_ago: i64) -> SignalOutcome {
    SignalOutcome {
        signal_id: Uuid::new_v4(),
        mint: "MINT".to_string(),
        signal_type: SignalType::Buy,
        predicted_entry: dec!(1),
        predicted_target: None,
        predicted_stop: None,
        actual_entry: Some(dec!(1)),
        actual_exit: Some(dec!(1)),
        profit_loss_percent: Some(pnl),
        accurate: Some(pnl > 0.0),
        target_hit: None,
        stop_hit: None,
        created_at: Utc::now(),
        recorded_at: Some(Utc::now() - Duration::seconds(secs_ago)),
    }
}

fn history(wins: usize, win_pnl: f64, losses: usize, loss_pnl: f64) -> Vec<SignalOutcome> {
    let mut outcomes = Vec::new();
    for i in 0..wins {
        outcomes.push(outcome(win_pnl, i as i64));
    }
    for i in 0..losses {
        outcomes.push(outcome(loss_pnl, (wins + i) as i64));
    }
    outcomes
}

#[test]
fn test_insufficient_history_falls_back() {
    let calc = KellyCalculator::new(KellyConfig::default());
    let outcomes = history(6, 20.0, 4, -10.0); // 10 trades, default minimum is 20

    let result = calc.calculate(&outcomes, None);

    assert!(!result.kelly_used);
    assert_eq!(result.suggested_position_percent, 0.0);
    assert_eq!(result.trades_analyzed, 10);
    assert!(result
        .fallback_reason
        .as_deref()
        .unwrap()
        .contains("Insufficient trade history"));
}

#[test]
fn test_disabled_falls_back() {
    let calc = KellyCalculator::new(KellyConfig {
        enabled: false,
        ..Default::default()
    });
    let outcomes = history(30, 20.0, 10, -10.0);

    let result = calc.calculate(&outcomes, None);

    assert!(!result.kelly_used);
    assert_eq!(result.suggested_position_percent, 0.0);
    assert_eq!(result.fallback_reason.as_deref(), Some("Kelly sizing disabled"));
}

#[test]
fn test_low_win_rate_falls_back() {
    let calc = KellyCalculator::new(KellyConfig::default());
    let outcomes = history(6, 20.0, 14, -10.0); // 30% win rate vs 40% minimum

    let result = calc.calculate(&outcomes, None);

    assert!(!result.kelly_used);
    assert!(result.fallback_reason.as_deref().unwrap().contains("Win rate"));
}

#[test]
fn test_negative_edge_falls_back() {
    let calc = KellyCalculator::new(KellyConfig::default());
    // 40% win rate at 1:1 payoff has negative expectancy
    let outcomes = history(8, 10.0, 12, -10.0);

    let result = calc.calculate(&outcomes, None);

    assert!(!result.kelly_used);
    assert_eq!(result.suggested_position_percent, 0.0);
    assert!(result
        .fallback_reason
        .as_deref()
        .unwrap()
        .contains("No positive edge"));
}

#[test]
fn test_profitable_history_produces_fraction() {
    let config = KellyConfig {
        max_position_percent: 50.0,
        confidence_adjustment: false,
        ..Default::default()
    };
    let calc = KellyCalculator::new(config);
    // p = 0.6, b = 2.0 -> optimal (2*0.6 - 0.4)/2 = 0.4, half Kelly 0.2
    let outcomes = history(18, 20.0, 12, -10.0);

    let result = calc.calculate(&outcomes, None);

    assert!(result.kelly_used);
    assert!((result.win_rate - 0.6).abs() < 1e-9);
    assert!((result.win_loss_ratio - 2.0).abs() < 1e-9);
    assert!((result.optimal_fraction - 0.4).abs() < 1e-9);
    assert!((result.suggested_position_percent - 20.0).abs() < 1e-9);
    assert!(result.fallback_reason.is_none());
}

#[test]
fn test_confidence_damping() {
    let config = KellyConfig {
        max_position_percent: 50.0,
        ..Default::default()
    };
    let calc = KellyCalculator::new(config);
    let outcomes = history(18, 20.0, 12, -10.0);

    // Same history as above; confidence 50 halves the adjusted fraction
    let result = calc.calculate(&outcomes, Some(50));

    assert!(result.kelly_used);
    assert!((result.suggested_position_percent - 10.0).abs() < 1e-9);
}

#[test]
fn test_position_clamped_to_bounds() {
    let calc = KellyCalculator::new(KellyConfig::default());
    // Strong edge: suggestion would exceed the 10% default cap
    let outcomes = history(24, 30.0, 6, -10.0);

    let result = calc.calculate(&outcomes, Some(100));

    assert!(result.kelly_used);
    assert_eq!(
        result.suggested_position_percent,
        KellyConfig::default().max_position_percent
    );
}

#[test]
fn test_lookback_limits_history() {
    let config = KellyConfig {
        lookback_trades: 20,
        confidence_adjustment: false,
        ..Default::default()
    };
    let calc = KellyCalculator::new(config);

    // 20 recent winners, then an older stretch of losers that the lookback
    // window must ignore
    let mut outcomes = history(20, 15.0, 0, 0.0);
    for i in 0..30 {
        outcomes.push(outcome(-20.0, 1000 + i));
    }

    let result = calc.calculate(&outcomes, None);

    assert!(result.kelly_used);
    assert_eq!(result.trades_analyzed, 20);
    assert!((result.win_rate - 1.0).abs() < 1e-9);
}

#[test]
fn test_unrecorded_outcomes_ignored() {
    let calc = KellyCalculator::new(KellyConfig::default());
    let mut outcomes = history(6, 20.0, 4, -10.0);
    // Pending outcomes should not count toward the trade minimum
    for _ in 0..20 {
        let mut o = outcome(0.0, 0);
        o.profit_loss_percent = None;
        o.recorded_at = None;
        outcomes.push(o);
    }

    let result = calc.calculate(&outcomes, None);

    assert!(!result.kelly_used);
    assert_eq!(result.trades_analyzed, 10);
}
