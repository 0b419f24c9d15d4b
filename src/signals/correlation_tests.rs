//! Unit tests for the correlation analyzer

use super::correlation::{CorrelationAnalyzer, CorrelationConfig, TokenProfile};
use crate::types::{PositionSizeKind, SignalStatus, SignalType, TradingSignal};
use chrono::{Duration, Utc};
use rust_decimal_macros::dec;
use uuid::Uuid;

fn active_signal(mint: &str, risk: f64, momentum: f64, change_1h: f64) -> TradingSignal {
    let now = Utc::now();
    TradingSignal {
        id: Uuid::new_v4(),
        mint: mint.to_string(),
        symbol: mint.to_string(),
        name: format!("{} token", mint),
        signal_type: SignalType::Buy,
        confidence: 70,
        position_size: dec!(2),
        position_size_kind: PositionSizeKind::PercentOfBankroll,
        rug_probability: 0.1,
        smart_money_score: 0.6,
        momentum_score: momentum,
        holder_score: 0.6,
        risk_score: risk,
        entry_price: dec!(0.001),
        target_price: None,
        stop_loss_price: None,
        liquidity_usd: dec!(50000),
        holder_count: 1000,
        top10_holder_percent: 20.0,
        price_change_1h: change_1h,
        reasons: vec![],
        warnings: vec![],
        generated_at: now,
        expires_at: now + Duration::hours(6),
        status: SignalStatus::Active,
    }
}

fn candidate(mint: &str, risk: f64, momentum: f64, change_1h: f64) -> TokenProfile {
    TokenProfile {
        mint: mint.to_string(),
        symbol: mint.to_string(),
        risk_score: risk,
        momentum_score: momentum,
        price_change_1h: change_1h,
        liquidity_usd: 50_000.0,
        holder_count: 1000,
        top10_holder_percent: 20.0,
    }
}

#[test]
fn test_near_identical_signals_correlate() {
    let analyzer = CorrelationAnalyzer::new(CorrelationConfig::default());
    let active = vec![
        active_signal("AAA", 80.0, 0.7, 25.0),
        active_signal("BBB", 82.0, 0.7, 27.0),
    ];

    let result = analyzer.analyze(&candidate("CCC", 81.0, 0.7, 26.0), &active);

    assert!(result.is_correlated);
    assert_eq!(result.correlated.len(), 2);
    for pair in &result.correlated {
        assert!(pair.score >= 0.70);
        assert!(!pair.factors.is_empty());
    }
}

#[test]
fn test_block_at_max_correlated() {
    let config = CorrelationConfig {
        max_correlated_signals: 2,
        ..Default::default()
    };
    let analyzer = CorrelationAnalyzer::new(config);
    let active = vec![
        active_signal("AAA", 80.0, 0.7, 25.0),
        active_signal("BBB", 82.0, 0.7, 27.0),
    ];

    let result = analyzer.analyze(&candidate("CCC", 81.0, 0.7, 26.0), &active);

    assert!(result.should_block);
}

#[test]
fn test_zero_max_is_warn_only() {
    let config = CorrelationConfig {
        max_correlated_signals: 0,
        ..Default::default()
    };
    let analyzer = CorrelationAnalyzer::new(config);
    let active = vec![
        active_signal("AAA", 80.0, 0.7, 25.0),
        active_signal("BBB", 82.0, 0.7, 27.0),
    ];

    let result = analyzer.analyze(&candidate("CCC", 81.0, 0.7, 26.0), &active);

    assert!(result.is_correlated);
    assert!(!result.should_block);
}

#[test]
fn test_dissimilar_tokens_do_not_correlate() {
    let analyzer = CorrelationAnalyzer::new(CorrelationConfig::default());
    let active = vec![active_signal("AAA", 90.0, 0.9, 40.0)];

    let mut other = candidate("ZZZ", 15.0, 0.1, -20.0);
    other.liquidity_usd = 1_500.0;
    other.holder_count = 30;
    other.top10_holder_percent = 85.0;

    let result = analyzer.analyze(&other, &active);

    assert!(!result.is_correlated);
    assert!(result.correlated.is_empty());
}

#[test]
fn test_same_mint_is_skipped() {
    let analyzer = CorrelationAnalyzer::new(CorrelationConfig::default());
    let active = vec![active_signal("AAA", 80.0, 0.7, 25.0)];

    let result = analyzer.analyze(&candidate("AAA", 80.0, 0.7, 25.0), &active);

    assert!(!result.is_correlated);
}

#[test]
fn test_pearson_path_with_price_history() {
    let analyzer = CorrelationAnalyzer::new(CorrelationConfig::default());
    // Perfectly co-moving histories
    for i in 1..=8 {
        analyzer.record_price("AAA", i as f64);
        analyzer.record_price("BBB", (i * 2) as f64);
    }

    let active = vec![active_signal("BBB", 80.0, 0.7, 25.0)];
    let result = analyzer.analyze(&candidate("AAA", 81.0, 0.7, 26.0), &active);

    assert!(result.is_correlated);
    assert!(result.correlated[0].score >= 0.9);
    assert!(result.correlated[0]
        .factors
        .contains(&"price_movement".to_string()));
}

#[test]
fn test_inverse_price_history_reduces_score() {
    let analyzer = CorrelationAnalyzer::new(CorrelationConfig::default());
    // Perfectly inverse histories zero out the price factor
    for i in 1..=8 {
        analyzer.record_price("AAA", i as f64);
        analyzer.record_price("BBB", (20 - i) as f64);
    }

    let active = vec![active_signal("BBB", 80.0, 0.7, 25.0)];
    let result = analyzer.analyze(&candidate("AAA", 81.0, 0.7, 26.0), &active);

    // Remaining factors carry at most 0.6 of the weight
    assert!(!result.is_correlated);
}

#[test]
fn test_diversification_score() {
    let analyzer = CorrelationAnalyzer::new(CorrelationConfig::default());

    // Identical book is fully concentrated
    let twins = vec![
        active_signal("AAA", 80.0, 0.7, 25.0),
        active_signal("BBB", 80.0, 0.7, 25.0),
    ];
    let concentrated = analyzer.diversification_score(&twins);
    assert!(concentrated < 10.0);

    // Under two signals there is nothing to concentrate
    assert_eq!(analyzer.diversification_score(&twins[..1]), 100.0);
    assert_eq!(analyzer.diversification_score(&[]), 100.0);

    let mut varied = vec![active_signal("AAA", 90.0, 0.9, 40.0)];
    let mut other = active_signal("ZZZ", 15.0, 0.1, -20.0);
    other.liquidity_usd = dec!(1500);
    other.holder_count = 30;
    other.top10_holder_percent = 85.0;
    varied.push(other);
    let diversified = analyzer.diversification_score(&varied);
    assert!(diversified > concentrated);
}

#[test]
fn test_weight_validation() {
    let bad = CorrelationConfig {
        price_weight: 0.5,
        liquidity_weight: 0.5,
        holder_weight: 0.5,
        risk_weight: 0.5,
        ..Default::default()
    };
    assert!(bad.validate().is_err());
    assert!(CorrelationConfig::default().validate().is_ok());
}
