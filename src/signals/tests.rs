//! Unit tests for the signal generator

use super::correlation::CorrelationConfig;
use super::kelly::KellyConfig;
use super::{SignalConfig, SignalGenerator, SignalInput};
use crate::model::{MlScore, Recommendation};
use crate::types::{
    MarketSnapshot, PositionSizeKind, SignalType, SmartMoneyActivity, TokenAnalysis,
};
use rust_decimal_macros::dec;

fn generator() -> SignalGenerator {
    SignalGenerator::new(
        SignalConfig::default(),
        KellyConfig::default(),
        CorrelationConfig::default(),
    )
    .unwrap()
}

fn buy_candidate(mint: &str) -> SignalInput {
    SignalInput {
        analysis: TokenAnalysis {
            mint: mint.to_string(),
            symbol: "PULSE".to_string(),
            name: "Pulse Token".to_string(),
            risk_score: 80.0,
            liquidity_usd: dec!(50000),
            holder_count: 1200,
            top10_holder_percent: 22.0,
            mint_revoked: true,
            freeze_revoked: true,
            lp_burned_percent: 95.0,
            smart_money: Some(SmartMoneyActivity {
                net_buys: 8,
                unique_wallets: 5,
            }),
            socials_present: true,
        },
        ml: MlScore {
            rug_probability: 0.1,
            confidence: 0.8,
            recommendation: Recommendation::Consider,
        },
        market: MarketSnapshot {
            price_usd: dec!(0.000045),
            price_change_1h: 30.0,
            price_change_24h: 60.0,
            volume_1h: dec!(20000),
            volume_24h: dec!(120000),
        },
    }
}

fn junk_candidate(mint: &str) -> SignalInput {
    SignalInput {
        analysis: TokenAnalysis {
            mint: mint.to_string(),
            symbol: "RUG".to_string(),
            name: "Rug Token".to_string(),
            risk_score: 5.0,
            liquidity_usd: dec!(800),
            holder_count: 12,
            top10_holder_percent: 95.0,
            mint_revoked: false,
            freeze_revoked: false,
            lp_burned_percent: 0.0,
            smart_money: Some(SmartMoneyActivity {
                net_buys: -10,
                unique_wallets: 0,
            }),
            socials_present: false,
        },
        ml: MlScore {
            rug_probability: 0.95,
            confidence: 0.9,
            recommendation: Recommendation::Avoid,
        },
        market: MarketSnapshot {
            price_usd: dec!(0.000002),
            price_change_1h: -10.0,
            price_change_24h: -80.0,
            volume_1h: dec!(0),
            volume_24h: dec!(0),
        },
    }
}

#[test]
fn test_strong_candidate_yields_buy() {
    let gen = generator();
    let input = buy_candidate("MINT_A");

    let signal = gen.generate(&input, &[], &[]).expect("expected a signal");

    assert_eq!(signal.signal_type, SignalType::Buy);
    assert!(signal.confidence > 70);
    assert!(signal.target_price.unwrap() > signal.entry_price);
    assert!(signal.stop_loss_price.unwrap() < signal.entry_price);
    assert!(!signal.reasons.is_empty());
}

#[test]
fn test_buy_blocked_by_rug_probability() {
    let gen = generator();
    let mut input = buy_candidate("MINT_B");
    input.ml.rug_probability = 0.45; // above the 0.30 BUY ceiling

    assert!(gen.generate(&input, &[], &[]).is_none());
}

#[test]
fn test_buy_blocked_by_low_safety() {
    let gen = generator();
    let mut input = buy_candidate("MINT_C");
    input.analysis.risk_score = 35.0; // below the 40 BUY floor

    assert!(gen.generate(&input, &[], &[]).is_none());
}

#[test]
fn test_high_rug_yields_sell() {
    let gen = generator();
    // A pumping honeypot: strong flow and holders, terrible safety facts
    let mut input = junk_candidate("MINT_D");
    input.analysis.risk_score = 10.0;
    input.analysis.holder_count = 5000;
    input.analysis.top10_holder_percent = 20.0;
    input.analysis.smart_money = Some(SmartMoneyActivity {
        net_buys: 10,
        unique_wallets: 10,
    });
    input.market.price_change_1h = 30.0;
    input.market.price_change_24h = 100.0;
    input.market.volume_1h = dec!(20000);
    input.market.volume_24h = dec!(120000);
    input.ml.rug_probability = 0.85;

    let signal = gen.generate(&input, &[], &[]);

    // rug 0.85 > 0.7 qualifies the SELL path when confidence clears 50
    match signal {
        Some(s) => assert_eq!(s.signal_type, SignalType::Sell),
        None => panic!("expected SELL signal"),
    }
}

#[test]
fn test_price_crash_sells_regardless_of_confidence() {
    let gen = generator();
    let mut input = junk_candidate("MINT_E");
    input.market.price_change_1h = -35.0;

    let signal = gen.generate(&input, &[], &[]).expect("crash must sell");

    assert_eq!(signal.signal_type, SignalType::Sell);
    // The crash branch ignores the confidence floor entirely
    assert!(signal.confidence < 20);
    assert!(signal
        .reasons
        .iter()
        .any(|r| r.contains("1h price down")));
}

#[test]
fn test_middling_candidate_yields_nothing() {
    let gen = generator();
    let mut input = buy_candidate("MINT_F");
    // Neither BUY (rug too high) nor SELL (rug too low, safety fine)
    input.ml.rug_probability = 0.5;
    input.market.price_change_1h = 2.0;

    assert!(gen.generate(&input, &[], &[]).is_none());
}

#[test]
fn test_token_cooldown_suppresses_second_signal() {
    let gen = generator();
    let input = buy_candidate("MINT_G");

    assert!(gen.generate(&input, &[], &[]).is_some());
    assert!(gen.generate(&input, &[], &[]).is_none());
}

#[test]
fn test_cooldown_is_per_token() {
    let gen = generator();

    assert!(gen.generate(&buy_candidate("MINT_H"), &[], &[]).is_some());
    assert!(gen.generate(&buy_candidate("MINT_I"), &[], &[]).is_some());
}

#[test]
fn test_confidence_stays_in_range() {
    let gen = generator();

    // Best case everything
    let mut best = buy_candidate("BEST");
    best.ml.rug_probability = 0.0;
    best.analysis.risk_score = 100.0;
    best.analysis.smart_money = Some(SmartMoneyActivity {
        net_buys: 50,
        unique_wallets: 40,
    });
    best.analysis.holder_count = 100_000;
    best.analysis.top10_holder_percent = 0.0;
    best.market.price_change_1h = 500.0;
    best.market.price_change_24h = 2000.0;
    best.market.volume_1h = dec!(1000000);
    let high = gen.calculate_confidence(&best);
    assert!(high > 90);
    assert!(high <= 100);

    // Worst case everything, including zero liquidity
    let mut worst = junk_candidate("WORST");
    worst.analysis.liquidity_usd = dec!(0);
    worst.market.price_change_1h = -99.0;
    worst.market.price_change_24h = -100.0;
    let low = gen.calculate_confidence(&worst);
    assert!(low < 20);
}

#[test]
fn test_neutral_subscores_without_data() {
    let gen = generator();
    let mut input = buy_candidate("MINT_J");
    input.analysis.smart_money = None;

    let signal = gen.generate(&input, &[], &[]).expect("still a buy");
    assert!((signal.smart_money_score - 0.5).abs() < 1e-9);
}

#[test]
fn test_correlation_block_suppresses_signal() {
    let gen = SignalGenerator::new(
        SignalConfig::default(),
        KellyConfig::default(),
        CorrelationConfig {
            max_correlated_signals: 2,
            ..Default::default()
        },
    )
    .unwrap();

    // Two active signals nearly identical to the candidate
    let first = gen
        .generate(&buy_candidate("MINT_K"), &[], &[])
        .expect("first signal");
    let second = gen
        .generate(&buy_candidate("MINT_L"), &[first.clone()], &[])
        .expect("second signal");

    let blocked = gen.generate(&buy_candidate("MINT_M"), &[first, second], &[]);
    assert!(blocked.is_none());
}

#[test]
fn test_correlation_warning_below_block() {
    let gen = generator();
    let first = gen
        .generate(&buy_candidate("MINT_N"), &[], &[])
        .expect("first signal");

    // Default max_correlated_signals is 3; one correlated pair only warns
    let second = gen
        .generate(&buy_candidate("MINT_O"), &[first], &[])
        .expect("second signal");
    assert!(second
        .warnings
        .iter()
        .any(|w| w.contains("Correlated with 1 active signal")));
}

#[test]
fn test_price_target_tiers() {
    let gen = generator();

    // Safe token: tight targets
    let safe = gen.generate(&buy_candidate("MINT_P"), &[], &[]).unwrap();
    assert_eq!(safe.target_price.unwrap(), safe.entry_price * dec!(1.3));
    assert_eq!(safe.stop_loss_price.unwrap(), safe.entry_price * dec!(0.85));

    // Mid-tier safety: default targets
    let mut mid_input = buy_candidate("MINT_Q");
    mid_input.analysis.risk_score = 55.0;
    let mid = gen.generate(&mid_input, &[], &[]).unwrap();
    assert_eq!(mid.target_price.unwrap(), mid.entry_price * dec!(1.5));
    assert_eq!(mid.stop_loss_price.unwrap(), mid.entry_price * dec!(0.8));
}

#[test]
fn test_fallback_sizing_without_history() {
    let gen = generator();
    let signal = gen.generate(&buy_candidate("MINT_R"), &[], &[]).unwrap();

    // No trade history: Kelly falls back to the confidence/safety scaled
    // percentage
    assert_eq!(signal.position_size_kind, PositionSizeKind::PercentOfBankroll);
    assert!(signal.position_size > dec!(0));
    assert!(signal.position_size <= dec!(5));
}

#[test]
fn test_fixed_unit_fallback() {
    let gen = SignalGenerator::new(
        SignalConfig {
            fixed_position_units: Some(dec!(0.1)),
            ..Default::default()
        },
        KellyConfig::default(),
        CorrelationConfig::default(),
    )
    .unwrap();

    let signal = gen.generate(&buy_candidate("MINT_S"), &[], &[]).unwrap();
    assert_eq!(signal.position_size_kind, PositionSizeKind::FixedUnits);
    assert_eq!(signal.position_size, dec!(0.1));
}

#[test]
fn test_invalid_weights_rejected_at_construction() {
    let config = SignalConfig {
        weights: super::ConfidenceWeights {
            rug: 0.5,
            risk: 0.5,
            smart_money: 0.5,
            momentum: 0.5,
            holders: 0.5,
        },
        ..Default::default()
    };
    assert!(SignalGenerator::new(
        config,
        KellyConfig::default(),
        CorrelationConfig::default()
    )
    .is_err());
}

#[test]
fn test_warnings_for_risky_facts() {
    let gen = generator();
    let mut input = buy_candidate("MINT_T");
    input.analysis.liquidity_usd = dec!(4000);
    input.analysis.top10_holder_percent = 55.0;
    input.analysis.socials_present = false;

    let signal = gen.generate(&input, &[], &[]).expect("still qualifies");

    assert!(signal.warnings.iter().any(|w| w.contains("Low liquidity")));
    assert!(signal
        .warnings
        .iter()
        .any(|w| w.contains("Top-10 wallets hold")));
    assert!(signal
        .warnings
        .iter()
        .any(|w| w.contains("No social presence")));
}
