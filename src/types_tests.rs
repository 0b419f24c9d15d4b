//! Tests for core types

#[cfg(test)]
mod tests {
    use crate::types::*;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn signal() -> TradingSignal {
        let now = Utc::now();
        TradingSignal {
            id: Uuid::new_v4(),
            mint: "So11111111111111111111111111111111111111112".to_string(),
            symbol: "PULSE".to_string(),
            name: "Pulse Token".to_string(),
            signal_type: SignalType::Buy,
            confidence: 78,
            position_size: dec!(2.5),
            position_size_kind: PositionSizeKind::PercentOfBankroll,
            rug_probability: 0.1,
            smart_money_score: 0.7,
            momentum_score: 0.65,
            holder_score: 0.89,
            risk_score: 80.0,
            entry_price: dec!(0.000045),
            target_price: Some(dec!(0.0000585)),
            stop_loss_price: Some(dec!(0.00003825)),
            liquidity_usd: dec!(50000),
            holder_count: 1200,
            top10_holder_percent: 22.0,
            price_change_1h: 30.0,
            reasons: vec!["Low rug probability (10%)".to_string()],
            warnings: vec![],
            generated_at: now,
            expires_at: now + Duration::hours(6),
            status: SignalStatus::Active,
        }
    }

    #[test]
    fn test_signal_type_serialization() {
        assert_eq!(serde_json::to_string(&SignalType::Buy).unwrap(), "\"BUY\"");
        assert_eq!(serde_json::to_string(&SignalType::Sell).unwrap(), "\"SELL\"");
        assert_eq!(
            serde_json::to_string(&SignalType::TakeProfit).unwrap(),
            "\"TAKE_PROFIT\""
        );
        assert_eq!(
            serde_json::to_string(&SignalType::StopLoss).unwrap(),
            "\"STOP_LOSS\""
        );
    }

    #[test]
    fn test_signal_type_deserialization() {
        let buy: SignalType = serde_json::from_str("\"BUY\"").unwrap();
        let sell: SignalType = serde_json::from_str("\"SELL\"").unwrap();
        assert_eq!(buy, SignalType::Buy);
        assert_eq!(sell, SignalType::Sell);
    }

    #[test]
    fn test_signal_type_display() {
        assert_eq!(SignalType::Buy.to_string(), "BUY");
        assert_eq!(SignalType::TakeProfit.to_string(), "TAKE_PROFIT");
    }

    #[test]
    fn test_status_terminality() {
        assert!(!SignalStatus::Active.is_terminal());
        assert!(!SignalStatus::Acknowledged.is_terminal());
        assert!(SignalStatus::Expired.is_terminal());
        assert!(SignalStatus::Executed.is_terminal());
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(
            serde_json::to_string(&SignalStatus::Active).unwrap(),
            "\"active\""
        );
        assert_eq!(
            serde_json::to_string(&SignalStatus::Acknowledged).unwrap(),
            "\"acknowledged\""
        );
    }

    #[test]
    fn test_signal_round_trip() {
        let original = signal();
        let json = serde_json::to_string(&original).unwrap();
        let decoded: TradingSignal = serde_json::from_str(&json).unwrap();

        assert_eq!(decoded.id, original.id);
        assert_eq!(decoded.signal_type, original.signal_type);
        assert_eq!(decoded.entry_price, original.entry_price);
        assert_eq!(decoded.status, original.status);
    }

    #[test]
    fn test_signal_expiry_check() {
        let s = signal();
        assert!(!s.is_expired_at(Utc::now()));
        assert!(s.is_expired_at(Utc::now() + Duration::hours(7)));
    }

    #[test]
    fn test_outcome_stub_copies_predictions() {
        let s = signal();
        let outcome = SignalOutcome::pending(&s);

        assert_eq!(outcome.signal_id, s.id);
        assert_eq!(outcome.predicted_entry, s.entry_price);
        assert_eq!(outcome.predicted_target, s.target_price);
        assert_eq!(outcome.predicted_stop, s.stop_loss_price);
        assert!(outcome.actual_entry.is_none());
        assert!(!outcome.is_recorded());
    }

    #[test]
    fn test_filter_matches_all_by_default() {
        let filter = SignalFilter::default();
        assert!(filter.matches(&signal()));
    }

    #[test]
    fn test_filter_criteria() {
        let s = signal();

        let wrong_type = SignalFilter {
            signal_type: Some(SignalType::Sell),
            ..Default::default()
        };
        assert!(!wrong_type.matches(&s));

        let too_confident = SignalFilter {
            min_confidence: Some(90),
            ..Default::default()
        };
        assert!(!too_confident.matches(&s));

        let matching = SignalFilter {
            signal_type: Some(SignalType::Buy),
            status: Some(SignalStatus::Active),
            mint: Some(s.mint.clone()),
            min_confidence: Some(70),
            since: Some(s.generated_at - Duration::minutes(1)),
        };
        assert!(matching.matches(&s));
    }

    #[test]
    fn test_analysis_deserializes_with_optional_fields() {
        let json = r#"{
            "mint": "abc",
            "symbol": "ABC",
            "name": "Abc Token",
            "risk_score": 65.0,
            "liquidity_usd": "25000",
            "holder_count": 400,
            "top10_holder_percent": 30.0,
            "mint_revoked": true,
            "freeze_revoked": true,
            "lp_burned_percent": 100.0
        }"#;
        let analysis: TokenAnalysis = serde_json::from_str(json).unwrap();
        assert!(analysis.smart_money.is_none());
        assert!(!analysis.socials_present);
        assert_eq!(analysis.liquidity_usd, dec!(25000));
    }
}
