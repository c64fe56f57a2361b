//! End-to-end decision scenarios
//!
//! Quiet market, liquidation cascade, clean uptrend and a direction flip
//! inside the cooldown window, each driven through the public engine.

mod common;

use common::*;
use serde_json::json;
use titan_decision_rs::config::{SuppressionPolicy, ThresholdConfig};
use titan_decision_rs::context::DecisionContext;
use titan_decision_rs::engine::DecisionEngine;
use titan_decision_rs::model::{
    ConfidenceTier, DecisionKind, ExecutionPermission, MarketRegime, StepStatus, SystemState,
    TradeQuality,
};
use titan_decision_rs::reason_tags::ReasonTag;

fn engine_with(config: ThresholdConfig) -> DecisionEngine {
    let (ctx, _clock) = DecisionContext::new_simulated(T0);
    DecisionEngine::with_context(config, ctx).expect("engine")
}

fn engine() -> DecisionEngine {
    engine_with(ThresholdConfig::default())
}

#[test]
fn test_quiet_market_no_trade() {
    let engine = engine();
    let eval = engine.evaluate("BTCUSDT", &quiet(T0)).unwrap();
    let d = &eval.decision;

    assert_eq!(d.decision, DecisionKind::NoTrade);
    assert_eq!(d.market_regime, Some(MarketRegime::Range));
    assert_ne!(d.trade_quality, TradeQuality::Poor);
    assert!(!d.executable);
    assert!(d.has_tag(ReasonTag::RangeBound));
    assert!(d.has_tag(ReasonTag::InsufficientAgreement));
    assert_eq!(d.system_state, SystemState::Idle);

    println!("✅ Quiet market stays flat");
}

#[test]
fn test_liquidation_cascade_denied() {
    let engine = engine();
    let eval = engine.evaluate("BTCUSDT", &cascade(T0)).unwrap();
    let d = &eval.decision;

    assert_eq!(d.market_regime, Some(MarketRegime::Extreme));
    assert!(!d.risk_exposure_allowed);
    assert_eq!(d.decision, DecisionKind::NoTrade);
    assert_eq!(d.execution_permission, ExecutionPermission::Deny);
    assert!(d.has_tag(ReasonTag::LiquidationCascade));
    assert!(d.has_tag(ReasonTag::RiskBlocked));

    let trace = &eval.trace;
    assert_eq!(trace.step(4).unwrap().status, StepStatus::Failed);
    assert_eq!(trace.step(6).unwrap().status, StepStatus::Pending);
    assert_eq!(trace.step(7).unwrap().status, StepStatus::Pending);
    assert_eq!(trace.step(8).unwrap().status, StepStatus::Success);

    println!("✅ Liquidation cascade blocks exposure");
}

#[test]
fn test_strong_uptrend_long_allowed() {
    let engine = engine();
    let eval = engine.evaluate("BTCUSDT", &uptrend(T0)).unwrap();
    let d = &eval.decision;

    assert_eq!(d.decision, DecisionKind::Long);
    assert!(d.confidence >= ConfidenceTier::High);
    assert_eq!(d.execution_permission, ExecutionPermission::Allow);
    assert!(d.executable);
    assert_eq!(d.market_regime, Some(MarketRegime::Trend));
    assert_eq!(d.trade_quality, TradeQuality::Good);
    assert_eq!(d.system_state, SystemState::Active);
    assert!(d.has_tag(ReasonTag::BullishConsensus));
    assert_eq!(d.price, Some(66000.0));

    let steps: Vec<u8> = eval.trace.steps.iter().map(|s| s.step).collect();
    assert_eq!(steps, (1..=9).collect::<Vec<u8>>());

    println!("✅ Uptrend produces an executable LONG");
}

#[test]
fn test_flip_within_cooldown_suppressed() {
    let engine = engine();

    let first = engine.evaluate("BTCUSDT", &uptrend(T0)).unwrap();
    assert_eq!(first.decision.decision, DecisionKind::Long);

    let flip = engine.evaluate("BTCUSDT", &downtrend(T0 + 10 * MINUTE)).unwrap();
    assert_eq!(flip.decision.decision, DecisionKind::NoTrade);
    assert!(!flip.decision.executable);
    assert!(flip.decision.has_tag(ReasonTag::DirectionFlip));
    assert!(flip.decision.has_tag(ReasonTag::DecisionSuppressed));
    assert_eq!(flip.decision.system_state, SystemState::CoolDown);

    let still_cooling = engine.evaluate("BTCUSDT", &downtrend(T0 + 20 * MINUTE)).unwrap();
    assert_eq!(still_cooling.decision.decision, DecisionKind::NoTrade);
    assert!(still_cooling.decision.has_tag(ReasonTag::CooldownActive));

    let accepted = engine.evaluate("BTCUSDT", &downtrend(T0 + 45 * MINUTE)).unwrap();
    assert_eq!(accepted.decision.decision, DecisionKind::Short);
    assert!(accepted.decision.executable);
    assert!(accepted.decision.has_tag(ReasonTag::CooldownElapsed));

    println!("✅ Flip suppressed until cooldown elapsed");
}

#[test]
fn test_flip_holds_previous_direction_when_configured() {
    let mut config = ThresholdConfig::default();
    config.frequency.suppression_policy = SuppressionPolicy::HoldPrevious;
    let engine = engine_with(config);

    engine.evaluate("BTCUSDT", &uptrend(T0)).unwrap();
    let flip = engine.evaluate("BTCUSDT", &downtrend(T0 + 10 * MINUTE)).unwrap();
    let d = &flip.decision;

    assert_eq!(d.decision, DecisionKind::Long);
    assert!(!d.executable);
    assert_eq!(d.execution_permission, ExecutionPermission::Deny);
    assert!(d.has_tag(ReasonTag::HeldPreviousDirection));
    assert!(d.has_tag(ReasonTag::DirectionFlip));

    println!("✅ Suppressed flip holds the previous direction");
}

#[test]
fn test_latest_is_published_after_assembly() {
    let engine = engine();
    assert!(engine.latest("BTCUSDT").is_none());
    let eval = engine.evaluate("BTCUSDT", &uptrend(T0)).unwrap();
    let latest = engine.latest("BTCUSDT").unwrap();
    assert_eq!(latest.decision, eval.decision);
    assert_eq!(latest.trace.steps.len(), 9);
}

#[test]
fn test_split_vote_is_a_tie() {
    let engine = engine();
    // 6h trend up, flow selling; everything else abstains.
    let mut snapshot = quiet(T0);
    snapshot["price_change_1h"] = json!(0.3);
    snapshot["price_change_6h"] = json!(2.0);
    snapshot["buy_sell_imbalance"] = json!(-0.4);
    let eval = engine.evaluate("BTCUSDT", &snapshot).unwrap();
    let d = &eval.decision;

    assert_eq!(d.market_regime, Some(MarketRegime::Range));
    assert!(d.has_tag(ReasonTag::RegimeAmbiguous));
    assert!(d.has_tag(ReasonTag::SignalTie));
    assert_eq!(d.decision, DecisionKind::NoTrade);
    assert!(!d.executable);

    println!("✅ One bull vs one bear stays flat");
}

#[test]
fn test_short_squeeze_denied() {
    let engine = engine();
    let mut snapshot = uptrend(T0);
    snapshot["price_change_1h"] = json!(3.5);
    snapshot["oi_change_1h"] = json!(-9.0);
    let eval = engine.evaluate("BTCUSDT", &snapshot).unwrap();
    let d = &eval.decision;

    assert_eq!(d.market_regime, Some(MarketRegime::Trend));
    assert!(!d.risk_exposure_allowed);
    assert!(d.has_tag(ReasonTag::ShortSqueeze));
    assert!(d.has_tag(ReasonTag::RiskBlocked));
    assert_eq!(d.decision, DecisionKind::NoTrade);
    assert_eq!(d.execution_permission, ExecutionPermission::Deny);

    println!("✅ Short squeeze blocks exposure");
}

#[test]
fn test_hour_above_day_volume_inferred_as_counter() {
    let engine = engine();
    let mut first = quiet(T0);
    first["volume_1h"] = json!(30_000.0);
    first["volume_24h"] = json!(20_000.0);
    let eval = engine.evaluate("BTCUSDT", &first).unwrap();
    assert!(eval.decision.has_tag(ReasonTag::VolumeBaselinePending));
    assert!(engine.lane_state("BTCUSDT").unwrap().volume.is_cumulative());

    let mut second = quiet(T0 + HOUR);
    second["volume_1h"] = json!(30_500.0);
    second["volume_24h"] = json!(20_500.0);
    let eval = engine.evaluate("BTCUSDT", &second).unwrap();
    assert!(!eval.decision.has_tag(ReasonTag::InvalidData));
    assert!(eval.decision.has_tag(ReasonTag::CumulativeVolumeConverted));
    assert_eq!(eval.trace.step(2).unwrap().status, StepStatus::Warning);

    println!("✅ Undeclared counter recognized from 1h > 24h");
}
