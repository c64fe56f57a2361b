//! Threshold configuration tests
//!
//! Loading the shipped document, violation reporting, fatal startup and
//! reload semantics.

mod common;

use common::*;
use titan_decision_rs::config::ThresholdConfig;
use titan_decision_rs::context::DecisionContext;
use titan_decision_rs::engine::DecisionEngine;
use titan_decision_rs::error::DecisionError;
use titan_decision_rs::model::{ConfidenceTier, DecisionKind};
use titan_decision_rs::reason_tags::ReasonTag;

const SHIPPED: &str = include_str!("../config/decision.toml");

#[test]
fn test_shipped_config_matches_defaults() {
    let mut parsed = ThresholdConfig::from_toml_str(SHIPPED).expect("shipped config parses");
    assert_eq!(
        parsed.reason_tags.label_for(ReasonTag::InvalidData),
        Some("Snapshot failed validation")
    );
    assert!(parsed.clone().validate().is_ok());

    parsed.reason_tags = Default::default();
    assert_eq!(parsed, ThresholdConfig::default());

    println!("✅ config/decision.toml mirrors the built-in defaults");
}

#[test]
fn test_serialized_config_round_trips() {
    let mut original = ThresholdConfig::default();
    original.frequency.cooldown_secs = 900;
    original.signal.range.required_signals = 5;
    original.confidence.uncertain_cap = ConfidenceTier::Medium;

    let text = original.to_toml_string().unwrap();
    let parsed = ThresholdConfig::from_toml_str(&text).unwrap();
    assert_eq!(parsed, original);
    assert_eq!(parsed.fingerprint(), original.fingerprint());
}

#[test]
fn test_missing_regime_section_reported() {
    let doc = SHIPPED.replace("[signal.range]", "[signal.unused]");
    let err = ThresholdConfig::from_toml_str(&doc).unwrap_err();
    let paths: Vec<&str> = err.violations().iter().map(|v| v.path.as_str()).collect();
    assert!(paths.contains(&"signal.range"), "{:?}", paths);
}

#[test]
fn test_engine_refuses_invalid_config() {
    let mut config = ThresholdConfig::default();
    config.signal.trend.required_signals = 9;
    config.regime.trend.min_abs_imbalance = 1.5;

    let err = match DecisionEngine::new(config) {
        Err(e) => e,
        Ok(_) => panic!("invalid configuration accepted"),
    };
    assert!(matches!(err, DecisionError::InvalidConfig(_)));
    let paths: Vec<&str> = err.violations().iter().map(|v| v.path.as_str()).collect();
    assert!(paths.contains(&"signal.trend.required_signals"), "{:?}", paths);
    assert!(paths.contains(&"regime.trend.min_abs_imbalance"), "{:?}", paths);

    println!("✅ Startup refused with {} violation(s)", paths.len());
}

#[test]
fn test_unbounded_durations_refused() {
    let mut config = ThresholdConfig::default();
    config.frequency.cooldown_secs = u64::MAX;
    config.data.max_snapshot_age_secs = u64::MAX;

    let err = match DecisionEngine::new(config) {
        Err(e) => e,
        Ok(_) => panic!("unbounded cooldown accepted"),
    };
    let paths: Vec<&str> = err.violations().iter().map(|v| v.path.as_str()).collect();
    assert!(paths.contains(&"frequency.cooldown_secs"), "{:?}", paths);
    assert!(paths.contains(&"data.max_snapshot_age_secs"), "{:?}", paths);
}

#[test]
fn test_unknown_reason_tag_label_rejected() {
    let doc = format!("{}\nINVALID_DATTA = \"typo\"\n", SHIPPED);
    let config = ThresholdConfig::from_toml_str(&doc).unwrap();
    let err = config.validate().unwrap_err();
    assert!(
        err.violations()
            .iter()
            .any(|v| v.path.eq_ignore_ascii_case("reason_tags.labels.INVALID_DATTA")),
        "{}",
        err
    );
}

#[test]
fn test_reload_keeps_old_config_on_failure() {
    let (ctx, _clock) = DecisionContext::new_simulated(T0);
    let engine = DecisionEngine::with_context(ThresholdConfig::default(), ctx).unwrap();
    let original = engine.config().fingerprint().to_string();

    let mut broken = ThresholdConfig::default();
    broken.frequency.cooldown_secs = 10;
    assert!(engine.reload_config(broken).is_err());
    assert_eq!(engine.config().fingerprint(), original);

    let mut shorter = ThresholdConfig::default();
    shorter.frequency.cooldown_secs = 600;
    let fingerprint = engine.reload_config(shorter).unwrap();
    assert_ne!(fingerprint, original);
    assert_eq!(engine.config().fingerprint(), fingerprint);

    // The flip at +10 min now only cools down for 10 minutes.
    engine.evaluate("BTCUSDT", &uptrend(T0)).unwrap();
    engine.evaluate("BTCUSDT", &downtrend(T0 + 10 * MINUTE)).unwrap();
    let after = engine.evaluate("BTCUSDT", &downtrend(T0 + 21 * MINUTE)).unwrap();
    assert_eq!(after.decision.decision, DecisionKind::Short);

    println!("✅ Reload validated before swap");
}
