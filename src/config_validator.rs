//! Threshold configuration validation.
//!
//! Runs once at startup and again on every reload. Collects every violation
//! instead of stopping at the first so an operator can fix a document in one
//! pass. A configuration with any violation never reaches the pipeline.

use crate::config::{MAX_DURATION_SECS, PerRegime, SignalThresholds, ThresholdConfig};
use crate::reason_tags::ReasonTag;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Number of independent sub-signals the direction vote draws from.
pub const SUB_SIGNAL_COUNT: u32 = 5;

/// Sections whose keys may be omitted from a document.
const OPTIONAL_SECTIONS: [&str; 1] = ["reason_tags"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigViolation {
    pub path: String,
    pub message: String,
}

impl ConfigViolation {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Structural pass over an untyped document. The reference shape is the
/// default configuration, so every key the typed config needs is checked,
/// including each regime under `signal` and `confidence.regime_cap`.
pub fn check_required_keys(document: &Value) -> Vec<ConfigViolation> {
    let mut violations = Vec::new();
    let reference = match serde_json::to_value(ThresholdConfig::default()) {
        Ok(v) => v,
        Err(e) => {
            violations.push(ConfigViolation::new("", format!("reference shape unavailable: {}", e)));
            return violations;
        }
    };
    walk_required(&reference, document, "", &mut violations);
    violations
}

fn walk_required(reference: &Value, document: &Value, prefix: &str, out: &mut Vec<ConfigViolation>) {
    let Some(expected) = reference.as_object() else {
        return;
    };
    let actual = document.as_object();

    for (key, child) in expected {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        if prefix.is_empty() && OPTIONAL_SECTIONS.contains(&key.as_str()) {
            continue;
        }
        match actual.and_then(|obj| obj.get(key)) {
            None | Some(Value::Null) => out.push(ConfigViolation::new(path, "required key is missing")),
            Some(found) => {
                if child.is_object() && !found.is_object() {
                    out.push(ConfigViolation::new(path, "expected a table"));
                } else {
                    walk_required(child, found, &path, out);
                }
            }
        }
    }
}

/// Semantic pass over a typed configuration.
pub fn validate(cfg: &ThresholdConfig) -> Result<(), Vec<ConfigViolation>> {
    let mut v = Vec::new();

    check_data(cfg, &mut v);
    check_regime(cfg, &mut v);
    check_risk(cfg, &mut v);
    check_quality(cfg, &mut v);
    check_signal(&cfg.signal, &mut v);
    check_confidence(cfg, &mut v);
    check_frequency(cfg, &mut v);
    check_reason_tags(cfg, &mut v);

    if v.is_empty() { Ok(()) } else { Err(v) }
}

fn non_negative(path: &str, value: f64, out: &mut Vec<ConfigViolation>) {
    if !value.is_finite() || value < 0.0 {
        out.push(ConfigViolation::new(path, format!("must be a finite value >= 0 (got {})", value)));
    }
}

fn positive(path: &str, value: f64, out: &mut Vec<ConfigViolation>) {
    if !value.is_finite() || value <= 0.0 {
        out.push(ConfigViolation::new(path, format!("must be a finite value > 0 (got {})", value)));
    }
}

fn unit_interval(path: &str, value: f64, out: &mut Vec<ConfigViolation>) {
    if !(0.0..=1.0).contains(&value) {
        out.push(ConfigViolation::new(path, format!("must lie within [0, 1] (got {})", value)));
    }
}

fn bounded_duration(path: &str, secs: u64, out: &mut Vec<ConfigViolation>) {
    if secs > MAX_DURATION_SECS {
        out.push(ConfigViolation::new(
            path,
            format!("must be at most {} seconds (got {})", MAX_DURATION_SECS, secs),
        ));
    }
}

fn check_data(cfg: &ThresholdConfig, out: &mut Vec<ConfigViolation>) {
    bounded_duration("data.max_snapshot_age_secs", cfg.data.max_snapshot_age_secs, out);
    positive("data.max_abs_percent_change", cfg.data.max_abs_percent_change, out);
    positive("data.max_abs_funding_rate", cfg.data.max_abs_funding_rate, out);
    if cfg.data.cumulative_streak == 0 {
        out.push(ConfigViolation::new("data.cumulative_streak", "must be at least 1"));
    }
}

fn check_regime(cfg: &ThresholdConfig, out: &mut Vec<ConfigViolation>) {
    let r = &cfg.regime;
    positive("regime.extreme_abs_price_change_1h", r.extreme_abs_price_change_1h, out);
    positive("regime.extreme_abs_oi_change_1h", r.extreme_abs_oi_change_1h, out);
    non_negative("regime.trend.min_abs_price_change_1h", r.trend.min_abs_price_change_1h, out);
    non_negative("regime.trend.min_abs_price_change_6h", r.trend.min_abs_price_change_6h, out);
    unit_interval("regime.trend.min_abs_imbalance", r.trend.min_abs_imbalance, out);
    non_negative("regime.range.max_abs_price_change_1h", r.range.max_abs_price_change_1h, out);
    unit_interval("regime.range.max_abs_imbalance", r.range.max_abs_imbalance, out);

    if r.trend.min_abs_price_change_1h <= r.range.max_abs_price_change_1h {
        out.push(ConfigViolation::new(
            "regime.trend.min_abs_price_change_1h",
            format!(
                "trend entry ({}) must be stricter than the range ceiling ({})",
                r.trend.min_abs_price_change_1h, r.range.max_abs_price_change_1h
            ),
        ));
    }
    if r.trend.min_abs_imbalance <= r.range.max_abs_imbalance {
        out.push(ConfigViolation::new(
            "regime.trend.min_abs_imbalance",
            format!(
                "trend entry ({}) must be stricter than the range ceiling ({})",
                r.trend.min_abs_imbalance, r.range.max_abs_imbalance
            ),
        ));
    }
    if r.extreme_abs_price_change_1h <= r.trend.min_abs_price_change_1h {
        out.push(ConfigViolation::new(
            "regime.extreme_abs_price_change_1h",
            "outlier cutoff must exceed the trend entry threshold",
        ));
    }
    if r.extreme_abs_price_change_1h > cfg.data.max_abs_percent_change {
        out.push(ConfigViolation::new(
            "regime.extreme_abs_price_change_1h",
            "outlier cutoff lies outside the data sanity band and can never fire",
        ));
    }
}

fn check_risk(cfg: &ThresholdConfig, out: &mut Vec<ConfigViolation>) {
    let r = &cfg.risk;
    positive("risk.max_abs_funding_rate", r.max_abs_funding_rate, out);
    positive("risk.max_oi_crowding_6h", r.max_oi_crowding_6h, out);
    positive("risk.volume_spike_ratio", r.volume_spike_ratio, out);
    positive("risk.liquidation_price_change_1h", r.liquidation_price_change_1h, out);
    positive("risk.liquidation_oi_change_1h", r.liquidation_oi_change_1h, out);

    if r.max_abs_funding_rate > cfg.data.max_abs_funding_rate {
        out.push(ConfigViolation::new(
            "risk.max_abs_funding_rate",
            "admission limit lies outside the data sanity band and can never fire",
        ));
    }
    if r.volume_spike_ratio <= 1.0 {
        out.push(ConfigViolation::new(
            "risk.volume_spike_ratio",
            "a spike must be above the 24h hourly average (ratio > 1)",
        ));
    }
}

fn check_quality(cfg: &ThresholdConfig, out: &mut Vec<ConfigViolation>) {
    let q = &cfg.quality;
    non_negative("quality.min_volume_ratio", q.min_volume_ratio, out);
    non_negative("quality.poor_volume_ratio", q.poor_volume_ratio, out);
    non_negative("quality.elevated_funding_rate", q.elevated_funding_rate, out);
    non_negative("quality.divergence_price_change", q.divergence_price_change, out);
    unit_interval("quality.divergence_imbalance", q.divergence_imbalance, out);

    if q.poor_volume_ratio >= q.min_volume_ratio {
        out.push(ConfigViolation::new(
            "quality.poor_volume_ratio",
            "must be below quality.min_volume_ratio",
        ));
    }
    if q.elevated_funding_rate >= cfg.risk.max_abs_funding_rate {
        out.push(ConfigViolation::new(
            "quality.elevated_funding_rate",
            "must be below risk.max_abs_funding_rate",
        ));
    }
}

fn check_signal_set(path: &str, s: &SignalThresholds, out: &mut Vec<ConfigViolation>) {
    if s.required_signals == 0 || s.required_signals > SUB_SIGNAL_COUNT {
        out.push(ConfigViolation::new(
            format!("{}.required_signals", path),
            format!("must be within 1..={} (got {})", SUB_SIGNAL_COUNT, s.required_signals),
        ));
    }
    non_negative(&format!("{}.price_change_1h", path), s.price_change_1h, out);
    non_negative(&format!("{}.price_change_6h", path), s.price_change_6h, out);
    unit_interval(&format!("{}.imbalance", path), s.imbalance, out);
    positive(&format!("{}.volume_ratio", path), s.volume_ratio, out);
    non_negative(&format!("{}.oi_change_1h", path), s.oi_change_1h, out);
}

fn check_signal(signal: &PerRegime<SignalThresholds>, out: &mut Vec<ConfigViolation>) {
    check_signal_set("signal.trend", &signal.trend, out);
    check_signal_set("signal.range", &signal.range, out);
    check_signal_set("signal.extreme", &signal.extreme, out);

    // Trends persist, so trend confirmation must be at most as strict as range.
    let (t, r) = (&signal.trend, &signal.range);
    let pairs = [
        ("price_change_1h", t.price_change_1h, r.price_change_1h),
        ("price_change_6h", t.price_change_6h, r.price_change_6h),
        ("imbalance", t.imbalance, r.imbalance),
        ("volume_ratio", t.volume_ratio, r.volume_ratio),
        ("oi_change_1h", t.oi_change_1h, r.oi_change_1h),
    ];
    for (key, trend, range) in pairs {
        if trend > range {
            out.push(ConfigViolation::new(
                format!("signal.trend.{}", key),
                format!("trend threshold ({}) must not exceed range threshold ({})", trend, range),
            ));
        }
    }
    if t.required_signals > r.required_signals {
        out.push(ConfigViolation::new(
            "signal.trend.required_signals",
            "trend must not require more agreeing signals than range",
        ));
    }
}

fn check_confidence(cfg: &ThresholdConfig, out: &mut Vec<ConfigViolation>) {
    let c = &cfg.confidence;
    if c.high_margin >= c.ultra_margin {
        out.push(ConfigViolation::new(
            "confidence.high_margin",
            "must be below confidence.ultra_margin",
        ));
    }
    if c.reduced_min_tier > c.allow_min_tier {
        out.push(ConfigViolation::new(
            "confidence.reduced_min_tier",
            "must not exceed confidence.allow_min_tier",
        ));
    }
    if c.executable_floor > c.allow_min_tier {
        out.push(ConfigViolation::new(
            "confidence.executable_floor",
            "an ALLOW decision below the executable floor could never execute",
        ));
    }
    if c.executable_floor == crate::model::ConfidenceTier::Low {
        out.push(ConfigViolation::new(
            "confidence.executable_floor",
            "LOW confidence must never be executable",
        ));
    }
}

fn check_frequency(cfg: &ThresholdConfig, out: &mut Vec<ConfigViolation>) {
    let f = &cfg.frequency;
    bounded_duration("frequency.min_decision_interval_secs", f.min_decision_interval_secs, out);
    bounded_duration("frequency.cooldown_secs", f.cooldown_secs, out);
    if f.cooldown_secs < f.min_decision_interval_secs {
        out.push(ConfigViolation::new(
            "frequency.cooldown_secs",
            "cooldown must be at least the minimum decision interval",
        ));
    }
    if f.flip_backoff_cap == 0 {
        out.push(ConfigViolation::new("frequency.flip_backoff_cap", "must be at least 1"));
    }
    if f.idle_after_no_trade == 0 {
        out.push(ConfigViolation::new("frequency.idle_after_no_trade", "must be at least 1"));
    }
}

fn check_reason_tags(cfg: &ThresholdConfig, out: &mut Vec<ConfigViolation>) {
    let mut seen_labels: HashMap<String, String> = HashMap::new();
    let mut seen_tags: HashMap<ReasonTag, String> = HashMap::new();

    for (key, label) in &cfg.reason_tags.labels {
        let path = format!("reason_tags.labels.{}", key);
        // Some sources lower-case keys; identifiers are matched case-insensitively.
        let tag = match key.to_ascii_uppercase().parse::<ReasonTag>() {
            Ok(tag) => tag,
            Err(e) => {
                out.push(ConfigViolation::new(path, e));
                continue;
            }
        };
        if let Some(first) = seen_tags.insert(tag, key.clone()) {
            out.push(ConfigViolation::new(
                path.clone(),
                format!("duplicates the entry for '{}'", first),
            ));
        }
        let normalized = label.trim().to_lowercase();
        if normalized.is_empty() {
            out.push(ConfigViolation::new(path, "label must not be empty"));
            continue;
        }
        if let Some(other) = seen_labels.insert(normalized, key.clone()) {
            out.push(ConfigViolation::new(
                path,
                format!("label '{}' is already used by '{}'", label, other),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConfidenceTier;

    fn paths(violations: &[ConfigViolation]) -> Vec<&str> {
        violations.iter().map(|v| v.path.as_str()).collect()
    }

    #[test]
    fn test_defaults_pass() {
        assert!(validate(&ThresholdConfig::default()).is_ok());
    }

    #[test]
    fn test_reports_every_violation() {
        let mut cfg = ThresholdConfig::default();
        cfg.signal.trend.required_signals = 9;
        cfg.regime.range.max_abs_imbalance = 1.5;
        cfg.frequency.cooldown_secs = 10;

        let violations = validate(&cfg).unwrap_err();
        let p = paths(&violations);
        assert!(p.contains(&"signal.trend.required_signals"));
        assert!(p.contains(&"regime.range.max_abs_imbalance"));
        assert!(p.contains(&"frequency.cooldown_secs"));
    }

    #[test]
    fn test_durations_are_bounded() {
        let mut cfg = ThresholdConfig::default();
        cfg.frequency.cooldown_secs = u64::MAX;
        cfg.frequency.min_decision_interval_secs = MAX_DURATION_SECS + 1;
        cfg.data.max_snapshot_age_secs = u64::MAX;

        let violations = validate(&cfg).unwrap_err();
        let p = paths(&violations);
        assert!(p.contains(&"frequency.cooldown_secs"));
        assert!(p.contains(&"frequency.min_decision_interval_secs"));
        assert!(p.contains(&"data.max_snapshot_age_secs"));

        cfg = ThresholdConfig::default();
        cfg.frequency.cooldown_secs = MAX_DURATION_SECS;
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn test_trend_must_be_stricter_than_range_for_regime() {
        let mut cfg = ThresholdConfig::default();
        cfg.regime.trend.min_abs_price_change_1h = 0.3;
        let violations = validate(&cfg).unwrap_err();
        assert!(paths(&violations).contains(&"regime.trend.min_abs_price_change_1h"));
    }

    #[test]
    fn test_trend_signal_looser_than_range() {
        let mut cfg = ThresholdConfig::default();
        cfg.signal.trend.imbalance = 0.9;
        let violations = validate(&cfg).unwrap_err();
        assert!(paths(&violations).contains(&"signal.trend.imbalance"));
    }

    #[test]
    fn test_tier_ordering() {
        let mut cfg = ThresholdConfig::default();
        cfg.confidence.reduced_min_tier = ConfidenceTier::Ultra;
        cfg.confidence.executable_floor = ConfidenceTier::Low;
        let p = validate(&cfg).unwrap_err();
        assert!(paths(&p).contains(&"confidence.reduced_min_tier"));
        assert!(paths(&p).contains(&"confidence.executable_floor"));
    }

    #[test]
    fn test_reason_tag_labels() {
        let mut cfg = ThresholdConfig::default();
        cfg.reason_tags.labels.insert("INVALID_DATA".into(), "Bad data".into());
        cfg.reason_tags.labels.insert("stale_data".into(), "bad data".into());
        cfg.reason_tags.labels.insert("INVALID_DATTA".into(), "Typo".into());

        let violations = validate(&cfg).unwrap_err();
        assert_eq!(violations.len(), 2, "{:?}", violations);
        assert!(violations.iter().any(|v| v.message.contains("unknown reason tag")));
        assert!(violations.iter().any(|v| v.message.contains("already used")));
    }

    #[test]
    fn test_required_keys_per_regime() {
        let mut doc = serde_json::to_value(ThresholdConfig::default()).unwrap();
        doc["signal"].as_object_mut().unwrap().remove("extreme");
        doc["confidence"]["regime_cap"].as_object_mut().unwrap().remove("range");

        let missing = check_required_keys(&doc);
        let p = paths(&missing);
        assert!(p.contains(&"signal.extreme"));
        assert!(p.contains(&"confidence.regime_cap.range"));
    }

    #[test]
    fn test_reason_tags_section_optional() {
        let mut doc = serde_json::to_value(ThresholdConfig::default()).unwrap();
        doc.as_object_mut().unwrap().remove("reason_tags");
        assert!(check_required_keys(&doc).is_empty());
    }
}
