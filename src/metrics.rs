use once_cell::sync::Lazy;
use prometheus::{
    Histogram, IntCounter, IntCounterVec, IntGauge, register_histogram, register_int_counter,
    register_int_counter_vec, register_int_gauge,
};

// --- Pipeline ---

pub static PIPELINE_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "titan_decision_pipeline_latency_seconds",
        "Time from snapshot intake to published decision",
        vec![0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01]
    )
    .expect("pipeline_latency histogram")
});

pub static DECISIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "titan_decision_decisions_total",
        "Published decisions by kind",
        &["decision"]
    )
    .expect("decisions counter")
});

pub static EXECUTABLE_DECISIONS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "titan_decision_executable_total",
        "Published decisions that passed the double threshold"
    )
    .expect("executable counter")
});

pub static INVALID_SNAPSHOTS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "titan_decision_invalid_snapshots_total",
        "Snapshots rejected by data validation"
    )
    .expect("invalid_snapshots counter")
});

pub static SUPPRESSED_DECISIONS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "titan_decision_suppressed_total",
        "Directional candidates suppressed by frequency control"
    )
    .expect("suppressed counter")
});

pub static RISK_DENIALS: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "titan_decision_risk_denials_total",
        "Snapshots denied by risk admission"
    )
    .expect("risk_denials counter")
});

// --- Health ---

pub static STATE_INCONSISTENCIES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "titan_decision_state_inconsistencies_total",
        "Evaluations aborted on inconsistent decision memory"
    )
    .expect("state_inconsistencies counter")
});

pub static CONFIG_RELOADS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "titan_decision_config_reloads_total",
        "Threshold configuration reload attempts",
        &["outcome"]
    )
    .expect("config_reloads counter")
});

pub static HALTED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "titan_decision_halted",
        "Operator halt switch (1 = halted)"
    )
    .expect("halted gauge")
});

pub fn observe_pipeline_latency(duration_sec: f64) {
    PIPELINE_LATENCY.observe(duration_sec);
}

pub fn inc_decision(kind: &str, executable: bool) {
    DECISIONS.with_label_values(&[kind]).inc();
    if executable {
        EXECUTABLE_DECISIONS.inc();
    }
}

pub fn inc_invalid_snapshots() {
    INVALID_SNAPSHOTS.inc();
}

pub fn inc_suppressed() {
    SUPPRESSED_DECISIONS.inc();
}

pub fn inc_risk_denials() {
    RISK_DENIALS.inc();
}

pub fn inc_state_inconsistencies() {
    STATE_INCONSISTENCIES.inc();
}

pub fn inc_config_reload(accepted: bool) {
    let outcome = if accepted { "accepted" } else { "rejected" };
    CONFIG_RELOADS.with_label_values(&[outcome]).inc();
}

pub fn set_halted(halted: bool) {
    HALTED.set(i64::from(halted));
}

/// Text exposition of every registered metric.
pub fn render() -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let mut buf = Vec::new();
    if encoder.encode(&prometheus::gather(), &mut buf).is_err() {
        return String::new();
    }
    String::from_utf8(buf).unwrap_or_default()
}
