use crate::config::{PercentUnit, ThresholdConfig, secs_to_ms};
use crate::model::{MarketSnapshot, RawSnapshot, StepStatus, TraceStep};
use crate::reason_tags::{ReasonTag, ReasonTags};
use crate::volume::{VolumeReading, VolumeTracker};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

pub const STEP: u8 = 2;
pub const STEP_NAME: &str = "Data Validation";

/// Accepted snapshot timestamps, epoch milliseconds: after 2001-09-09 and
/// before 2100-01-01.
pub const MIN_TIMESTAMP_MS: i64 = 1_000_000_000_000;
pub const MAX_TIMESTAMP_MS: i64 = 4_102_444_800_000;

pub fn timestamp_in_range(timestamp: i64) -> bool {
    (MIN_TIMESTAMP_MS..=MAX_TIMESTAMP_MS).contains(&timestamp)
}

pub const REQUIRED_FIELDS: [&str; 10] = [
    "price",
    "price_change_1h",
    "price_change_6h",
    "volume_1h",
    "volume_24h",
    "buy_sell_imbalance",
    "funding_rate",
    "oi_change_1h",
    "oi_change_6h",
    "timestamp",
];

/// Outcome of step 2. When `is_valid` is false no later stage may run and
/// `snapshot` is `None`.
#[derive(Debug, Clone)]
pub struct Validation {
    pub is_valid: bool,
    pub snapshot: Option<MarketSnapshot>,
    pub error: Option<String>,
    pub reason_tags: ReasonTags,
    /// Whatever price/timestamp could be read, for the invalid decision record.
    pub price: Option<f64>,
    pub timestamp: Option<i64>,
    pub trace_step: TraceStep,
}

impl Validation {
    fn invalid(raw: &RawSnapshot, detail: Vec<ReasonTag>, errors: Vec<String>) -> Self {
        let mut tags = ReasonTags::new();
        tags.push(ReasonTag::InvalidData);
        tags.extend(detail);
        let message = errors.join("; ");
        Self {
            is_valid: false,
            snapshot: None,
            error: Some(message.clone()),
            reason_tags: tags,
            price: raw.price.filter(|p| p.is_finite() && *p > 0.0),
            timestamp: raw.timestamp.filter(|ts| timestamp_in_range(*ts)),
            trace_step: TraceStep {
                step: STEP,
                name: STEP_NAME.to_string(),
                status: StepStatus::Failed,
                message,
                result: None,
            },
        }
    }
}

/// Per-lane inputs the validator needs besides the payload itself.
pub struct LaneView<'a> {
    pub volume: &'a mut VolumeTracker,
    /// Timestamp of the last snapshot this lane evaluated.
    pub last_evaluated_at: Option<i64>,
    /// Wall clock, epoch milliseconds.
    pub now_ms: i64,
}

enum Field<T> {
    Present(T),
    Absent,
    NotNumeric,
}

fn read_float(obj: &Map<String, Value>, key: &str) -> Field<f64> {
    match obj.get(key) {
        None | Some(Value::Null) => Field::Absent,
        Some(Value::Number(n)) => n.as_f64().map(Field::Present).unwrap_or(Field::NotNumeric),
        Some(_) => Field::NotNumeric,
    }
}

fn read_timestamp(obj: &Map<String, Value>) -> Field<i64> {
    match obj.get("timestamp") {
        None | Some(Value::Null) => Field::Absent,
        // Floats are only taken when they name a whole millisecond inside the
        // accepted window; anything else would be truncated or saturated.
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|v| v.fract() == 0.0)
                    .filter(|v| (MIN_TIMESTAMP_MS as f64..=MAX_TIMESTAMP_MS as f64).contains(v))
                    .map(|v| v as i64)
            })
            .map(Field::Present)
            .unwrap_or(Field::NotNumeric),
        Some(_) => Field::NotNumeric,
    }
}

/// Lift the payload into a `RawSnapshot`, recording keys whose value had the
/// wrong type. Nothing is defaulted.
pub fn extract(payload: &Value) -> Result<(RawSnapshot, Vec<String>), String> {
    let obj = payload
        .as_object()
        .ok_or_else(|| "snapshot must be a JSON object".to_string())?;

    let mut wrong_type = Vec::new();
    let mut float = |key: &str| match read_float(obj, key) {
        Field::Present(v) => Some(v),
        Field::Absent => None,
        Field::NotNumeric => {
            wrong_type.push(key.to_string());
            None
        }
    };

    let mut raw = RawSnapshot {
        symbol: obj.get("symbol").and_then(|v| v.as_str()).map(str::to_string),
        price: float("price"),
        price_change_1h: float("price_change_1h"),
        price_change_6h: float("price_change_6h"),
        volume_1h: float("volume_1h"),
        volume_24h: float("volume_24h"),
        buy_sell_imbalance: float("buy_sell_imbalance"),
        funding_rate: float("funding_rate"),
        oi_change_1h: float("oi_change_1h"),
        oi_change_6h: float("oi_change_6h"),
        timestamp: None,
        volume_basis: None,
    };
    raw.timestamp = match read_timestamp(obj) {
        Field::Present(ts) => Some(ts),
        Field::Absent => None,
        Field::NotNumeric => {
            wrong_type.push("timestamp".to_string());
            None
        }
    };
    raw.volume_basis = match obj.get("volume_basis") {
        None | Some(Value::Null) => None,
        Some(v) => match serde_json::from_value(v.clone()) {
            Ok(basis) => Some(basis),
            Err(_) => {
                wrong_type.push("volume_basis".to_string());
                None
            }
        },
    };
    Ok((raw, wrong_type))
}

impl RawSnapshot {
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let present = [
            self.price.is_some(),
            self.price_change_1h.is_some(),
            self.price_change_6h.is_some(),
            self.volume_1h.is_some(),
            self.volume_24h.is_some(),
            self.buy_sell_imbalance.is_some(),
            self.funding_rate.is_some(),
            self.oi_change_1h.is_some(),
            self.oi_change_6h.is_some(),
            self.timestamp.is_some(),
        ];
        REQUIRED_FIELDS
            .iter()
            .zip(present)
            .filter(|(_, ok)| !ok)
            .map(|(name, _)| *name)
            .collect()
    }
}

fn scale_percent(value: f64, unit: PercentUnit) -> f64 {
    match unit {
        PercentUnit::Points => value,
        PercentUnit::Fraction => value * 100.0,
    }
}

/// Step 2: presence, ranges, unit normalization, freshness and volume basis.
///
/// The volume tracker is only advanced for snapshots that pass every other
/// check, so a rejected tick never becomes a counter baseline.
pub fn validate_snapshot(
    symbol: &str,
    payload: &Value,
    cfg: &ThresholdConfig,
    lane: LaneView<'_>,
) -> Validation {
    let (raw, wrong_type) = match extract(payload) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(symbol, error = %e, "🚫 Snapshot rejected: not an object");
            return Validation::invalid(&RawSnapshot::default(), vec![ReasonTag::MissingField], vec![e]);
        }
    };

    let missing = raw.missing_fields();
    if !missing.is_empty() || !wrong_type.is_empty() {
        let mut errors = Vec::new();
        let mut detail = Vec::new();
        if !missing.is_empty() {
            errors.push(format!("missing required field(s): {}", missing.join(", ")));
            detail.push(ReasonTag::MissingField);
        }
        if !wrong_type.is_empty() {
            errors.push(format!("non-numeric or unrepresentable field(s): {}", wrong_type.join(", ")));
            detail.push(ReasonTag::OutOfRange);
        }
        warn!(symbol, missing = ?missing, wrong_type = ?wrong_type, "🚫 Snapshot rejected: incomplete");
        return Validation::invalid(&raw, detail, errors);
    }

    // Presence is established above; the pattern only re-binds the values.
    let (
        Some(price),
        Some(p1h),
        Some(p6h),
        Some(v1h),
        Some(v24h),
        Some(imbalance),
        Some(funding),
        Some(oi1h),
        Some(oi6h),
        Some(timestamp),
    ) = (
        raw.price,
        raw.price_change_1h,
        raw.price_change_6h,
        raw.volume_1h,
        raw.volume_24h,
        raw.buy_sell_imbalance,
        raw.funding_rate,
        raw.oi_change_1h,
        raw.oi_change_6h,
        raw.timestamp,
    )
    else {
        return Validation::invalid(&raw, vec![ReasonTag::MissingField], vec!["incomplete snapshot".into()]);
    };

    let unit = cfg.data.percent_unit;
    let p1h = scale_percent(p1h, unit);
    let p6h = scale_percent(p6h, unit);
    let oi1h = scale_percent(oi1h, unit);
    let oi6h = scale_percent(oi6h, unit);

    let band = cfg.data.max_abs_percent_change;
    let mut errors = Vec::new();
    if !(price.is_finite() && price > 0.0) {
        errors.push(format!("price must be > 0, got {}", price));
    }
    for (name, value) in [
        ("price_change_1h", p1h),
        ("price_change_6h", p6h),
        ("oi_change_1h", oi1h),
        ("oi_change_6h", oi6h),
    ] {
        if !value.is_finite() || value.abs() > band {
            errors.push(format!("{} = {} outside ±{}", name, value, band));
        }
    }
    if !imbalance.is_finite() || !(-1.0..=1.0).contains(&imbalance) {
        errors.push(format!("buy_sell_imbalance = {} outside [-1, 1]", imbalance));
    }
    for (name, value) in [("volume_1h", v1h), ("volume_24h", v24h)] {
        if !value.is_finite() || value < 0.0 {
            errors.push(format!("{} must be >= 0, got {}", name, value));
        }
    }
    if !funding.is_finite() || funding.abs() > cfg.data.max_abs_funding_rate {
        errors.push(format!(
            "funding_rate = {} outside ±{}",
            funding, cfg.data.max_abs_funding_rate
        ));
    }
    if !timestamp_in_range(timestamp) {
        errors.push(format!(
            "timestamp {} outside [{}, {}] epoch ms",
            timestamp, MIN_TIMESTAMP_MS, MAX_TIMESTAMP_MS
        ));
    }
    if !errors.is_empty() {
        warn!(symbol, errors = ?errors, "🚫 Snapshot rejected: out of range");
        return Validation::invalid(&raw, vec![ReasonTag::OutOfRange], errors);
    }

    let max_age_ms = secs_to_ms(cfg.data.max_snapshot_age_secs);
    let age_ms = lane.now_ms.saturating_sub(timestamp);
    if max_age_ms > 0 && age_ms > max_age_ms {
        warn!(symbol, age_ms, max_age_ms, "🚫 Snapshot rejected: stale");
        return Validation::invalid(
            &raw,
            vec![ReasonTag::StaleData],
            vec![format!("snapshot is {} ms old (max {} ms)", age_ms, max_age_ms)],
        );
    }
    if let Some(last) = lane.last_evaluated_at {
        if timestamp < last {
            warn!(symbol, timestamp, last, "🚫 Snapshot rejected: older than last evaluated");
            return Validation::invalid(
                &raw,
                vec![ReasonTag::OutOfOrder],
                vec![format!("timestamp {} precedes last evaluated {}", timestamp, last)],
            );
        }
    }

    let mut tags = ReasonTags::new();
    let (volume_1h, volume_24h) = match lane.volume.observe(
        v1h,
        v24h,
        raw.volume_basis,
        timestamp,
        cfg.data.cumulative_streak,
    ) {
        VolumeReading::Ready {
            volume_1h,
            volume_24h,
            converted,
        } => {
            if converted {
                tags.push(ReasonTag::CumulativeVolumeConverted);
            }
            (volume_1h, volume_24h)
        }
        VolumeReading::BaselinePending => {
            return Validation::invalid(
                &raw,
                vec![ReasonTag::VolumeBaselinePending],
                vec!["cumulative volume series has no baseline yet".to_string()],
            );
        }
    };

    let snapshot = MarketSnapshot {
        symbol: symbol.to_string(),
        price,
        price_change_1h: p1h,
        price_change_6h: p6h,
        volume_1h,
        volume_24h,
        buy_sell_imbalance: imbalance,
        funding_rate: funding,
        oi_change_1h: oi1h,
        oi_change_6h: oi6h,
        timestamp,
    };
    debug!(symbol, timestamp, "Snapshot validated");

    let converted = tags.contains(ReasonTag::CumulativeVolumeConverted);
    Validation {
        is_valid: true,
        error: None,
        price: Some(price),
        timestamp: Some(timestamp),
        trace_step: TraceStep {
            step: STEP,
            name: STEP_NAME.to_string(),
            status: if converted {
                StepStatus::Warning
            } else {
                StepStatus::Success
            },
            message: if converted {
                "Valid; cumulative volume converted to period deltas".to_string()
            } else {
                "All fields present and within range".to_string()
            },
            result: Some(json!({
                "price_change_1h": snapshot.price_change_1h,
                "price_change_6h": snapshot.price_change_6h,
                "volume_1h": snapshot.volume_1h,
                "volume_24h": snapshot.volume_24h,
                "volume_ratio": snapshot.volume_ratio(),
            })),
        },
        snapshot: Some(snapshot),
        reason_tags: tags,
    }
}
