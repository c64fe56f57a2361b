use crate::reason_tags::{ReasonTag, ReasonTags};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Snapshot as received from the data-acquisition side. Every financially
/// meaningful field is optional here so that absence can be reported instead
/// of defaulted; `MarketSnapshot` is the validated form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshot {
    #[serde(default)]
    pub symbol: Option<String>,
    pub price: Option<f64>,
    pub price_change_1h: Option<f64>,
    pub price_change_6h: Option<f64>,
    pub volume_1h: Option<f64>,
    pub volume_24h: Option<f64>,
    pub buy_sell_imbalance: Option<f64>,
    pub funding_rate: Option<f64>,
    pub oi_change_1h: Option<f64>,
    pub oi_change_6h: Option<f64>,
    /// Epoch milliseconds
    pub timestamp: Option<i64>,
    #[serde(default)]
    pub volume_basis: Option<VolumeBasis>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeBasis {
    Delta,
    Cumulative,
}

/// Validated, normalized snapshot.
///
/// Percentage fields are percentage points (0.5 == half a percent).
/// Volumes are base-asset period deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub price: f64,
    pub price_change_1h: f64,
    pub price_change_6h: f64,
    pub volume_1h: f64,
    pub volume_24h: f64,
    pub buy_sell_imbalance: f64,
    pub funding_rate: f64,
    pub oi_change_1h: f64,
    pub oi_change_6h: f64,
    pub timestamp: i64,
}

impl MarketSnapshot {
    /// Last hour's volume relative to the 24h hourly average.
    /// `None` when there is no 24h volume to compare against.
    pub fn volume_ratio(&self) -> Option<f64> {
        if self.volume_24h > 0.0 {
            Some(self.volume_1h / (self.volume_24h / 24.0))
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionKind {
    Long,
    Short,
    NoTrade,
}

impl DecisionKind {
    pub fn is_directional(&self) -> bool {
        !matches!(self, DecisionKind::NoTrade)
    }

    pub fn opposes(&self, other: DecisionKind) -> bool {
        matches!(
            (self, other),
            (DecisionKind::Long, DecisionKind::Short) | (DecisionKind::Short, DecisionKind::Long)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionKind::Long => "LONG",
            DecisionKind::Short => "SHORT",
            DecisionKind::NoTrade => "NO_TRADE",
        }
    }
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered so that `>=` comparisons express "at least this confident".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
    Ultra,
}

impl ConfidenceTier {
    const LADDER: [ConfidenceTier; 4] = [
        ConfidenceTier::Low,
        ConfidenceTier::Medium,
        ConfidenceTier::High,
        ConfidenceTier::Ultra,
    ];

    fn rank(&self) -> usize {
        *self as usize
    }

    pub fn raised(&self, tiers: usize) -> ConfidenceTier {
        Self::LADDER[(self.rank() + tiers).min(Self::LADDER.len() - 1)]
    }

    pub fn lowered(&self, tiers: usize) -> ConfidenceTier {
        Self::LADDER[self.rank().saturating_sub(tiers)]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarketRegime {
    Trend,
    Range,
    Extreme,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeQuality {
    Good,
    Uncertain,
    Poor,
}

/// Ordered from most to least permissive so `max` picks the stricter one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionPermission {
    Allow,
    AllowReduced,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemState {
    #[default]
    Idle,
    Active,
    CoolDown,
}

impl fmt::Display for SystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// The double threshold: neither confidence nor permission alone authorizes
/// action, and a non-directional decision is never executable.
pub fn is_executable(
    decision: DecisionKind,
    confidence: ConfidenceTier,
    permission: ExecutionPermission,
    floor: ConfidenceTier,
) -> bool {
    decision.is_directional() && confidence >= floor && permission != ExecutionPermission::Deny
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub symbol: String,
    pub decision: DecisionKind,
    pub confidence: ConfidenceTier,
    pub executable: bool,
    pub execution_permission: ExecutionPermission,
    pub market_regime: Option<MarketRegime>,
    pub system_state: SystemState,
    pub risk_exposure_allowed: bool,
    pub trade_quality: TradeQuality,
    pub reason_tags: ReasonTags,
    pub timestamp: i64,
    pub price: Option<f64>,
}

impl Decision {
    pub fn has_tag(&self, tag: ReasonTag) -> bool {
        self.reason_tags.contains(tag)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Warning,
    Failed,
    Pending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceStep {
    pub step: u8,
    pub name: String,
    pub status: StepStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PipelineTrace {
    pub steps: Vec<TraceStep>,
}

impl PipelineTrace {
    pub fn record(
        &mut self,
        step: u8,
        name: &str,
        status: StepStatus,
        message: impl Into<String>,
        result: Option<serde_json::Value>,
    ) {
        self.steps.push(TraceStep {
            step,
            name: name.to_string(),
            status,
            message: message.into(),
            result,
        });
    }

    pub fn step(&self, step: u8) -> Option<&TraceStep> {
        self.steps.iter().find(|s| s.step == step)
    }
}

/// A decision together with the trace that produced it. This is the unit
/// published to readers once the pipeline has finished.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub decision: Decision,
    pub trace: PipelineTrace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    BothLong,
    BothShort,
    BothNoTrade,
    Conflict,
    PartialLong,
    PartialShort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedVerdict {
    pub decision: DecisionKind,
    pub confidence: ConfidenceTier,
    pub execution_permission: ExecutionPermission,
    pub executable: bool,
    pub reason_tags: ReasonTags,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DualConclusion {
    pub symbol: String,
    pub short_term: Decision,
    pub medium_term: Decision,
    pub alignment: Alignment,
    pub combined: CombinedVerdict,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confidence_ladder_saturates() {
        assert_eq!(ConfidenceTier::High.raised(5), ConfidenceTier::Ultra);
        assert_eq!(ConfidenceTier::Medium.lowered(3), ConfidenceTier::Low);
        assert_eq!(ConfidenceTier::Medium.raised(1), ConfidenceTier::High);
    }

    #[test]
    fn test_double_threshold() {
        use ConfidenceTier::*;
        use ExecutionPermission::*;
        assert!(is_executable(DecisionKind::Long, High, Allow, Medium));
        assert!(!is_executable(DecisionKind::Long, Ultra, Deny, Medium));
        assert!(!is_executable(DecisionKind::Short, Low, AllowReduced, Medium));
        assert!(!is_executable(DecisionKind::NoTrade, Ultra, Allow, Medium));
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_string(&DecisionKind::NoTrade).unwrap(), "\"NO_TRADE\"");
        assert_eq!(
            serde_json::to_string(&ExecutionPermission::AllowReduced).unwrap(),
            "\"ALLOW_REDUCED\""
        );
        assert_eq!(serde_json::to_string(&SystemState::CoolDown).unwrap(), "\"COOL_DOWN\"");
        assert_eq!(serde_json::to_string(&Alignment::PartialLong).unwrap(), "\"partial_long\"");
        assert_eq!(serde_json::to_string(&StepStatus::Warning).unwrap(), "\"warning\"");
    }

    #[test]
    fn test_permission_ordering_picks_stricter() {
        assert_eq!(
            ExecutionPermission::Allow.max(ExecutionPermission::AllowReduced),
            ExecutionPermission::AllowReduced
        );
        assert_eq!(
            ExecutionPermission::Deny.max(ExecutionPermission::Allow),
            ExecutionPermission::Deny
        );
    }
}
