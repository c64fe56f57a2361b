//! Closed catalog of reason tags.
//!
//! Every rule that contributes to a decision names itself with one of these
//! variants. Tags cross the wire as SCREAMING_SNAKE_CASE identifiers; the
//! configuration may only attach display labels to identifiers listed here.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonTag {
    // Data validation
    InvalidData,
    MissingField,
    OutOfRange,
    StaleData,
    OutOfOrder,
    VolumeBaselinePending,
    CumulativeVolumeConverted,

    // Regime
    RegimeTrend,
    RegimeRange,
    RegimeExtreme,
    RangeBound,
    RegimeAmbiguous,

    // Risk admission
    FundingExtreme,
    OiCrowded,
    VolumeSpike,
    LiquidationCascade,
    ShortSqueeze,
    ExtremeRegime,
    RiskBlocked,

    // Trade quality
    QualityGood,
    QualityUncertain,
    QualityPoor,
    ThinVolume,
    VolumeUnknown,
    FundingElevated,
    TimeframeDivergence,
    FlowDivergence,
    QualitySuppressed,

    // Direction
    BullishConsensus,
    BearishConsensus,
    InsufficientAgreement,
    SignalTie,

    // Confidence / permission
    ConfidenceCapped,
    PermissionReduced,
    PermissionDenied,
    BelowExecutableFloor,

    // Frequency control
    DirectionFlip,
    CooldownActive,
    CooldownElapsed,
    RateLimited,
    DecisionSuppressed,
    HeldPreviousDirection,
    ReturnedToIdle,

    // Dual timeframe
    TimeframeConflict,
    PartialAlignment,

    // Operator
    SystemHalted,
}

impl ReasonTag {
    pub const ALL: [ReasonTag; 46] = [
        ReasonTag::InvalidData,
        ReasonTag::MissingField,
        ReasonTag::OutOfRange,
        ReasonTag::StaleData,
        ReasonTag::OutOfOrder,
        ReasonTag::VolumeBaselinePending,
        ReasonTag::CumulativeVolumeConverted,
        ReasonTag::RegimeTrend,
        ReasonTag::RegimeRange,
        ReasonTag::RegimeExtreme,
        ReasonTag::RangeBound,
        ReasonTag::RegimeAmbiguous,
        ReasonTag::FundingExtreme,
        ReasonTag::OiCrowded,
        ReasonTag::VolumeSpike,
        ReasonTag::LiquidationCascade,
        ReasonTag::ShortSqueeze,
        ReasonTag::ExtremeRegime,
        ReasonTag::RiskBlocked,
        ReasonTag::QualityGood,
        ReasonTag::QualityUncertain,
        ReasonTag::QualityPoor,
        ReasonTag::ThinVolume,
        ReasonTag::VolumeUnknown,
        ReasonTag::FundingElevated,
        ReasonTag::TimeframeDivergence,
        ReasonTag::FlowDivergence,
        ReasonTag::QualitySuppressed,
        ReasonTag::BullishConsensus,
        ReasonTag::BearishConsensus,
        ReasonTag::InsufficientAgreement,
        ReasonTag::SignalTie,
        ReasonTag::ConfidenceCapped,
        ReasonTag::PermissionReduced,
        ReasonTag::PermissionDenied,
        ReasonTag::BelowExecutableFloor,
        ReasonTag::DirectionFlip,
        ReasonTag::CooldownActive,
        ReasonTag::CooldownElapsed,
        ReasonTag::RateLimited,
        ReasonTag::DecisionSuppressed,
        ReasonTag::HeldPreviousDirection,
        ReasonTag::ReturnedToIdle,
        ReasonTag::TimeframeConflict,
        ReasonTag::PartialAlignment,
        ReasonTag::SystemHalted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonTag::InvalidData => "INVALID_DATA",
            ReasonTag::MissingField => "MISSING_FIELD",
            ReasonTag::OutOfRange => "OUT_OF_RANGE",
            ReasonTag::StaleData => "STALE_DATA",
            ReasonTag::OutOfOrder => "OUT_OF_ORDER",
            ReasonTag::VolumeBaselinePending => "VOLUME_BASELINE_PENDING",
            ReasonTag::CumulativeVolumeConverted => "CUMULATIVE_VOLUME_CONVERTED",
            ReasonTag::RegimeTrend => "REGIME_TREND",
            ReasonTag::RegimeRange => "REGIME_RANGE",
            ReasonTag::RegimeExtreme => "REGIME_EXTREME",
            ReasonTag::RangeBound => "RANGE_BOUND",
            ReasonTag::RegimeAmbiguous => "REGIME_AMBIGUOUS",
            ReasonTag::FundingExtreme => "FUNDING_EXTREME",
            ReasonTag::OiCrowded => "OI_CROWDED",
            ReasonTag::VolumeSpike => "VOLUME_SPIKE",
            ReasonTag::LiquidationCascade => "LIQUIDATION_CASCADE",
            ReasonTag::ShortSqueeze => "SHORT_SQUEEZE",
            ReasonTag::ExtremeRegime => "EXTREME_REGIME",
            ReasonTag::RiskBlocked => "RISK_BLOCKED",
            ReasonTag::QualityGood => "QUALITY_GOOD",
            ReasonTag::QualityUncertain => "QUALITY_UNCERTAIN",
            ReasonTag::QualityPoor => "QUALITY_POOR",
            ReasonTag::ThinVolume => "THIN_VOLUME",
            ReasonTag::VolumeUnknown => "VOLUME_UNKNOWN",
            ReasonTag::FundingElevated => "FUNDING_ELEVATED",
            ReasonTag::TimeframeDivergence => "TIMEFRAME_DIVERGENCE",
            ReasonTag::FlowDivergence => "FLOW_DIVERGENCE",
            ReasonTag::QualitySuppressed => "QUALITY_SUPPRESSED",
            ReasonTag::BullishConsensus => "BULLISH_CONSENSUS",
            ReasonTag::BearishConsensus => "BEARISH_CONSENSUS",
            ReasonTag::InsufficientAgreement => "INSUFFICIENT_AGREEMENT",
            ReasonTag::SignalTie => "SIGNAL_TIE",
            ReasonTag::ConfidenceCapped => "CONFIDENCE_CAPPED",
            ReasonTag::PermissionReduced => "PERMISSION_REDUCED",
            ReasonTag::PermissionDenied => "PERMISSION_DENIED",
            ReasonTag::BelowExecutableFloor => "BELOW_EXECUTABLE_FLOOR",
            ReasonTag::DirectionFlip => "DIRECTION_FLIP",
            ReasonTag::CooldownActive => "COOLDOWN_ACTIVE",
            ReasonTag::CooldownElapsed => "COOLDOWN_ELAPSED",
            ReasonTag::RateLimited => "RATE_LIMITED",
            ReasonTag::DecisionSuppressed => "DECISION_SUPPRESSED",
            ReasonTag::HeldPreviousDirection => "HELD_PREVIOUS_DIRECTION",
            ReasonTag::ReturnedToIdle => "RETURNED_TO_IDLE",
            ReasonTag::TimeframeConflict => "TIMEFRAME_CONFLICT",
            ReasonTag::PartialAlignment => "PARTIAL_ALIGNMENT",
            ReasonTag::SystemHalted => "SYSTEM_HALTED",
        }
    }
}

impl fmt::Display for ReasonTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasonTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReasonTag::ALL
            .iter()
            .find(|tag| tag.as_str() == s)
            .copied()
            .ok_or_else(|| format!("unknown reason tag '{}'", s))
    }
}

/// Ordered, duplicate-free list of tags accumulated while a decision is built.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReasonTags(Vec<ReasonTag>);

impl ReasonTags {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn push(&mut self, tag: ReasonTag) {
        if !self.0.contains(&tag) {
            self.0.push(tag);
        }
    }

    pub fn extend<I: IntoIterator<Item = ReasonTag>>(&mut self, tags: I) {
        for tag in tags {
            self.push(tag);
        }
    }

    pub fn contains(&self, tag: ReasonTag) -> bool {
        self.0.contains(&tag)
    }

    pub fn as_slice(&self) -> &[ReasonTag] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<ReasonTag> for ReasonTags {
    fn from_iter<I: IntoIterator<Item = ReasonTag>>(iter: I) -> Self {
        let mut tags = ReasonTags::new();
        tags.extend(iter);
        tags
    }
}

impl<'a> IntoIterator for &'a ReasonTags {
    type Item = &'a ReasonTag;
    type IntoIter = std::slice::Iter<'a, ReasonTag>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_match_serde() {
        for tag in ReasonTag::ALL {
            let json = serde_json::to_string(&tag).unwrap();
            assert_eq!(json, format!("\"{}\"", tag.as_str()));
        }
    }

    #[test]
    fn test_parse_rejects_typos() {
        assert_eq!("INVALID_DATA".parse::<ReasonTag>(), Ok(ReasonTag::InvalidData));
        assert_eq!("SYSTEM_HALTED".parse::<ReasonTag>(), Ok(ReasonTag::SystemHalted));
        assert!("INVALID_DAT".parse::<ReasonTag>().is_err());
    }

    #[test]
    fn test_tags_keep_first_insertion_order() {
        let mut tags = ReasonTags::new();
        tags.push(ReasonTag::RegimeTrend);
        tags.push(ReasonTag::QualityGood);
        tags.push(ReasonTag::RegimeTrend);
        assert_eq!(tags.as_slice(), &[ReasonTag::RegimeTrend, ReasonTag::QualityGood]);
    }
}
