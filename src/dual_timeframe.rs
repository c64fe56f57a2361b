//! Short-term and medium-term lanes evaluated side by side.
//!
//! Each lane keeps its own decision memory (`<symbol>@short`,
//! `<symbol>@medium`); this module only reads the two finished decisions and
//! states how far they agree.

use crate::config::DualConfig;
use crate::model::{
    Alignment, CombinedVerdict, ConfidenceTier, Decision, DecisionKind, DualConclusion,
    ExecutionPermission, is_executable,
};
use crate::reason_tags::{ReasonTag, ReasonTags};

pub const SHORT_SUFFIX: &str = "@short";
pub const MEDIUM_SUFFIX: &str = "@medium";

pub fn short_lane(symbol: &str) -> String {
    format!("{}{}", symbol, SHORT_SUFFIX)
}

pub fn medium_lane(symbol: &str) -> String {
    format!("{}{}", symbol, MEDIUM_SUFFIX)
}

/// Instrument a dual lane belongs to; `None` for a single-timeframe lane.
pub fn symbol_of_lane(lane: &str) -> Option<&str> {
    lane.strip_suffix(SHORT_SUFFIX)
        .or_else(|| lane.strip_suffix(MEDIUM_SUFFIX))
}

pub fn alignment(short: DecisionKind, medium: DecisionKind) -> Alignment {
    use DecisionKind::*;
    match (short, medium) {
        (Long, Long) => Alignment::BothLong,
        (Short, Short) => Alignment::BothShort,
        (NoTrade, NoTrade) => Alignment::BothNoTrade,
        (Long, Short) | (Short, Long) => Alignment::Conflict,
        (Long, NoTrade) | (NoTrade, Long) => Alignment::PartialLong,
        (Short, NoTrade) | (NoTrade, Short) => Alignment::PartialShort,
    }
}

fn stand_down(tags: ReasonTags) -> CombinedVerdict {
    CombinedVerdict {
        decision: DecisionKind::NoTrade,
        confidence: ConfidenceTier::Low,
        execution_permission: ExecutionPermission::Deny,
        executable: false,
        reason_tags: tags,
    }
}

pub fn combine(
    short: &Decision,
    medium: &Decision,
    cfg: &DualConfig,
    executable_floor: ConfidenceTier,
) -> CombinedVerdict {
    let aligned = alignment(short.decision, medium.decision);
    let (decision, confidence, permission, tags) = match aligned {
        Alignment::BothLong | Alignment::BothShort => {
            let floor = short.confidence.min(medium.confidence);
            let confidence = if cfg.agreement_boost {
                floor.raised(1)
            } else {
                floor
            };
            let permission = short.execution_permission.max(medium.execution_permission);
            (short.decision, confidence, permission, ReasonTags::new())
        }
        Alignment::BothNoTrade => return stand_down(ReasonTags::new()),
        Alignment::Conflict => {
            return stand_down([ReasonTag::TimeframeConflict].into_iter().collect());
        }
        Alignment::PartialLong | Alignment::PartialShort => {
            let lead = if short.decision.is_directional() {
                short
            } else {
                medium
            };
            let confidence = lead
                .confidence
                .lowered(cfg.partial_downgrade_tiers as usize);
            let permission = lead
                .execution_permission
                .max(ExecutionPermission::AllowReduced);
            (
                lead.decision,
                confidence,
                permission,
                [ReasonTag::PartialAlignment].into_iter().collect(),
            )
        }
    };

    CombinedVerdict {
        decision,
        confidence,
        execution_permission: permission,
        executable: is_executable(decision, confidence, permission, executable_floor),
        reason_tags: tags,
    }
}

pub fn conclude(
    symbol: &str,
    short: Decision,
    medium: Decision,
    cfg: &DualConfig,
    executable_floor: ConfidenceTier,
) -> DualConclusion {
    let combined = combine(&short, &medium, cfg, executable_floor);
    DualConclusion {
        symbol: symbol.to_string(),
        alignment: alignment(short.decision, medium.decision),
        short_term: short,
        medium_term: medium,
        combined,
    }
}
