use crate::config::{ConfidenceConfig, UncertainQualityPolicy};
use crate::model::{
    ConfidenceTier, DecisionKind, ExecutionPermission, MarketRegime, TradeQuality, is_executable,
};
use crate::reason_tags::{ReasonTag, ReasonTags};
use crate::signal::DirectionAssessment;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ConfidenceAssessment {
    pub confidence: ConfidenceTier,
    pub execution_permission: ExecutionPermission,
    pub executable: bool,
    pub margin: u32,
    pub reason_tags: ReasonTags,
}

fn tier_for_margin(margin: u32, cfg: &ConfidenceConfig) -> ConfidenceTier {
    if margin >= cfg.ultra_margin {
        ConfidenceTier::Ultra
    } else if margin >= cfg.high_margin {
        ConfidenceTier::High
    } else {
        ConfidenceTier::Medium
    }
}

/// Permission is decided from quality and confidence together; neither axis
/// alone grants it.
pub fn permission_for(
    quality: TradeQuality,
    confidence: ConfidenceTier,
    cfg: &ConfidenceConfig,
) -> ExecutionPermission {
    match quality {
        TradeQuality::Good if confidence >= cfg.allow_min_tier => ExecutionPermission::Allow,
        TradeQuality::Good if confidence >= cfg.reduced_min_tier => {
            ExecutionPermission::AllowReduced
        }
        TradeQuality::Uncertain if confidence >= cfg.reduced_min_tier => {
            match cfg.uncertain_quality_policy {
                UncertainQualityPolicy::AllowReduced => ExecutionPermission::AllowReduced,
                UncertainQualityPolicy::Deny => ExecutionPermission::Deny,
            }
        }
        _ => ExecutionPermission::Deny,
    }
}

/// Step 7.
pub fn score(
    direction: &DirectionAssessment,
    regime: MarketRegime,
    quality: TradeQuality,
    cfg: &ConfidenceConfig,
) -> ConfidenceAssessment {
    let mut tags = ReasonTags::new();

    if direction.candidate == DecisionKind::NoTrade {
        return ConfidenceAssessment {
            confidence: ConfidenceTier::Low,
            execution_permission: ExecutionPermission::Deny,
            executable: false,
            margin: 0,
            reason_tags: tags,
        };
    }

    let margin = direction.margin();
    let raw = tier_for_margin(margin, cfg);
    let mut confidence = raw.min(*cfg.regime_cap.for_regime(regime));
    if quality == TradeQuality::Uncertain {
        confidence = confidence.min(cfg.uncertain_cap);
    }
    if confidence < raw {
        tags.push(ReasonTag::ConfidenceCapped);
    }

    let execution_permission = permission_for(quality, confidence, cfg);
    match execution_permission {
        ExecutionPermission::AllowReduced => tags.push(ReasonTag::PermissionReduced),
        ExecutionPermission::Deny => tags.push(ReasonTag::PermissionDenied),
        ExecutionPermission::Allow => {}
    }

    let executable = is_executable(
        direction.candidate,
        confidence,
        execution_permission,
        cfg.executable_floor,
    );
    if confidence < cfg.executable_floor {
        tags.push(ReasonTag::BelowExecutableFloor);
    }

    ConfidenceAssessment {
        confidence,
        execution_permission,
        executable,
        margin,
        reason_tags: tags,
    }
}
