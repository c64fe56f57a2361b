use crate::config::{QualityConfig, RiskConfig};
use crate::model::{MarketRegime, MarketSnapshot, TradeQuality};
use crate::reason_tags::{ReasonTag, ReasonTags};
use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

/// A condition under which no new exposure may be taken, whatever the
/// direction.
#[derive(Debug, Clone, PartialEq)]
pub enum RiskBlock {
    FundingExtreme { funding_rate: f64, limit: f64 },
    OiCrowded { oi_change_6h: f64, limit: f64 },
    VolumeSpike { ratio: f64, limit: f64 },
    LiquidationCascade { price_change_1h: f64, oi_change_1h: f64 },
    ShortSqueeze { price_change_1h: f64, oi_change_1h: f64 },
    ExtremeRegime,
}

impl RiskBlock {
    pub fn tag(&self) -> ReasonTag {
        match self {
            RiskBlock::FundingExtreme { .. } => ReasonTag::FundingExtreme,
            RiskBlock::OiCrowded { .. } => ReasonTag::OiCrowded,
            RiskBlock::VolumeSpike { .. } => ReasonTag::VolumeSpike,
            RiskBlock::LiquidationCascade { .. } => ReasonTag::LiquidationCascade,
            RiskBlock::ShortSqueeze { .. } => ReasonTag::ShortSqueeze,
            RiskBlock::ExtremeRegime => ReasonTag::ExtremeRegime,
        }
    }
}

impl fmt::Display for RiskBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskBlock::FundingExtreme {
                funding_rate,
                limit,
            } => write!(f, "Funding {:.5} beyond ±{:.5}", funding_rate, limit),
            RiskBlock::OiCrowded {
                oi_change_6h,
                limit,
            } => write!(f, "OI +{:.2}% over 6h >= crowding limit {:.2}%", oi_change_6h, limit),
            RiskBlock::VolumeSpike { ratio, limit } => {
                write!(f, "Volume ratio {:.2}x >= spike limit {:.2}x", ratio, limit)
            }
            RiskBlock::LiquidationCascade {
                price_change_1h,
                oi_change_1h,
            } => write!(
                f,
                "Liquidation cascade: price {:.2}% with OI {:.2}% in 1h",
                price_change_1h, oi_change_1h
            ),
            RiskBlock::ShortSqueeze {
                price_change_1h,
                oi_change_1h,
            } => write!(
                f,
                "Short squeeze: price +{:.2}% with OI {:.2}% in 1h",
                price_change_1h, oi_change_1h
            ),
            RiskBlock::ExtremeRegime => write!(f, "Extreme regime blocks new exposure"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskAdmission {
    pub blocks: Vec<RiskBlock>,
}

impl RiskAdmission {
    pub fn allowed(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn reason_tags(&self) -> ReasonTags {
        self.blocks.iter().map(RiskBlock::tag).collect()
    }

    pub fn summary(&self) -> String {
        if self.blocks.is_empty() {
            "No risk gate triggered".to_string()
        } else {
            self.blocks
                .iter()
                .map(|b| b.to_string())
                .collect::<Vec<_>>()
                .join("; ")
        }
    }
}

/// Step 4. Every gate is evaluated so the trace names all of them.
pub fn assess_admission(
    snapshot: &MarketSnapshot,
    regime: MarketRegime,
    cfg: &RiskConfig,
) -> RiskAdmission {
    let mut blocks = Vec::new();
    let p1h = snapshot.price_change_1h;
    let oi1h = snapshot.oi_change_1h;

    if snapshot.funding_rate.abs() > cfg.max_abs_funding_rate {
        blocks.push(RiskBlock::FundingExtreme {
            funding_rate: snapshot.funding_rate,
            limit: cfg.max_abs_funding_rate,
        });
    }
    if snapshot.oi_change_6h >= cfg.max_oi_crowding_6h {
        blocks.push(RiskBlock::OiCrowded {
            oi_change_6h: snapshot.oi_change_6h,
            limit: cfg.max_oi_crowding_6h,
        });
    }
    if let Some(ratio) = snapshot.volume_ratio() {
        if ratio >= cfg.volume_spike_ratio {
            blocks.push(RiskBlock::VolumeSpike {
                ratio,
                limit: cfg.volume_spike_ratio,
            });
        }
    }
    let oi_collapse = oi1h <= -cfg.liquidation_oi_change_1h;
    if oi_collapse && p1h <= -cfg.liquidation_price_change_1h {
        blocks.push(RiskBlock::LiquidationCascade {
            price_change_1h: p1h,
            oi_change_1h: oi1h,
        });
    }
    if oi_collapse && p1h >= cfg.liquidation_price_change_1h {
        blocks.push(RiskBlock::ShortSqueeze {
            price_change_1h: p1h,
            oi_change_1h: oi1h,
        });
    }
    if regime == MarketRegime::Extreme && cfg.block_extreme_regime {
        blocks.push(RiskBlock::ExtremeRegime);
    }

    let admission = RiskAdmission { blocks };
    if admission.allowed() {
        debug!(symbol = %snapshot.symbol, "Risk admission passed");
    } else {
        warn!(symbol = %snapshot.symbol, reason = %admission.summary(), "🛡️ Risk admission denied");
    }
    admission
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityAssessment {
    pub quality: TradeQuality,
    pub reason_tags: ReasonTags,
}

/// Step 5. POOR conditions are checked first; any UNCERTAIN condition
/// downgrades an otherwise GOOD reading.
pub fn assess_quality(
    snapshot: &MarketSnapshot,
    regime: MarketRegime,
    cfg: &QualityConfig,
) -> QualityAssessment {
    let ratio = snapshot.volume_ratio();
    let mut poor = ReasonTags::new();
    if regime == MarketRegime::Extreme {
        poor.push(ReasonTag::RegimeExtreme);
    }
    if let Some(r) = ratio {
        if r < cfg.poor_volume_ratio {
            poor.push(ReasonTag::ThinVolume);
        }
    }
    if !poor.is_empty() {
        let mut tags: ReasonTags = [ReasonTag::QualityPoor].into_iter().collect();
        tags.extend(poor.as_slice().iter().copied());
        return QualityAssessment {
            quality: TradeQuality::Poor,
            reason_tags: tags,
        };
    }

    let p1h = snapshot.price_change_1h;
    let p6h = snapshot.price_change_6h;
    let imbalance = snapshot.buy_sell_imbalance;
    let mut uncertain = ReasonTags::new();
    match ratio {
        None => uncertain.push(ReasonTag::VolumeUnknown),
        Some(r) if r < cfg.min_volume_ratio => uncertain.push(ReasonTag::ThinVolume),
        Some(_) => {}
    }
    if snapshot.funding_rate.abs() >= cfg.elevated_funding_rate {
        uncertain.push(ReasonTag::FundingElevated);
    }
    if p1h * p6h < 0.0
        && p1h.abs() >= cfg.divergence_price_change
        && p6h.abs() >= cfg.divergence_price_change
    {
        uncertain.push(ReasonTag::TimeframeDivergence);
    }
    if p1h * imbalance < 0.0 && imbalance.abs() >= cfg.divergence_imbalance {
        uncertain.push(ReasonTag::FlowDivergence);
    }

    if uncertain.is_empty() {
        QualityAssessment {
            quality: TradeQuality::Good,
            reason_tags: [ReasonTag::QualityGood].into_iter().collect(),
        }
    } else {
        let mut tags: ReasonTags = [ReasonTag::QualityUncertain].into_iter().collect();
        tags.extend(uncertain.as_slice().iter().copied());
        QualityAssessment {
            quality: TradeQuality::Uncertain,
            reason_tags: tags,
        }
    }
}
