use crate::config::RegimeConfig;
use crate::model::{MarketRegime, MarketSnapshot};
use crate::reason_tags::{ReasonTag, ReasonTags};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct RegimeAssessment {
    pub regime: MarketRegime,
    /// RANGE reached by elimination rather than by the range ceilings.
    pub ambiguous: bool,
    pub reason_tags: ReasonTags,
}

/// EXTREME overrides everything; TREND needs a strong 1h move confirmed by
/// order flow or by the 6h move; whatever is left is RANGE.
pub fn classify(snapshot: &MarketSnapshot, cfg: &RegimeConfig) -> RegimeAssessment {
    let p1h = snapshot.price_change_1h;
    let p6h = snapshot.price_change_6h;
    let imbalance = snapshot.buy_sell_imbalance;

    if p1h.abs() >= cfg.extreme_abs_price_change_1h
        || snapshot.oi_change_1h.abs() >= cfg.extreme_abs_oi_change_1h
    {
        return RegimeAssessment {
            regime: MarketRegime::Extreme,
            ambiguous: false,
            reason_tags: [ReasonTag::RegimeExtreme].into_iter().collect(),
        };
    }

    let flow_confirms = imbalance.abs() >= cfg.trend.min_abs_imbalance;
    let six_hour_confirms =
        p6h.abs() >= cfg.trend.min_abs_price_change_6h && p6h.signum() == p1h.signum();
    if p1h.abs() >= cfg.trend.min_abs_price_change_1h && (flow_confirms || six_hour_confirms) {
        return RegimeAssessment {
            regime: MarketRegime::Trend,
            ambiguous: false,
            reason_tags: [ReasonTag::RegimeTrend].into_iter().collect(),
        };
    }

    let bound = p1h.abs() <= cfg.range.max_abs_price_change_1h
        && imbalance.abs() <= cfg.range.max_abs_imbalance;
    let detail = if bound {
        ReasonTag::RangeBound
    } else {
        ReasonTag::RegimeAmbiguous
    };
    RegimeAssessment {
        regime: MarketRegime::Range,
        ambiguous: !bound,
        reason_tags: [ReasonTag::RegimeRange, detail].into_iter().collect(),
    }
}
