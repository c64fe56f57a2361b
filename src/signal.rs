use crate::config::SignalThresholds;
use crate::model::{DecisionKind, MarketSnapshot, TradeQuality};
use crate::reason_tags::{ReasonTag, ReasonTags};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Bull,
    Bear,
    Abstain,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubSignal {
    pub name: &'static str,
    pub value: f64,
    pub threshold: f64,
    pub vote: Vote,
}

#[derive(Debug, Clone, Serialize)]
pub struct DirectionAssessment {
    pub candidate: DecisionKind,
    pub bullish: u32,
    pub bearish: u32,
    pub required: u32,
    pub signals: Vec<SubSignal>,
    pub reason_tags: ReasonTags,
}

impl DirectionAssessment {
    /// Votes beyond the requirement that are not cancelled by opposing votes.
    pub fn margin(&self) -> u32 {
        let (agree, oppose) = match self.candidate {
            DecisionKind::Long => (self.bullish, self.bearish),
            DecisionKind::Short => (self.bearish, self.bullish),
            DecisionKind::NoTrade => return 0,
        };
        agree.saturating_sub(self.required).saturating_sub(oppose)
    }
}

fn signed_vote(value: f64, threshold: f64) -> Vote {
    if value >= threshold && value > 0.0 {
        Vote::Bull
    } else if value <= -threshold && value < 0.0 {
        Vote::Bear
    } else {
        Vote::Abstain
    }
}

/// Volume and OI growth have no direction of their own; they confirm
/// whichever way the 1h price moved.
fn confirming_vote(value: f64, threshold: f64, price_change_1h: f64) -> Vote {
    if value < threshold || price_change_1h == 0.0 {
        Vote::Abstain
    } else if price_change_1h > 0.0 {
        Vote::Bull
    } else {
        Vote::Bear
    }
}

pub fn collect_votes(snapshot: &MarketSnapshot, thresholds: &SignalThresholds) -> Vec<SubSignal> {
    let p1h = snapshot.price_change_1h;
    // Unknown volume ratio abstains.
    let ratio = snapshot.volume_ratio().unwrap_or(0.0);
    vec![
        SubSignal {
            name: "price_change_1h",
            value: p1h,
            threshold: thresholds.price_change_1h,
            vote: signed_vote(p1h, thresholds.price_change_1h),
        },
        SubSignal {
            name: "price_change_6h",
            value: snapshot.price_change_6h,
            threshold: thresholds.price_change_6h,
            vote: signed_vote(snapshot.price_change_6h, thresholds.price_change_6h),
        },
        SubSignal {
            name: "buy_sell_imbalance",
            value: snapshot.buy_sell_imbalance,
            threshold: thresholds.imbalance,
            vote: signed_vote(snapshot.buy_sell_imbalance, thresholds.imbalance),
        },
        SubSignal {
            name: "volume_ratio",
            value: ratio,
            threshold: thresholds.volume_ratio,
            vote: confirming_vote(ratio, thresholds.volume_ratio, p1h),
        },
        SubSignal {
            name: "oi_change_1h",
            value: snapshot.oi_change_1h,
            threshold: thresholds.oi_change_1h,
            vote: confirming_vote(snapshot.oi_change_1h, thresholds.oi_change_1h, p1h),
        },
    ]
}

/// Step 6. `risk_allowed` and `quality` come from steps 4 and 5; either can
/// veto the vote outright.
pub fn assess_direction(
    snapshot: &MarketSnapshot,
    thresholds: &SignalThresholds,
    risk_allowed: bool,
    quality: TradeQuality,
) -> DirectionAssessment {
    let signals = collect_votes(snapshot, thresholds);
    let bullish = signals.iter().filter(|s| s.vote == Vote::Bull).count() as u32;
    let bearish = signals.iter().filter(|s| s.vote == Vote::Bear).count() as u32;
    let required = thresholds.required_signals;

    let mut tags = ReasonTags::new();
    let candidate = if !risk_allowed {
        tags.push(ReasonTag::RiskBlocked);
        DecisionKind::NoTrade
    } else if quality == TradeQuality::Poor {
        tags.push(ReasonTag::QualitySuppressed);
        DecisionKind::NoTrade
    } else if bullish >= required && bullish > bearish {
        tags.push(ReasonTag::BullishConsensus);
        DecisionKind::Long
    } else if bearish >= required && bearish > bullish {
        tags.push(ReasonTag::BearishConsensus);
        DecisionKind::Short
    } else if bullish == bearish && bullish > 0 {
        tags.push(ReasonTag::SignalTie);
        DecisionKind::NoTrade
    } else {
        tags.push(ReasonTag::InsufficientAgreement);
        DecisionKind::NoTrade
    };

    DirectionAssessment {
        candidate,
        bullish,
        bearish,
        required,
        signals,
        reason_tags: tags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ThresholdConfig;
    use crate::model::MarketRegime;

    fn uptrend() -> MarketSnapshot {
        MarketSnapshot {
            symbol: "BTCUSDT".into(),
            price: 65000.0,
            price_change_1h: 1.8,
            price_change_6h: 4.0,
            volume_1h: 1500.0,
            volume_24h: 24000.0,
            buy_sell_imbalance: 0.45,
            funding_rate: 0.0001,
            oi_change_1h: 2.5,
            oi_change_6h: 6.0,
            timestamp: 0,
        }
    }

    fn mirrored(s: &MarketSnapshot) -> MarketSnapshot {
        MarketSnapshot {
            price_change_1h: -s.price_change_1h,
            price_change_6h: -s.price_change_6h,
            buy_sell_imbalance: -s.buy_sell_imbalance,
            ..s.clone()
        }
    }

    #[test]
    fn test_full_agreement_long() {
        let cfg = ThresholdConfig::default();
        let t = cfg.signal.for_regime(MarketRegime::Trend);
        let d = assess_direction(&uptrend(), t, true, TradeQuality::Good);
        assert_eq!(d.candidate, DecisionKind::Long);
        assert_eq!((d.bullish, d.bearish), (5, 0));
        assert_eq!(d.margin(), 2);
    }

    #[test]
    fn test_mirrored_is_short() {
        let cfg = ThresholdConfig::default();
        let t = cfg.signal.for_regime(MarketRegime::Trend);
        let d = assess_direction(&mirrored(&uptrend()), t, true, TradeQuality::Good);
        assert_eq!(d.candidate, DecisionKind::Short);
        assert!(d.reason_tags.contains(ReasonTag::BearishConsensus));
    }

    #[test]
    fn test_vetoes() {
        let cfg = ThresholdConfig::default();
        let t = cfg.signal.for_regime(MarketRegime::Trend);
        let blocked = assess_direction(&uptrend(), t, false, TradeQuality::Good);
        assert_eq!(blocked.candidate, DecisionKind::NoTrade);
        assert!(blocked.reason_tags.contains(ReasonTag::RiskBlocked));
        let poor = assess_direction(&uptrend(), t, true, TradeQuality::Poor);
        assert!(poor.reason_tags.contains(ReasonTag::QualitySuppressed));
    }

    #[test]
    fn test_range_thresholds_are_stricter() {
        let cfg = ThresholdConfig::default();
        let mut snap = uptrend();
        snap.price_change_1h = 0.6;
        snap.price_change_6h = 1.2;
        snap.buy_sell_imbalance = 0.25;
        snap.oi_change_1h = 0.0;
        snap.volume_1h = 1000.0;
        let trend = assess_direction(&snap, cfg.signal.for_regime(MarketRegime::Trend), true, TradeQuality::Good);
        let range = assess_direction(&snap, cfg.signal.for_regime(MarketRegime::Range), true, TradeQuality::Good);
        assert_eq!(trend.candidate, DecisionKind::Long);
        assert_eq!(range.candidate, DecisionKind::NoTrade);
        assert!(range.reason_tags.contains(ReasonTag::InsufficientAgreement));
    }
}
