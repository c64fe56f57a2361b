/// Decision memory and frequency control.
///
/// Per-lane hysteresis: a directional call must survive the minimum decision
/// interval, and reversing an active direction parks the lane in a cooldown
/// whose length backs off with every consecutive flip.
///
/// State Diagram:
/// ```text
///   Idle ──directional──→ Active ──opposite direction──→ CoolDown
///    ↑                      │                               │
///    └──── N × NO_TRADE ────┘                               │
///    └──────────────── cooldown elapsed ────────────────────┘
/// ```
///
/// Time is always the snapshot timestamp, never the wall clock.
use crate::config::{FrequencyConfig, SuppressionPolicy, secs_to_ms};
use crate::error::DecisionError;
use crate::model::{DecisionKind, SystemState};
use crate::reason_tags::{ReasonTag, ReasonTags};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

impl SystemState {
    /// Returns the set of states reachable from this state.
    pub fn valid_transitions(&self) -> &'static [SystemState] {
        use SystemState::*;
        match self {
            Idle => &[Active],
            Active => &[CoolDown, Idle],
            // Expiry always passes through Idle; a directional call in the
            // same tick then moves on to Active.
            CoolDown => &[Idle],
        }
    }

    pub fn can_transition_to(&self, next: SystemState) -> bool {
        self.valid_transitions().contains(&next)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecisionMemory {
    pub state: SystemState,
    /// Last emitted decision, suppressed or not.
    pub last_decision: Option<DecisionKind>,
    /// Last direction accepted by the controller. Cleared on return to Idle.
    pub stable_direction: Option<DecisionKind>,
    pub last_change_at: Option<i64>,
    pub last_directional_at: Option<i64>,
    pub cooldown_until: Option<i64>,
    pub consecutive_flips: u32,
    pub no_trade_streak: u32,
    pub last_evaluated_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrequencyOutcome {
    pub decision: DecisionKind,
    pub suppressed: bool,
    pub state: SystemState,
    pub reason_tags: ReasonTags,
}

fn inconsistent(lane: &str, detail: String) -> DecisionError {
    error!(lane, detail = %detail, "❌ Decision memory inconsistent");
    DecisionError::StateInconsistency {
        lane: lane.to_string(),
        detail,
    }
}

impl DecisionMemory {
    /// Reject memory that no sequence of legal transitions can produce. The
    /// memory is reported, never repaired.
    pub fn check_consistency(&self, lane: &str, now: i64) -> Result<(), DecisionError> {
        match (self.state, self.cooldown_until) {
            (SystemState::CoolDown, None) => {
                return Err(inconsistent(lane, "COOL_DOWN without a cooldown expiry".into()));
            }
            (SystemState::Idle | SystemState::Active, Some(until)) => {
                return Err(inconsistent(
                    lane,
                    format!("cooldown_until {} set while {}", until, self.state),
                ));
            }
            _ => {}
        }
        if self.state == SystemState::Active && self.stable_direction.is_none() {
            return Err(inconsistent(lane, "ACTIVE without a stable direction".into()));
        }
        if self.stable_direction == Some(DecisionKind::NoTrade) {
            return Err(inconsistent(lane, "NO_TRADE recorded as a stable direction".into()));
        }
        if let (Some(until), Some(changed)) = (self.cooldown_until, self.last_change_at) {
            if until < changed {
                return Err(inconsistent(
                    lane,
                    format!("cooldown_until {} precedes last change {}", until, changed),
                ));
            }
        }
        if let Some(changed) = self.last_change_at {
            if now < changed {
                return Err(inconsistent(
                    lane,
                    format!("evaluation time {} precedes last change {}", now, changed),
                ));
            }
        }
        Ok(())
    }

    /// Step 8. Runs on a scratch copy and commits only on success, so an
    /// error leaves the memory exactly as it was.
    pub fn apply(
        &mut self,
        lane: &str,
        candidate: DecisionKind,
        now: i64,
        cfg: &FrequencyConfig,
    ) -> Result<FrequencyOutcome, DecisionError> {
        self.check_consistency(lane, now)?;
        let mut next = self.clone();
        let outcome = next.advance(lane, candidate, now, cfg)?;
        *self = next;
        Ok(outcome)
    }

    fn transition(&mut self, lane: &str, next: SystemState, now: i64) -> Result<(), DecisionError> {
        if self.state == next {
            return Ok(());
        }
        if !self.state.can_transition_to(next) {
            return Err(inconsistent(
                lane,
                format!("illegal transition {} → {}", self.state, next),
            ));
        }
        info!(lane, from = %self.state, to = %next, at = now, "Decision state transition");
        self.state = next;
        Ok(())
    }

    fn within_min_interval(&self, candidate: DecisionKind, now: i64, cfg: &FrequencyConfig) -> bool {
        match (self.last_decision, self.last_change_at) {
            (Some(prev), Some(changed)) if prev != candidate => {
                now.saturating_sub(changed) < secs_to_ms(cfg.min_decision_interval_secs)
            }
            _ => false,
        }
    }

    fn advance(
        &mut self,
        lane: &str,
        candidate: DecisionKind,
        now: i64,
        cfg: &FrequencyConfig,
    ) -> Result<FrequencyOutcome, DecisionError> {
        let mut tags = ReasonTags::new();

        if let Some(until) = self.cooldown_until {
            if now >= until {
                self.cooldown_until = None;
                self.stable_direction = None;
                self.transition(lane, SystemState::Idle, now)?;
                tags.push(ReasonTag::CooldownElapsed);
            }
        }

        let verdict: Result<DecisionKind, ReasonTag> = if !candidate.is_directional() {
            // NO_TRADE is never throttled.
            self.no_trade_streak = self.no_trade_streak.saturating_add(1);
            if self.state == SystemState::Active && self.no_trade_streak >= cfg.idle_after_no_trade
            {
                self.transition(lane, SystemState::Idle, now)?;
                self.stable_direction = None;
                self.consecutive_flips = 0;
                tags.push(ReasonTag::ReturnedToIdle);
            }
            Ok(DecisionKind::NoTrade)
        } else {
            self.no_trade_streak = 0;
            let flips_active = self.state == SystemState::Active
                && self.stable_direction.is_some_and(|d| d.opposes(candidate));

            if self.state == SystemState::CoolDown {
                Err(ReasonTag::CooldownActive)
            } else if flips_active {
                self.consecutive_flips = self.consecutive_flips.saturating_add(1);
                let factor = i64::from(self.consecutive_flips.min(cfg.flip_backoff_cap).max(1));
                let cooldown_ms = secs_to_ms(cfg.cooldown_secs).saturating_mul(factor);
                let until = now.saturating_add(cooldown_ms);
                self.cooldown_until = Some(until);
                self.transition(lane, SystemState::CoolDown, now)?;
                warn!(
                    lane,
                    candidate = %candidate,
                    flips = self.consecutive_flips,
                    cooldown_until = until,
                    "🔁 Direction flip suppressed, entering cooldown"
                );
                Err(ReasonTag::DirectionFlip)
            } else if self.within_min_interval(candidate, now, cfg) {
                Err(ReasonTag::RateLimited)
            } else {
                self.transition(lane, SystemState::Active, now)?;
                self.stable_direction = Some(candidate);
                Ok(candidate)
            }
        };

        let (decision, suppressed) = match verdict {
            Ok(kind) => (kind, false),
            Err(tag) => {
                tags.push(tag);
                tags.push(ReasonTag::DecisionSuppressed);
                let held = match (cfg.suppression_policy, self.last_decision) {
                    (SuppressionPolicy::HoldPrevious, Some(prev)) if prev.is_directional() => {
                        tags.push(ReasonTag::HeldPreviousDirection);
                        prev
                    }
                    _ => DecisionKind::NoTrade,
                };
                debug!(lane, candidate = %candidate, emitted = %held, "Candidate suppressed");
                (held, true)
            }
        };

        let changed = match self.last_decision {
            Some(prev) => prev != decision,
            None => decision.is_directional(),
        };
        if changed {
            self.last_change_at = Some(now);
        }
        self.last_decision = Some(decision);
        if decision.is_directional() {
            self.last_directional_at = Some(now);
        }
        self.last_evaluated_at = Some(now);

        Ok(FrequencyOutcome {
            decision,
            suppressed,
            state: self.state,
            reason_tags: tags,
        })
    }
}
