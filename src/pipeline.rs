use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::circuit_breaker::GlobalHalt;
use crate::confidence::{self, ConfidenceAssessment};
use crate::config::ValidatedConfig;
use crate::context::DecisionContext;
use crate::data_validator::{self, LaneView};
use crate::error::DecisionError;
use crate::metrics;
use crate::model::{
    ConfidenceTier, Decision, DecisionKind, Evaluation, ExecutionPermission, PipelineTrace,
    StepStatus, TradeQuality, is_executable,
};
use crate::reason_tags::ReasonTag;
use crate::regime;
use crate::risk_gate;
use crate::signal::{self, DirectionAssessment};
use crate::state_store::InstrumentState;

pub const STEP_NAMES: [&str; 9] = [
    "Config Check",
    "Data Validation",
    "Regime Detection",
    "Risk Admission",
    "Trade Quality",
    "Direction Assessment",
    "Confidence Scoring",
    "Frequency Control",
    "Decision Assembly",
];

fn name(step: u8) -> &'static str {
    STEP_NAMES[(step - 1) as usize]
}

/// usage:
/// let pipeline = DecisionPipeline::new(config, ctx, halt);
/// let evaluation = pipeline.run("BTCUSDT", "BTCUSDT", &payload, &mut lane_state)?;
///
/// One pipeline pins one configuration for every step of a run.
pub struct DecisionPipeline {
    config: Arc<ValidatedConfig>,
    ctx: DecisionContext,
    halt: GlobalHalt,
}

impl DecisionPipeline {
    pub fn new(config: Arc<ValidatedConfig>, ctx: DecisionContext, halt: GlobalHalt) -> Self {
        Self { config, ctx, halt }
    }

    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    /// Evaluate one snapshot for one lane.
    ///
    /// Invalid data is not an error: it yields a NO_TRADE decision tagged
    /// `INVALID_DATA`. `Err` is reserved for decision memory that cannot be
    /// trusted. `state` may be partially advanced on `Err`; callers run on a
    /// scratch copy.
    pub fn run(
        &self,
        lane: &str,
        symbol: &str,
        payload: &Value,
        state: &mut InstrumentState,
    ) -> Result<Evaluation, DecisionError> {
        let started = Instant::now();
        let cfg = &*self.config;
        let mut trace = PipelineTrace::default();

        // --- 1. CONFIG CHECK ---
        trace.record(
            1,
            name(1),
            StepStatus::Success,
            format!("Thresholds {} in force", cfg.fingerprint()),
            Some(json!({ "fingerprint": cfg.fingerprint() })),
        );

        // --- 2. DATA VALIDATION ---
        let validation = data_validator::validate_snapshot(
            symbol,
            payload,
            cfg,
            LaneView {
                volume: &mut state.volume,
                last_evaluated_at: state.memory.last_evaluated_at,
                now_ms: self.ctx.time.now_millis(),
            },
        );
        trace.steps.push(validation.trace_step.clone());

        let Some(snapshot) = validation.snapshot else {
            metrics::inc_invalid_snapshots();
            for step in 3..=8 {
                trace.record(step, name(step), StepStatus::Pending, "Skipped: invalid snapshot", None);
            }
            let mut tags = validation.reason_tags;
            let halted = self.halt.is_halted();
            if halted {
                tags.push(ReasonTag::SystemHalted);
            }
            let decision = Decision {
                symbol: symbol.to_string(),
                decision: DecisionKind::NoTrade,
                confidence: ConfidenceTier::Low,
                executable: false,
                execution_permission: ExecutionPermission::Deny,
                market_regime: None,
                system_state: state.memory.state,
                risk_exposure_allowed: false,
                trade_quality: TradeQuality::Poor,
                reason_tags: tags,
                // Without a usable timestamp the record is pinned to the lane's
                // last evaluation (0 for a fresh lane), never the wall clock.
                timestamp: validation
                    .timestamp
                    .or(state.memory.last_evaluated_at)
                    .unwrap_or(0),
                price: validation.price,
            };
            return Ok(self.assemble(decision, trace, started));
        };

        let mut tags = validation.reason_tags;

        // --- 3. REGIME DETECTION ---
        let regime = regime::classify(&snapshot, &cfg.regime);
        trace.record(
            3,
            name(3),
            if regime.ambiguous {
                StepStatus::Warning
            } else {
                StepStatus::Success
            },
            format!("{:?}", regime.regime),
            serde_json::to_value(&regime).ok(),
        );
        tags.extend(regime.reason_tags.as_slice().iter().copied());

        // --- 4. RISK ADMISSION ---
        let admission = risk_gate::assess_admission(&snapshot, regime.regime, &cfg.risk);
        trace.record(
            4,
            name(4),
            if admission.allowed() {
                StepStatus::Success
            } else {
                StepStatus::Failed
            },
            admission.summary(),
            Some(json!({ "allowed": admission.allowed() })),
        );
        tags.extend(admission.reason_tags().as_slice().iter().copied());
        if !admission.allowed() {
            metrics::inc_risk_denials();
        }

        // --- 5. TRADE QUALITY ---
        let quality = risk_gate::assess_quality(&snapshot, regime.regime, &cfg.quality);
        trace.record(
            5,
            name(5),
            match quality.quality {
                TradeQuality::Good => StepStatus::Success,
                TradeQuality::Uncertain => StepStatus::Warning,
                TradeQuality::Poor => StepStatus::Failed,
            },
            format!("{:?}", quality.quality),
            serde_json::to_value(&quality).ok(),
        );
        tags.extend(quality.reason_tags.as_slice().iter().copied());

        // --- 6. DIRECTION ASSESSMENT / 7. CONFIDENCE SCORING ---
        let thresholds = cfg.signal.for_regime(regime.regime);
        let (direction, scored): (Option<DirectionAssessment>, Option<ConfidenceAssessment>) =
            if admission.allowed() {
                let direction =
                    signal::assess_direction(&snapshot, thresholds, true, quality.quality);
                trace.record(
                    6,
                    name(6),
                    if direction.candidate.is_directional() {
                        StepStatus::Success
                    } else {
                        StepStatus::Warning
                    },
                    format!(
                        "{} ({} bull / {} bear, {} required)",
                        direction.candidate, direction.bullish, direction.bearish, direction.required
                    ),
                    serde_json::to_value(&direction).ok(),
                );
                tags.extend(direction.reason_tags.as_slice().iter().copied());

                let scored =
                    confidence::score(&direction, regime.regime, quality.quality, &cfg.confidence);
                trace.record(
                    7,
                    name(7),
                    if scored.executable {
                        StepStatus::Success
                    } else {
                        StepStatus::Warning
                    },
                    format!(
                        "{:?} / {:?}",
                        scored.confidence, scored.execution_permission
                    ),
                    serde_json::to_value(&scored).ok(),
                );
                (Some(direction), Some(scored))
            } else {
                tags.push(ReasonTag::RiskBlocked);
                trace.record(6, name(6), StepStatus::Pending, "Skipped: risk admission denied", None);
                trace.record(7, name(7), StepStatus::Pending, "Skipped: risk admission denied", None);
                (None, None)
            };
        let candidate = direction
            .as_ref()
            .map(|d| d.candidate)
            .unwrap_or(DecisionKind::NoTrade);

        // --- 8. FREQUENCY CONTROL ---
        let outcome = state
            .memory
            .apply(lane, candidate, snapshot.timestamp, &cfg.frequency)?;
        trace.record(
            8,
            name(8),
            if outcome.suppressed {
                StepStatus::Warning
            } else {
                StepStatus::Success
            },
            format!("{} → {} ({})", candidate, outcome.decision, outcome.state),
            Some(json!({ "outcome": outcome, "memory": state.memory })),
        );
        if outcome.suppressed {
            metrics::inc_suppressed();
        }

        // --- 9. DECISION ASSEMBLY ---
        let (confidence, permission) = match (&scored, outcome.suppressed) {
            (Some(scored), false) if outcome.decision.is_directional() => {
                tags.extend(scored.reason_tags.as_slice().iter().copied());
                (scored.confidence, scored.execution_permission)
            }
            _ => (ConfidenceTier::Low, ExecutionPermission::Deny),
        };
        tags.extend(outcome.reason_tags.as_slice().iter().copied());

        let permission = self.halt.gate(permission);
        let halted = self.halt.is_halted();
        if halted {
            tags.push(ReasonTag::SystemHalted);
        }

        let decision = Decision {
            symbol: symbol.to_string(),
            decision: outcome.decision,
            confidence,
            executable: is_executable(
                outcome.decision,
                confidence,
                permission,
                cfg.confidence.executable_floor,
            ),
            execution_permission: permission,
            market_regime: Some(regime.regime),
            system_state: outcome.state,
            risk_exposure_allowed: admission.allowed(),
            trade_quality: quality.quality,
            reason_tags: tags,
            timestamp: snapshot.timestamp,
            price: Some(snapshot.price),
        };
        Ok(self.assemble(decision, trace, started))
    }

    fn assemble(&self, decision: Decision, mut trace: PipelineTrace, started: Instant) -> Evaluation {
        let labels: serde_json::Map<String, Value> = decision
            .reason_tags
            .as_slice()
            .iter()
            .filter_map(|tag| {
                self.config
                    .reason_tags
                    .label_for(*tag)
                    .map(|label| (tag.to_string(), Value::String(label.to_string())))
            })
            .collect();

        trace.record(
            9,
            name(9),
            if decision.executable {
                StepStatus::Success
            } else {
                StepStatus::Warning
            },
            format!(
                "{} {:?} {:?} executable={}",
                decision.decision, decision.confidence, decision.execution_permission, decision.executable
            ),
            Some(json!({
                "reason_tags": decision.reason_tags,
                "labels": labels,
            })),
        );

        if decision.executable {
            info!(
                symbol = %decision.symbol,
                decision = %decision.decision,
                confidence = ?decision.confidence,
                permission = ?decision.execution_permission,
                "🎯 Executable decision"
            );
        } else if decision.has_tag(ReasonTag::InvalidData) {
            warn!(symbol = %decision.symbol, tags = ?decision.reason_tags, "Decision on invalid data: NO_TRADE");
        } else {
            debug!(
                symbol = %decision.symbol,
                decision = %decision.decision,
                state = %decision.system_state,
                "Decision assembled"
            );
        }

        metrics::inc_decision(decision.decision.as_str(), decision.executable);
        metrics::observe_pipeline_latency(started.elapsed().as_secs_f64());

        Evaluation { decision, trace }
    }
}
