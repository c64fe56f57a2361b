use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::circuit_breaker::GlobalHalt;
use crate::config::{ThresholdConfig, ValidatedConfig};
use crate::context::DecisionContext;
use crate::dual_timeframe;
use crate::error::DecisionError;
use crate::metrics;
use crate::model::{DualConclusion, Evaluation};
use crate::pipeline::DecisionPipeline;
use crate::state_store::{InstrumentState, StateStore};

/// Public entry point: owns the validated thresholds, the per-lane store and
/// the halt switch.
///
/// usage:
/// let engine = DecisionEngine::new(ThresholdConfig::default())?;
/// let evaluation = engine.evaluate("BTCUSDT", &snapshot_json)?;
pub struct DecisionEngine {
    config: RwLock<Arc<ValidatedConfig>>,
    store: StateStore,
    halt: GlobalHalt,
    ctx: DecisionContext,
}

impl DecisionEngine {
    /// Refuses to start on an invalid configuration.
    pub fn new(config: ThresholdConfig) -> Result<Self, DecisionError> {
        Self::with_context(config, DecisionContext::new_system())
    }

    pub fn with_context(config: ThresholdConfig, ctx: DecisionContext) -> Result<Self, DecisionError> {
        let validated = config.validate().inspect_err(|e| {
            error!("❌ Refusing to start decision engine: {}", e);
        })?;
        info!(
            fingerprint = %validated.fingerprint(),
            "🚀 Decision engine initialized"
        );
        Ok(Self {
            config: RwLock::new(Arc::new(validated)),
            store: StateStore::new(),
            halt: GlobalHalt::new(),
            ctx,
        })
    }

    /// The configuration new evaluations will pin.
    pub fn config(&self) -> Arc<ValidatedConfig> {
        self.config.read().clone()
    }

    /// Validate then swap. On failure the current configuration stays in
    /// force and every violation is returned.
    pub fn reload_config(&self, candidate: ThresholdConfig) -> Result<String, DecisionError> {
        match candidate.validate() {
            Ok(validated) => {
                let fingerprint = validated.fingerprint().to_string();
                let previous = {
                    let mut guard = self.config.write();
                    std::mem::replace(&mut *guard, Arc::new(validated))
                };
                metrics::inc_config_reload(true);
                info!(
                    from = %previous.fingerprint(),
                    to = %fingerprint,
                    "🔄 Threshold configuration reloaded"
                );
                Ok(fingerprint)
            }
            Err(e) => {
                metrics::inc_config_reload(false);
                warn!(
                    kept = %self.config().fingerprint(),
                    "Configuration reload rejected: {}",
                    e
                );
                Err(e)
            }
        }
    }

    pub fn evaluate(&self, symbol: &str, payload: &Value) -> Result<Arc<Evaluation>, DecisionError> {
        let config = self.config();
        self.evaluate_lane(&config, symbol, symbol, payload)
    }

    /// Both lanes run against the same pinned configuration and commit
    /// together: if either lane fails, neither lane advances and nothing is
    /// published.
    pub fn evaluate_dual(
        &self,
        symbol: &str,
        short_term: &Value,
        medium_term: &Value,
    ) -> Result<Arc<DualConclusion>, DecisionError> {
        let config = self.config();
        let pipeline = self.pipeline(&config);
        let short_key = dual_timeframe::short_lane(symbol);
        let medium_key = dual_timeframe::medium_lane(symbol);
        let short_slot = self.store.lane(&short_key);
        let medium_slot = self.store.lane(&medium_key);

        // Lock order is always short before medium.
        let mut short_guard = short_slot.lock();
        let mut medium_guard = medium_slot.lock();
        let (short_next, short_eval) =
            self.run_scratch(&pipeline, &short_guard, &short_key, symbol, short_term)?;
        let (medium_next, medium_eval) =
            self.run_scratch(&pipeline, &medium_guard, &medium_key, symbol, medium_term)?;

        *short_guard = short_next;
        *medium_guard = medium_next;
        let short = self.store.publish(&short_key, short_eval);
        let medium = self.store.publish(&medium_key, medium_eval);

        let conclusion = dual_timeframe::conclude(
            symbol,
            short.decision.clone(),
            medium.decision.clone(),
            &config.dual,
            config.confidence.executable_floor,
        );
        info!(
            symbol,
            alignment = ?conclusion.alignment,
            combined = %conclusion.combined.decision,
            executable = conclusion.combined.executable,
            "Dual-timeframe conclusion"
        );
        Ok(self.store.publish_dual(symbol, conclusion))
    }

    fn pipeline(&self, config: &Arc<ValidatedConfig>) -> DecisionPipeline {
        DecisionPipeline::new(config.clone(), self.ctx.clone(), self.halt.clone())
    }

    /// Runs on a copy of the lane state; the caller commits the returned
    /// state together with the published result, under the lane lock.
    fn run_scratch(
        &self,
        pipeline: &DecisionPipeline,
        current: &InstrumentState,
        lane: &str,
        symbol: &str,
        payload: &Value,
    ) -> Result<(InstrumentState, Evaluation), DecisionError> {
        let mut scratch = current.clone();
        match pipeline.run(lane, symbol, payload, &mut scratch) {
            Ok(evaluation) => Ok((scratch, evaluation)),
            Err(e) => {
                if matches!(e, DecisionError::StateInconsistency { .. }) {
                    metrics::inc_state_inconsistencies();
                }
                error!(lane, "❌ Evaluation aborted: {}", e);
                Err(e)
            }
        }
    }

    fn evaluate_lane(
        &self,
        config: &Arc<ValidatedConfig>,
        lane: &str,
        symbol: &str,
        payload: &Value,
    ) -> Result<Arc<Evaluation>, DecisionError> {
        let pipeline = self.pipeline(config);
        let slot = self.store.lane(lane);
        let mut guard = slot.lock();
        let (next, evaluation) = self.run_scratch(&pipeline, &guard, lane, symbol, payload)?;
        *guard = next;
        Ok(self.store.publish(lane, evaluation))
    }

    pub fn latest(&self, lane: &str) -> Option<Arc<Evaluation>> {
        self.store.latest(lane)
    }

    pub fn latest_dual(&self, symbol: &str) -> Option<Arc<DualConclusion>> {
        self.store.latest_dual(symbol)
    }

    pub fn lane_state(&self, lane: &str) -> Option<InstrumentState> {
        self.store.inspect(lane)
    }

    /// Seed a lane, e.g. from persisted memory.
    pub fn restore_lane(&self, lane: &str, state: InstrumentState) {
        self.store.restore(lane, state);
    }

    pub fn reset_lane(&self, lane: &str) -> bool {
        self.store.reset(lane)
    }

    pub fn lanes(&self) -> Vec<String> {
        self.store.lane_keys()
    }

    pub fn halt(&self, reason: &str) {
        self.halt.set_halt(true, reason);
    }

    pub fn resume(&self, reason: &str) {
        self.halt.set_halt(false, reason);
    }

    pub fn is_halted(&self) -> bool {
        self.halt.is_halted()
    }
}
