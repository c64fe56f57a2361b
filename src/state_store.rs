use crate::dual_timeframe;
use crate::frequency::DecisionMemory;
use crate::model::{DualConclusion, Evaluation};
use crate::volume::VolumeTracker;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, info};

/// Everything that survives from one tick to the next for a single lane.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstrumentState {
    pub memory: DecisionMemory,
    pub volume: VolumeTracker,
}

/// Keyed per-lane state plus the latest published results.
///
/// Each lane sits behind its own mutex, so one writer per lane while distinct
/// lanes proceed in parallel. Readers only ever see whole `Arc`s swapped in
/// after an evaluation completed.
pub struct StateStore {
    lanes: DashMap<String, Arc<Mutex<InstrumentState>>>,
    published: DashMap<String, Arc<Evaluation>>,
    published_dual: DashMap<String, Arc<DualConclusion>>,
    last_publish_ts: AtomicI64,
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            lanes: DashMap::new(),
            published: DashMap::new(),
            published_dual: DashMap::new(),
            last_publish_ts: AtomicI64::new(0),
        }
    }

    /// Lane slot, created empty on first use. The map shard is released
    /// before the caller locks the slot.
    pub fn lane(&self, key: &str) -> Arc<Mutex<InstrumentState>> {
        if let Some(slot) = self.lanes.get(key) {
            return slot.clone();
        }
        debug!(lane = key, "Creating decision lane");
        self.lanes.entry(key.to_string()).or_default().clone()
    }

    /// Copy of a lane's state, for diagnostics.
    pub fn inspect(&self, key: &str) -> Option<InstrumentState> {
        let slot = self.lanes.get(key)?.clone();
        let state = slot.lock().clone();
        Some(state)
    }

    /// Replace a lane's state wholesale (restore from an external snapshot).
    pub fn restore(&self, key: &str, state: InstrumentState) {
        let slot = self.lane(key);
        *slot.lock() = state;
        info!(lane = key, "Lane state restored");
    }

    /// Drops the lane, its latest evaluation and, for a dual lane, the
    /// conclusion it contributed to.
    pub fn reset(&self, key: &str) -> bool {
        let removed = self.lanes.remove(key).is_some();
        self.published.remove(key);
        if let Some(symbol) = dual_timeframe::symbol_of_lane(key) {
            self.published_dual.remove(symbol);
        }
        if removed {
            info!(lane = key, "Lane state reset");
        }
        removed
    }

    pub fn publish(&self, key: &str, evaluation: Evaluation) -> Arc<Evaluation> {
        let ts = evaluation.decision.timestamp;
        let shared = Arc::new(evaluation);
        self.published.insert(key.to_string(), shared.clone());
        self.last_publish_ts.store(ts, Ordering::SeqCst);
        shared
    }

    pub fn publish_dual(&self, symbol: &str, conclusion: DualConclusion) -> Arc<DualConclusion> {
        let shared = Arc::new(conclusion);
        self.published_dual.insert(symbol.to_string(), shared.clone());
        shared
    }

    pub fn latest(&self, key: &str) -> Option<Arc<Evaluation>> {
        self.published.get(key).map(|e| e.clone())
    }

    pub fn latest_dual(&self, symbol: &str) -> Option<Arc<DualConclusion>> {
        self.published_dual.get(symbol).map(|c| c.clone())
    }

    pub fn lane_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lanes.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Snapshot timestamp of the most recent publish.
    pub fn last_publish(&self) -> i64 {
        self.last_publish_ts.load(Ordering::SeqCst)
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SystemState;

    #[test]
    fn test_lane_created_once_and_shared() {
        let store = StateStore::new();
        let a = store.lane("BTCUSDT");
        let b = store.lane("BTCUSDT");
        assert!(Arc::ptr_eq(&a, &b));
        a.lock().memory.state = SystemState::Active;
        assert_eq!(store.inspect("BTCUSDT").unwrap().memory.state, SystemState::Active);
        assert_eq!(store.lane_keys(), vec!["BTCUSDT".to_string()]);
    }

    #[test]
    fn test_reset_drops_lane() {
        let store = StateStore::new();
        store.restore("ETHUSDT", InstrumentState::default());
        assert!(store.reset("ETHUSDT"));
        assert!(store.inspect("ETHUSDT").is_none());
        assert!(!store.reset("ETHUSDT"));
    }
}
