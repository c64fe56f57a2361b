use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Trait for providing the current wall-clock time.
/// Decision timing itself follows snapshot timestamps; the wall clock is only
/// consulted for staleness, so tests can pin it.
pub trait TimeProvider: Send + Sync {
    fn now_millis(&self) -> i64;

    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.now_millis())
            .single()
            .unwrap_or_default()
    }
}

/// Context holding the providers.
/// Passed down to the engine and its pipelines.
#[derive(Clone)]
pub struct DecisionContext {
    pub time: Arc<dyn TimeProvider>,
}

impl DecisionContext {
    pub fn new_system() -> Self {
        Self {
            time: Arc::new(SystemTimeProvider),
        }
    }

    pub fn new_simulated(start_time_ms: i64) -> (Self, Arc<SimulatedTimeProvider>) {
        let provider = Arc::new(SimulatedTimeProvider::new(start_time_ms));
        (
            Self {
                time: provider.clone(),
            },
            provider,
        )
    }
}

impl Default for DecisionContext {
    fn default() -> Self {
        Self::new_system()
    }
}

// --- Live Implementation ---

pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// --- Simulated Implementation ---

pub struct SimulatedTimeProvider {
    current_time_ms: AtomicI64,
}

impl SimulatedTimeProvider {
    pub fn new(start_time_ms: i64) -> Self {
        Self {
            current_time_ms: AtomicI64::new(start_time_ms),
        }
    }

    pub fn set_time(&self, time_ms: i64) {
        self.current_time_ms.store(time_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, duration_ms: i64) {
        self.current_time_ms.fetch_add(duration_ms, Ordering::SeqCst);
    }
}

impl TimeProvider for SimulatedTimeProvider {
    fn now_millis(&self) -> i64 {
        self.current_time_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulated_clock() {
        let (ctx, clock) = DecisionContext::new_simulated(1_700_000_000_000);
        assert_eq!(ctx.time.now_millis(), 1_700_000_000_000);
        clock.advance(60_000);
        assert_eq!(ctx.time.now_millis(), 1_700_000_060_000);
        clock.set_time(5);
        assert_eq!(ctx.time.now().timestamp_millis(), 5);
    }
}
