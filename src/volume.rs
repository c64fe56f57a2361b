//! Volume basis normalization.
//!
//! Downstream stages expect per-period deltas. Some feeds publish running
//! counters instead; summing or comparing those directly makes every volume
//! rule drift upward forever. The tracker recognizes counters and converts
//! them to period rates from consecutive observations.

use crate::model::VolumeBasis;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const HOUR_MS: f64 = 3_600_000.0;
const DAY_MS: f64 = 86_400_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum VolumeReading {
    Ready {
        volume_1h: f64,
        volume_24h: f64,
        converted: bool,
    },
    /// Counter series without a usable previous observation.
    BaselinePending,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Observation {
    timestamp: i64,
    raw_1h: f64,
    raw_24h: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeTracker {
    last: Option<Observation>,
    last_reading: Option<VolumeReading>,
    rising_streak: u32,
    cumulative: bool,
}

impl VolumeTracker {
    pub fn is_cumulative(&self) -> bool {
        self.cumulative
    }

    /// Feed one observation. `streak_required` is the number of consecutive
    /// strictly increasing observations after which an undeclared series is
    /// treated as a counter.
    pub fn observe(
        &mut self,
        raw_1h: f64,
        raw_24h: f64,
        basis: Option<VolumeBasis>,
        timestamp: i64,
        streak_required: u32,
    ) -> VolumeReading {
        let current = Observation {
            timestamp,
            raw_1h,
            raw_24h,
        };

        // Replayed tick: answer exactly as before.
        if let (Some(prev), Some(reading)) = (self.last, self.last_reading) {
            if prev == current {
                return reading;
            }
        }

        let (rising, reset) = match self.last {
            Some(prev) => (
                raw_1h > prev.raw_1h && raw_24h > prev.raw_24h,
                raw_1h < prev.raw_1h || raw_24h < prev.raw_24h,
            ),
            None => (false, false),
        };
        self.rising_streak = if rising { self.rising_streak.saturating_add(1) } else { 0 };

        let was_cumulative = self.cumulative;
        self.cumulative = match basis {
            Some(VolumeBasis::Delta) => false,
            Some(VolumeBasis::Cumulative) => true,
            // A 1h delta can never exceed the 24h delta that contains it.
            None if raw_1h > raw_24h => true,
            None if self.rising_streak >= streak_required => true,
            None if reset => false,
            None => self.cumulative,
        };
        if self.cumulative && !was_cumulative {
            warn!(
                raw_1h,
                raw_24h,
                streak = self.rising_streak,
                "Volume series recognized as cumulative, converting to period deltas"
            );
        }

        let reading = if self.cumulative {
            match self.last {
                Some(prev) if !reset && timestamp > prev.timestamp => {
                    let elapsed = timestamp.saturating_sub(prev.timestamp) as f64;
                    let delta_1h = raw_1h - prev.raw_1h;
                    let delta_24h = raw_24h - prev.raw_24h;
                    VolumeReading::Ready {
                        volume_1h: delta_1h * HOUR_MS / elapsed,
                        volume_24h: delta_24h * DAY_MS / elapsed,
                        converted: true,
                    }
                }
                _ => {
                    debug!(timestamp, "Cumulative volume baseline not yet available");
                    VolumeReading::BaselinePending
                }
            }
        } else {
            VolumeReading::Ready {
                volume_1h: raw_1h,
                volume_24h: raw_24h,
                converted: false,
            }
        };

        self.last = Some(current);
        self.last_reading = Some(reading);
        reading
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000_000;
    const HOUR: i64 = 3_600_000;

    #[test]
    fn test_delta_series_passes_through() {
        let mut tracker = VolumeTracker::default();
        let reading = tracker.observe(100.0, 2400.0, None, T0, 3);
        assert_eq!(
            reading,
            VolumeReading::Ready {
                volume_1h: 100.0,
                volume_24h: 2400.0,
                converted: false
            }
        );
    }

    #[test]
    fn test_declared_counter_converted_to_bounded_delta() {
        let mut tracker = VolumeTracker::default();
        let basis = Some(VolumeBasis::Cumulative);
        assert_eq!(
            tracker.observe(1_000_000.0, 1_000_000.0, basis, T0, 3),
            VolumeReading::BaselinePending
        );
        let reading = tracker.observe(1_000_500.0, 1_000_500.0, basis, T0 + HOUR, 3);
        match reading {
            VolumeReading::Ready {
                volume_1h,
                volume_24h,
                converted,
            } => {
                assert!(converted);
                assert!((volume_1h - 500.0).abs() < 1e-9);
                assert!((volume_24h - 12_000.0).abs() < 1e-6);
            }
            other => panic!("unexpected reading {:?}", other),
        }
    }

    #[test]
    fn test_inferred_counter_after_streak() {
        let mut tracker = VolumeTracker::default();
        let mut total = 10_000.0;
        let mut last = VolumeReading::BaselinePending;
        for i in 0..6 {
            total += 400.0;
            last = tracker.observe(total, total + 50_000.0, None, T0 + i * HOUR, 3);
        }
        assert!(tracker.is_cumulative());
        match last {
            VolumeReading::Ready { volume_1h, .. } => assert!((volume_1h - 400.0).abs() < 1e-9),
            other => panic!("unexpected reading {:?}", other),
        }
    }

    #[test]
    fn test_one_hour_above_day_means_counter() {
        let mut tracker = VolumeTracker::default();
        let reading = tracker.observe(9_000.0, 5_000.0, None, T0, 3);
        assert_eq!(reading, VolumeReading::BaselinePending);
        assert!(tracker.is_cumulative());
    }

    #[test]
    fn test_replayed_tick_is_stable() {
        let mut tracker = VolumeTracker::default();
        let basis = Some(VolumeBasis::Cumulative);
        tracker.observe(100.0, 100.0, basis, T0, 3);
        let first = tracker.observe(160.0, 160.0, basis, T0 + HOUR, 3);
        let replay = tracker.observe(160.0, 160.0, basis, T0 + HOUR, 3);
        assert_eq!(first, replay);
    }

    #[test]
    fn test_counter_reset_rebaselines() {
        let mut tracker = VolumeTracker::default();
        let basis = Some(VolumeBasis::Cumulative);
        tracker.observe(5_000.0, 5_000.0, basis, T0, 3);
        tracker.observe(5_100.0, 5_100.0, basis, T0 + HOUR, 3);
        assert_eq!(
            tracker.observe(20.0, 20.0, basis, T0 + 2 * HOUR, 3),
            VolumeReading::BaselinePending
        );
        assert!(matches!(
            tracker.observe(80.0, 80.0, basis, T0 + 3 * HOUR, 3),
            VolumeReading::Ready { .. }
        ));
    }
}
