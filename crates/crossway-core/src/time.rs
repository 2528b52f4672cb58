//! Simulated time
//!
//! Simulation seconds are an internal logical quantity. Each intersection
//! owns a SimClock that advances as its signals service vehicles; pauses
//! are realised in wall-clock time through a process-wide scale factor.

use std::ops::{Add, Sub};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Default scale: one simulated second lasts 50 real milliseconds
pub const DEFAULT_TIME_SCALE: f64 = 0.05;

/// Simulated instant, microseconds since simulation start
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(pub i64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    #[inline]
    pub fn from_micros(micros: i64) -> Self {
        SimTime(micros)
    }

    #[inline]
    pub fn from_secs_f64(secs: f64) -> Self {
        SimTime((secs * 1_000_000.0).round() as i64)
    }

    #[inline]
    pub fn as_micros(self) -> i64 {
        self.0
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1_000_000.0
    }

    /// Simulated seconds elapsed since `earlier` (zero if `earlier` is later)
    #[inline]
    pub fn secs_since(self, earlier: SimTime) -> f64 {
        self.0.saturating_sub(earlier.0).max(0) as f64 / 1_000_000.0
    }
}

impl Add<f64> for SimTime {
    type Output = SimTime;

    #[inline]
    fn add(self, secs: f64) -> Self::Output {
        SimTime(self.0.saturating_add((secs * 1_000_000.0).round() as i64))
    }
}

impl Sub<SimTime> for SimTime {
    type Output = f64;

    #[inline]
    fn sub(self, rhs: SimTime) -> Self::Output {
        self.secs_since(rhs)
    }
}

impl std::fmt::Debug for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sim({:.3}s)", self.as_secs_f64())
    }
}

// Wire form is fractional seconds
impl Serialize for SimTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_secs_f64())
    }
}

impl<'de> Deserialize<'de> for SimTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(SimTime::from_secs_f64(f64::deserialize(deserializer)?))
    }
}

/// Shared simulated clock of one intersection
///
/// Every direction worker advances the same clock, so green durations are
/// measured on the intersection's own timeline.
#[derive(Debug)]
pub struct SimClock {
    micros: AtomicI64,
    scale: f64,
}

impl SimClock {
    pub fn new(scale: f64) -> Self {
        SimClock {
            micros: AtomicI64::new(0),
            scale: scale.max(0.0),
        }
    }

    #[inline]
    pub fn now(&self) -> SimTime {
        SimTime(self.micros.load(Ordering::Acquire))
    }

    /// Advance by `secs` simulated seconds, returning the new instant
    pub fn advance(&self, secs: f64) -> SimTime {
        let delta = (secs.max(0.0) * 1_000_000.0).round() as i64;
        SimTime(self.micros.fetch_add(delta, Ordering::AcqRel) + delta)
    }

    /// Real pause that realises `secs` simulated seconds
    pub fn to_real(&self, secs: f64) -> Duration {
        Duration::from_secs_f64((secs * self.scale).max(0.0))
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }
}

impl Default for SimClock {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_SCALE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extreme_times_saturate() {
        let early = SimTime::from_secs_f64(-1e300);
        let late = SimTime::from_secs_f64(1e300);
        assert!(late.secs_since(early) > 0.0);
        assert_eq!(early.secs_since(late), 0.0);
        assert_eq!((late + 5.0).as_micros(), i64::MAX);
    }

    #[test]
    fn test_sim_clock_advance() {
        let clock = SimClock::new(0.05);
        let t0 = clock.now();
        clock.advance(1.5);
        clock.advance(3.0);
        assert_eq!(clock.now(), SimTime::from_secs_f64(4.5));
        assert!((clock.now() - t0 - 4.5).abs() < 1e-9);
    }

    #[test]
    fn test_sim_clock_ignores_negative() {
        let clock = SimClock::default();
        clock.advance(-2.0);
        assert_eq!(clock.now(), SimTime::ZERO);
    }

    #[test]
    fn test_to_real_scale() {
        let clock = SimClock::new(0.05);
        assert_eq!(clock.to_real(2.0), Duration::from_millis(100));
        assert_eq!(clock.to_real(0.0), Duration::ZERO);
    }

    #[test]
    fn test_sim_time_wire_seconds() {
        let t = SimTime::from_secs_f64(12.25);
        assert_eq!(serde_json::to_string(&t).unwrap(), "12.25");
        let back: SimTime = serde_json::from_str("12.25").unwrap();
        assert_eq!(back, t);
    }
}
