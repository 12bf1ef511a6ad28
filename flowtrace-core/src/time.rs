//! Virtual time for the simulation clock.

use std::fmt;
use std::ops::{Add, AddAssign};
use std::time::Duration;

/// A point in virtual time, measured from the start of the run.
///
/// Wraps a [`Duration`] so arithmetic stays lossless. Trace output renders
/// the value in seconds, matching the clock the event driver advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(Duration);

impl SimTime {
    /// The start of the run.
    pub const ZERO: SimTime = SimTime(Duration::ZERO);

    /// Creates a timestamp from fractional seconds.
    ///
    /// # Panics
    /// Panics if `secs` is negative or not finite, as [`Duration::from_secs_f64`] does.
    pub fn from_secs_f64(secs: f64) -> Self {
        SimTime(Duration::from_secs_f64(secs))
    }

    /// Creates a timestamp from whole milliseconds.
    pub fn from_millis(millis: u64) -> Self {
        SimTime(Duration::from_millis(millis))
    }

    /// Creates a timestamp from whole microseconds.
    pub fn from_micros(micros: u64) -> Self {
        SimTime(Duration::from_micros(micros))
    }

    /// Returns the timestamp as fractional seconds.
    pub fn as_secs_f64(self) -> f64 {
        self.0.as_secs_f64()
    }

    /// Elapsed virtual time since `earlier`, zero if `earlier` is not earlier.
    pub fn since(self, earlier: SimTime) -> Duration {
        self.0.saturating_sub(earlier.0)
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> SimTime {
        SimTime(self.0 + rhs)
    }
}

impl AddAssign<Duration> for SimTime {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs;
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_renders_seconds() {
        assert_eq!(SimTime::ZERO.to_string(), "0");
        assert_eq!(SimTime::from_millis(200).to_string(), "0.2");
        assert_eq!(SimTime::from_millis(600).to_string(), "0.6");
        assert_eq!(SimTime::from_secs_f64(1.5).to_string(), "1.5");
    }

    #[test]
    fn test_addition_advances_time() {
        let mut t = SimTime::ZERO + Duration::from_millis(200);
        t += Duration::from_millis(200);
        assert_eq!(t, SimTime::from_millis(400));
    }

    #[test]
    fn test_since_saturates_at_zero() {
        let earlier = SimTime::from_millis(100);
        let later = SimTime::from_millis(300);

        assert_eq!(later.since(earlier), Duration::from_millis(200));
        assert_eq!(earlier.since(later), Duration::ZERO);
    }

    #[test]
    fn test_ordering_follows_the_clock() {
        assert!(SimTime::from_micros(1) < SimTime::from_millis(1));
        assert!(SimTime::from_millis(200) < SimTime::from_millis(400));
    }
}
