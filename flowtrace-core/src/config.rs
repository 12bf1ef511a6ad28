//! Probe configuration.
//!
//! Tunables for the instrumentation live here instead of being scattered
//! through the samplers.

use std::time::Duration;

use crate::time::SimTime;

/// Settings for the periodic samplers and the window tracer.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Throughput sampling period.
    pub rate_period: Duration,
    /// Virtual time of the first throughput sample. Offset slightly from
    /// zero so the sample grid never collides with start-of-run events.
    pub rate_start: SimTime,
    /// Queue-occupancy sampling period. Independent of `rate_period`.
    pub queue_period: Duration,
    /// Virtual time of the first queue-occupancy sample.
    pub queue_start: SimTime,
    /// Bytes per transport segment, used to normalize raw window sizes into
    /// segment counts.
    pub segment_size: u32,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            rate_period: Duration::from_millis(200),
            rate_start: SimTime::from_micros(1),
            queue_period: Duration::from_millis(200),
            queue_start: SimTime::ZERO,
            segment_size: 1448,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_the_experiment_grid() {
        let config = ProbeConfig::default();
        assert_eq!(config.rate_period, Duration::from_millis(200));
        assert_eq!(config.queue_start, SimTime::ZERO);
        assert!(config.rate_start > SimTime::ZERO);
        assert_eq!(config.segment_size, 1448);
    }
}
