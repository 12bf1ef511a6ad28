//! Periodic throughput probe over cumulative flow counters.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{ProbeError, ProviderError};
use crate::flow::{FlowId, FlowSnapshot};
use crate::providers::FlowStatsProvider;
use crate::scheduler::{EventScheduler, arm_periodic};
use crate::time::SimTime;
use crate::trace::TraceWriter;

/// Samples cumulative transmit counters on a fixed period and converts each
/// interval delta into per-flow and aggregate throughput in Mbit/s.
///
/// The first successful poll only seeds the previous snapshot; there is no
/// prior interval, so nothing is emitted. From the second poll on, every
/// sample appends one line to the throughput trace. The flow set is pinned
/// by the first poll: a different set later is a fatal contract violation,
/// as is any counter moving backwards.
pub struct RateSampler<P> {
    provider: P,
    writer: Rc<RefCell<TraceWriter>>,
    period: Duration,
    previous: Option<FlowSnapshot>,
}

impl<P: FlowStatsProvider + 'static> RateSampler<P> {
    /// Creates a sampler polling `provider` every `period`.
    pub fn new(provider: P, writer: Rc<RefCell<TraceWriter>>, period: Duration) -> Self {
        Self {
            provider,
            writer,
            period,
            previous: None,
        }
    }

    /// Arms the sampler to fire first at `start` and re-arm itself every
    /// period for the rest of the run.
    pub fn arm(self, scheduler: &mut dyn EventScheduler, start: SimTime) {
        let period = self.period;
        let mut sampler = self;
        arm_periodic(scheduler, start, period, move |now| sampler.sample(now));
    }

    /// One firing: polls the provider, emits the interval since the previous
    /// poll, stores the new snapshot.
    ///
    /// # Errors
    /// Fatal contract violations only; transient provider gaps are absorbed
    /// here and merely skip the interval's output.
    pub fn sample(&mut self, now: SimTime) -> Result<(), ProbeError> {
        let stats = match self.provider.flow_stats() {
            Ok(stats) if !stats.is_empty() => stats,
            Ok(_) => {
                debug!(time = %now, "no flows established yet, skipping throughput sample");
                return Ok(());
            }
            Err(ProviderError::Unavailable) => {
                warn!(time = %now, "flow statistics unavailable, skipping throughput sample");
                return Ok(());
            }
        };

        match &self.previous {
            Some(previous) => {
                if let Some((aggregate, rates)) = interval_rates(previous, now, &stats)? {
                    self.writer
                        .borrow_mut()
                        .record_throughput(now, aggregate, &rates)?;
                } else {
                    debug!(time = %now, "zero-length interval, skipping throughput sample");
                    return Ok(());
                }
            }
            None => {
                debug!(time = %now, flows = stats.len(), "first flow snapshot, nothing to report");
            }
        }

        self.previous = Some(FlowSnapshot::new(now, stats));
        Ok(())
    }
}

/// Per-flow and aggregate rates over the interval from `previous` to `now`.
///
/// Rates are in Mbit/s: bits divided by microseconds. The aggregate is the
/// running sum of the per-flow rates, never re-derived from a global
/// counter, so the line always sums consistently. Returns `None` for a
/// zero-length interval, which has no defined rate.
fn interval_rates(
    previous: &FlowSnapshot,
    now: SimTime,
    stats: &BTreeMap<FlowId, u64>,
) -> Result<Option<(f64, Vec<f64>)>, ProbeError> {
    if stats.len() != previous.flow_count() {
        return Err(ProbeError::FlowSetChanged {
            expected: previous.flow_count(),
            actual: stats.len(),
        });
    }

    let interval = now.since(previous.taken_at);
    if interval.is_zero() {
        return Ok(None);
    }
    let interval_micros = interval.as_micros() as f64;

    let mut rates = Vec::with_capacity(stats.len());
    let mut aggregate = 0.0;
    for (&flow, &bytes) in stats {
        let previous_bytes = previous
            .tx_bytes
            .get(&flow)
            .copied()
            .ok_or(ProbeError::FlowVanished { flow })?;
        if bytes < previous_bytes {
            return Err(ProbeError::CounterRegression {
                flow,
                previous: previous_bytes,
                current: bytes,
            });
        }
        let rate = 8.0 * (bytes - previous_bytes) as f64 / interval_micros;
        aggregate += rate;
        rates.push(rate);
    }

    Ok(Some((aggregate, rates)))
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::fs;
    use std::path::Path;

    use proptest::prelude::*;

    use super::*;
    use crate::trace::THROUGHPUT_FILE;

    /// Replays a scripted sequence of poll results.
    struct FakeStats {
        responses: RefCell<VecDeque<Result<BTreeMap<FlowId, u64>, ProviderError>>>,
    }

    impl FakeStats {
        fn new(
            responses: impl IntoIterator<Item = Result<BTreeMap<FlowId, u64>, ProviderError>>,
        ) -> Self {
            Self {
                responses: RefCell::new(responses.into_iter().collect()),
            }
        }
    }

    impl FlowStatsProvider for FakeStats {
        fn flow_stats(&self) -> Result<BTreeMap<FlowId, u64>, ProviderError> {
            self.responses
                .borrow_mut()
                .pop_front()
                .unwrap_or(Err(ProviderError::Unavailable))
        }
    }

    fn counters(values: &[(u32, u64)]) -> BTreeMap<FlowId, u64> {
        values
            .iter()
            .map(|&(flow, bytes)| (FlowId::new(flow), bytes))
            .collect()
    }

    fn writer_in(dir: &Path) -> Rc<RefCell<TraceWriter>> {
        Rc::new(RefCell::new(TraceWriter::open(dir, &[]).unwrap()))
    }

    fn trace_lines(dir: &Path, writer: &Rc<RefCell<TraceWriter>>) -> Vec<String> {
        writer.borrow_mut().finish().unwrap();
        fs::read_to_string(dir.join(THROUGHPUT_FILE))
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_first_sample_emits_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer_in(dir.path());
        let provider = FakeStats::new([Ok(counters(&[(1, 500), (2, 700)]))]);
        let mut sampler = RateSampler::new(provider, writer.clone(), Duration::from_millis(200));

        sampler.sample(SimTime::ZERO).unwrap();

        assert!(trace_lines(dir.path(), &writer).is_empty());
    }

    #[test]
    fn test_second_sample_reports_interval_rates() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer_in(dir.path());
        let provider = FakeStats::new([
            Ok(counters(&[(1, 0), (2, 0)])),
            Ok(counters(&[(1, 1000), (2, 2000)])),
        ]);
        let mut sampler = RateSampler::new(provider, writer.clone(), Duration::from_millis(200));

        sampler.sample(SimTime::ZERO).unwrap();
        sampler.sample(SimTime::from_millis(200)).unwrap();

        // 8 * 1000 bytes over 0.2s is 40 kbit/s, or 0.04 Mbit/s
        let lines = trace_lines(dir.path(), &writer);
        assert_eq!(lines, vec!["0.2s 0.120000Mbps 0.040000Mbps 0.080000Mbps"]);
    }

    #[test]
    fn test_unavailable_provider_skips_and_resumes() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer_in(dir.path());
        let provider = FakeStats::new([
            Err(ProviderError::Unavailable),
            Ok(counters(&[(1, 0)])),
            Err(ProviderError::Unavailable),
            Ok(counters(&[(1, 4000)])),
        ]);
        let mut sampler = RateSampler::new(provider, writer.clone(), Duration::from_millis(200));

        for millis in [0, 200, 400, 600] {
            sampler.sample(SimTime::from_millis(millis)).unwrap();
        }

        // the emitted interval spans the skipped sample: 0.2s to 0.6s
        let lines = trace_lines(dir.path(), &writer);
        assert_eq!(lines, vec!["0.6s 0.080000Mbps 0.080000Mbps"]);
    }

    #[test]
    fn test_counter_regression_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer_in(dir.path());
        let provider = FakeStats::new([
            Ok(counters(&[(1, 2000)])),
            Ok(counters(&[(1, 1500)])),
        ]);
        let mut sampler = RateSampler::new(provider, writer, Duration::from_millis(200));

        sampler.sample(SimTime::ZERO).unwrap();
        let result = sampler.sample(SimTime::from_millis(200));

        assert!(matches!(
            result,
            Err(ProbeError::CounterRegression {
                previous: 2000,
                current: 1500,
                ..
            })
        ));
    }

    #[test]
    fn test_flow_set_growth_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer_in(dir.path());
        let provider = FakeStats::new([
            Ok(counters(&[(1, 0), (2, 0)])),
            Ok(counters(&[(1, 10), (2, 10), (3, 10)])),
        ]);
        let mut sampler = RateSampler::new(provider, writer, Duration::from_millis(200));

        sampler.sample(SimTime::ZERO).unwrap();
        let result = sampler.sample(SimTime::from_millis(200));

        assert!(matches!(
            result,
            Err(ProbeError::FlowSetChanged {
                expected: 2,
                actual: 3,
            })
        ));
    }

    #[test]
    fn test_flow_identity_swap_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let writer = writer_in(dir.path());
        let provider = FakeStats::new([
            Ok(counters(&[(1, 0), (2, 0)])),
            Ok(counters(&[(1, 10), (9, 10)])),
        ]);
        let mut sampler = RateSampler::new(provider, writer, Duration::from_millis(200));

        sampler.sample(SimTime::ZERO).unwrap();
        let result = sampler.sample(SimTime::from_millis(200));

        assert!(matches!(
            result,
            Err(ProbeError::FlowVanished { flow }) if flow == FlowId::new(9)
        ));
    }

    #[test]
    fn test_zero_length_interval_emits_nothing() {
        let previous = FlowSnapshot::new(SimTime::from_millis(200), counters(&[(1, 100)]));
        let result = interval_rates(
            &previous,
            SimTime::from_millis(200),
            &counters(&[(1, 300)]),
        )
        .unwrap();
        assert!(result.is_none());
    }

    proptest! {
        /// Monotone counters can never produce a negative rate, and the
        /// aggregate column always equals the sum of the per-flow columns.
        #[test]
        fn prop_monotone_counters_yield_nonnegative_rates(
            start in proptest::collection::vec(0u64..1_000_000, 1..8),
            deltas in proptest::collection::vec(0u64..1_000_000, 1..8),
            interval_millis in 1u64..10_000,
        ) {
            let flows = start.len().min(deltas.len());
            let before: BTreeMap<FlowId, u64> = (0..flows)
                .map(|i| (FlowId::new(i as u32), start[i]))
                .collect();
            let after: BTreeMap<FlowId, u64> = (0..flows)
                .map(|i| (FlowId::new(i as u32), start[i] + deltas[i]))
                .collect();

            let previous = FlowSnapshot::new(SimTime::ZERO, before);
            let now = SimTime::from_millis(interval_millis);
            let (aggregate, rates) = interval_rates(&previous, now, &after)
                .unwrap()
                .expect("interval is nonzero");

            prop_assert!(rates.iter().all(|rate| *rate >= 0.0));
            let sum: f64 = rates.iter().sum();
            prop_assert!((aggregate - sum).abs() <= 1e-9 * sum.abs().max(1.0));
        }
    }
}
