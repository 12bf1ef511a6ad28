//! Periodic queue-occupancy probe.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use tracing::warn;

use crate::error::{ProbeError, ProviderError};
use crate::providers::QueueLengthProvider;
use crate::scheduler::{EventScheduler, arm_periodic};
use crate::time::SimTime;
use crate::trace::TraceWriter;

/// Samples the instantaneous queue depth on a fixed period.
///
/// The value is absolute, so there is no interval arithmetic and no warm-up
/// sample: every successful poll appends one line.
pub struct OccupancySampler<Q> {
    provider: Q,
    writer: Rc<RefCell<TraceWriter>>,
    period: Duration,
}

impl<Q: QueueLengthProvider + 'static> OccupancySampler<Q> {
    /// Creates a sampler polling `provider` every `period`.
    pub fn new(provider: Q, writer: Rc<RefCell<TraceWriter>>, period: Duration) -> Self {
        Self {
            provider,
            writer,
            period,
        }
    }

    /// Arms the sampler to fire first at `start` and re-arm itself every
    /// period for the rest of the run.
    pub fn arm(self, scheduler: &mut dyn EventScheduler, start: SimTime) {
        let period = self.period;
        let mut sampler = self;
        arm_periodic(scheduler, start, period, move |now| sampler.sample(now));
    }

    /// One firing: polls the queue and appends the sample.
    ///
    /// # Errors
    /// Only trace write failures are fatal; an unavailable provider skips
    /// the sample and keeps the schedule.
    pub fn sample(&mut self, now: SimTime) -> Result<(), ProbeError> {
        match self.provider.queue_length() {
            Ok(depth) => self.writer.borrow_mut().record_queue_depth(now, depth),
            Err(ProviderError::Unavailable) => {
                warn!(time = %now, "queue length unavailable, skipping occupancy sample");
                Ok(())
            }
        }
    }
}
