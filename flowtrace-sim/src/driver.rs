//! Discrete-event driver.
//!
//! Executes scheduled callbacks one at a time in non-decreasing virtual-time
//! order, with registration order breaking ties at the same instant. There is
//! no preemption: a callback runs to completion before the clock moves again,
//! so probes sharing the driver never race.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use flowtrace_core::{Callback, EventScheduler, ProbeError, SimTime};
use tracing::debug;

use crate::clock::SimClock;

/// Backstop against a runaway event loop; far above any real scenario.
const MAX_PENDING_EVENTS: usize = 100_000;

/// Errors that can occur while driving a run.
#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    /// More events pending than any legitimate scenario schedules.
    #[error("event queue overflow: {count} events pending")]
    EventQueueOverflow {
        /// Number of pending events at the overflow check.
        count: usize,
    },

    /// An attempt to move the virtual clock backwards.
    #[error("virtual time cannot move backwards: {from} -> {to}")]
    TimeReversal {
        /// Clock position when the attempt was made.
        from: SimTime,
        /// Requested target time.
        to: SimTime,
    },

    /// A probe reported a fatal contract violation; the run is aborted.
    #[error("probe failure: {0}")]
    Probe(#[from] ProbeError),
}

/// Summary of a completed run.
#[derive(Debug, Clone, Copy)]
pub struct RunReport {
    /// Virtual time when the driver stopped.
    pub end_time: SimTime,
    /// Callbacks executed over the driver's lifetime.
    pub events_processed: u64,
}

struct ScheduledEvent {
    seq: u64,
    at: SimTime,
    callback: Callback,
}

impl Eq for ScheduledEvent {}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed so the max-heap pops the earliest (time, seq) first
        (other.at, other.seq).cmp(&(self.at, self.seq))
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Event queue and clock for one run.
#[derive(Default)]
pub struct EventDriver {
    clock: SimClock,
    queue: BinaryHeap<ScheduledEvent>,
    next_seq: u64,
    events_processed: u64,
}

impl EventDriver {
    /// Creates an empty driver at virtual zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// True once no callbacks remain.
    pub fn is_drained(&self) -> bool {
        self.queue.is_empty()
    }

    /// Runs callbacks until the queue is empty or the next event lies past
    /// `horizon`. The horizon is the global stop: everything scheduled
    /// beyond it is discarded, never executed. Events exactly at the
    /// horizon still run. On success the clock rests at `horizon`.
    ///
    /// # Errors
    /// - `SimulationError::Probe` - a callback reported a fatal violation
    /// - `SimulationError::EventQueueOverflow` - the queue kept growing past
    ///   any plausible scenario size
    pub fn run_until(&mut self, horizon: SimTime) -> Result<RunReport, SimulationError> {
        while let Some(event) = self.queue.pop() {
            if event.at > horizon {
                debug!(
                    discarded = self.queue.len() + 1,
                    %horizon,
                    "horizon reached, cancelling pending events"
                );
                self.queue.clear();
                break;
            }

            self.clock.advance_to(event.at)?;
            (event.callback)(self)?;
            self.events_processed += 1;

            if self.queue.len() > MAX_PENDING_EVENTS {
                return Err(SimulationError::EventQueueOverflow {
                    count: self.queue.len(),
                });
            }
        }

        if self.clock.now() < horizon {
            self.clock.advance_to(horizon)?;
        }
        Ok(RunReport {
            end_time: self.clock.now(),
            events_processed: self.events_processed,
        })
    }
}

impl EventScheduler for EventDriver {
    fn now(&self) -> SimTime {
        self.clock.now()
    }

    fn schedule(&mut self, at: SimTime, callback: Callback) {
        // a request for the past lands at the current instant instead
        let at = at.max(self.clock.now());
        self.queue.push(ScheduledEvent {
            seq: self.next_seq,
            at,
            callback,
        });
        self.next_seq += 1;
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use flowtrace_core::arm_periodic;

    use super::*;

    fn record(log: &Rc<RefCell<Vec<(&'static str, SimTime)>>>, label: &'static str) -> Callback {
        let log = log.clone();
        Box::new(move |sched| {
            log.borrow_mut().push((label, sched.now()));
            Ok(())
        })
    }

    #[test]
    fn test_events_run_in_time_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut driver = EventDriver::new();

        driver.schedule(SimTime::from_millis(300), record(&log, "late"));
        driver.schedule(SimTime::from_millis(100), record(&log, "early"));
        driver.schedule(SimTime::from_millis(200), record(&log, "middle"));

        let report = driver.run_until(SimTime::from_millis(500)).unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                ("early", SimTime::from_millis(100)),
                ("middle", SimTime::from_millis(200)),
                ("late", SimTime::from_millis(300)),
            ]
        );
        assert_eq!(report.events_processed, 3);
        assert_eq!(report.end_time, SimTime::from_millis(500));
        assert!(driver.is_drained());
    }

    #[test]
    fn test_same_instant_runs_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut driver = EventDriver::new();
        let at = SimTime::from_millis(100);

        driver.schedule(at, record(&log, "first"));
        driver.schedule(at, record(&log, "second"));
        driver.schedule(at, record(&log, "third"));
        driver.run_until(SimTime::from_millis(100)).unwrap();

        assert_eq!(
            *log.borrow(),
            vec![("first", at), ("second", at), ("third", at)]
        );
    }

    #[test]
    fn test_horizon_discards_later_events() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut driver = EventDriver::new();

        driver.schedule(SimTime::from_millis(100), record(&log, "kept"));
        driver.schedule(SimTime::from_millis(200), record(&log, "at-horizon"));
        driver.schedule(SimTime::from_millis(201), record(&log, "dropped"));
        assert_eq!(driver.pending(), 3);

        let report = driver.run_until(SimTime::from_millis(200)).unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                ("kept", SimTime::from_millis(100)),
                ("at-horizon", SimTime::from_millis(200)),
            ]
        );
        assert_eq!(report.end_time, SimTime::from_millis(200));
        assert!(driver.is_drained(), "past-horizon events are cancelled");
    }

    #[test]
    fn test_callbacks_can_chain_further_events() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut driver = EventDriver::new();

        let inner_log = log.clone();
        driver.schedule(
            SimTime::from_millis(100),
            Box::new(move |sched| {
                inner_log.borrow_mut().push(("outer", sched.now()));
                let log = inner_log.clone();
                sched.schedule(
                    sched.now() + Duration::from_millis(50),
                    Box::new(move |sched| {
                        log.borrow_mut().push(("inner", sched.now()));
                        Ok(())
                    }),
                );
                Ok(())
            }),
        );
        driver.run_until(SimTime::from_millis(500)).unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                ("outer", SimTime::from_millis(100)),
                ("inner", SimTime::from_millis(150)),
            ]
        );
    }

    #[test]
    fn test_fatal_callback_error_aborts_the_run() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut driver = EventDriver::new();

        driver.schedule(
            SimTime::from_millis(100),
            Box::new(|_| Err(ProbeError::TraceClosed)),
        );
        driver.schedule(SimTime::from_millis(200), record(&log, "after"));

        let result = driver.run_until(SimTime::from_millis(500));

        assert!(matches!(
            result,
            Err(SimulationError::Probe(ProbeError::TraceClosed))
        ));
        assert!(log.borrow().is_empty(), "no callback runs after the abort");
    }

    #[test]
    fn test_scheduling_in_the_past_lands_now() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut driver = EventDriver::new();

        let inner_log = log.clone();
        driver.schedule(
            SimTime::from_millis(100),
            Box::new(move |sched| {
                let log = inner_log.clone();
                sched.schedule(
                    SimTime::ZERO,
                    Box::new(move |sched| {
                        log.borrow_mut().push(("clamped", sched.now()));
                        Ok(())
                    }),
                );
                Ok(())
            }),
        );
        driver.run_until(SimTime::from_millis(500)).unwrap();

        assert_eq!(*log.borrow(), vec![("clamped", SimTime::from_millis(100))]);
    }

    #[test]
    fn test_periodic_probe_keeps_its_grid_through_the_driver() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut driver = EventDriver::new();

        let seen = log.clone();
        arm_periodic(
            &mut driver,
            SimTime::ZERO,
            Duration::from_millis(200),
            move |now| {
                seen.borrow_mut().push(now);
                Ok(())
            },
        );
        driver.run_until(SimTime::from_millis(600)).unwrap();

        assert_eq!(
            *log.borrow(),
            vec![
                SimTime::ZERO,
                SimTime::from_millis(200),
                SimTime::from_millis(400),
                SimTime::from_millis(600),
            ]
        );
    }
}
