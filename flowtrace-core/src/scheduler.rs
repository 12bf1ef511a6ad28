//! Scheduler abstraction the probes arm themselves through.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use crate::error::ProbeError;
use crate::time::SimTime;

/// A deferred unit of work executed by the event driver.
///
/// A callback returning an error aborts the run; the driver stops executing
/// further events and propagates the error to its caller.
pub type Callback = Box<dyn FnOnce(&mut dyn EventScheduler) -> Result<(), ProbeError>>;

/// Discrete-event scheduler contract.
///
/// Callbacks run to completion one at a time, in non-decreasing virtual-time
/// order. Callbacks scheduled for the same instant run in registration order.
pub trait EventScheduler {
    /// Current virtual time.
    fn now(&self) -> SimTime;

    /// Schedules `callback` to run at virtual time `at`.
    fn schedule(&mut self, at: SimTime, callback: Callback);
}

/// Arms `tick` to fire first at `start` and then every `period`.
///
/// Each firing schedules the next occurrence as an independent event, so the
/// recurrence never nests calls no matter how long the run is. The cycle only
/// ends when the driver stops dispatching, or when a firing returns an error.
pub fn arm_periodic<F>(scheduler: &mut dyn EventScheduler, start: SimTime, period: Duration, tick: F)
where
    F: FnMut(SimTime) -> Result<(), ProbeError> + 'static,
{
    schedule_tick(scheduler, start, period, Rc::new(RefCell::new(tick)));
}

fn schedule_tick<F>(
    scheduler: &mut dyn EventScheduler,
    at: SimTime,
    period: Duration,
    tick: Rc<RefCell<F>>,
) where
    F: FnMut(SimTime) -> Result<(), ProbeError> + 'static,
{
    scheduler.schedule(
        at,
        Box::new(move |sched| {
            let now = sched.now();
            (&mut *tick.borrow_mut())(now)?;
            schedule_tick(sched, now + period, period, tick);
            Ok(())
        }),
    );
}
