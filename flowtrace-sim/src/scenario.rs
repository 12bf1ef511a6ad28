//! Scenario assembly.
//!
//! A [`Scenario`] is pure data: per-flow traffic profiles plus scripted
//! window and queue behavior, loadable from JSON. [`install`] turns it into
//! scheduled events against an [`EventDriver`] and hands back the provider
//! handles the probes consume. Transport and queue-discipline names are
//! labels recorded in the run's configuration, not models; the scripts stand
//! in for whatever dynamics the real engine would produce.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use flowtrace_core::{EventScheduler, FlowId, SimTime, arm_periodic};
use serde::{Deserialize, Serialize};

use crate::clock::DeterministicRng;
use crate::driver::EventDriver;
use crate::providers::{SimFlowStats, SimQueue, SimWindow};

/// Spacing of the byte-accrual ticks feeding the flow counters.
pub const TRAFFIC_TICK: Duration = Duration::from_millis(10);

/// One step of a piecewise-constant rate profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateStep {
    /// Virtual time the step takes effect, in seconds.
    pub at_secs: f64,
    /// Target rate from that point on, in Mbit/s.
    pub rate_mbps: f64,
}

/// Scripted sending behavior of one flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrafficProfile {
    /// Flow this profile drives.
    pub flow: FlowId,
    /// Virtual time the flow is established, in seconds.
    pub start_secs: f64,
    /// Rate steps, sorted by `at_secs`.
    pub rate_steps: Vec<RateStep>,
}

impl TrafficProfile {
    /// Target rate at virtual time `at`: the latest step not after `at`,
    /// zero before the first step.
    pub fn rate_at(&self, at: SimTime) -> f64 {
        let secs = at.as_secs_f64();
        self.rate_steps
            .iter()
            .take_while(|step| step.at_secs <= secs)
            .last()
            .map(|step| step.rate_mbps)
            .unwrap_or(0.0)
    }
}

/// One scripted congestion-window change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowChange {
    /// Virtual time of the change, in seconds.
    pub at_secs: f64,
    /// New raw window in bytes.
    pub window_bytes: u32,
}

/// Scripted congestion-window trajectory of one flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowScript {
    /// Flow whose window this script drives.
    pub flow: FlowId,
    /// Change points, sorted by `at_secs`.
    pub changes: Vec<WindowChange>,
}

/// One scripted change of the bottleneck queue depth.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DepthChange {
    /// Virtual time of the change, in seconds.
    pub at_secs: f64,
    /// New instantaneous depth in packets.
    pub depth: u64,
}

/// Scripted bottleneck queue occupancy.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QueueScript {
    /// Change points, sorted by `at_secs`.
    pub changes: Vec<DepthChange>,
}

/// A complete experiment script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Transport label recorded in the configuration record.
    pub transport: String,
    /// Queue-discipline label recorded in the configuration record.
    pub queue_disc: String,
    /// Sending flows.
    pub flows: Vec<TrafficProfile>,
    /// Window trajectories, one per traced flow.
    pub windows: Vec<WindowScript>,
    /// Bottleneck queue behavior.
    pub queue: QueueScript,
}

impl Scenario {
    /// The built-in experiment: two bulk senders sharing one bottleneck,
    /// flows established at 0.1s, window dynamics shaped by the transport
    /// label and queue dynamics by the queue-discipline label.
    pub fn bulk_senders(transport: &str, queue_disc: &str) -> Self {
        let flows = vec![
            TrafficProfile {
                flow: FlowId::new(1),
                start_secs: 0.1,
                rate_steps: vec![
                    RateStep {
                        at_secs: 0.1,
                        rate_mbps: 2.0,
                    },
                    RateStep {
                        at_secs: 5.0,
                        rate_mbps: 6.0,
                    },
                ],
            },
            TrafficProfile {
                flow: FlowId::new(2),
                start_secs: 0.1,
                rate_steps: vec![
                    RateStep {
                        at_secs: 0.1,
                        rate_mbps: 3.0,
                    },
                    RateStep {
                        at_secs: 5.0,
                        rate_mbps: 4.0,
                    },
                ],
            },
        ];

        let windows = flows
            .iter()
            .map(|profile| window_script(transport, profile.flow))
            .collect();

        Self {
            transport: transport.to_string(),
            queue_disc: queue_disc.to_string(),
            flows,
            windows,
            queue: queue_script(queue_disc),
        }
    }

    /// Flows that have a window script, in script order.
    pub fn window_flows(&self) -> Vec<FlowId> {
        self.windows.iter().map(|script| script.flow).collect()
    }
}

const SEGMENT: u32 = 1448;

fn window_script(transport: &str, flow: FlowId) -> WindowScript {
    let mut changes = vec![WindowChange {
        at_secs: 0.101,
        window_bytes: 10 * SEGMENT,
    }];

    match transport {
        // probe-rtt style: hold a large window, collapse to 4 segments for
        // a short probe every 10 seconds, then restore
        "bbr" => {
            changes.push(WindowChange {
                at_secs: 1.0,
                window_bytes: 64 * SEGMENT,
            });
            for cycle in 1..10 {
                let probe = cycle as f64 * 10.0;
                changes.push(WindowChange {
                    at_secs: probe,
                    window_bytes: 4 * SEGMENT,
                });
                changes.push(WindowChange {
                    at_secs: probe + 0.2,
                    window_bytes: 64 * SEGMENT,
                });
            }
        }
        // additive increase every 2 seconds, halved on a loss every 12
        _ => {
            let mut window = 10 * SEGMENT;
            let mut secs = 2.0;
            while secs < 100.0 {
                window = if (secs as u64).is_multiple_of(12) {
                    window / 2
                } else {
                    window + 8 * SEGMENT
                };
                changes.push(WindowChange {
                    at_secs: secs,
                    window_bytes: window,
                });
                secs += 2.0;
            }
        }
    }

    WindowScript { flow, changes }
}

fn queue_script(queue_disc: &str) -> QueueScript {
    // fifo builds a standing queue that drains at each probe; fq-style
    // disciplines hold occupancy lower
    let (standing, drained) = match queue_disc {
        "fifo" => (60, 5),
        _ => (12, 2),
    };

    let mut changes = vec![
        DepthChange {
            at_secs: 0.3,
            depth: 5,
        },
        DepthChange {
            at_secs: 1.0,
            depth: standing,
        },
    ];
    for cycle in 1..10 {
        let probe = cycle as f64 * 10.0;
        changes.push(DepthChange {
            at_secs: probe,
            depth: drained,
        });
        changes.push(DepthChange {
            at_secs: probe + 0.5,
            depth: standing,
        });
    }
    QueueScript { changes }
}

/// Provider handles for an installed scenario.
#[derive(Clone)]
pub struct ScenarioHandles {
    /// Cumulative transmit counters, polled by the rate sampler.
    pub flow_stats: SimFlowStats,
    /// Bottleneck queue, polled by the occupancy sampler.
    pub queue: SimQueue,
    /// Window-change source the tracers register with.
    pub window: SimWindow,
}

/// Schedules every scripted behavior onto `driver`.
///
/// Traffic bytes accrue on a fixed tick from each flow's start, with a small
/// seeded jitter so counters look like real traffic while staying monotone
/// and reproducible. Window and queue changes are scheduled as one event per
/// change point. Re-arming runs for the life of the simulation; whatever
/// lies past the driver's horizon is cancelled by the driver, not here.
pub fn install(scenario: &Scenario, driver: &mut EventDriver, seed: u64) -> ScenarioHandles {
    let handles = ScenarioHandles {
        flow_stats: SimFlowStats::with_expected(scenario.flows.len()),
        queue: SimQueue::new(),
        window: SimWindow::new(),
    };
    let rng = Rc::new(RefCell::new(DeterministicRng::from_seed(seed)));

    for profile in &scenario.flows {
        let start = SimTime::from_secs_f64(profile.start_secs);

        let stats = handles.flow_stats.clone();
        let flow = profile.flow;
        driver.schedule(
            start,
            Box::new(move |_| {
                stats.start_flow(flow);
                Ok(())
            }),
        );

        let stats = handles.flow_stats.clone();
        let profile = profile.clone();
        let rng = rng.clone();
        arm_periodic(driver, start + TRAFFIC_TICK, TRAFFIC_TICK, move |now| {
            let rate_mbps = profile.rate_at(now);
            let jitter = 0.9 + 0.2 * rng.borrow_mut().random_f64();
            let bytes = rate_mbps * jitter * TRAFFIC_TICK.as_secs_f64() * 1_000_000.0 / 8.0;
            stats.add_bytes(profile.flow, bytes as u64);
            Ok(())
        });
    }

    for script in &scenario.windows {
        for change in &script.changes {
            let window = handles.window.clone();
            let flow = script.flow;
            let value = change.window_bytes;
            driver.schedule(
                SimTime::from_secs_f64(change.at_secs),
                Box::new(move |sched| window.set_window(sched.now(), flow, value)),
            );
        }
    }

    for change in &scenario.queue.changes {
        let queue = handles.queue.clone();
        let depth = change.depth;
        driver.schedule(
            SimTime::from_secs_f64(change.at_secs),
            Box::new(move |_| {
                queue.set_depth(depth);
                Ok(())
            }),
        );
    }

    handles
}
