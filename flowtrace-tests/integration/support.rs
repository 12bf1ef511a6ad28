//! Shared harness for the integration tests: wires a scenario to the probes
//! the same way the CLI does, runs it, and parses the trace files back.

use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use flowtrace_core::{
    OccupancySampler, ProbeConfig, RateSampler, SimTime, TraceWriter, WindowTracer,
};
use flowtrace_sim::{EventDriver, RunReport, Scenario, SimulationError, install};

/// Runs `scenario` with default probe settings, draining one extra second
/// past `stop_secs`. Trace files land in `dir`.
pub fn run_scenario(
    scenario: &Scenario,
    stop_secs: f64,
    dir: &Path,
    seed: u64,
) -> Result<RunReport, SimulationError> {
    let window_flows = scenario.window_flows();
    let writer = Rc::new(RefCell::new(TraceWriter::open(dir, &window_flows)?));
    writer.borrow_mut().record_config(&[
        ("transport", scenario.transport.clone()),
        ("queueDisc", scenario.queue_disc.clone()),
        ("stopTime", stop_secs.to_string()),
        ("seed", seed.to_string()),
    ])?;

    let mut driver = EventDriver::new();
    let handles = install(scenario, &mut driver, seed);

    let probes = ProbeConfig::default();
    RateSampler::new(
        handles.flow_stats.clone(),
        writer.clone(),
        probes.rate_period,
    )
    .arm(&mut driver, probes.rate_start);
    OccupancySampler::new(handles.queue.clone(), writer.clone(), probes.queue_period)
        .arm(&mut driver, probes.queue_start);
    for flow in window_flows {
        WindowTracer::new(flow, probes.segment_size, writer.clone()).attach(&handles.window);
    }

    let horizon = SimTime::from_secs_f64(stop_secs) + Duration::from_secs(1);
    let outcome = driver.run_until(horizon);
    let closed = writer.borrow_mut().finish();
    let report = outcome?;
    closed?;
    Ok(report)
}

/// One parsed throughput line: timestamp, aggregate, per-flow rates.
pub struct ThroughputLine {
    pub time: f64,
    pub aggregate: f64,
    pub per_flow: Vec<f64>,
}

/// Parses the throughput trace, stripping the `s` and `Mbps` unit suffixes.
pub fn parse_throughput(dir: &Path) -> Vec<ThroughputLine> {
    let text = fs::read_to_string(dir.join("throughput.dat")).unwrap();
    text.lines()
        .map(|line| {
            let mut fields = line.split_whitespace();
            let time = strip(fields.next().unwrap(), "s");
            let aggregate = strip(fields.next().unwrap(), "Mbps");
            let per_flow = fields.map(|field| strip(field, "Mbps")).collect();
            ThroughputLine {
                time,
                aggregate,
                per_flow,
            }
        })
        .collect()
}

/// Parses a two-column `<time> <value>` trace.
pub fn parse_pairs(dir: &Path, file: &str) -> Vec<(f64, f64)> {
    let text = fs::read_to_string(dir.join(file)).unwrap();
    text.lines()
        .map(|line| {
            let mut fields = line.split_whitespace();
            let time: f64 = fields.next().unwrap().parse().unwrap();
            let value: f64 = fields.next().unwrap().parse().unwrap();
            assert!(fields.next().is_none(), "unexpected extra column: {line}");
            (time, value)
        })
        .collect()
}

fn strip(field: &str, suffix: &str) -> f64 {
    field
        .strip_suffix(suffix)
        .unwrap_or_else(|| panic!("field {field:?} lacks suffix {suffix:?}"))
        .parse()
        .unwrap()
}
