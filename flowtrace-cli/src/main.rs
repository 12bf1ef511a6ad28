//! Flowtrace CLI - runs the bottleneck experiment and records traces.
//!
//! Two bulk senders share one bottleneck link; the probes sample throughput
//! and queue occupancy on a fixed grid and trace every congestion-window
//! change. Each run lands in its own timestamped directory under the output
//! root, alongside a record of the parameters in effect.

use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use flowtrace_core::{
    OccupancySampler, ProbeConfig, RateSampler, SimTime, TraceWriter, WindowTracer,
};
use flowtrace_sim::{EventDriver, Scenario, install};
use tracing::info;

#[derive(Parser)]
#[command(name = "flowtrace")]
#[command(
    about = "Runs a two-sender bottleneck experiment and records throughput, queue, and window traces"
)]
struct Cli {
    /// Transport label shaping the window script: bbr or newreno
    #[arg(long, default_value = "bbr")]
    transport: String,

    /// Queue-discipline label shaping the queue script: fifo or fq
    #[arg(long, default_value = "fifo")]
    queue_disc: String,

    /// Seconds of simulated traffic; the run drains for one extra second
    #[arg(long, default_value_t = 100.0)]
    stop_time: f64,

    /// Root directory for run output
    #[arg(long, default_value = "results")]
    out_dir: PathBuf,

    /// Bytes per transport segment, for window normalization
    #[arg(long, default_value_t = 1448)]
    segment_size: u32,

    /// Seed for the scripted traffic jitter
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// JSON scenario file overriding the built-in scripts
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.quiet {
        tracing_subscriber::fmt().with_env_filter("warn").init();
    } else {
        tracing_subscriber::fmt::init();
    }

    let scenario: Scenario = match &cli.scenario {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading scenario file {}", path.display()))?;
            serde_json::from_str(&json)
                .with_context(|| format!("parsing scenario file {}", path.display()))?
        }
        None => Scenario::bulk_senders(&cli.transport, &cli.queue_disc),
    };

    let stamp = Local::now().format("%d-%m-%Y-%H-%M-%S");
    let run_dir = cli
        .out_dir
        .join(format!("{}{}", scenario.transport, scenario.queue_disc))
        .join(stamp.to_string());

    let window_flows = scenario.window_flows();
    let writer = TraceWriter::open(&run_dir, &window_flows)
        .with_context(|| format!("opening trace sinks in {}", run_dir.display()))?;
    let writer = Rc::new(RefCell::new(writer));
    writer.borrow_mut().record_config(&[
        ("transport", scenario.transport.clone()),
        ("queueDisc", scenario.queue_disc.clone()),
        ("stopTime", cli.stop_time.to_string()),
        ("segmentSize", cli.segment_size.to_string()),
        ("seed", cli.seed.to_string()),
    ])?;

    let mut driver = EventDriver::new();
    let handles = install(&scenario, &mut driver, cli.seed);

    let probes = ProbeConfig {
        segment_size: cli.segment_size,
        ..ProbeConfig::default()
    };
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

    info!(dir = %run_dir.display(), transport = %scenario.transport, "starting run");
    let horizon = SimTime::from_secs_f64(cli.stop_time) + Duration::from_secs(1);
    let outcome = driver.run_until(horizon);

    // close the sinks on every exit path so an aborted run still flushes
    let closed = writer.borrow_mut().finish();
    let report = outcome.context("run aborted")?;
    closed.context("closing trace sinks")?;

    info!(
        end = %report.end_time,
        events = report.events_processed,
        dir = %run_dir.display(),
        "run complete"
    );
    Ok(())
}
