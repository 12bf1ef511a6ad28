//! End-to-end checks of the built-in bulk-sender experiment.

use std::fs;

use flowtrace_sim::Scenario;

use crate::support::{parse_pairs, parse_throughput, run_scenario};

const PERIOD: f64 = 0.2;
const TOLERANCE: f64 = 1e-9;

#[test]
fn test_run_produces_every_trace_file() {
    let dir = tempfile::tempdir().unwrap();
    let scenario = Scenario::bulk_senders("bbr", "fifo");

    run_scenario(&scenario, 2.0, dir.path(), 42).unwrap();

    for file in [
        "throughput.dat",
        "queueSize.dat",
        "cwnd-1.dat",
        "cwnd-2.dat",
        "config.dat",
    ] {
        assert!(dir.path().join(file).is_file(), "missing {file}");
    }

    let config = fs::read_to_string(dir.path().join("config.dat")).unwrap();
    assert!(config.contains("transport bbr\n"));
    assert!(config.contains("queueDisc fifo\n"));
}

#[test]
fn test_throughput_trace_starts_after_the_warmup_sample() {
    let dir = tempfile::tempdir().unwrap();
    let scenario = Scenario::bulk_senders("bbr", "fifo");

    run_scenario(&scenario, 2.0, dir.path(), 42).unwrap();
    let lines = parse_throughput(dir.path());
    assert!(!lines.is_empty());

    // samples fire at 1us, 0.2s+1us, 0.4s+1us, ... and flows establish at
    // 0.1s: the 1us sample finds no flows, the next one only seeds the
    // previous snapshot, so the first emitted line is the third firing
    let first = &lines[0];
    assert!(
        (first.time - (2.0 * PERIOD + 1e-6)).abs() < TOLERANCE,
        "first line at {}",
        first.time
    );

    for pair in lines.windows(2) {
        let spacing = pair[1].time - pair[0].time;
        assert!(
            (spacing - PERIOD).abs() < TOLERANCE,
            "samples {} and {} are {} apart",
            pair[0].time,
            pair[1].time,
            spacing
        );
    }
}

#[test]
fn test_aggregate_rate_is_the_sum_of_flow_rates() {
    let dir = tempfile::tempdir().unwrap();
    let scenario = Scenario::bulk_senders("bbr", "fifo");

    run_scenario(&scenario, 3.0, dir.path(), 42).unwrap();

    for line in parse_throughput(dir.path()) {
        assert_eq!(line.per_flow.len(), 2);
        assert!(line.per_flow.iter().all(|rate| *rate >= 0.0));
        let sum: f64 = line.per_flow.iter().sum();
        // columns are rounded to six decimals independently
        assert!(
            (line.aggregate - sum).abs() <= 1e-5,
            "aggregate {} vs sum {} at t={}",
            line.aggregate,
            sum,
            line.time
        );
    }
}

#[test]
fn test_queue_trace_sits_on_the_sampling_grid() {
    let dir = tempfile::tempdir().unwrap();
    let scenario = Scenario::bulk_senders("bbr", "fifo");

    run_scenario(&scenario, 2.0, dir.path(), 42).unwrap();
    let samples = parse_pairs(dir.path(), "queueSize.dat");

    // queue sampling starts at virtual zero and runs to the 3s horizon
    assert_eq!(samples.len(), 16);
    for (index, (time, depth)) in samples.iter().enumerate() {
        assert!(
            (time - index as f64 * PERIOD).abs() < TOLERANCE,
            "sample {index} at {time}"
        );
        assert!(*depth >= 0.0);
        assert_eq!(depth.fract(), 0.0, "occupancy must be integral");
    }

    // the scripted fifo standing queue is in place from 1.0s on
    assert_eq!(samples[0].1, 0.0);
    assert_eq!(samples[10].1, 60.0);
}

#[test]
fn test_window_traces_are_ordered_and_normalized() {
    let dir = tempfile::tempdir().unwrap();
    let scenario = Scenario::bulk_senders("bbr", "fifo");

    run_scenario(&scenario, 15.0, dir.path(), 42).unwrap();

    for flow in ["1", "2"] {
        let samples = parse_pairs(dir.path(), &format!("cwnd-{flow}.dat"));
        assert!(!samples.is_empty());

        for pair in samples.windows(2) {
            assert!(pair[0].0 <= pair[1].0, "timestamps went backwards");
        }

        // script: 10 segments at 0.101s, 64 at 1s, probe drop to 4 at 10s
        let values: Vec<f64> = samples.iter().map(|(_, value)| *value).collect();
        assert_eq!(values[0], 10.0);
        assert_eq!(values[1], 64.0);
        assert!(values.contains(&4.0), "probe drop missing: {values:?}");
    }
}

#[test]
fn test_same_seed_reproduces_identical_traces() {
    let scenario = Scenario::bulk_senders("bbr", "fifo");

    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    run_scenario(&scenario, 2.0, dir_a.path(), 7).unwrap();
    run_scenario(&scenario, 2.0, dir_b.path(), 7).unwrap();

    for file in ["throughput.dat", "queueSize.dat", "cwnd-1.dat"] {
        let a = fs::read_to_string(dir_a.path().join(file)).unwrap();
        let b = fs::read_to_string(dir_b.path().join(file)).unwrap();
        assert_eq!(a, b, "{file} differs between identical runs");
    }
}

#[test]
fn test_rerunning_into_the_same_directory_keeps_unrelated_files() {
    let dir = tempfile::tempdir().unwrap();
    let unrelated = dir.path().join("analysis.txt");
    fs::write(&unrelated, "previous notes").unwrap();

    let scenario = Scenario::bulk_senders("bbr", "fifo");
    run_scenario(&scenario, 1.0, dir.path(), 42).unwrap();
    run_scenario(&scenario, 1.0, dir.path(), 42).unwrap();

    assert_eq!(fs::read_to_string(&unrelated).unwrap(), "previous notes");
}
