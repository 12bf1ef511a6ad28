//! Integration tests for flowtrace
//!
//! These tests run whole experiments end to end: scenario installed on the
//! event driver, probes armed, trace files written to disk and then parsed
//! back to check the recorded series.

#[path = "integration/support.rs"]
mod support;

#[path = "integration/bottleneck_run.rs"]
mod bottleneck_run;

#[path = "integration/scripted_scenarios.rs"]
mod scripted_scenarios;
