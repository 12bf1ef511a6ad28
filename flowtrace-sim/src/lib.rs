//! Flowtrace Simulation - deterministic event driving for probe experiments.
//!
//! Supplies everything the probes treat as "the engine": a virtual clock, an
//! event driver executing callbacks in strict time order, and scripted
//! providers standing in for a real network simulation. Runs are fully
//! deterministic: the same scenario and seed reproduce the same trace files
//! byte for byte.

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]

mod clock;
mod driver;
mod providers;
mod scenario;

// Re-export core types for public API
pub use clock::{DeterministicRng, SimClock};
pub use driver::{EventDriver, RunReport, SimulationError};
pub use providers::{SimFlowStats, SimQueue, SimWindow};
pub use scenario::{
    DepthChange, QueueScript, RateStep, Scenario, ScenarioHandles, TRAFFIC_TICK, TrafficProfile,
    WindowChange, WindowScript, install,
};
