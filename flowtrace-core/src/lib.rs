//! Flowtrace Core - Measurement probes for discrete-event network experiments.
//!
//! The simulated network itself lives behind three narrow provider
//! interfaces; this crate turns what they expose into ordered trace files.
//! It owns the hard parts of instrumentation:
//!
//! - periodic samplers that re-arm themselves against a shared virtual clock
//!   without drifting or double-emitting,
//! - interval-delta conversion of monotone cumulative counters into rates,
//! - a reactive tracer for asynchronous window-change notifications,
//! - a single-writer trace store that keeps every output file well-formed
//!   even when the run is aborted.

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]

pub mod config;
pub mod error;
pub mod flow;
pub mod providers;
pub mod sampler;
pub mod scheduler;
pub mod time;
pub mod trace;

// Re-export main types for convenient access
pub use config::ProbeConfig;
pub use error::{ProbeError, ProviderError};
pub use flow::{FlowId, FlowSnapshot};
pub use providers::{FlowStatsProvider, QueueLengthProvider, WindowCallback, WindowChangeSource};
pub use sampler::{OccupancySampler, RateSampler, WindowTracer};
pub use scheduler::{Callback, EventScheduler, arm_periodic};
pub use time::SimTime;
pub use trace::TraceWriter;
