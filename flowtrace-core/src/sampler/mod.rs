//! Measurement probes.
//!
//! Two periodic samplers re-arm themselves through the scheduler; the window
//! tracer is reactive and fires only when the engine reports a change. Each
//! probe owns its own state and writes through the shared [`TraceWriter`],
//! so any one of them can be tested in isolation.
//!
//! [`TraceWriter`]: crate::trace::TraceWriter

mod occupancy;
mod rate;
mod window;

pub use occupancy::OccupancySampler;
pub use rate::RateSampler;
pub use window::WindowTracer;
