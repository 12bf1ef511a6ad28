//! Read-only interfaces onto the external simulation engine.
//!
//! The probes never look at simulated network state directly; everything
//! flows through these three traits so each probe can be unit tested against
//! a hand-rolled implementation.

use std::collections::BTreeMap;

use crate::error::{ProbeError, ProviderError};
use crate::flow::FlowId;
use crate::time::SimTime;

/// Callback invoked on every congestion-window change of a registered flow,
/// with the current virtual time and the old and new raw window in bytes.
///
/// Returning an error is fatal and stops the event driver.
pub type WindowCallback = Box<dyn FnMut(SimTime, u32, u32) -> Result<(), ProbeError>>;

/// Cumulative per-flow transmit counters.
pub trait FlowStatsProvider {
    /// Returns cumulative transmitted bytes for every established flow.
    ///
    /// Counters are monotonically non-decreasing per flow. Once any call has
    /// returned a non-empty map, the set of flows must not change for the
    /// rest of the run.
    ///
    /// # Errors
    /// `ProviderError::Unavailable` while the engine has no flow records yet.
    fn flow_stats(&self) -> Result<BTreeMap<FlowId, u64>, ProviderError>;
}

/// Instantaneous occupancy of the monitored queue.
pub trait QueueLengthProvider {
    /// Returns the current number of queued packets. Absolute, not cumulative.
    ///
    /// # Errors
    /// `ProviderError::Unavailable` while the queue is not installed yet.
    fn queue_length(&self) -> Result<u64, ProviderError>;
}

/// Asynchronous window-change notifications.
pub trait WindowChangeSource {
    /// Registers `callback` for window changes of `flow`.
    ///
    /// At most one registration per flow; a later registration replaces the
    /// earlier one. Changes arriving at the same virtual instant are
    /// delivered in the order they occurred.
    fn on_window_change(&self, flow: FlowId, callback: WindowCallback);
}
