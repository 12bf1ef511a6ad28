//! Scripted engine state backing the core probe interfaces.
//!
//! The driver is single-threaded and cooperative, so shared state is plain
//! `Rc<RefCell<..>>`; handles are cheap clones over the same cell.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use flowtrace_core::{
    FlowId, FlowStatsProvider, ProbeError, ProviderError, QueueLengthProvider, SimTime,
    WindowCallback, WindowChangeSource,
};

#[derive(Debug, Default)]
struct FlowCounters {
    expected: usize,
    started: BTreeMap<FlowId, u64>,
}

/// Cumulative transmit counters for the scripted flows.
///
/// Reports [`ProviderError::Unavailable`] until every expected flow has
/// started, mirroring an engine whose flow records only appear once traffic
/// is established. The visible set is therefore stable from the first
/// successful poll onward.
#[derive(Clone, Debug, Default)]
pub struct SimFlowStats {
    inner: Rc<RefCell<FlowCounters>>,
}

impl SimFlowStats {
    /// Provider that stays unavailable until `expected` flows have started.
    pub fn with_expected(expected: usize) -> Self {
        Self {
            inner: Rc::new(RefCell::new(FlowCounters {
                expected,
                started: BTreeMap::new(),
            })),
        }
    }

    /// Makes `flow` visible with a zeroed counter.
    pub fn start_flow(&self, flow: FlowId) {
        self.inner.borrow_mut().started.entry(flow).or_insert(0);
    }

    /// Accrues transmitted bytes onto `flow`'s cumulative counter. Flows
    /// that have not started yet accumulate nothing.
    pub fn add_bytes(&self, flow: FlowId, bytes: u64) {
        if let Some(counter) = self.inner.borrow_mut().started.get_mut(&flow) {
            *counter += bytes;
        }
    }

    /// Current counter for `flow`, if started.
    pub fn tx_bytes(&self, flow: FlowId) -> Option<u64> {
        self.inner.borrow().started.get(&flow).copied()
    }
}

impl FlowStatsProvider for SimFlowStats {
    fn flow_stats(&self) -> Result<BTreeMap<FlowId, u64>, ProviderError> {
        let inner = self.inner.borrow();
        if inner.started.len() < inner.expected {
            return Err(ProviderError::Unavailable);
        }
        Ok(inner.started.clone())
    }
}

/// Instantaneous depth of the scripted bottleneck queue.
#[derive(Clone, Debug, Default)]
pub struct SimQueue {
    depth: Rc<Cell<u64>>,
}

impl SimQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the instantaneous depth.
    pub fn set_depth(&self, depth: u64) {
        self.depth.set(depth);
    }

    /// Current depth.
    pub fn depth(&self) -> u64 {
        self.depth.get()
    }
}

impl QueueLengthProvider for SimQueue {
    fn queue_length(&self) -> Result<u64, ProviderError> {
        Ok(self.depth.get())
    }
}

struct WindowState {
    value: u32,
    callback: Option<WindowCallback>,
}

/// Scripted congestion windows with change notification.
///
/// [`SimWindow::set_window`] updates the stored value and synchronously
/// invokes the registered callback, so several changes at one virtual
/// instant are delivered in exactly the order they were applied.
#[derive(Clone, Default)]
pub struct SimWindow {
    flows: Rc<RefCell<BTreeMap<FlowId, WindowState>>>,
}

impl SimWindow {
    /// Creates a source with no windows set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the window of `flow` to `value` bytes at time `now`, firing the
    /// registered callback with the old and new value.
    ///
    /// # Errors
    /// Whatever the registered callback returns; callback failures are
    /// fatal to the run.
    pub fn set_window(&self, now: SimTime, flow: FlowId, value: u32) -> Result<(), ProbeError> {
        let mut flows = self.flows.borrow_mut();
        let state = flows.entry(flow).or_insert(WindowState {
            value: 0,
            callback: None,
        });
        let old = state.value;
        state.value = value;
        if let Some(callback) = state.callback.as_mut() {
            callback(now, old, value)?;
        }
        Ok(())
    }

    /// Current window of `flow` in bytes, zero if never set.
    pub fn window(&self, flow: FlowId) -> u32 {
        self.flows
            .borrow()
            .get(&flow)
            .map(|state| state.value)
            .unwrap_or(0)
    }
}

impl WindowChangeSource for SimWindow {
    fn on_window_change(&self, flow: FlowId, callback: WindowCallback) {
        let mut flows = self.flows.borrow_mut();
        let state = flows.entry(flow).or_insert(WindowState {
            value: 0,
            callback: None,
        });
        state.callback = Some(callback);
    }
}
