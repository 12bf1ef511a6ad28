//! Flow identity and counter snapshots.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::time::SimTime;

/// Identifier of one logical traffic stream.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct FlowId(pub u32);

impl FlowId {
    /// Creates a flow identifier.
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying identifier as u32.
    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cumulative transmitted-byte counters for every tracked flow at one instant.
///
/// Stored in a `BTreeMap` so per-flow columns appear in the same order on
/// every trace line. Counters are monotone: for the same flow, a later
/// snapshot never holds a smaller value unless the engine broke its contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowSnapshot {
    /// When the counters were read.
    pub taken_at: SimTime,
    /// Cumulative transmitted bytes per flow.
    pub tx_bytes: BTreeMap<FlowId, u64>,
}

impl FlowSnapshot {
    /// Snapshot of `tx_bytes` taken at `taken_at`.
    pub fn new(taken_at: SimTime, tx_bytes: BTreeMap<FlowId, u64>) -> Self {
        Self { taken_at, tx_bytes }
    }

    /// Number of flows in the snapshot.
    pub fn flow_count(&self) -> usize {
        self.tx_bytes.len()
    }
}
