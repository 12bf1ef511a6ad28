//! Error taxonomy for the probe subsystem.
//!
//! Two tiers: [`ProbeError`] is fatal and halts the event driver, because it
//! signals either a broken engine contract or lost trace output.
//! [`ProviderError`] is transient and absorbed inside the sampler that saw it.

use crate::flow::FlowId;

/// Fatal probe failures.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    /// A cumulative counter moved backwards, which the engine contract forbids.
    #[error("flow {flow} counter regressed: {previous} -> {current}")]
    CounterRegression {
        /// Flow whose counter regressed.
        flow: FlowId,
        /// Counter value from the previous sample.
        previous: u64,
        /// Counter value from the current sample.
        current: u64,
    },

    /// The set of tracked flows changed size after the first sample.
    #[error("tracked flow set changed mid-run: expected {expected} flows, got {actual}")]
    FlowSetChanged {
        /// Flow count pinned by the first sample.
        expected: usize,
        /// Flow count seen now.
        actual: usize,
    },

    /// A previously tracked flow disappeared from the statistics.
    #[error("flow {flow} vanished from the tracked set")]
    FlowVanished {
        /// Flow that is no longer reported.
        flow: FlowId,
    },

    /// A trace sink was used after the writer was closed.
    #[error("trace sink used after close")]
    TraceClosed,

    /// No window trace sink was opened for this flow.
    #[error("no window trace sink for flow {flow}")]
    MissingWindowSink {
        /// Flow without a sink.
        flow: FlowId,
    },

    /// Trace file could not be created or written.
    #[error("trace I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Transient provider conditions.
///
/// A sampler that hits one of these skips the interval's output and keeps
/// its schedule; it never propagates past the sampler.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The engine has no data for this probe yet.
    #[error("provider has no data yet")]
    Unavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_flow() {
        let err = ProbeError::CounterRegression {
            flow: FlowId::new(1),
            previous: 2000,
            current: 1500,
        };
        assert_eq!(err.to_string(), "flow 1 counter regressed: 2000 -> 1500");

        let err = ProbeError::FlowSetChanged {
            expected: 2,
            actual: 3,
        };
        assert!(err.to_string().contains("expected 2 flows, got 3"));
    }
}
