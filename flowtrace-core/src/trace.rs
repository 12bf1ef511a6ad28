//! Append-only trace sinks for probe output.
//!
//! One [`TraceWriter`] owns every output file of a run: the throughput trace,
//! the queue-occupancy trace, one congestion-window trace per traced flow,
//! and the one-shot configuration record. Nothing else holds the file
//! handles, so every write goes through here and lands as a complete line.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::ProbeError;
use crate::flow::FlowId;
use crate::time::SimTime;

/// Throughput trace file name.
pub const THROUGHPUT_FILE: &str = "throughput.dat";
/// Queue-occupancy trace file name.
pub const QUEUE_FILE: &str = "queueSize.dat";
/// Configuration record file name.
pub const CONFIG_FILE: &str = "config.dat";

/// Window trace file name for one flow.
pub fn window_file(flow: FlowId) -> String {
    format!("cwnd-{flow}.dat")
}

struct TraceSink {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl TraceSink {
    fn create(path: PathBuf) -> Result<Self, ProbeError> {
        let file = File::create(&path)?;
        debug!(path = %path.display(), "trace sink opened");
        Ok(Self {
            writer: BufWriter::new(file),
            path,
        })
    }

    /// Appends one complete, newline-terminated line.
    fn append(&mut self, line: &str) -> Result<(), ProbeError> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn finish(mut self) -> Result<(), ProbeError> {
        self.writer.flush()?;
        debug!(path = %self.path.display(), "trace sink closed");
        Ok(())
    }
}

/// Owns every trace sink of a run.
///
/// Sinks are opened before the first probe fires and stay open until
/// [`TraceWriter::finish`], which flushes and closes each exactly once.
/// Any write after that returns [`ProbeError::TraceClosed`] instead of
/// silently dropping samples. The buffered writers also flush on drop, so
/// an aborted run still leaves whole lines behind.
pub struct TraceWriter {
    throughput: Option<TraceSink>,
    queue: Option<TraceSink>,
    windows: BTreeMap<FlowId, TraceSink>,
    config: Option<TraceSink>,
}

impl TraceWriter {
    /// Opens all sinks under `dir`, creating the directory if needed.
    ///
    /// Creation is idempotent: re-running against an existing directory
    /// succeeds and leaves unrelated files in it untouched. One window sink
    /// is opened per entry in `window_flows`.
    ///
    /// # Errors
    /// Any failure to create the directory or a file is fatal; no sampling
    /// must begin with a missing sink.
    pub fn open(dir: &Path, window_flows: &[FlowId]) -> Result<Self, ProbeError> {
        fs::create_dir_all(dir)?;

        let throughput = TraceSink::create(dir.join(THROUGHPUT_FILE))?;
        let queue = TraceSink::create(dir.join(QUEUE_FILE))?;
        let config = TraceSink::create(dir.join(CONFIG_FILE))?;
        let mut windows = BTreeMap::new();
        for &flow in window_flows {
            windows.insert(flow, TraceSink::create(dir.join(window_file(flow)))?);
        }

        Ok(Self {
            throughput: Some(throughput),
            queue: Some(queue),
            windows,
            config: Some(config),
        })
    }

    /// Writes the one-shot `<key> <value>` configuration record and closes
    /// its sink.
    ///
    /// # Errors
    /// [`ProbeError::TraceClosed`] on a second call; otherwise I/O failures.
    pub fn record_config(&mut self, entries: &[(&str, String)]) -> Result<(), ProbeError> {
        let mut sink = self.config.take().ok_or(ProbeError::TraceClosed)?;
        for (key, value) in entries {
            sink.append(&format!("{key} {value}"))?;
        }
        sink.finish()
    }

    /// Appends one throughput sample: timestamp, aggregate rate, then one
    /// column per flow, all in Mbit/s.
    ///
    /// # Errors
    /// [`ProbeError::TraceClosed`] after [`TraceWriter::finish`]; otherwise
    /// I/O failures.
    pub fn record_throughput(
        &mut self,
        at: SimTime,
        aggregate: f64,
        per_flow: &[f64],
    ) -> Result<(), ProbeError> {
        let sink = self.throughput.as_mut().ok_or(ProbeError::TraceClosed)?;
        let mut line = format!("{at}s {aggregate:.6}Mbps");
        for rate in per_flow {
            line.push_str(&format!(" {rate:.6}Mbps"));
        }
        sink.append(&line)
    }

    /// Appends one queue-occupancy sample.
    ///
    /// # Errors
    /// [`ProbeError::TraceClosed`] after [`TraceWriter::finish`]; otherwise
    /// I/O failures.
    pub fn record_queue_depth(&mut self, at: SimTime, depth: u64) -> Result<(), ProbeError> {
        let sink = self.queue.as_mut().ok_or(ProbeError::TraceClosed)?;
        sink.append(&format!("{at} {depth}"))
    }

    /// Appends one window sample for `flow`, already normalized to segments.
    ///
    /// # Errors
    /// [`ProbeError::MissingWindowSink`] for a flow with no sink,
    /// [`ProbeError::TraceClosed`] after [`TraceWriter::finish`]; otherwise
    /// I/O failures.
    pub fn record_window(
        &mut self,
        flow: FlowId,
        at: SimTime,
        segments: f64,
    ) -> Result<(), ProbeError> {
        let sink = match self.windows.get_mut(&flow) {
            Some(sink) => sink,
            None if self.throughput.is_none() => return Err(ProbeError::TraceClosed),
            None => return Err(ProbeError::MissingWindowSink { flow }),
        };
        sink.append(&format!("{at} {segments:.6}"))
    }

    /// Flushes and closes every sink. Exactly once per run.
    ///
    /// # Errors
    /// [`ProbeError::TraceClosed`] on a second call, as for any record call
    /// after the first; otherwise flush failures.
    pub fn finish(&mut self) -> Result<(), ProbeError> {
        let throughput = self.throughput.take().ok_or(ProbeError::TraceClosed)?;
        throughput.finish()?;
        if let Some(queue) = self.queue.take() {
            queue.finish()?;
        }
        for (_, sink) in std::mem::take(&mut self.windows) {
            sink.finish()?;
        }
        // an unwritten config record is flushed empty rather than left missing
        if let Some(config) = self.config.take() {
            config.finish()?;
        }
        Ok(())
    }
}
