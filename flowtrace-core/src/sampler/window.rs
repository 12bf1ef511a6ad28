//! Reactive congestion-window tracer.

use std::cell::RefCell;
use std::rc::Rc;

use crate::flow::FlowId;
use crate::providers::WindowChangeSource;
use crate::trace::TraceWriter;

/// Records every congestion-window change of one flow, normalized from raw
/// bytes to segment counts.
///
/// Purely reactive: registered once before traffic starts, then driven
/// entirely by the engine's change notifications. Multiple changes at the
/// same virtual instant are all recorded, in the order they fired. Tracing
/// several flows means one tracer per flow, each with its own trace sink,
/// sharing nothing but the writer.
pub struct WindowTracer {
    flow: FlowId,
    segment_size: u32,
    writer: Rc<RefCell<TraceWriter>>,
}

impl WindowTracer {
    /// Creates a tracer for `flow` normalizing by `segment_size` bytes.
    pub fn new(flow: FlowId, segment_size: u32, writer: Rc<RefCell<TraceWriter>>) -> Self {
        Self {
            flow,
            segment_size,
            writer,
        }
    }

    /// Registers the tracer against `source`, consuming it into the callback.
    pub fn attach<S: WindowChangeSource + ?Sized>(self, source: &S) {
        let WindowTracer {
            flow,
            segment_size,
            writer,
        } = self;
        source.on_window_change(
            flow,
            Box::new(move |now, _old, new| {
                let segments = f64::from(new) / f64::from(segment_size);
                writer.borrow_mut().record_window(flow, now, segments)
            }),
        );
    }
}
