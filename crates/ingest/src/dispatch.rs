//! Frame Distribution

use metrics::counter;
use ring_buffer::HistoryStore;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use storage::{SinkReport, SinkStats, SinkWriter};
use telemetry_protocol::Frame;
use tracing::debug;

/// Producer-side counters
#[derive(Debug, Default)]
pub struct IngestStats {
    dispatched: AtomicU64,
    decode_errors: AtomicU64,
    sink_refusals: AtomicU64,
}

impl IngestStats {
    /// Frames handed to the consumers
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }

    /// Candidates rejected by the decoder
    pub fn decode_errors(&self) -> u64 {
        self.decode_errors.load(Ordering::Relaxed)
    }

    /// Frames the sink writer refused at submission
    pub fn sink_refusals(&self) -> u64 {
        self.sink_refusals.load(Ordering::Relaxed)
    }

    pub(crate) fn record_decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }
}

/// Hands every frame to the history store and the durable sink.
///
/// The history store is always updated first and a sink failure is only
/// counted, so the live view keeps moving when the log is unwritable.
pub struct Dispatcher {
    history: Arc<HistoryStore>,
    sink: Option<SinkWriter>,
    stats: Arc<IngestStats>,
}

impl Dispatcher {
    /// Create a dispatcher; `sink` is `None` when logging is disabled
    pub fn new(history: Arc<HistoryStore>, sink: Option<SinkWriter>) -> Self {
        Self {
            history,
            sink,
            stats: Arc::new(IngestStats::default()),
        }
    }

    /// Deliver one frame to both consumers
    pub fn dispatch(&self, frame: Frame) {
        let frame = Arc::new(frame);
        self.history.record(frame.clone());
        self.stats.dispatched.fetch_add(1, Ordering::Relaxed);
        counter!("telemetry_frames_total").increment(1);

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.submit(frame) {
                self.stats.sink_refusals.fetch_add(1, Ordering::Relaxed);
                counter!("telemetry_sink_failures_total").increment(1);
                debug!("Frame not logged: {}", e);
            }
        }
    }

    /// History store fed by this dispatcher
    pub fn history(&self) -> &Arc<HistoryStore> {
        &self.history
    }

    /// Sink counters, if a sink is attached
    pub fn sink_stats(&self) -> Option<Arc<SinkStats>> {
        self.sink.as_ref().map(|s| s.stats())
    }

    /// Producer-side counters
    pub fn stats(&self) -> Arc<IngestStats> {
        self.stats.clone()
    }

    /// Flush and close the sink
    pub async fn close(self) -> Option<SinkReport> {
        match self.sink {
            Some(sink) => Some(sink.close().await),
            None => None,
        }
    }
}
