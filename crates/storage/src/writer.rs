//! Background Sink Writer
//!
//! Runs a [`FrameSink`] on a blocking worker fed by a bounded queue.
//! Submitting a frame never waits: when the queue is full the frame is
//! refused and counted. Write failures are counted and logged, never
//! retried.

use crate::{FrameSink, SinkError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use telemetry_protocol::Frame;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Writer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkWriterConfig {
    /// Frames that may wait for the worker before submissions are refused
    pub queue_depth: usize,
}

impl Default for SinkWriterConfig {
    fn default() -> Self {
        Self { queue_depth: 1024 }
    }
}

/// Live sink counters, shared between the writer and its observers
#[derive(Debug, Default)]
pub struct SinkStats {
    written: AtomicU64,
    failed: AtomicU64,
    flush_failures: AtomicU64,
    dropped: AtomicU64,
    consecutive_failures: AtomicU64,
    last_error: Mutex<Option<String>>,
}

impl SinkStats {
    /// Frames written successfully
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Frame writes that returned an error
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Flushes that returned an error
    pub fn flush_failures(&self) -> u64 {
        self.flush_failures.load(Ordering::Relaxed)
    }

    /// Frames refused because the queue was full or the worker had stopped
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Frames lost (failed or dropped) since the last successful write
    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Most recent failure message
    pub fn last_error(&self) -> Option<String> {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Plain copy of the counters
    pub fn report(&self) -> SinkReport {
        SinkReport {
            written: self.written(),
            failed: self.failed(),
            flush_failures: self.flush_failures(),
            dropped: self.dropped(),
            last_error: self.last_error(),
        }
    }

    fn record_success(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
    }

    fn record_failure(&self, err: &SinkError) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        self.set_last_error(err);
    }

    // Not a lost frame, so the consecutive count is left alone
    fn record_flush_failure(&self, err: &SinkError) {
        self.flush_failures.fetch_add(1, Ordering::Relaxed);
        self.set_last_error(err);
    }

    fn set_last_error(&self, err: &SinkError) {
        *self.last_error.lock().unwrap_or_else(PoisonError::into_inner) = Some(err.to_string());
    }

    fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
    }
}

/// Final sink counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SinkReport {
    pub written: u64,
    pub failed: u64,
    pub flush_failures: u64,
    pub dropped: u64,
    pub last_error: Option<String>,
}

/// Non-blocking front end to a [`FrameSink`]
pub struct SinkWriter {
    tx: mpsc::Sender<Arc<Frame>>,
    stats: Arc<SinkStats>,
    worker: JoinHandle<()>,
    description: String,
}

impl SinkWriter {
    /// Start the worker. Must be called from within a tokio runtime.
    pub fn spawn(sink: Box<dyn FrameSink>, config: SinkWriterConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_depth.max(1));
        let stats = Arc::new(SinkStats::default());
        let description = sink.describe();
        info!(
            "Starting sink writer for {} (queue depth {})",
            description, config.queue_depth
        );

        let worker = {
            let stats = stats.clone();
            tokio::task::spawn_blocking(move || run_worker(sink, rx, stats))
        };

        Self {
            tx,
            stats,
            worker,
            description,
        }
    }

    /// Queue a frame for writing without waiting
    pub fn submit(&self, frame: Arc<Frame>) -> Result<(), SinkError> {
        match self.tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.stats.record_dropped();
                Err(SinkError::Unavailable("write queue full".into()))
            }
            Err(TrySendError::Closed(_)) => {
                self.stats.record_dropped();
                Err(SinkError::Unavailable("writer stopped".into()))
            }
        }
    }

    /// Shared counters
    pub fn stats(&self) -> Arc<SinkStats> {
        self.stats.clone()
    }

    /// Destination description
    pub fn describe(&self) -> &str {
        &self.description
    }

    /// Stop accepting frames, write what is queued, flush and close
    pub async fn close(self) -> SinkReport {
        let Self {
            tx,
            stats,
            worker,
            description,
        } = self;
        drop(tx);

        if let Err(e) = worker.await {
            error!("Sink worker for {} terminated abnormally: {}", description, e);
        }
        stats.report()
    }
}

fn run_worker(
    mut sink: Box<dyn FrameSink>,
    mut rx: mpsc::Receiver<Arc<Frame>>,
    stats: Arc<SinkStats>,
) {
    while let Some(frame) = rx.blocking_recv() {
        write_one(sink.as_mut(), &frame, &stats);
        while let Ok(frame) = rx.try_recv() {
            write_one(sink.as_mut(), &frame, &stats);
        }

        // Queue drained; push buffered rows out
        if let Err(e) = sink.flush() {
            warn!("Flush to {} failed: {}", sink.describe(), e);
            stats.record_flush_failure(&e);
        }
    }

    if let Err(e) = sink.flush() {
        warn!("Final flush to {} failed: {}", sink.describe(), e);
        stats.record_flush_failure(&e);
    }
    info!(
        "Sink writer for {} stopped: {} written, {} failed, {} dropped",
        sink.describe(),
        stats.written(),
        stats.failed(),
        stats.dropped()
    );
}

fn write_one(sink: &mut dyn FrameSink, frame: &Frame, stats: &SinkStats) {
    match sink.write(frame) {
        Ok(()) => stats.record_success(),
        Err(e) => {
            // Log the first failure of a run loudly, the rest quietly
            if stats.consecutive_failures() == 0 {
                warn!("Write to {} failed: {}", sink.describe(), e);
            } else {
                debug!("Write to {} failed: {}", sink.describe(), e);
            }
            stats.record_failure(&e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemorySink;
    use chrono::Utc;
    use telemetry_protocol::{Channel, CHANNEL_COUNT};

    fn frame(log_index: i64) -> Arc<Frame> {
        let mut values = [0i64; CHANNEL_COUNT];
        values[Channel::LogIndex.index()] = log_index;
        Arc::new(Frame::new(values, Utc::now()))
    }

    #[tokio::test]
    async fn test_frames_written_in_order() {
        let handle = MemorySink::new(100);
        let writer = SinkWriter::spawn(Box::new(handle.clone()), SinkWriterConfig::default());

        for i in 0..20 {
            writer.submit(frame(i)).unwrap();
        }
        let report = writer.close().await;

        assert_eq!(report.written, 20);
        assert_eq!(report.failed, 0);
        let indices: Vec<i64> = handle.frames().iter().map(|f| f.log_index()).collect();
        assert_eq!(indices, (0..20).collect::<Vec<_>>());
        assert!(handle.flushes() >= 1);
    }

    #[tokio::test]
    async fn test_failures_are_counted_not_fatal() {
        let handle = MemorySink::new(100);
        handle.set_available(false);
        let writer = SinkWriter::spawn(Box::new(handle.clone()), SinkWriterConfig::default());

        for i in 0..5 {
            assert!(writer.submit(frame(i)).is_ok());
        }
        let report = writer.close().await;

        assert_eq!(report.written, 0);
        assert_eq!(report.failed, 5);
        // At least the final flush fails too, counted apart from frames
        assert!(report.flush_failures >= 1);
        assert!(report.last_error.unwrap().contains("unavailable"));
        assert!(handle.is_empty());
    }

    #[tokio::test]
    async fn test_recovers_after_failure() {
        let handle = MemorySink::new(100);
        handle.set_available(false);
        let writer = SinkWriter::spawn(Box::new(handle.clone()), SinkWriterConfig::default());
        let stats = writer.stats();

        writer.submit(frame(1)).unwrap();
        while stats.failed() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(stats.consecutive_failures() >= 1);

        handle.set_available(true);
        writer.submit(frame(2)).unwrap();
        while stats.written() == 0 {
            tokio::task::yield_now().await;
        }
        assert_eq!(stats.consecutive_failures(), 0);

        writer.close().await;
        assert_eq!(handle.frames()[0].log_index(), 2);
    }

    #[tokio::test]
    async fn test_flush_failures_do_not_count_as_lost_frames() {
        let handle = MemorySink::new(100);
        handle.set_available(false);
        let writer = SinkWriter::spawn(Box::new(handle.clone()), SinkWriterConfig::default());
        let stats = writer.stats();

        for i in 0..3 {
            writer.submit(frame(i)).unwrap();
            // Let each frame be written and flushed on its own
            while stats.failed() <= i as u64 || stats.flush_failures() <= i as u64 {
                tokio::task::yield_now().await;
            }
        }
        assert_eq!(stats.failed(), 3);
        assert_eq!(stats.consecutive_failures(), 3);

        let report = writer.close().await;
        assert_eq!(report.failed, 3);
        assert!(report.flush_failures >= 4);
        assert_eq!(stats.consecutive_failures(), 3);
    }

    struct StallingSink {
        release: std::sync::mpsc::Receiver<()>,
    }

    impl FrameSink for StallingSink {
        fn write(&mut self, _frame: &Frame) -> Result<(), SinkError> {
            self.release.recv().ok();
            Ok(())
        }

        fn describe(&self) -> String {
            "stalling".to_string()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_full_queue_refuses_without_blocking() {
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let writer = SinkWriter::spawn(
            Box::new(StallingSink { release: release_rx }),
            SinkWriterConfig { queue_depth: 2 },
        );

        // One frame may be held by the stalled worker, two more fill the queue
        let mut refused = 0;
        for i in 0..10 {
            if writer.submit(frame(i)).is_err() {
                refused += 1;
            }
        }
        assert!(refused >= 7);
        assert_eq!(writer.stats().dropped(), refused);

        drop(release_tx);
        let report = writer.close().await;
        assert_eq!(report.written + report.dropped, 10);
    }
}
