//! In-Memory Sink

use crate::{FrameSink, SinkError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use telemetry_protocol::Frame;

struct MemoryLog {
    frames: VecDeque<Frame>,
    max_records: usize,
    available: bool,
    flushes: u64,
}

/// Sink keeping frames in memory with a retention limit.
///
/// Clones share the same log, so a test can keep one handle while the
/// writer owns another. Marking the sink unavailable makes every write
/// fail with [`SinkError::Unavailable`].
#[derive(Clone)]
pub struct MemorySink {
    log: Arc<Mutex<MemoryLog>>,
}

impl MemorySink {
    /// Create a sink retaining at most `max_records` frames
    pub fn new(max_records: usize) -> Self {
        Self {
            log: Arc::new(Mutex::new(MemoryLog {
                frames: VecDeque::with_capacity(max_records.min(10_000)),
                max_records,
                available: true,
                flushes: 0,
            })),
        }
    }

    /// Toggle whether writes succeed
    pub fn set_available(&self, available: bool) {
        self.lock().available = available;
    }

    /// Copy of the retained frames, oldest first
    pub fn frames(&self) -> Vec<Frame> {
        self.lock().frames.iter().cloned().collect()
    }

    /// Number of retained frames
    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of flushes requested
    pub fn flushes(&self) -> u64 {
        self.lock().flushes
    }

    fn lock(&self) -> MutexGuard<'_, MemoryLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(100_000)
    }
}

impl FrameSink for MemorySink {
    fn write(&mut self, frame: &Frame) -> Result<(), SinkError> {
        let mut log = self.lock();
        if !log.available {
            return Err(SinkError::Unavailable("memory sink marked unavailable".into()));
        }

        // Enforce retention
        while log.frames.len() >= log.max_records.max(1) {
            log.frames.pop_front();
        }
        log.frames.push_back(frame.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        let mut log = self.lock();
        if !log.available {
            return Err(SinkError::Unavailable("memory sink marked unavailable".into()));
        }
        log.flushes += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
