//! History Ring Buffer Implementation

use crate::snapshot::Snapshot;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use telemetry_protocol::Frame;
use tracing::debug;

/// Default history depth (2000 frames = ~100 s at 20 Hz)
pub const DEFAULT_CAPACITY: usize = 2000;

struct Ring {
    frames: VecDeque<Arc<Frame>>,
    /// Frames ever recorded, including evicted ones
    total_recorded: u64,
}

/// Fixed-capacity FIFO history of frames.
///
/// The lock is held only to insert one frame or to copy the frame
/// pointers out for a snapshot, never across I/O.
pub struct HistoryStore {
    ring: Mutex<Ring>,
    capacity: usize,
}

impl HistoryStore {
    /// Create a store holding at most `capacity` frames
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "History capacity must be > 0");
        debug!("Creating history store with capacity {}", capacity);
        Self {
            ring: Mutex::new(Ring {
                frames: VecDeque::with_capacity(capacity),
                total_recorded: 0,
            }),
            capacity,
        }
    }

    /// Create a store with the default depth (2000 frames)
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Append a frame, evicting the oldest one when full
    pub fn record(&self, frame: impl Into<Arc<Frame>>) {
        let frame = frame.into();
        let mut ring = self.lock();
        if ring.frames.len() == self.capacity {
            ring.frames.pop_front();
        }
        ring.frames.push_back(frame);
        ring.total_recorded += 1;
    }

    /// Point-in-time copy of the history, oldest to newest
    pub fn snapshot(&self) -> Snapshot {
        let ring = self.lock();
        Snapshot::new(ring.frames.iter().cloned().collect(), ring.total_recorded)
    }

    /// Most recently recorded frame
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.lock().frames.back().cloned()
    }

    /// Number of frames currently held
    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of frames held
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames ever recorded, including evicted ones
    pub fn total_recorded(&self) -> u64 {
        self.lock().total_recorded
    }

    // A panic while holding the lock cannot leave the ring half-updated,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Ring> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::thread;
    use telemetry_protocol::{Channel, CHANNEL_COUNT};

    fn frame(log_index: i64) -> Frame {
        let mut values = [0i64; CHANNEL_COUNT];
        values[Channel::LogIndex.index()] = log_index;
        values[Channel::EngineRpm.index()] = log_index * 10;
        Frame::new(values, Utc::now())
    }

    #[test]
    fn test_record_and_snapshot() {
        let store = HistoryStore::new(10);
        for i in 0..5 {
            store.record(frame(i));
        }

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 5);
        let indices: Vec<i64> = snapshot.iter().map(|f| f.log_index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(store.latest().unwrap().log_index(), 4);
    }

    #[test]
    fn test_evicts_oldest_when_full() {
        let store = HistoryStore::new(5);
        for i in 0..12 {
            store.record(frame(i));
        }

        assert_eq!(store.len(), 5);
        assert_eq!(store.total_recorded(), 12);
        let indices: Vec<i64> = store.snapshot().iter().map(|f| f.log_index()).collect();
        assert_eq!(indices, vec![7, 8, 9, 10, 11]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let store = HistoryStore::new(3);
        store.record(frame(1));
        let before = store.snapshot();
        store.record(frame(2));
        store.record(frame(3));
        store.record(frame(4));

        assert_eq!(before.len(), 1);
        assert_eq!(before.latest().unwrap().log_index(), 1);
        assert_eq!(store.snapshot().first().unwrap().log_index(), 2);
    }

    #[test]
    #[should_panic]
    fn test_zero_capacity_rejected() {
        HistoryStore::new(0);
    }

    #[test]
    fn test_concurrent_snapshots_are_monotonic() {
        const FRAMES: i64 = 20_000;
        let store = Arc::new(HistoryStore::new(64));

        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..FRAMES {
                    store.record(frame(i));
                }
            })
        };

        let mut last_newest = -1;
        let mut last_total = 0;
        loop {
            let snapshot = store.snapshot();
            let indices: Vec<i64> = snapshot.iter().map(|f| f.log_index()).collect();

            assert!(indices.len() <= 64);
            // Contiguous: nothing earlier missing while something later is visible
            for pair in indices.windows(2) {
                assert_eq!(pair[1], pair[0] + 1);
            }
            if let Some(&newest) = indices.last() {
                assert!(newest >= last_newest);
                assert_eq!(newest + 1, snapshot.total_recorded() as i64);
                last_newest = newest;
            }
            assert!(snapshot.total_recorded() >= last_total);
            last_total = snapshot.total_recorded();

            if last_newest == FRAMES - 1 {
                break;
            }
        }

        writer.join().unwrap();
        assert_eq!(store.total_recorded(), FRAMES as u64);
    }
}
