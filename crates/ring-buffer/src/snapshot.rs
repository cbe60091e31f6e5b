//! Immutable History Snapshots

use std::sync::Arc;
use telemetry_protocol::{Channel, Frame};

/// Point-in-time view of the history, oldest frame first.
///
/// Frames are shared with the store, not copied; the snapshot itself
/// never changes after it is taken.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    frames: Vec<Arc<Frame>>,
    total_recorded: u64,
}

impl Snapshot {
    pub(crate) fn new(frames: Vec<Arc<Frame>>, total_recorded: u64) -> Self {
        Self {
            frames,
            total_recorded,
        }
    }

    /// Frames oldest to newest
    pub fn frames(&self) -> &[Arc<Frame>] {
        &self.frames
    }

    /// Iterate frames oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &Frame> + '_ {
        self.frames.iter().map(|f| f.as_ref())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Oldest frame in the window
    pub fn first(&self) -> Option<&Frame> {
        self.frames.first().map(|f| f.as_ref())
    }

    /// Newest frame in the window
    pub fn latest(&self) -> Option<&Frame> {
        self.frames.last().map(|f| f.as_ref())
    }

    /// Frames recorded by the store up to the moment of the snapshot
    pub fn total_recorded(&self) -> u64 {
        self.total_recorded
    }

    /// Values of one channel across the window, oldest first
    pub fn channel(&self, channel: Channel) -> Vec<i64> {
        self.iter().map(|f| f.get(channel)).collect()
    }

    /// Minimum and maximum of one channel across the window
    pub fn range(&self, channel: Channel) -> Option<(i64, i64)> {
        self.iter().map(|f| f.get(channel)).fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::HistoryStore;
    use chrono::Utc;
    use proptest::prelude::*;
    use telemetry_protocol::{Channel, Frame, CHANNEL_COUNT};

    fn frame(log_index: i64, rpm: i64) -> Frame {
        let mut values = [0i64; CHANNEL_COUNT];
        values[Channel::LogIndex.index()] = log_index;
        values[Channel::EngineRpm.index()] = rpm;
        Frame::new(values, Utc::now())
    }

    #[test]
    fn test_channel_series() {
        let store = HistoryStore::new(8);
        for (i, rpm) in [800, 1200, 950].into_iter().enumerate() {
            store.record(frame(i as i64, rpm));
        }

        let snapshot = store.snapshot();
        assert_eq!(snapshot.channel(Channel::EngineRpm), vec![800, 1200, 950]);
        assert_eq!(snapshot.range(Channel::EngineRpm), Some((800, 1200)));
        assert_eq!(snapshot.first().unwrap().log_index(), 0);
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = HistoryStore::new(4).snapshot();
        assert!(snapshot.is_empty());
        assert!(snapshot.latest().is_none());
        assert_eq!(snapshot.range(Channel::Gear), None);
    }

    proptest! {
        #[test]
        fn snapshot_holds_most_recent_capacity_frames(capacity in 1usize..64, extra in 1usize..200) {
            let store = HistoryStore::new(capacity);
            let total = capacity + extra;
            for i in 0..total {
                store.record(frame(i as i64, 0));
            }

            let snapshot = store.snapshot();
            let indices = snapshot.channel(Channel::LogIndex);
            let expected: Vec<i64> = ((total - capacity) as i64..total as i64).collect();
            prop_assert_eq!(indices, expected);
            prop_assert_eq!(snapshot.total_recorded(), total as u64);
        }
    }
}
