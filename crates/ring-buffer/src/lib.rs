//! Frame History Ring Buffer
//!
//! Keeps the most recent frames for the live view. The producer records
//! frames while the render path takes immutable snapshots concurrently.

mod buffer;
mod snapshot;

pub use buffer::{HistoryStore, DEFAULT_CAPACITY};
pub use snapshot::Snapshot;
