//! Telemetry Ingestion
//!
//! Runs the producer path: bytes from the serial link (or frames from the
//! synthetic source) are decoded and each frame is handed to the history
//! store and the durable sink. The render path only ever reads snapshots
//! of the history store, so it is decoupled from this loop entirely.

mod dispatch;
mod session;

pub use dispatch::{Dispatcher, IngestStats};
pub use session::{Session, SessionConfig, SessionReport, StopReason};
