//! Storage Layer
//!
//! Durable, append-only logging of decoded frames. Sinks implement
//! [`FrameSink`]; the [`SinkWriter`] runs a sink on a blocking worker
//! behind a bounded queue so slow storage never stalls ingestion.

mod csv;
mod memory;
mod writer;

pub use csv::{session_log_path, CsvSink};
pub use memory::MemorySink;
pub use writer::{SinkReport, SinkStats, SinkWriter, SinkWriterConfig};

use telemetry_protocol::Frame;
use thiserror::Error;

/// Sink errors
#[derive(Debug, Clone, Error)]
pub enum SinkError {
    /// Destination cannot accept writes right now
    #[error("Sink unavailable: {0}")]
    Unavailable(String),
    /// Write or flush failed
    #[error("Sink I/O failure: {0}")]
    IoFailure(String),
}

impl From<std::io::Error> for SinkError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                SinkError::Unavailable(err.to_string())
            }
            _ => SinkError::IoFailure(err.to_string()),
        }
    }
}

/// Append-only destination for decoded frames.
///
/// `write` may block on I/O; callers on the ingestion path go through
/// [`SinkWriter`] instead of calling it directly.
pub trait FrameSink: Send {
    /// Append one frame
    fn write(&mut self, frame: &Frame) -> Result<(), SinkError>;

    /// Push buffered rows to the destination
    fn flush(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Human-readable destination, for logs
    fn describe(&self) -> String;
}
