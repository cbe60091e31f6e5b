//! Telemetry Error Types

use thiserror::Error;

/// Reasons a frame candidate was rejected by the decoder.
///
/// All of these are recovered inside the decoder: the candidate is
/// dropped, counted, and decoding continues with the next terminator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Candidate did not split into exactly the expected number of fields
    #[error("Expected {expected} fields, got {actual}")]
    FieldCountMismatch { expected: usize, actual: usize },

    /// A field was empty or not a signed decimal integer
    #[error("Field {index} is not an integer: {raw:?}")]
    NonIntegerField { index: usize, raw: String },

    /// No terminator arrived before the pending buffer hit its limit
    #[error("No terminator within {limit} bytes, discarded {discarded} pending bytes")]
    FrameTooLarge { limit: usize, discarded: usize },
}

impl DecodeError {
    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::FieldCountMismatch { .. } => "field_count_mismatch",
            DecodeError::NonIntegerField { .. } => "non_integer_field",
            DecodeError::FrameTooLarge { .. } => "frame_too_large",
        }
    }
}

/// Errors raised by the serial link. These are never handled by the
/// decoder; they end the producer loop and reach the session owner.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Serial port connection error
    #[error("Serial port error: {0}")]
    SerialError(String),

    /// Port enumeration found nothing to connect to
    #[error("No serial ports found, specify a port explicitly")]
    NoPorts,

    /// Port enumeration found more than one candidate
    #[error("{0} serial ports found, specify a port explicitly")]
    AmbiguousPort(usize),

    /// The link reported end of stream
    #[error("Serial link closed")]
    Disconnected,
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::SerialError(err.to_string())
    }
}

impl From<tokio_serial::Error> for TransportError {
    fn from(err: tokio_serial::Error) -> Self {
        TransportError::SerialError(err.to_string())
    }
}
